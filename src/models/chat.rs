use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Runner,
    Customer,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// Conversation for one open order view. Nothing is persisted; dropping
/// the log (closing the view) discards it.
#[derive(Debug, Default)]
pub struct ChatLog {
    order_id: String,
    messages: Vec<ChatMessage>,
}

impl ChatLog {
    pub fn open(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            messages: Vec::new(),
        }
    }

    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    /// Blank input is ignored. Returns whether a message was recorded.
    pub fn send(&mut self, text: &str) -> bool {
        self.push(Sender::Runner, text)
    }

    pub fn receive(&mut self, text: &str) -> bool {
        self.push(Sender::Customer, text)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn close(self) {}

    fn push(&mut self, sender: Sender, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }

        self.messages.push(ChatMessage {
            sender,
            text: text.to_string(),
            sent_at: Utc::now(),
        });
        true
    }
}

pub fn contact_uri(contact: &str) -> Option<String> {
    let number: String = contact
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    if number.is_empty() {
        None
    } else {
        Some(format!("tel:{number}"))
    }
}

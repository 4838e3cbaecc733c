use serde::Serialize;
use tracing::{debug, warn};

use super::ApiClient;
use crate::error::ClientError;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PushMessage {
    pub to: String,
    pub sound: &'static str,
    pub title: String,
    pub body: String,
}

/// Best-effort notifications to customers and stores through the push
/// delivery endpoint. Nothing waits on the outcome.
#[derive(Clone)]
pub struct PushDispatcher {
    http: reqwest::Client,
    endpoint: String,
}

impl PushDispatcher {
    pub fn new(api: &ApiClient, endpoint: &str) -> Self {
        Self {
            http: api.http().clone(),
            endpoint: endpoint.to_string(),
        }
    }

    /// Fire-and-forget. A missing recipient address is skipped.
    pub fn dispatch(&self, address: Option<&str>, title: &str, body: &str) {
        let Some(message) = build_message(address, title, body) else {
            debug!(title, "no push address for recipient; skipping notification");
            return;
        };

        let dispatcher = self.clone();
        tokio::spawn(async move {
            if let Err(err) = dispatcher.send(&message).await {
                warn!(error = %err, title = %message.title, "push notification failed");
            }
        });
    }

    pub async fn send(&self, message: &PushMessage) -> Result<(), ClientError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_status(status, &body));
        }

        Ok(())
    }
}

pub fn build_message(address: Option<&str>, title: &str, body: &str) -> Option<PushMessage> {
    let address = address.map(str::trim).filter(|addr| !addr.is_empty())?;
    Some(PushMessage {
        to: address.to_string(),
        sound: "default",
        title: title.to_string(),
        body: body.to_string(),
    })
}

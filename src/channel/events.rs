use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClientError;
use crate::models::request::{AcceptedRef, DeliveryRequest};

pub const NEW_DELIVERY_REQUEST: &str = "newDeliveryRequest";
pub const ACCEPTED_DELIVERY_REQUEST: &str = "acceptedDeliveryRequest";

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    NewDeliveryRequest(DeliveryRequest),
    AcceptedDeliveryRequest(AcceptedRef),
}

/// Text frame layout: `{"event": "<name>", "data": <payload>}`.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

impl ChannelEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ChannelEvent::NewDeliveryRequest(_) => NEW_DELIVERY_REQUEST,
            ChannelEvent::AcceptedDeliveryRequest(_) => ACCEPTED_DELIVERY_REQUEST,
        }
    }

    /// `Ok(None)` for events this client does not handle.
    pub fn decode(text: &str) -> Result<Option<Self>, ClientError> {
        let envelope: Envelope = serde_json::from_str(text)?;
        let event = match envelope.event.as_str() {
            NEW_DELIVERY_REQUEST => {
                ChannelEvent::NewDeliveryRequest(serde_json::from_value(envelope.data)?)
            }
            ACCEPTED_DELIVERY_REQUEST => {
                ChannelEvent::AcceptedDeliveryRequest(serde_json::from_value(envelope.data)?)
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

pub fn encode_accepted(request: &DeliveryRequest) -> Result<String, ClientError> {
    let envelope = Envelope {
        event: ACCEPTED_DELIVERY_REQUEST.to_string(),
        data: serde_json::to_value(request)?,
    };
    Ok(serde_json::to_string(&envelope)?)
}

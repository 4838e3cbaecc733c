use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    Accepted,
    Cancelled,
    #[serde(other)]
    Unknown,
}

/// A delivery opportunity offered to the runner.
///
/// Requests reach the client in two shapes: flat, or wrapped in a
/// runner-assignment record (`{ "_id": .., "deliveryRequest": { .. } }`).
/// Both are folded into this record on deserialization; `wrapper_id` keeps
/// the assignment record's id so removal can match either identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", from = "RequestPayload")]
pub struct DeliveryRequest {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(skip)]
    pub wrapper_id: Option<String>,
    pub store_name: String,
    pub pickup_address: String,
    pub delivery_address: String,
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runner_id: Option<String>,
}

impl DeliveryRequest {
    pub fn matches(&self, id: &str) -> bool {
        self.id == id || self.wrapper_id.as_deref() == Some(id)
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlatRequest {
    #[serde(rename = "_id", alias = "id")]
    id: String,
    #[serde(default)]
    store_name: String,
    #[serde(default)]
    pickup_address: String,
    #[serde(default)]
    delivery_address: String,
    #[serde(default)]
    status: RequestStatus,
    #[serde(default)]
    runner_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WrappedRequest {
    #[serde(rename = "_id", alias = "id", default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<RequestStatus>,
    #[serde(default)]
    runner_id: Option<String>,
    delivery_request: FlatRequest,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RequestPayload {
    Wrapped(WrappedRequest),
    Flat(FlatRequest),
}

impl From<RequestPayload> for DeliveryRequest {
    fn from(payload: RequestPayload) -> Self {
        match payload {
            RequestPayload::Flat(flat) => DeliveryRequest {
                id: flat.id,
                wrapper_id: None,
                store_name: flat.store_name,
                pickup_address: flat.pickup_address,
                delivery_address: flat.delivery_address,
                status: flat.status,
                runner_id: flat.runner_id,
            },
            RequestPayload::Wrapped(wrapped) => {
                let inner = wrapped.delivery_request;
                DeliveryRequest {
                    id: inner.id,
                    wrapper_id: wrapped.id,
                    store_name: inner.store_name,
                    pickup_address: inner.pickup_address,
                    delivery_address: inner.delivery_address,
                    status: wrapped.status.unwrap_or(inner.status),
                    runner_id: wrapped.runner_id.or(inner.runner_id),
                }
            }
        }
    }
}

/// Payload of an `acceptedDeliveryRequest` event: a bare id or a full
/// request in either shape.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AcceptedRef {
    Id(String),
    Request(DeliveryRequest),
}

impl AcceptedRef {
    pub fn matches(&self, request: &DeliveryRequest) -> bool {
        match self {
            AcceptedRef::Id(id) => request.matches(id),
            AcceptedRef::Request(accepted) => {
                request.matches(&accepted.id)
                    || accepted
                        .wrapper_id
                        .as_deref()
                        .is_some_and(|wrapper| request.matches(wrapper))
            }
        }
    }
}

impl From<&str> for AcceptedRef {
    fn from(id: &str) -> Self {
        AcceptedRef::Id(id.to_string())
    }
}

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use super::{ApiClient, DataEnvelope};
use crate::error::ClientError;
use crate::models::order::Order;
use crate::models::request::DeliveryRequest;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptResponse {
    #[serde(default)]
    pub delivery_request: Option<DeliveryRequest>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiClient {
    pub async fn delivery_requests(
        &self,
        token: &str,
        runner_id: &str,
    ) -> Result<Vec<DeliveryRequest>, ClientError> {
        let envelope: DataEnvelope<DeliveryRequest> = self
            .get(&format!("/delivery/runner/{runner_id}"), token)
            .await?;
        Ok(envelope.data)
    }

    pub async fn runner_orders(
        &self,
        token: &str,
        runner_id: &str,
    ) -> Result<Vec<Order>, ClientError> {
        let envelope: DataEnvelope<Order> = self
            .get(&format!("/runner/orders/{runner_id}"), token)
            .await?;
        Ok(envelope.data)
    }

    pub async fn accept_request(
        &self,
        token: &str,
        request_id: &str,
        runner_id: &str,
    ) -> Result<AcceptResponse, ClientError> {
        self.request(
            Method::POST,
            "/delivery/accept",
            Some(token),
            Some(json!({ "requestId": request_id, "runnerId": runner_id })),
        )
        .await
    }
}

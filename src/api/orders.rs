use reqwest::Method;
use serde_json::{json, Value};

use super::ApiClient;
use crate::error::ClientError;
use crate::models::order::Order;

impl ApiClient {
    pub async fn order(&self, token: &str, order_id: &str) -> Result<Order, ClientError> {
        self.get(&format!("/orders/{order_id}"), token).await
    }

    pub async fn mark_picked_up(
        &self,
        token: &str,
        runner_id: &str,
        order_id: &str,
    ) -> Result<(), ClientError> {
        let _: Value = self
            .request(
                Method::POST,
                &format!("/runner/{runner_id}/order/{order_id}/picked-up"),
                Some(token),
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn mark_delivered(
        &self,
        token: &str,
        runner_id: &str,
        order_id: &str,
        delivery_code: &str,
    ) -> Result<(), ClientError> {
        let _: Value = self
            .request(
                Method::POST,
                &format!("/runner/{runner_id}/order/{order_id}/delivered"),
                Some(token),
                Some(json!({ "deliveryCode": delivery_code })),
            )
            .await?;
        Ok(())
    }
}

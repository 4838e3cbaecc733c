use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use super::ApiClient;
use crate::error::ClientError;
use crate::models::runner::RunnerIdentity;
use crate::models::transaction::Transaction;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResponse {
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub runner: Option<RunnerIdentity>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ToggleResponse {
    /// The availability the server reports, falling back to what was asked.
    pub fn confirmed(&self, requested: bool) -> bool {
        self.runner
            .as_ref()
            .map(|runner| runner.is_active)
            .or(self.is_active)
            .unwrap_or(requested)
    }
}

#[derive(Debug, Deserialize)]
struct RunnerResponse {
    runner: RunnerIdentity,
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    #[serde(default)]
    transactions: Vec<Transaction>,
}

impl ApiClient {
    pub async fn toggle_active(
        &self,
        token: &str,
        runner_id: &str,
        is_active: bool,
    ) -> Result<ToggleResponse, ClientError> {
        let response: Option<ToggleResponse> = self
            .request(
                Method::PATCH,
                &format!("/runner/{runner_id}/toggleActive"),
                Some(token),
                Some(json!({ "isActive": is_active })),
            )
            .await?;
        Ok(response.unwrap_or_default())
    }

    pub async fn runner_detail(
        &self,
        token: &str,
        runner_id: &str,
    ) -> Result<RunnerIdentity, ClientError> {
        let response: RunnerResponse = self.get(&format!("/runner/{runner_id}"), token).await?;
        Ok(response.runner)
    }

    pub async fn transactions(
        &self,
        token: &str,
        runner_id: &str,
    ) -> Result<Vec<Transaction>, ClientError> {
        let response: TransactionsResponse = self
            .get(&format!("/runner/{runner_id}/transactions"), token)
            .await?;
        Ok(response.transactions)
    }
}

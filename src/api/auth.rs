use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use super::{ApiClient, MessageResponse};
use crate::error::ClientError;
use crate::models::runner::{ProfileFields, RunnerIdentity};

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileResponse {
    pub token: String,
    pub runner: RunnerIdentity,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    runner: RunnerIdentity,
}

impl ApiClient {
    pub async fn login(&self, phone: &str, password: &str) -> Result<LoginResponse, ClientError> {
        self.request(
            Method::POST,
            "/runner-auth/login",
            None,
            Some(json!({ "phone": phone, "password": password })),
        )
        .await
    }

    pub async fn send_code(&self, phone: &str) -> Result<MessageResponse, ClientError> {
        self.request(
            Method::POST,
            "/runner-auth/send-code",
            None,
            Some(json!({ "phone": phone })),
        )
        .await
    }

    pub async fn verify_code(&self, phone: &str, code: &str) -> Result<MessageResponse, ClientError> {
        self.request(
            Method::POST,
            "/runner-auth/verify-code",
            None,
            Some(json!({ "phone": phone, "code": code })),
        )
        .await
    }

    pub async fn complete_profile(
        &self,
        fields: &ProfileFields,
    ) -> Result<ProfileResponse, ClientError> {
        self.request(
            Method::POST,
            "/runner-auth/complete-profile",
            None,
            Some(serde_json::to_value(fields)?),
        )
        .await
    }

    pub async fn complete_campus_profile(
        &self,
        fields: &ProfileFields,
    ) -> Result<ProfileResponse, ClientError> {
        self.request(
            Method::POST,
            "/runner-auth/complete-campus-profile",
            None,
            Some(serde_json::to_value(fields)?),
        )
        .await
    }

    pub async fn me(&self, token: &str) -> Result<RunnerIdentity, ClientError> {
        let response: MeResponse = self.get("/runner-auth/me", token).await?;
        Ok(response.runner)
    }

    pub async fn update_push_address(
        &self,
        token: &str,
        runner_id: &str,
        address: &str,
    ) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .request(
                Method::PUT,
                &format!("/runner-auth/{runner_id}/expo-token"),
                Some(token),
                Some(json!({ "expoPushToken": address })),
            )
            .await?;
        Ok(())
    }
}

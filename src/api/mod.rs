pub mod auth;
pub mod delivery;
pub mod orders;
pub mod push;
pub mod runner;

use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::ClientError;
use crate::observability::metrics::Metrics;

/// HTTP client for the runner backend. Cheap to clone; clones share the
/// connection pool.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    metrics: Metrics,
}

/// `{ "data": [...] }` list envelope used by the collection endpoints.
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration, metrics: Metrics) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ClientError::Internal(format!("failed to build http client: {err}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            metrics,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.http.request(method.clone(), &url);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                self.metrics
                    .api_calls_total
                    .with_label_values(&["network_error"])
                    .inc();
                debug!(%method, path, error = %err, "request failed");
                return Err(err.into());
            }
        };

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            self.metrics
                .api_calls_total
                .with_label_values(&["rejected"])
                .inc();
            debug!(%method, path, status = status.as_u16(), "request rejected");
            return Err(ClientError::from_status(status, &text));
        }

        self.metrics
            .api_calls_total
            .with_label_values(&["success"])
            .inc();

        let value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };
        Ok(serde_json::from_value(value)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T, ClientError> {
        self.request(Method::GET, path, Some(token), None).await
    }
}

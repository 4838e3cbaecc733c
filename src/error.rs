use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("{0}")]
    Validation(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("action not confirmed: {0}")]
    ActionConfirmation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("profile is under review")]
    NotApproved,

    #[error("channel error: {0}")]
    Channel(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ClientError {
    /// Maps a non-success response to the error taxonomy, keeping the
    /// server's message verbatim when the body carries one.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|parsed| parsed.message.or(parsed.error))
            .unwrap_or_else(|| match status.canonical_reason() {
                Some(reason) => reason.to_string(),
                None => format!("status {}", status.as_u16()),
            });

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Auth(message),
            StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                ClientError::Validation(message)
            }
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            _ => ClientError::Network(message),
        }
    }

    /// Server rejections of a confirm-style action become
    /// `ActionConfirmation`; transport failures stay `Network`.
    pub fn into_confirmation(self) -> Self {
        match self {
            ClientError::Validation(msg)
            | ClientError::NotFound(msg)
            | ClientError::Auth(msg) => ClientError::ActionConfirmation(msg),
            other => other,
        }
    }

    /// Credential problems: the session must be dropped.
    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Auth(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Internal(format!("malformed payload: {err}"))
    }
}

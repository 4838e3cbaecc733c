use std::env;
use std::path::PathBuf;

use crate::error::ClientError;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub channel_url: String,
    pub push_endpoint: String,
    pub credentials_path: PathBuf,
    pub log_level: String,
    pub request_timeout_secs: u64,
    pub event_buffer_size: usize,
    pub outbound_buffer_size: usize,
    pub reconnect_base_ms: u64,
    pub reconnect_max_ms: u64,
    pub reconnect_max_attempts: u32,
    pub dedupe_incoming_requests: bool,
    pub runner_phone: Option<String>,
    pub runner_password: Option<String>,
    pub device_push_address: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ClientError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            api_base_url: env::var("API_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:5000".to_string()),
            channel_url: env::var("CHANNEL_URL")
                .unwrap_or_else(|_| "ws://127.0.0.1:5000/ws".to_string()),
            push_endpoint: env::var("PUSH_ENDPOINT")
                .unwrap_or_else(|_| "https://exp.host/--/api/v2/push/send".to_string()),
            credentials_path: env::var("CREDENTIALS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".runner/credentials.json")),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            request_timeout_secs: parse_or_default("REQUEST_TIMEOUT_SECS", 15)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 256)?,
            outbound_buffer_size: parse_or_default("OUTBOUND_BUFFER_SIZE", 64)?,
            reconnect_base_ms: parse_or_default("RECONNECT_BASE_MS", 500)?,
            reconnect_max_ms: parse_or_default("RECONNECT_MAX_MS", 30_000)?,
            reconnect_max_attempts: parse_or_default("RECONNECT_MAX_ATTEMPTS", 10)?,
            dedupe_incoming_requests: parse_or_default("DEDUPE_INCOMING_REQUESTS", false)?,
            runner_phone: env::var("RUNNER_PHONE").ok(),
            runner_password: env::var("RUNNER_PASSWORD").ok(),
            device_push_address: env::var("DEVICE_PUSH_ADDRESS").ok(),
        })
    }

    /// Defaults pointing at a local backend; tests override the URLs.
    pub fn local(api_base_url: &str, channel_url: &str, credentials_path: PathBuf) -> Self {
        Self {
            api_base_url: api_base_url.to_string(),
            channel_url: channel_url.to_string(),
            push_endpoint: format!("{}/push/send", api_base_url.trim_end_matches('/')),
            credentials_path,
            log_level: "info".to_string(),
            request_timeout_secs: 5,
            event_buffer_size: 256,
            outbound_buffer_size: 64,
            reconnect_base_ms: 50,
            reconnect_max_ms: 1_000,
            reconnect_max_attempts: 3,
            dedupe_incoming_requests: false,
            runner_phone: None,
            runner_password: None,
            device_push_address: None,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, ClientError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| ClientError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

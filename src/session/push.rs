use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PushUnavailable {
    #[error("permission not granted to get push token for push notification")]
    PermissionDenied,

    #[error("must use physical device for push notifications")]
    NotADevice,

    #[error("error getting push token: {0}")]
    Platform(String),
}

/// Platform notification service that hands out this device's push address.
#[async_trait]
pub trait PushRegistrar: Send + Sync {
    async fn device_address(&self) -> Result<String, PushUnavailable>;
}

/// A fixed address, e.g. from configuration. `None` behaves like a device
/// that cannot receive pushes.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistrar {
    address: Option<String>,
}

impl StaticRegistrar {
    pub fn new(address: Option<String>) -> Self {
        Self { address }
    }
}

#[async_trait]
impl PushRegistrar for StaticRegistrar {
    async fn device_address(&self) -> Result<String, PushUnavailable> {
        self.address.clone().ok_or(PushUnavailable::NotADevice)
    }
}

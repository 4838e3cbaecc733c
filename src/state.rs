use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::api::push::PushDispatcher;
use crate::api::ApiClient;
use crate::channel::backoff::Backoff;
use crate::channel::EventChannel;
use crate::config::Config;
use crate::error::ClientError;
use crate::fulfillment::OrderFulfillment;
use crate::observability::metrics::Metrics;
use crate::session::push::PushRegistrar;
use crate::session::Session;
use crate::storage::CredentialStore;
use crate::sync::pump::run_event_pump;
use crate::sync::reconciler::{DuplicatePolicy, ListReconciler};
use crate::wallet::{fetch_wallet, WalletSummary};

/// Everything a runner session needs, wired once at startup and handed to
/// whoever drives the UI.
pub struct AppState {
    pub api: ApiClient,
    pub session: Arc<Session>,
    pub channel: Arc<EventChannel>,
    pub reconciler: Arc<ListReconciler>,
    pub fulfillment: OrderFulfillment,
    pub push: PushDispatcher,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config, registrar: Arc<dyn PushRegistrar>) -> Result<Self, ClientError> {
        let metrics = Metrics::new();
        let api = ApiClient::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
            metrics.clone(),
        )?;
        let push = PushDispatcher::new(&api, &config.push_endpoint);

        let session = Arc::new(Session::new(
            api.clone(),
            CredentialStore::new(config.credentials_path.clone()),
            registrar,
        ));

        let channel = Arc::new(EventChannel::new(
            &config.channel_url,
            Backoff::new(
                Duration::from_millis(config.reconnect_base_ms),
                Duration::from_millis(config.reconnect_max_ms),
                config.reconnect_max_attempts,
            ),
            config.event_buffer_size,
            config.outbound_buffer_size,
            metrics.clone(),
        ));

        let policy = if config.dedupe_incoming_requests {
            DuplicatePolicy::ReplaceById
        } else {
            DuplicatePolicy::Prepend
        };
        let reconciler = Arc::new(ListReconciler::new(
            api.clone(),
            session.clone(),
            channel.clone(),
            policy,
            metrics.clone(),
        ));

        let fulfillment = OrderFulfillment::new(
            api.clone(),
            session.clone(),
            reconciler.clone(),
            push.clone(),
        );

        Ok(Self {
            api,
            session,
            channel,
            reconciler,
            fulfillment,
            push,
            metrics,
        })
    }

    /// Opens the channel for the signed-in runner, starts applying its
    /// events and runs the initial fetch. An unreachable channel is not
    /// fatal: the lists still load and the channel keeps retrying in the
    /// background. The returned pump stops when the channel is dropped;
    /// abort it on teardown.
    pub async fn start(&self) -> Result<JoinHandle<()>, ClientError> {
        let (_, identity) = self.session.credentials()?;

        let pump = tokio::spawn(run_event_pump(
            self.reconciler.clone(),
            self.channel.subscribe(),
            self.channel.status(),
        ));
        if let Err(err) = self.channel.connect(&identity).await {
            warn!(error = %err, "channel not connected at startup");
        }

        let (requests, orders) = self.reconciler.refresh_all().await;
        if let Err(err) = requests {
            warn!(error = %err, "initial request fetch failed");
        }
        if let Err(err) = orders {
            warn!(error = %err, "initial order fetch failed");
        }

        Ok(pump)
    }

    pub async fn wallet(&self) -> Result<WalletSummary, ClientError> {
        fetch_wallet(&self.api, &self.session).await
    }

    pub fn logout(&self) {
        self.channel.disconnect();
        self.reconciler.clear();
        self.session.logout();
    }
}

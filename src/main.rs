use std::sync::Arc;

use runner_client::config::Config;
use runner_client::error::ClientError;
use runner_client::session::push::StaticRegistrar;
use runner_client::session::RestoreOutcome;
use runner_client::state::AppState;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let registrar = Arc::new(StaticRegistrar::new(config.device_push_address.clone()));
    let app = AppState::new(&config, registrar)?;

    match app.session.restore_session().await {
        RestoreOutcome::Restored(identity) => {
            tracing::info!(runner_id = %identity.id, "resuming session");
        }
        RestoreOutcome::NoSession | RestoreOutcome::Expired => {
            let (Some(phone), Some(password)) = (&config.runner_phone, &config.runner_password)
            else {
                return Err(ClientError::Auth(
                    "no stored session; set RUNNER_PHONE and RUNNER_PASSWORD".to_string(),
                ));
            };
            app.session.sign_in(phone, password).await?;
        }
    }

    if let Some(identity) = app.session.identity() {
        if !identity.is_approved {
            tracing::warn!("profile is under review; availability cannot be changed yet");
        }
    }

    let pump = app.start().await?;
    let mut counts = WatchStream::new(app.reconciler.subscribe_counts());

    loop {
        tokio::select! {
            Some(current) = counts.next() => {
                tracing::info!(
                    new_requests = current.new_requests,
                    active_orders = current.active_orders,
                    "lists updated"
                );
            }
            _ = shutdown_signal() => break,
        }
    }

    app.channel.disconnect();
    pump.abort();
    match app.metrics.encode() {
        Ok(text) => tracing::debug!(metrics = %text, "final metrics"),
        Err(err) => tracing::warn!(error = %err, "failed to encode metrics"),
    }
    tracing::info!("runner client stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}

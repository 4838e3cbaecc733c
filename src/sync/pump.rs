use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use crate::channel::events::ChannelEvent;
use crate::channel::ChannelStatus;
use crate::sync::reconciler::ListReconciler;

/// Applies channel events to the reconciler until the channel goes away.
/// Every time the channel comes back after a drop both lists are refetched,
/// since pushes sent while it was down are gone.
pub async fn run_event_pump(
    reconciler: Arc<ListReconciler>,
    mut events_rx: broadcast::Receiver<ChannelEvent>,
    mut status_rx: watch::Receiver<ChannelStatus>,
) {
    info!("event pump started");
    let mut last_status = *status_rx.borrow_and_update();

    loop {
        tokio::select! {
            received = events_rx.recv() => match received {
                Ok(event) => reconciler.apply_event(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event pump lagged; refetching requests");
                    if let Err(err) = reconciler.refresh_requests().await {
                        warn!(error = %err, "resync after lag failed");
                    }
                }
                Err(RecvError::Closed) => break,
            },
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = *status_rx.borrow_and_update();
                // Connected twice in a row means the Reconnecting in between
                // was coalesced away.
                if status == ChannelStatus::Connected && last_status != ChannelStatus::Disconnected {
                    resync(&reconciler).await;
                }
                last_status = status;
            }
        }
    }

    warn!("event pump stopped: event channel closed");
}

async fn resync(reconciler: &ListReconciler) {
    info!("channel reconnected; refetching lists");
    let (requests, orders) = reconciler.refresh_all().await;
    if let Err(err) = requests {
        warn!(error = %err, "request resync failed");
    }
    if let Err(err) = orders {
        warn!(error = %err, "order resync failed");
    }
}

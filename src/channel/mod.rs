pub mod backoff;
pub mod events;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::channel::backoff::Backoff;
use crate::channel::events::{encode_accepted, ChannelEvent};
use crate::error::ClientError;
use crate::models::request::DeliveryRequest;
use crate::models::runner::RunnerIdentity;
use crate::observability::metrics::Metrics;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Disconnected,
    Connected,
    Reconnecting,
}

struct ActiveChannel {
    runner_id: String,
    outbound_tx: mpsc::Sender<String>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

#[derive(Clone)]
struct ConnectionContext {
    url: String,
    backoff: Backoff,
    events_tx: broadcast::Sender<ChannelEvent>,
    status_tx: watch::Sender<ChannelStatus>,
    metrics: Metrics,
}

enum DriveExit {
    Shutdown,
    Dropped,
}

enum Reconnect {
    Connected(WsStream),
    Shutdown,
    GaveUp,
}

/// One live event connection per signed-in runner. Only this type opens or
/// closes it; everyone else subscribes.
pub struct EventChannel {
    base_url: String,
    backoff: Backoff,
    outbound_buffer: usize,
    events_tx: broadcast::Sender<ChannelEvent>,
    status_tx: watch::Sender<ChannelStatus>,
    active: Mutex<Option<ActiveChannel>>,
    metrics: Metrics,
}

impl EventChannel {
    pub fn new(
        base_url: &str,
        backoff: Backoff,
        event_buffer_size: usize,
        outbound_buffer: usize,
        metrics: Metrics,
    ) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));
        let (status_tx, _unused_status) = watch::channel(ChannelStatus::Disconnected);

        Self {
            base_url: base_url.to_string(),
            backoff,
            outbound_buffer: outbound_buffer.max(1),
            events_tx,
            status_tx,
            active: Mutex::new(None),
            metrics,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events_tx.subscribe()
    }

    pub fn status(&self) -> watch::Receiver<ChannelStatus> {
        self.status_tx.subscribe()
    }

    pub fn is_connected_for(&self, runner_id: &str) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|active| active.runner_id == runner_id && !active.task.is_finished())
    }

    /// Opens the channel for `identity`. Already open for the same runner is
    /// a no-op; open for someone else closes that channel first.
    ///
    /// A failed first attempt is returned as `Channel` but not abandoned: the
    /// status moves to `Reconnecting` and the backoff loop keeps trying.
    pub async fn connect(&self, identity: &RunnerIdentity) -> Result<(), ClientError> {
        if self.is_connected_for(&identity.id) {
            debug!(runner_id = %identity.id, "channel already open");
            return Ok(());
        }
        self.disconnect();

        let url = channel_url(&self.base_url, &identity.id)?;
        let first = connect_async(url.as_str())
            .await
            .map(|(ws, _)| ws)
            .map_err(|err| ClientError::Channel(format!("failed to connect: {err}")));

        let mut active = self.active.lock();
        if active
            .as_ref()
            .is_some_and(|current| current.runner_id == identity.id && !current.task.is_finished())
        {
            // Another connect won the race; this socket is dropped unused.
            return Ok(());
        }

        let (outbound_tx, outbound_rx) = mpsc::channel(self.outbound_buffer);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ctx = ConnectionContext {
            url,
            backoff: self.backoff,
            events_tx: self.events_tx.clone(),
            status_tx: self.status_tx.clone(),
            metrics: self.metrics.clone(),
        };

        let (socket, outcome) = match first {
            Ok(ws) => {
                self.status_tx.send_replace(ChannelStatus::Connected);
                info!(runner_id = %identity.id, "channel connected");
                (Some(ws), Ok(()))
            }
            Err(err) => {
                self.status_tx.send_replace(ChannelStatus::Reconnecting);
                warn!(runner_id = %identity.id, error = %err, "channel unavailable; retrying in background");
                (None, Err(err))
            }
        };
        let task = tokio::spawn(run_connection(ctx, socket, outbound_rx, shutdown_rx));

        if let Some(previous) = active.replace(ActiveChannel {
            runner_id: identity.id.clone(),
            outbound_tx,
            shutdown_tx,
            task,
        }) {
            let _ = previous.shutdown_tx.send(true);
        }

        outcome
    }

    /// Idempotent.
    pub fn disconnect(&self) {
        let Some(active) = self.active.lock().take() else {
            return;
        };

        let _ = active.shutdown_tx.send(true);
        self.status_tx.send_replace(ChannelStatus::Disconnected);
        info!(runner_id = %active.runner_id, "channel disconnected");
    }

    /// Tells peers this request is taken.
    pub async fn emit_accepted(&self, request: &DeliveryRequest) -> Result<(), ClientError> {
        let frame = encode_accepted(request)?;
        let outbound_tx = self
            .active
            .lock()
            .as_ref()
            .map(|active| active.outbound_tx.clone())
            .ok_or_else(|| ClientError::Channel("not connected".to_string()))?;

        outbound_tx
            .send(frame)
            .await
            .map_err(|_| ClientError::Channel("channel closed".to_string()))
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            let _ = active.shutdown_tx.send(true);
        }
    }
}

fn channel_url(base_url: &str, runner_id: &str) -> Result<String, ClientError> {
    let mut url = url::Url::parse(base_url)
        .map_err(|err| ClientError::Channel(format!("invalid channel url {base_url}: {err}")))?;
    url.query_pairs_mut().append_pair("runnerId", runner_id);
    Ok(url.into())
}

async fn run_connection(
    ctx: ConnectionContext,
    mut socket: Option<WsStream>,
    mut outbound_rx: mpsc::Receiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    // Status is left alone on shutdown: `disconnect` already reported it and
    // a newer connection may own it by now.
    loop {
        let ws = match socket.take() {
            Some(ws) => ws,
            None => {
                ctx.status_tx.send_replace(ChannelStatus::Reconnecting);
                match reconnect(&ctx, &mut shutdown_rx).await {
                    Reconnect::Connected(ws) => {
                        ctx.status_tx.send_replace(ChannelStatus::Connected);
                        ws
                    }
                    Reconnect::Shutdown => return,
                    Reconnect::GaveUp => {
                        ctx.status_tx.send_replace(ChannelStatus::Disconnected);
                        return;
                    }
                }
            }
        };

        if let DriveExit::Shutdown = drive(&ctx, ws, &mut outbound_rx, &mut shutdown_rx).await {
            return;
        }
    }
}

async fn drive(
    ctx: &ConnectionContext,
    ws: WsStream,
    outbound_rx: &mut mpsc::Receiver<String>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> DriveExit {
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                let _ = sink.send(Message::Close(None)).await;
                return DriveExit::Shutdown;
            }
            Some(frame) = outbound_rx.recv() => {
                if let Err(err) = sink.send(Message::Text(frame.into())).await {
                    warn!(error = %err, "failed to send channel frame");
                    return DriveExit::Dropped;
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => handle_frame(ctx, text.as_str()),
                Some(Ok(Message::Close(_))) | None => return DriveExit::Dropped,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(error = %err, "channel read failed");
                    return DriveExit::Dropped;
                }
            },
        }
    }
}

async fn reconnect(ctx: &ConnectionContext, shutdown_rx: &mut watch::Receiver<bool>) -> Reconnect {
    let mut attempt = 0;

    while ctx.backoff.allows(attempt) {
        let delay = ctx.backoff.delay(attempt);
        attempt += 1;
        ctx.metrics.reconnect_attempts_total.inc();
        warn!(attempt, delay_ms = delay.as_millis() as u64, "channel down; reconnecting");

        tokio::select! {
            _ = sleep(delay) => {}
            _ = shutdown_rx.changed() => return Reconnect::Shutdown,
        }

        match connect_async(ctx.url.as_str()).await {
            Ok((ws, _)) => {
                info!(attempt, "channel reconnected");
                return Reconnect::Connected(ws);
            }
            Err(err) => warn!(attempt, error = %err, "reconnect failed"),
        }
    }

    warn!(attempts = attempt, "giving up on channel");
    Reconnect::GaveUp
}

fn handle_frame(ctx: &ConnectionContext, text: &str) {
    match ChannelEvent::decode(text) {
        Ok(Some(event)) => {
            ctx.metrics
                .channel_events_total
                .with_label_values(&[event.name()])
                .inc();
            debug!(event = event.name(), "channel event received");
            let _ = ctx.events_tx.send(event);
        }
        Ok(None) => debug!("ignoring unhandled channel event"),
        Err(err) => warn!(error = %err, "malformed channel frame"),
    }
}

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::ApiClient;
use crate::channel::events::ChannelEvent;
use crate::channel::EventChannel;
use crate::error::ClientError;
use crate::models::order::{Order, OrderStatus};
use crate::models::request::{AcceptedRef, DeliveryRequest};
use crate::observability::metrics::Metrics;
use crate::session::Session;
use crate::sync::journal::{replay, EventJournal, JournalEntry, JournalMark};
use crate::sync::sequence::{AppliedMark, RefreshSequencer, RefreshTicket};

/// What to do when a pushed request has an id already in view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Prepend regardless; the same request can show up twice.
    #[default]
    Prepend,
    /// Drop the older entry so each id appears once.
    ReplaceById,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    NewRequests,
    ActiveOrders,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderFilter {
    #[default]
    All,
    InProgress,
    PickedUp,
    Completed,
}

impl OrderFilter {
    pub fn admits(self, status: OrderStatus) -> bool {
        match self {
            OrderFilter::All => true,
            OrderFilter::InProgress => status == OrderStatus::InProgress,
            OrderFilter::PickedUp => status == OrderStatus::PickedUp,
            OrderFilter::Completed => status == OrderStatus::Completed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TabCounts {
    pub new_requests: usize,
    pub active_orders: usize,
}

impl TabCounts {
    pub fn for_tab(&self, tab: Tab) -> usize {
        match tab {
            Tab::NewRequests => self.new_requests,
            Tab::ActiveOrders => self.active_orders,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied(usize),
    /// A newer fetch already landed; this response was dropped.
    Stale,
}

#[derive(Debug, Default)]
struct Lists {
    requests: Vec<DeliveryRequest>,
    orders: Vec<Order>,
    requests_applied: AppliedMark,
    orders_applied: AppliedMark,
    journal: EventJournal,
}

impl Lists {
    fn counts(&self) -> TabCounts {
        TabCounts {
            new_requests: self.requests.iter().filter(|r| r.is_pending()).count(),
            active_orders: self.orders.len(),
        }
    }
}

/// Keeps the journal open for one in-flight request fetch; a fetch dropped
/// mid-flight closes its mark on drop.
struct OpenFetch<'a> {
    lists: &'a Mutex<Lists>,
    mark: JournalMark,
    finished: bool,
}

impl<'a> OpenFetch<'a> {
    fn new(lists: &'a Mutex<Lists>) -> Self {
        let mark = lists.lock().journal.open();
        Self {
            lists,
            mark,
            finished: false,
        }
    }

    /// Hands the mark to the caller, who closes it under the list lock.
    fn finish(mut self) -> JournalMark {
        self.finished = true;
        self.mark
    }
}

impl Drop for OpenFetch<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.lists.lock().journal.close(self.mark);
        }
    }
}

/// Local copies of the pending requests and owned orders, kept in step with
/// fetches, channel events and the runner's own accepts.
pub struct ListReconciler {
    api: ApiClient,
    session: Arc<Session>,
    channel: Arc<EventChannel>,
    policy: DuplicatePolicy,
    lists: Mutex<Lists>,
    request_tickets: RefreshSequencer,
    order_tickets: RefreshSequencer,
    counts_tx: watch::Sender<TabCounts>,
    metrics: Metrics,
}

impl ListReconciler {
    pub fn new(
        api: ApiClient,
        session: Arc<Session>,
        channel: Arc<EventChannel>,
        policy: DuplicatePolicy,
        metrics: Metrics,
    ) -> Self {
        let (counts_tx, _unused_rx) = watch::channel(TabCounts::default());

        Self {
            api,
            session,
            channel,
            policy,
            lists: Mutex::new(Lists::default()),
            request_tickets: RefreshSequencer::default(),
            order_tickets: RefreshSequencer::default(),
            counts_tx,
            metrics,
        }
    }

    pub fn counts(&self) -> TabCounts {
        *self.counts_tx.borrow()
    }

    pub fn subscribe_counts(&self) -> watch::Receiver<TabCounts> {
        self.counts_tx.subscribe()
    }

    /// The "new requests" tab: pending requests, newest first.
    pub fn requests(&self) -> Vec<DeliveryRequest> {
        self.lists
            .lock()
            .requests
            .iter()
            .filter(|request| request.is_pending())
            .cloned()
            .collect()
    }

    /// The "active orders" tab narrowed by status.
    pub fn orders(&self, filter: OrderFilter) -> Vec<Order> {
        self.lists
            .lock()
            .orders
            .iter()
            .filter(|order| filter.admits(order.status))
            .cloned()
            .collect()
    }

    pub fn order(&self, order_id: &str) -> Option<Order> {
        self.lists
            .lock()
            .orders
            .iter()
            .find(|order| order.id == order_id)
            .cloned()
    }

    pub async fn refresh_requests(&self) -> Result<RefreshOutcome, ClientError> {
        let ticket = self.request_tickets.issue();
        let (token, identity) = self.session.credentials()?;
        let open = OpenFetch::new(&self.lists);

        let fetched = self.api.delivery_requests(&token, &identity.id).await;
        let mark = open.finish();

        // Events applied while the fetch was in flight are replayed on top
        // of the snapshot.
        let outcome = self
            .mutate(|lists| -> Result<RefreshOutcome, ClientError> {
                let missed = lists.journal.close(mark);
                let requests = fetched?;
                if !lists.requests_applied.admit(ticket) {
                    return Ok(RefreshOutcome::Stale);
                }
                lists.requests = requests;
                replay(&mut lists.requests, missed);
                Ok(RefreshOutcome::Applied(lists.requests.len()))
            })
            .inspect_err(|err| warn!(error = %err, "failed to fetch delivery requests"))?;
        Ok(self.note_stale("requests", ticket, outcome))
    }

    pub async fn refresh_orders(&self) -> Result<RefreshOutcome, ClientError> {
        let ticket = self.order_tickets.issue();
        let (token, identity) = self.session.credentials()?;

        let orders = self
            .api
            .runner_orders(&token, &identity.id)
            .await
            .inspect_err(|err| warn!(error = %err, "failed to fetch orders"))?;

        let outcome = self.mutate(|lists| {
            if !lists.orders_applied.admit(ticket) {
                return RefreshOutcome::Stale;
            }
            lists.orders = orders;
            RefreshOutcome::Applied(lists.orders.len())
        });
        Ok(self.note_stale("orders", ticket, outcome))
    }

    pub async fn refresh_all(
        &self,
    ) -> (
        Result<RefreshOutcome, ClientError>,
        Result<RefreshOutcome, ClientError>,
    ) {
        tokio::join!(self.refresh_requests(), self.refresh_orders())
    }

    pub fn apply_incoming_request(&self, request: DeliveryRequest) {
        debug!(request_id = %request.id, "new delivery request");
        let policy = self.policy;
        self.mutate(|lists| {
            if policy == DuplicatePolicy::ReplaceById {
                lists.requests.retain(|existing| existing.id != request.id);
            }
            lists.journal.record(JournalEntry::Pushed(request.clone()));
            lists.requests.insert(0, request);
        });
    }

    /// Removes every entry matching `accepted`. Absent entries are fine.
    pub fn apply_accepted_elsewhere(&self, accepted: &AcceptedRef) -> usize {
        let removed = self.mutate(|lists| {
            lists.journal.record(JournalEntry::Accepted(accepted.clone()));
            let before = lists.requests.len();
            lists.requests.retain(|request| !accepted.matches(request));
            before - lists.requests.len()
        });
        if removed > 0 {
            debug!(removed, "accepted request removed from view");
        }
        removed
    }

    pub fn apply_event(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::NewDeliveryRequest(request) => self.apply_incoming_request(request),
            ChannelEvent::AcceptedDeliveryRequest(accepted) => {
                self.apply_accepted_elsewhere(&accepted);
            }
        }
    }

    /// Claims a request. Nothing changes locally until the server confirms;
    /// then peers are told and both lists are refetched.
    pub async fn accept_request(
        &self,
        request: &DeliveryRequest,
    ) -> Result<DeliveryRequest, ClientError> {
        let (token, identity) = self.session.credentials()?;

        let response = self
            .api
            .accept_request(&token, &request.id, &identity.id)
            .await
            .inspect_err(|err| error!(request_id = %request.id, error = %err, "accept failed"))?;

        let Some(accepted) = response.delivery_request else {
            let message = response
                .message
                .unwrap_or_else(|| "accept response carried no delivery request".to_string());
            error!(request_id = %request.id, %message, "accept not confirmed");
            return Err(ClientError::ActionConfirmation(message));
        };

        self.apply_accepted_elsewhere(&AcceptedRef::Id(request.id.clone()));
        self.apply_accepted_elsewhere(&AcceptedRef::Request(accepted.clone()));
        info!(request_id = %request.id, runner_id = %identity.id, "delivery request accepted");

        if let Err(err) = self.channel.emit_accepted(&accepted).await {
            warn!(error = %err, "failed to announce accepted request");
        }

        let (requests, orders) = self.refresh_all().await;
        if let Err(err) = requests.and(orders) {
            warn!(error = %err, "refresh after accept failed");
        }

        Ok(accepted)
    }

    /// Mirrors a server-confirmed status change. Backward moves are refused.
    pub fn mirror_order_status(&self, order_id: &str, status: OrderStatus) -> bool {
        self.mutate(|lists| {
            match lists.orders.iter_mut().find(|order| order.id == order_id) {
                Some(order) if order.status.can_advance_to(status) => {
                    order.status = status;
                    true
                }
                _ => false,
            }
        })
    }

    pub fn clear(&self) {
        self.mutate(|lists| {
            lists.requests.clear();
            lists.orders.clear();
        });
    }

    fn mutate<T>(&self, apply: impl FnOnce(&mut Lists) -> T) -> T {
        let mut lists = self.lists.lock();
        let result = apply(&mut lists);
        let counts = lists.counts();
        drop(lists);

        self.metrics.pending_requests.set(counts.new_requests as i64);
        self.metrics.owned_orders.set(counts.active_orders as i64);
        self.counts_tx.send_if_modified(|current| {
            let changed = *current != counts;
            *current = counts;
            changed
        });
        result
    }

    fn note_stale(
        &self,
        collection: &str,
        ticket: RefreshTicket,
        outcome: RefreshOutcome,
    ) -> RefreshOutcome {
        if outcome == RefreshOutcome::Stale {
            self.metrics
                .stale_refreshes_total
                .with_label_values(&[collection])
                .inc();
            warn!(collection, ?ticket, "discarded stale refresh");
        }
        outcome
    }
}

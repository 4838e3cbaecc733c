use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub channel_events_total: IntCounterVec,
    pub api_calls_total: IntCounterVec,
    pub stale_refreshes_total: IntCounterVec,
    pub reconnect_attempts_total: IntCounter,
    pub pending_requests: IntGauge,
    pub owned_orders: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let channel_events_total = IntCounterVec::new(
            Opts::new("channel_events_total", "Channel events received by name"),
            &["event"],
        )
        .expect("valid channel_events_total metric");

        let api_calls_total = IntCounterVec::new(
            Opts::new("api_calls_total", "API calls by outcome"),
            &["outcome"],
        )
        .expect("valid api_calls_total metric");

        let stale_refreshes_total = IntCounterVec::new(
            Opts::new(
                "stale_refreshes_total",
                "Refresh responses discarded because a newer one was applied",
            ),
            &["collection"],
        )
        .expect("valid stale_refreshes_total metric");

        let reconnect_attempts_total = IntCounter::new(
            "reconnect_attempts_total",
            "Channel reconnection attempts",
        )
        .expect("valid reconnect_attempts_total metric");

        let pending_requests = IntGauge::new("pending_requests", "Delivery requests in view")
            .expect("valid pending_requests metric");

        let owned_orders = IntGauge::new("owned_orders", "Orders owned by the runner")
            .expect("valid owned_orders metric");

        registry
            .register(Box::new(channel_events_total.clone()))
            .expect("register channel_events_total");
        registry
            .register(Box::new(api_calls_total.clone()))
            .expect("register api_calls_total");
        registry
            .register(Box::new(stale_refreshes_total.clone()))
            .expect("register stale_refreshes_total");
        registry
            .register(Box::new(reconnect_attempts_total.clone()))
            .expect("register reconnect_attempts_total");
        registry
            .register(Box::new(pending_requests.clone()))
            .expect("register pending_requests");
        registry
            .register(Box::new(owned_orders.clone()))
            .expect("register owned_orders");

        Self {
            registry,
            channel_events_total,
            api_calls_total,
            stale_refreshes_total,
            reconnect_attempts_total,
            pending_requests,
            owned_orders,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub dispatch_jobs_in_queue: IntGauge,
    pub dispatch_enqueue_failures_total: IntCounter,
    pub dispatch_total: IntCounterVec,
    pub dispatch_latency_seconds: HistogramVec,
    pub matches_created_total: IntCounter,
    pub notifications_total: IntCounterVec,
    pub match_transitions_total: IntCounterVec,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let dispatch_jobs_in_queue = IntGauge::new(
            "dispatch_jobs_in_queue",
            "Current number of orders waiting for match dispatch",
        )
        .expect("valid dispatch_jobs_in_queue metric");

        let dispatch_enqueue_failures_total = IntCounter::new(
            "dispatch_enqueue_failures_total",
            "Orders that could not be queued for match dispatch",
        )
        .expect("valid dispatch_enqueue_failures_total metric");

        let dispatch_total = IntCounterVec::new(
            Opts::new("dispatch_total", "Total dispatch runs by outcome"),
            &["outcome"],
        )
        .expect("valid dispatch_total metric");

        let dispatch_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "dispatch_latency_seconds",
                "Latency of match dispatch in seconds",
            ),
            &["outcome"],
        )
        .expect("valid dispatch_latency_seconds metric");

        let matches_created_total =
            IntCounter::new("matches_created_total", "Total match records created")
                .expect("valid matches_created_total metric");

        let notifications_total = IntCounterVec::new(
            Opts::new("notifications_total", "Operator notifications by outcome"),
            &["outcome"],
        )
        .expect("valid notifications_total metric");

        let match_transitions_total = IntCounterVec::new(
            Opts::new(
                "match_transitions_total",
                "Accepted or rejected match decisions by side",
            ),
            &["side", "decision"],
        )
        .expect("valid match_transitions_total metric");

        registry
            .register(Box::new(dispatch_jobs_in_queue.clone()))
            .expect("register dispatch_jobs_in_queue");
        registry
            .register(Box::new(dispatch_enqueue_failures_total.clone()))
            .expect("register dispatch_enqueue_failures_total");
        registry
            .register(Box::new(dispatch_total.clone()))
            .expect("register dispatch_total");
        registry
            .register(Box::new(dispatch_latency_seconds.clone()))
            .expect("register dispatch_latency_seconds");
        registry
            .register(Box::new(matches_created_total.clone()))
            .expect("register matches_created_total");
        registry
            .register(Box::new(notifications_total.clone()))
            .expect("register notifications_total");
        registry
            .register(Box::new(match_transitions_total.clone()))
            .expect("register match_transitions_total");

        Self {
            registry,
            dispatch_jobs_in_queue,
            dispatch_enqueue_failures_total,
            dispatch_total,
            dispatch_latency_seconds,
            matches_created_total,
            notifications_total,
            match_transitions_total,
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


use autometrics::prometheus_exporter::{self};
use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, register_histogram_vec, HistogramVec, IntCounterVec, IntGaugeVec, Opts,
    Registry,
};

lazy_static! {
    pub static ref LEADERSHIP_TRANSITIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("leadership_transitions", "Role transitions observed by local agents"),
        &["cluster_id", "transition"]
    )
    .expect("metric can not be created");

    pub static ref IS_LEADER: IntGaugeVec = IntGaugeVec::new(
        Opts::new("is_leader", "1 while the local agent holds the lease"),
        &["cluster_id", "holder_id"]
    )
    .expect("metric can not be created");

    pub static ref HELD_FENCING_TOKEN: IntGaugeVec = IntGaugeVec::new(
        Opts::new("held_fencing_token", "Fencing token held by the local leader, 0 when none"),
        &["cluster_id", "holder_id"]
    )
    .expect("metric can not be created");

    pub static ref STORE_CALL_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("store_call_failures", "Lease store calls that failed or timed out"),
        &["operation"]
    )
    .expect("metric can not be created");

    pub static ref STORE_CALL_LATENCY_MS: HistogramVec = register_histogram_vec!(
        "store_call_latency_ms",
        "Histogram of lease store call latency in ms",
        &["operation"],
        exponential_buckets(1.0, 2.0, 12).expect("valid buckets")
    )
    .expect("metric can not be created");

    pub static ref STORE_UNAVAILABLE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("store_unavailable", "1 while the store has been unreachable for several lease windows"),
        &["cluster_id", "holder_id"]
    )
    .expect("metric can not be created");

    pub static ref EVENTS_PUBLISHED: IntCounterVec = IntCounterVec::new(
        Opts::new("events_published", "Leadership events handed to the notification channel"),
        &["cluster_id", "result"]
    )
    .expect("metric can not be created");

    pub static ref EVENTS_DELIVERED: IntCounterVec = IntCounterVec::new(
        Opts::new("events_delivered", "Leadership events delivered to subscription handlers"),
        &["cluster_id"]
    )
    .expect("metric can not be created");

    pub static ref EVENTS_DUPLICATED: IntCounterVec = IntCounterVec::new(
        Opts::new("events_duplicated", "Redelivered leadership events dropped by deduplication"),
        &["cluster_id"]
    )
    .expect("metric can not be created");

    pub static ref CONFIG_RELOADS: IntCounterVec = IntCounterVec::new(
        Opts::new("config_reloads", "Election parameter reloads by result"),
        &["result"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

pub(crate) fn register_custom_metrics(registry: &Registry) {
    // registering twice yields AlreadyReg, which is fine for repeated node starts
    let _ = registry.register(Box::new(LEADERSHIP_TRANSITIONS.clone()));
    let _ = registry.register(Box::new(IS_LEADER.clone()));
    let _ = registry.register(Box::new(HELD_FENCING_TOKEN.clone()));
    let _ = registry.register(Box::new(STORE_CALL_FAILURES.clone()));
    let _ = registry.register(Box::new(STORE_UNAVAILABLE.clone()));
    let _ = registry.register(Box::new(EVENTS_PUBLISHED.clone()));
    let _ = registry.register(Box::new(EVENTS_DELIVERED.clone()));
    let _ = registry.register(Box::new(EVENTS_DUPLICATED.clone()));
    let _ = registry.register(Box::new(CONFIG_RELOADS.clone()));
}

/// Registers custom collectors and the autometrics exporter.
pub fn init_metrics() {
    register_custom_metrics(&REGISTRY);
    let _ = prometheus_exporter::try_init();
}

/// Prometheus text exposition: custom registry, default registry, autometrics.
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut res = String::new();
    for families in [REGISTRY.gather(), prometheus::gather()] {
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&families, &mut buffer) {
            tracing::warn!("could not encode metrics: {}", e);
            continue;
        }
        match String::from_utf8(buffer) {
            Ok(v) => res.push_str(&v),
            Err(e) => tracing::warn!("metrics could not be from_utf8'd: {}", e),
        }
    }

    res.push_str(&get_metrics_body());
    res
}

/// Export autometrics metrics for Prometheus to scrape
pub fn get_metrics_body() -> String {
    prometheus_exporter::encode_http_response().into_body()
}

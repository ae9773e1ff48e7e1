use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Metrics::new()
        })
        .await
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Refresh metrics
    pub refresh_attempts: IntCounter,
    pub refresh_failures: IntCounterVec,

    // Hydration metrics
    pub hydrations: IntCounter,

    // Persistence metrics
    pub save_failures: IntCounter,

    // Refresh-map occupancy
    pub refresh_map_entries: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("twitch_credentials".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            refresh_attempts: IntCounter::new("refresh_attempts_total", "Total refresh attempts").unwrap(),
            refresh_failures: IntCounterVec::new(Opts::new("refresh_failures_total", "Refresh failures by reason"), &["reason"]).unwrap(),

            hydrations: IntCounter::new("hydrations_total", "Credential records hydrated via token introspection").unwrap(),

            save_failures: IntCounter::new("save_failures_total", "Credential save failures").unwrap(),

            refresh_map_entries: IntGauge::new("refresh_map_entries", "Entries currently held in the refresh map").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.refresh_attempts.clone())).unwrap();
        reg.register(Box::new(metrics.refresh_failures.clone())).unwrap();
        reg.register(Box::new(metrics.hydrations.clone())).unwrap();
        reg.register(Box::new(metrics.save_failures.clone())).unwrap();
        reg.register(Box::new(metrics.refresh_map_entries.clone())).unwrap();

        metrics
    }
}

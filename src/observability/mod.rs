pub mod metrics;

pub use metrics::{get_metrics, Metrics};

pub mod metrics_collector;
pub mod offset_store;
pub mod parser;
pub mod rate_estimator;

pub use metrics_collector::{MetricsCollector, StatusSnapshot};

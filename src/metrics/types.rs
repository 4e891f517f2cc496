use crate::collector::parser::PartitionLag;
use crate::config::StageConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One polling cycle's view of the monitored topic and group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsEvent {
    /// Unix epoch milliseconds.
    pub timestamp: i64,
    /// Active demo stage, 0 before any stage was activated.
    pub stage: u32,
    pub partition_count: usize,
    pub consumer_count: usize,
    pub total_lag: i64,
    pub partitions: Vec<PartitionLag>,
    pub producer_rate: i64,
    pub consumer_rate: i64,
}

/// Topology announced to viewers when a stage is activated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTopology {
    pub partitions: u32,
    pub consumers: u32,
    pub key_strategy: String,
    pub message_rate: u32,
}

impl From<&StageConfig> for StageTopology {
    fn from(stage: &StageConfig) -> Self {
        Self {
            partitions: stage.partitions,
            consumers: stage.consumers,
            key_strategy: stage.key_strategy.clone(),
            message_rate: stage.message_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageActivated {
    pub stage: u32,
    pub config: StageTopology,
}

/// Everything pushed to dashboard viewers, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DashboardEvent {
    Metrics(Arc<MetricsEvent>),
    StageActivated(StageActivated),
}

pub type Labels = BTreeMap<&'static str, String>;

/// One sample in the Prometheus exposition.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub name: &'static str,
    pub labels: Labels,
    pub value: f64,
    pub help: &'static str,
}

impl MetricPoint {
    pub fn gauge(name: &'static str, labels: Labels, value: f64, help: &'static str) -> Self {
        Self {
            name,
            labels,
            value,
            help,
        }
    }
}

use crate::collector::MetricsCollector;
use crate::metrics::definitions::{
    HELP_CONSUMER_COUNT, HELP_CONSUMER_RATE, HELP_LAST_UPDATE_TIMESTAMP, HELP_PARTITION_COUNT,
    HELP_PARTITION_CURRENT_OFFSET, HELP_PARTITION_LAG, HELP_PARTITION_LOG_END_OFFSET,
    HELP_PRODUCER_RATE, HELP_STAGE, HELP_TOTAL_LAG, HELP_UP, HELP_VIEWERS, LABEL_CONSUMER_ID,
    LABEL_GROUP, LABEL_PARTITION, LABEL_TOPIC, METRIC_CONSUMER_COUNT, METRIC_CONSUMER_RATE,
    METRIC_LAST_UPDATE_TIMESTAMP, METRIC_PARTITION_COUNT, METRIC_PARTITION_CURRENT_OFFSET,
    METRIC_PARTITION_LAG, METRIC_PARTITION_LOG_END_OFFSET, METRIC_PRODUCER_RATE, METRIC_STAGE,
    METRIC_TOTAL_LAG, METRIC_UP, METRIC_VIEWERS,
};
use crate::metrics::types::{Labels, MetricPoint, MetricsEvent};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Renders the latest published metrics event in the Prometheus text format.
/// Never triggers a collection cycle.
#[derive(Clone)]
pub struct PrometheusExporter {
    collector: Arc<MetricsCollector>,
}

impl PrometheusExporter {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self { collector }
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn render_metrics(&self) -> String {
        let client = self.collector.client();
        let hub = self.collector.hub();

        let mut points = vec![
            MetricPoint::gauge(
                METRIC_UP,
                Labels::new(),
                f64::from(u8::from(self.collector.is_healthy())),
                HELP_UP,
            ),
            MetricPoint::gauge(
                METRIC_STAGE,
                Labels::new(),
                f64::from(self.collector.current_stage()),
                HELP_STAGE,
            ),
            MetricPoint::gauge(
                METRIC_VIEWERS,
                Labels::new(),
                hub.connection_count() as f64,
                HELP_VIEWERS,
            ),
        ];

        if let Some(event) = hub.latest() {
            points.extend(build_event_points(
                &event,
                client.topic(),
                client.consumer_group(),
            ));
        }

        render(&points)
    }
}

/// Metric points for one metrics event.
#[allow(clippy::cast_precision_loss)]
pub fn build_event_points(event: &MetricsEvent, topic: &str, group: &str) -> Vec<MetricPoint> {
    let base = || -> Labels {
        Labels::from([
            (LABEL_TOPIC, topic.to_string()),
            (LABEL_GROUP, group.to_string()),
        ])
    };

    let mut points = vec![
        MetricPoint::gauge(METRIC_TOTAL_LAG, base(), event.total_lag as f64, HELP_TOTAL_LAG),
        MetricPoint::gauge(
            METRIC_PRODUCER_RATE,
            base(),
            event.producer_rate as f64,
            HELP_PRODUCER_RATE,
        ),
        MetricPoint::gauge(
            METRIC_CONSUMER_RATE,
            base(),
            event.consumer_rate as f64,
            HELP_CONSUMER_RATE,
        ),
        MetricPoint::gauge(
            METRIC_PARTITION_COUNT,
            base(),
            event.partition_count as f64,
            HELP_PARTITION_COUNT,
        ),
        MetricPoint::gauge(
            METRIC_CONSUMER_COUNT,
            base(),
            event.consumer_count as f64,
            HELP_CONSUMER_COUNT,
        ),
        MetricPoint::gauge(
            METRIC_LAST_UPDATE_TIMESTAMP,
            Labels::new(),
            event.timestamp as f64 / 1000.0,
            HELP_LAST_UPDATE_TIMESTAMP,
        ),
    ];

    for p in &event.partitions {
        let mut labels = base();
        labels.insert(LABEL_PARTITION, p.partition.to_string());

        let mut lag_labels = labels.clone();
        lag_labels.insert(LABEL_CONSUMER_ID, p.consumer_id.clone());

        points.push(MetricPoint::gauge(
            METRIC_PARTITION_LAG,
            lag_labels,
            p.lag as f64,
            HELP_PARTITION_LAG,
        ));
        points.push(MetricPoint::gauge(
            METRIC_PARTITION_CURRENT_OFFSET,
            labels.clone(),
            p.current_offset as f64,
            HELP_PARTITION_CURRENT_OFFSET,
        ));
        points.push(MetricPoint::gauge(
            METRIC_PARTITION_LOG_END_OFFSET,
            labels,
            p.log_end_offset as f64,
            HELP_PARTITION_LOG_END_OFFSET,
        ));
    }

    points
}

/// Text exposition, metric families sorted by name, HELP/TYPE once per family.
pub fn render(points: &[MetricPoint]) -> String {
    let mut by_name: BTreeMap<&str, Vec<&MetricPoint>> = BTreeMap::new();
    for point in points {
        by_name.entry(point.name).or_default().push(point);
    }

    let mut output = String::new();
    for (name, family) in by_name {
        output.push_str(format!("# HELP {name} {}\n", family[0].help).as_str());
        output.push_str(format!("# TYPE {name} gauge\n").as_str());
        for point in family {
            let labels = render_labels(&point.labels);
            output.push_str(format!("{name}{labels} {}\n", point.value).as_str());
        }
    }
    output
}

fn render_labels(labels: &Labels) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let label_str = labels
        .iter()
        .map(|(k, v)| format!("{k}=\"{}\"", escape_label_value(v)))
        .collect::<Vec<_>>()
        .join(",");

    format!("{{{label_str}}}")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::BrokerClient;
    use crate::broker::scripted::ScriptedExecutor;
    use crate::collector::parser::PartitionLag;
    use crate::config::{BrokerConfig, DashboardConfig};
    use crate::hub::BroadcastHub;
    use crate::metrics::types::DashboardEvent;

    fn event() -> MetricsEvent {
        MetricsEvent {
            timestamp: 1_700_000_000_000,
            stage: 2,
            partition_count: 2,
            consumer_count: 1,
            total_lag: 15,
            partitions: vec![
                PartitionLag {
                    partition: 0,
                    current_offset: 90,
                    log_end_offset: 100,
                    lag: 10,
                    consumer_id: "consumer-1".to_string(),
                },
                PartitionLag {
                    partition: 1,
                    current_offset: 45,
                    log_end_offset: 50,
                    lag: 5,
                    consumer_id: "consumer-1".to_string(),
                },
            ],
            producer_rate: 40,
            consumer_rate: 35,
        }
    }

    fn exporter() -> (PrometheusExporter, Arc<MetricsCollector>) {
        let client = Arc::new(BrokerClient::new(
            &BrokerConfig::default(),
            Arc::new(ScriptedExecutor::new()),
        ));
        let collector = Arc::new(MetricsCollector::new(
            client,
            Arc::new(BroadcastHub::new()),
            &DashboardConfig::default(),
        ));
        (PrometheusExporter::new(Arc::clone(&collector)), collector)
    }

    #[test]
    fn test_render_without_events() {
        let (exporter, _) = exporter();
        let output = exporter.render_metrics();

        assert!(output.contains("lag_dashboard_up 1\n"));
        assert!(output.contains("lag_dashboard_stage 0\n"));
        assert!(output.contains("lag_dashboard_connected_viewers 0\n"));
        assert!(!output.contains(METRIC_TOTAL_LAG));
    }

    #[test]
    fn test_render_latest_event() {
        let (exporter, collector) = exporter();
        collector
            .hub()
            .publish(&DashboardEvent::Metrics(Arc::new(event())));

        let output = exporter.render_metrics();

        assert!(output.contains(
            "lag_dashboard_total_lag{group=\"demo-group\",topic=\"demo-topic\"} 15\n"
        ));
        assert!(output.contains(
            "lag_dashboard_partition_lag{consumer_id=\"consumer-1\",group=\"demo-group\",partition=\"1\",topic=\"demo-topic\"} 5\n"
        ));
        assert!(output.contains("lag_dashboard_producer_rate{"));
        assert!(output.contains("lag_dashboard_last_update_timestamp_seconds 1700000000\n"));
    }

    #[test]
    fn test_help_and_type_once_per_family() {
        let points = build_event_points(&event(), "t", "g");
        let output = render(&points);

        assert_eq!(
            output.matches("# HELP lag_dashboard_partition_lag ").count(),
            1
        );
        assert_eq!(
            output.matches("# TYPE lag_dashboard_partition_lag gauge").count(),
            1
        );
        assert_eq!(output.matches("\nlag_dashboard_partition_lag{").count(), 2);
    }

    #[test]
    fn test_label_values_are_escaped() {
        assert_eq!(escape_label_value("a\"b\\c\nd"), "a\\\"b\\\\c\\nd");
    }
}

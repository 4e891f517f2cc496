pub const METRIC_TOTAL_LAG: &str = "lag_dashboard_total_lag";
pub const METRIC_PARTITION_LAG: &str = "lag_dashboard_partition_lag";
pub const METRIC_PARTITION_CURRENT_OFFSET: &str = "lag_dashboard_partition_current_offset";
pub const METRIC_PARTITION_LOG_END_OFFSET: &str = "lag_dashboard_partition_log_end_offset";
pub const METRIC_PRODUCER_RATE: &str = "lag_dashboard_producer_rate";
pub const METRIC_CONSUMER_RATE: &str = "lag_dashboard_consumer_rate";
pub const METRIC_PARTITION_COUNT: &str = "lag_dashboard_partition_count";
pub const METRIC_CONSUMER_COUNT: &str = "lag_dashboard_consumer_count";
pub const METRIC_STAGE: &str = "lag_dashboard_stage";
pub const METRIC_VIEWERS: &str = "lag_dashboard_connected_viewers";
pub const METRIC_UP: &str = "lag_dashboard_up";
pub const METRIC_LAST_UPDATE_TIMESTAMP: &str = "lag_dashboard_last_update_timestamp_seconds";

pub const LABEL_TOPIC: &str = "topic";
pub const LABEL_GROUP: &str = "group";
pub const LABEL_PARTITION: &str = "partition";
pub const LABEL_CONSUMER_ID: &str = "consumer_id";

pub const HELP_TOTAL_LAG: &str = "Sum of offset lag across all partitions of the monitored topic";
pub const HELP_PARTITION_LAG: &str = "Offset lag reported by the broker for a partition";
pub const HELP_PARTITION_CURRENT_OFFSET: &str = "Committed offset of the consumer group on a partition";
pub const HELP_PARTITION_LOG_END_OFFSET: &str = "Log end offset of a partition";
pub const HELP_PRODUCER_RATE: &str = "Smoothed producer throughput in messages per second";
pub const HELP_CONSUMER_RATE: &str = "Smoothed consumer throughput in messages per second";
pub const HELP_PARTITION_COUNT: &str = "Number of partitions of the monitored topic, 0 if it does not exist";
pub const HELP_CONSUMER_COUNT: &str = "Number of distinct consumers assigned to the topic";
pub const HELP_STAGE: &str = "Active demo stage, 0 before any stage was activated";
pub const HELP_VIEWERS: &str = "Number of connected dashboard viewers";
pub const HELP_UP: &str = "1 if broker tooling is answering, 0 otherwise";
pub const HELP_LAST_UPDATE_TIMESTAMP: &str = "Unix timestamp of the last published metrics event";

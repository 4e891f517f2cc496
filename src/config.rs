use crate::collector::rate_estimator::DEFAULT_RATE_WINDOW;
use crate::error::{DashboardError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(300);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub producer: ProducerConfig,
    #[serde(default = "default_stages")]
    pub stages: Vec<StageConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_http_host")]
    pub http_host: String,
    /// Upper bound for a single broker CLI invocation.
    #[serde(with = "humantime_serde", default = "default_command_timeout")]
    pub command_timeout: Duration,
    /// Number of samples in each rate smoothing window.
    #[serde(default = "default_rate_window")]
    pub rate_window: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrokerConfig {
    #[serde(default = "default_bootstrap_servers")]
    pub bootstrap_servers: String,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_consumer_group")]
    pub consumer_group: String,
    /// Prepended to every broker command, e.g. `docker exec kafka`.
    #[serde(default)]
    pub exec_prefix: String,
    /// Strip a leading `<consumer_group>-` from consumer ids before parsing.
    #[serde(default)]
    pub strip_consumer_prefix: bool,
    /// Command used to scale consumers on stage change. `{count}` is replaced
    /// with the stage's consumer count.
    #[serde(default)]
    pub scale_consumers_command: Option<String>,
    #[serde(with = "humantime_serde", default = "default_topic_delete_delay")]
    pub topic_delete_delay: Duration,
    #[serde(with = "humantime_serde", default = "default_topic_ready_delay")]
    pub topic_ready_delay: Duration,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProducerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_producer_url")]
    pub base_url: String,
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,
    #[serde(with = "humantime_serde", default = "default_settle_delay")]
    pub settle_delay: Duration,
}

/// One predefined demo topology.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct StageConfig {
    pub id: u32,
    pub partitions: u32,
    pub consumers: u32,
    pub key_strategy: String,
    /// Messages per second per producer.
    pub message_rate: u32,
    #[serde(default = "default_producer_count")]
    pub producer_count: u32,
    /// How the producer service spreads messages over partitions.
    #[serde(default)]
    pub partition_strategy: PartitionStrategy,
}

/// Partition selection mode understood by the producer service.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartitionStrategy {
    HotPartition,
    #[default]
    RoundRobin,
}

impl StageConfig {
    pub fn ms_between_messages(&self) -> u64 {
        1000 / u64::from(self.message_rate.max(1))
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_http_port() -> u16 {
    3000
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_rate_window() -> usize {
    DEFAULT_RATE_WINDOW
}

fn default_bootstrap_servers() -> String {
    "localhost:9092".to_string()
}

fn default_topic() -> String {
    "demo-topic".to_string()
}

fn default_consumer_group() -> String {
    "demo-group".to_string()
}

fn default_topic_delete_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_topic_ready_delay() -> Duration {
    Duration::from_secs(3)
}

fn default_true() -> bool {
    true
}

fn default_producer_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_settle_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_producer_count() -> u32 {
    1
}

fn default_stages() -> Vec<StageConfig> {
    vec![
        StageConfig {
            id: 1,
            partitions: 1,
            consumers: 1,
            key_strategy: "single".to_string(),
            message_rate: 10,
            producer_count: 1,
            partition_strategy: PartitionStrategy::RoundRobin,
        },
        StageConfig {
            id: 2,
            partitions: 4,
            consumers: 4,
            key_strategy: "bad".to_string(),
            message_rate: 5,
            producer_count: 1,
            partition_strategy: PartitionStrategy::HotPartition,
        },
        StageConfig {
            id: 3,
            partitions: 4,
            consumers: 4,
            key_strategy: "good".to_string(),
            message_rate: 5,
            producer_count: 1,
            partition_strategy: PartitionStrategy::RoundRobin,
        },
    ]
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            http_port: default_http_port(),
            http_host: default_http_host(),
            command_timeout: default_command_timeout(),
            rate_window: default_rate_window(),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: default_bootstrap_servers(),
            topic: default_topic(),
            consumer_group: default_consumer_group(),
            exec_prefix: String::new(),
            strip_consumer_prefix: false,
            scale_consumers_command: None,
            topic_delete_delay: default_topic_delete_delay(),
            topic_ready_delay: default_topic_ready_delay(),
        }
    }
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_producer_url(),
            request_timeout: default_request_timeout(),
            settle_delay: default_settle_delay(),
        }
    }
}

impl Config {
    pub fn load(path: Option<&str>) -> Result<Config> {
        let config_path = path.unwrap_or("config.toml");

        if !Path::new(config_path).exists() {
            return Err(DashboardError::Config(format!(
                "Configuration file not found: {config_path}"
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Config> {
        let content = Self::substitute_env_vars(content)?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| DashboardError::Config(format!("TOML parse error: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    fn substitute_env_vars(content: &str) -> Result<String> {
        // ${VAR} -> value or empty, ${VAR:-default} -> value or default
        let re = Regex::new(r"\$\{\??([^}:-]+)(?::-([^}]*))?\}")?;
        Ok(re
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                let default_value = caps.get(2).map_or("", |m| m.as_str());
                std::env::var(var_name).unwrap_or_else(|_| default_value.to_string())
            })
            .to_string())
    }

    pub fn validate(&self) -> Result<()> {
        self.dashboard.validate()?;
        self.broker.validate()?;

        let mut seen = HashSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.id) {
                return Err(DashboardError::Config(format!(
                    "Stage {} is defined more than once",
                    stage.id
                )));
            }
            if stage.partitions == 0 {
                return Err(DashboardError::Config(format!(
                    "Stage {}: partitions must be at least 1",
                    stage.id
                )));
            }
        }

        Ok(())
    }
}

impl DashboardConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval < MIN_POLL_INTERVAL || self.poll_interval > MAX_POLL_INTERVAL {
            return Err(DashboardError::Config(format!(
                "poll_interval must be between {MIN_POLL_INTERVAL:?} and {MAX_POLL_INTERVAL:?}, got {:?}",
                self.poll_interval
            )));
        }

        if self.command_timeout.is_zero() {
            return Err(DashboardError::Config(
                "command_timeout must be greater than zero".to_string(),
            ));
        }

        if self.rate_window == 0 {
            return Err(DashboardError::Config(
                "rate_window must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

impl BrokerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bootstrap_servers.is_empty() {
            return Err(DashboardError::Config(
                "broker.bootstrap_servers cannot be empty".to_string(),
            ));
        }

        if self.topic.is_empty() {
            return Err(DashboardError::Config(
                "broker.topic cannot be empty".to_string(),
            ));
        }

        if self.consumer_group.is_empty() {
            return Err(DashboardError::Config(
                "broker.consumer_group cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn stage(config: &Config, id: u32) -> Option<&StageConfig> {
        config.stages.iter().find(|s| s.id == id)
    }

    #[test]
    fn test_config_loads_from_file() {
        let config_content = r#"
[dashboard]
poll_interval = "1s"
http_port = 4000

[broker]
bootstrap_servers = "kafka:29092"
topic = "orders"
consumer_group = "order-processors"
"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let config = Config::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(config.dashboard.poll_interval, Duration::from_secs(1));
        assert_eq!(config.dashboard.http_port, 4000);
        assert_eq!(config.broker.bootstrap_servers, "kafka:29092");
        assert_eq!(config.broker.topic, "orders");
        assert_eq!(config.broker.consumer_group, "order-processors");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = Config::load(Some("/definitely/not/here/dashboard.toml"));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Configuration file not found"));
    }

    #[test]
    fn test_default_config_values() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.dashboard.poll_interval, Duration::from_secs(2));
        assert_eq!(config.dashboard.http_port, 3000);
        assert_eq!(config.dashboard.http_host, "0.0.0.0");
        assert_eq!(config.dashboard.command_timeout, Duration::from_secs(5));
        assert_eq!(config.dashboard.rate_window, 5);
        assert_eq!(config.broker.topic, "demo-topic");
        assert_eq!(config.broker.consumer_group, "demo-group");
        assert!(config.broker.exec_prefix.is_empty());
        assert!(config.producer.enabled);
        assert_eq!(config.stages.len(), 3);
    }

    #[test]
    fn test_default_stages_match_demo_topologies() {
        let config = Config::from_toml_str("").unwrap();

        let single = stage(&config, 1).unwrap();
        assert_eq!(single.partitions, 1);
        assert_eq!(single.key_strategy, "single");
        assert_eq!(single.ms_between_messages(), 100);

        let bad = stage(&config, 2).unwrap();
        assert_eq!(bad.partitions, 4);
        assert_eq!(bad.consumers, 4);
        assert_eq!(bad.key_strategy, "bad");
        assert_eq!(bad.partition_strategy, PartitionStrategy::HotPartition);

        assert_eq!(stage(&config, 3).unwrap().key_strategy, "good");
        assert!(stage(&config, 4).is_none());
    }

    #[test]
    fn test_config_env_with_default() {
        // SAFETY: test-local variable name, not read concurrently elsewhere
        unsafe { std::env::remove_var("TEST_DASHBOARD_NONEXISTENT") };

        let config_content = r#"
[broker]
bootstrap_servers = "${TEST_DASHBOARD_NONEXISTENT:-localhost:9092}"
"#;

        let config = Config::from_toml_str(config_content).unwrap();
        assert_eq!(config.broker.bootstrap_servers, "localhost:9092");
    }

    #[test]
    fn test_config_env_override_default() {
        // SAFETY: test-local variable name, not read concurrently elsewhere
        unsafe { std::env::set_var("TEST_DASHBOARD_CONTAINER", "broker-1") };

        let config_content = r#"
[broker]
exec_prefix = "docker exec ${TEST_DASHBOARD_CONTAINER:-kafka}"
"#;

        let config = Config::from_toml_str(config_content).unwrap();
        assert_eq!(config.broker.exec_prefix, "docker exec broker-1");

        // SAFETY: see above
        unsafe { std::env::remove_var("TEST_DASHBOARD_CONTAINER") };
    }

    #[test]
    fn test_config_rejects_poll_interval_out_of_range() {
        let config_content = r#"
[dashboard]
poll_interval = "100ms"
"#;

        let err = Config::from_toml_str(config_content)
            .unwrap_err()
            .to_string();
        assert!(err.contains("poll_interval must be between"));
    }

    #[test]
    fn test_config_rejects_empty_topic() {
        let config_content = r#"
[broker]
topic = ""
"#;

        let err = Config::from_toml_str(config_content)
            .unwrap_err()
            .to_string();
        assert!(err.contains("broker.topic cannot be empty"));
    }

    #[test]
    fn test_config_rejects_duplicate_stage_ids() {
        let config_content = r#"
[[stages]]
id = 1
partitions = 1
consumers = 1
key_strategy = "single"
message_rate = 10

[[stages]]
id = 1
partitions = 2
consumers = 2
key_strategy = "good"
message_rate = 5
"#;

        let err = Config::from_toml_str(config_content)
            .unwrap_err()
            .to_string();
        assert!(err.contains("defined more than once"));
    }

    #[test]
    fn test_custom_stage_table_replaces_defaults() {
        let config_content = r#"
[[stages]]
id = 7
partitions = 8
consumers = 2
key_strategy = "good"
message_rate = 20
producer_count = 3
partition_strategy = "HOT_PARTITION"
"#;

        let config = Config::from_toml_str(config_content).unwrap();
        assert_eq!(config.stages.len(), 1);
        let stage = stage(&config, 7).unwrap();
        assert_eq!(stage.partitions, 8);
        assert_eq!(stage.producer_count, 3);
        assert_eq!(stage.partition_strategy, PartitionStrategy::HotPartition);
        assert_eq!(stage.ms_between_messages(), 50);
    }
}

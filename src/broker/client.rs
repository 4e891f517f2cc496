use crate::broker::executor::{CommandExecutor, CommandOutput, CommandSpec};
use crate::config::BrokerConfig;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

const CONSUMER_GROUPS_TOOL: &str = "kafka-consumer-groups";
const TOPICS_TOOL: &str = "kafka-topics";

/// Index of the consumer id column in `kafka-consumer-groups --describe`.
const CONSUMER_ID_COLUMN: usize = 6;

/// Issues broker CLI commands for the configured topic and consumer group.
pub struct BrokerClient {
    executor: Arc<dyn CommandExecutor>,
    config: BrokerConfig,
    prefix: Vec<String>,
}

impl BrokerClient {
    pub fn new(config: &BrokerConfig, executor: Arc<dyn CommandExecutor>) -> Self {
        let prefix = config
            .exec_prefix
            .split_whitespace()
            .map(str::to_string)
            .collect();

        Self {
            executor,
            config: config.clone(),
            prefix,
        }
    }

    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    pub fn consumer_group(&self) -> &str {
        &self.config.consumer_group
    }

    fn command<I, S>(&self, tool: &str, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = match self.prefix.split_first() {
            Some((program, rest)) => CommandSpec::new(program.as_str())
                .args(rest.iter().cloned())
                .arg(tool),
            None => CommandSpec::new(tool),
        };
        spec.arg("--bootstrap-server")
            .arg(self.config.bootstrap_servers.as_str())
            .args(args)
    }

    pub fn describe_group_command(&self) -> CommandSpec {
        self.command(
            CONSUMER_GROUPS_TOOL,
            ["--describe", "--group", self.config.consumer_group.as_str()],
        )
    }

    pub fn describe_topic_command(&self) -> CommandSpec {
        self.command(
            TOPICS_TOOL,
            ["--describe", "--topic", self.config.topic.as_str()],
        )
    }

    #[instrument(skip(self), fields(group = %self.config.consumer_group))]
    pub async fn describe_consumer_group(&self) -> CommandOutput {
        let mut output = self.executor.execute(&self.describe_group_command()).await;
        if !output.success {
            warn!(stderr = %output.stderr.trim(), "Consumer group describe failed");
        }

        if self.config.strip_consumer_prefix {
            let prefix = format!("{}-", self.config.consumer_group);
            output.stdout = strip_consumer_prefix(&output.stdout, &prefix);
        }
        output
    }

    #[instrument(skip(self), fields(topic = %self.config.topic))]
    pub async fn describe_topic(&self) -> CommandOutput {
        let output = self.executor.execute(&self.describe_topic_command()).await;
        if !output.success {
            // Also the normal answer for a topic that has not been created yet
            debug!(stderr = %output.stderr.trim(), "Topic describe failed");
        }
        output
    }

    #[instrument(skip(self), fields(topic = %self.config.topic))]
    pub async fn delete_topic(&self) -> CommandOutput {
        let cmd = self.command(
            TOPICS_TOOL,
            ["--delete", "--topic", self.config.topic.as_str()],
        );
        self.executor.execute(&cmd).await
    }

    #[instrument(skip(self), fields(topic = %self.config.topic))]
    pub async fn create_topic(&self, partitions: u32) -> CommandOutput {
        let partitions = partitions.to_string();
        let cmd = self.command(
            TOPICS_TOOL,
            [
                "--create",
                "--topic",
                self.config.topic.as_str(),
                "--partitions",
                partitions.as_str(),
                "--replication-factor",
                "1",
            ],
        );
        self.executor.execute(&cmd).await
    }

    /// Runs the configured scaling command. `None` when scaling is not
    /// configured.
    #[instrument(skip(self))]
    pub async fn scale_consumers(&self, count: u32) -> Option<CommandOutput> {
        let template = self.config.scale_consumers_command.as_deref()?;
        let line = template.replace("{count}", &count.to_string());
        let Some(cmd) = CommandSpec::from_line(&line) else {
            warn!("scale_consumers_command is empty, skipping");
            return None;
        };
        Some(self.executor.execute(&cmd).await)
    }
}

/// Remove `prefix` from the consumer id column of every row that has one.
fn strip_consumer_prefix(stdout: &str, prefix: &str) -> String {
    stdout
        .lines()
        .map(|line| {
            let mut parts: Vec<&str> = line.split_whitespace().collect();
            match parts.get(CONSUMER_ID_COLUMN).copied() {
                Some(id) if id.len() > prefix.len() && id.starts_with(prefix) => {
                    parts[CONSUMER_ID_COLUMN] = &id[prefix.len()..];
                    parts.join(" ")
                }
                _ => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl std::fmt::Debug for BrokerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerClient")
            .field("bootstrap_servers", &self.config.bootstrap_servers)
            .field("topic", &self.config.topic)
            .field("consumer_group", &self.config.consumer_group)
            .finish_non_exhaustive()
    }
}

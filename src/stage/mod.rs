//! Demo stage switching: topic re-creation, consumer scaling and producer
//! reconfiguration for one predefined topology.

pub mod producer;

use crate::broker::{BrokerClient, CommandOutput};
use crate::collector::MetricsCollector;
use crate::config::{BrokerConfig, ProducerConfig, StageConfig};
use crate::error::{DashboardError, Result};
use crate::metrics::types::{DashboardEvent, StageActivated};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

pub use producer::{HttpProducer, ProduceRequest, ProducerControl};

/// Waits applied between the steps of an activation.
#[derive(Debug, Clone, Copy)]
pub struct StageTimings {
    pub topic_delete_delay: Duration,
    pub topic_ready_delay: Duration,
    pub settle_delay: Duration,
}

impl StageTimings {
    pub fn from_config(broker: &BrokerConfig, producer: &ProducerConfig) -> Self {
        Self {
            topic_delete_delay: broker.topic_delete_delay,
            topic_ready_delay: broker.topic_ready_delay,
            settle_delay: producer.settle_delay,
        }
    }
}

pub struct StageController {
    stages: Vec<StageConfig>,
    collector: Arc<MetricsCollector>,
    producer: Option<Arc<dyn ProducerControl>>,
    timings: StageTimings,
    activation: Mutex<()>,
}

impl StageController {
    /// `producer` is `None` when producer control is disabled.
    pub fn new(
        stages: Vec<StageConfig>,
        collector: Arc<MetricsCollector>,
        producer: Option<Arc<dyn ProducerControl>>,
        timings: StageTimings,
    ) -> Self {
        Self {
            stages,
            collector,
            producer,
            timings,
            activation: Mutex::new(()),
        }
    }

    pub fn stage(&self, id: u32) -> Option<&StageConfig> {
        self.stages.iter().find(|s| s.id == id)
    }

    /// Switch the demo to stage `id`. Concurrent activations run one at a time.
    #[instrument(skip(self))]
    pub async fn activate(&self, id: u32) -> Result<StageActivated> {
        let stage = self.stage(id).ok_or(DashboardError::UnknownStage(id))?.clone();
        let _guard = self.activation.lock().await;
        let client = self.collector.client();

        info!(
            partitions = stage.partitions,
            consumers = stage.consumers,
            key_strategy = %stage.key_strategy,
            "Activating stage"
        );

        if let Some(producer) = &self.producer
            && let Err(e) = producer.stop().await
        {
            warn!(error = %e, "Failed to stop producer, continuing");
        }

        let deleted = client.delete_topic().await;
        if !deleted.success {
            warn!(stderr = %deleted.stderr.trim(), "Topic delete failed, continuing");
        }
        tokio::time::sleep(self.timings.topic_delete_delay).await;

        require(client.create_topic(stage.partitions).await, "create topic")?;
        // Ticks while the stage settles must not compare against the old topic
        self.collector.reset().await;
        tokio::time::sleep(self.timings.topic_ready_delay).await;

        self.scale_consumers(client, stage.consumers).await?;

        if let Some(producer) = &self.producer {
            producer.change_key_strategy(&stage.key_strategy).await?;
            producer
                .start(&ProduceRequest {
                    producer_count: stage.producer_count,
                    ms_between_messages: stage.ms_between_messages(),
                    partition_strategy: stage.partition_strategy,
                })
                .await?;
        }

        tokio::time::sleep(self.timings.settle_delay).await;

        // Drop samples taken while producers and consumers were restarting
        self.collector.reset().await;
        self.collector.set_stage(stage.id);

        let activated = StageActivated {
            stage: stage.id,
            config: (&stage).into(),
        };
        let report = self
            .collector
            .hub()
            .publish(&DashboardEvent::StageActivated(activated.clone()));

        info!(viewers = report.delivered, "Stage activated");
        Ok(activated)
    }

    async fn scale_consumers(&self, client: &BrokerClient, count: u32) -> Result<()> {
        match client.scale_consumers(count).await {
            Some(output) => require(output, "scale consumers"),
            None => Ok(()),
        }
    }
}

fn require(output: CommandOutput, step: &str) -> Result<()> {
    if output.success {
        Ok(())
    } else {
        Err(DashboardError::Stage(format!(
            "{step}: {}",
            output.stderr.trim()
        )))
    }
}

impl std::fmt::Debug for StageController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageController")
            .field("stages", &self.stages.len())
            .field("producer_control", &self.producer.is_some())
            .finish_non_exhaustive()
    }
}

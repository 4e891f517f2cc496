use crate::broker::{BrokerClient, CommandOutput};
use crate::collector::parser::{
    LagSnapshot, TopicInfo, parse_consumer_group_lag, parse_topic_description,
};
use crate::collector::rate_estimator::{RateEstimator, Rates};
use crate::config::DashboardConfig;
use crate::error::{DashboardError, Result};
use crate::hub::BroadcastHub;
use crate::metrics::types::{DashboardEvent, MetricsEvent};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, broadcast};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

/// Consecutive cycles with every broker command failing before the tooling
/// is reported as unavailable.
const UNAVAILABLE_THRESHOLD: u32 = 3;

/// Slack on top of `command_timeout` for one whole cycle. Both commands run
/// concurrently, so a cycle is bounded by the slower one.
const CYCLE_TIMEOUT_SLACK: Duration = Duration::from_secs(1);

/// Mutable per-cycle state. Only reachable through the collector's lock, which
/// makes the lock holder the single writer of offsets and rate history.
#[derive(Debug)]
struct CollectorState {
    estimator: RateEstimator,
    consecutive_failures: u32,
}

/// Lightweight status for REST pollers; does not advance rate estimation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub current_stage: u32,
    pub partition_count: usize,
    pub consumer_count: usize,
    pub total_lag: i64,
}

pub struct MetricsCollector {
    client: Arc<BrokerClient>,
    hub: Arc<BroadcastHub>,
    state: Mutex<CollectorState>,
    current_stage: AtomicU32,
    healthy: AtomicBool,
    poll_interval: Duration,
    cycle_timeout: Duration,
}

impl MetricsCollector {
    pub fn new(client: Arc<BrokerClient>, hub: Arc<BroadcastHub>, config: &DashboardConfig) -> Self {
        info!(
            topic = client.topic(),
            group = client.consumer_group(),
            poll_interval = ?config.poll_interval,
            command_timeout = ?config.command_timeout,
            rate_window = config.rate_window,
            "Created metrics collector"
        );

        Self {
            client,
            hub,
            state: Mutex::new(CollectorState {
                estimator: RateEstimator::new(config.rate_window),
                consecutive_failures: 0,
            }),
            current_stage: AtomicU32::new(0),
            healthy: AtomicBool::new(true),
            poll_interval: config.poll_interval,
            cycle_timeout: config.command_timeout + CYCLE_TIMEOUT_SLACK,
        }
    }

    pub fn client(&self) -> &BrokerClient {
        &self.client
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn current_stage(&self) -> u32 {
        self.current_stage.load(Ordering::Relaxed)
    }

    pub fn set_stage(&self, stage: u32) {
        self.current_stage.store(stage, Ordering::Relaxed);
    }

    /// `false` once broker tooling failed for several cycles in a row.
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    /// Run one cycle, waiting for an in-flight cycle to finish first.
    pub async fn collect_once(&self) -> Option<Arc<MetricsEvent>> {
        let mut state = self.state.lock().await;
        self.run_cycle(&mut state, Instant::now(), SystemTime::now())
            .await
    }

    /// Run one cycle unless another one is in flight, in which case the call
    /// is skipped and returns `None`.
    pub async fn try_collect_once(&self) -> Option<Arc<MetricsEvent>> {
        let Ok(mut state) = self.state.try_lock() else {
            debug!("Previous cycle still running, skipping tick");
            return None;
        };
        self.run_cycle(&mut state, Instant::now(), SystemTime::now())
            .await
    }

    /// Drop all offset baselines and rate history. Call after the topic or
    /// group topology changed.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.estimator.reset();
        info!("Rate estimation reset");
    }

    /// Fresh partition/lag summary without touching rate state.
    pub async fn status(&self) -> StatusSnapshot {
        let (lag, topic, _) = self.fetch().await;
        StatusSnapshot {
            current_stage: self.current_stage(),
            partition_count: topic.partition_count,
            consumer_count: lag.consumer_count,
            total_lag: lag.total_lag,
        }
    }

    /// Raw consumer group describe output, for troubleshooting the parser.
    pub async fn debug_consumer_group(&self) -> CommandOutput {
        self.client.describe_consumer_group().await
    }

    #[instrument(skip(self, shutdown), fields(topic = %self.client.topic()))]
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!("Starting collection loop");

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let result = tokio::time::timeout(
                        self.cycle_timeout,
                        self.try_collect_once(),
                    )
                    .await;

                    if result.is_err() {
                        warn!(
                            timeout_ms = self.cycle_timeout.as_millis(),
                            "Collection cycle timed out"
                        );
                    }
                }
                _ = shutdown.recv() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        info!("Collection loop stopped");
    }

    #[instrument(skip_all)]
    async fn run_cycle(
        &self,
        state: &mut CollectorState,
        now: Instant,
        wall_clock: SystemTime,
    ) -> Option<Arc<MetricsEvent>> {
        let (lag, topic, all_failed) = self.fetch().await;
        self.track_availability(state, all_failed);

        let rates = state.estimator.update(&lag.partitions, now);

        let event = match self.assemble(lag, topic, rates, wall_clock) {
            Ok(event) => Arc::new(event),
            Err(e) => {
                error!(error = %e, "Failed to assemble metrics event");
                return None;
            }
        };

        if topic.exists && !event.partitions.is_empty() {
            debug!(
                partitions = event.partitions.len(),
                consumers = event.consumer_count,
                total_lag = event.total_lag,
                producer_rate = event.producer_rate,
                consumer_rate = event.consumer_rate,
                "Metrics collected"
            );
        }

        self.hub
            .publish(&DashboardEvent::Metrics(Arc::clone(&event)));
        Some(event)
    }

    /// Fetch both descriptions concurrently. A failed fetch degrades to the
    /// empty structure for that side. The flag reports whether both failed.
    async fn fetch(&self) -> (LagSnapshot, TopicInfo, bool) {
        let (group_output, topic_output) = tokio::join!(
            self.client.describe_consumer_group(),
            self.client.describe_topic()
        );

        let lag = if group_output.success && !group_output.stdout.trim().is_empty() {
            parse_consumer_group_lag(&group_output.stdout, self.client.topic())
        } else {
            LagSnapshot::default()
        };
        let topic = parse_topic_description(&topic_output);

        (lag, topic, !group_output.success && !topic_output.success)
    }

    fn track_availability(&self, state: &mut CollectorState, all_failed: bool) {
        if all_failed {
            state.consecutive_failures += 1;
            if state.consecutive_failures == UNAVAILABLE_THRESHOLD {
                error!(
                    consecutive_failures = state.consecutive_failures,
                    "Broker tooling unavailable, publishing empty metrics"
                );
                self.healthy.store(false, Ordering::Relaxed);
            }
        } else {
            if state.consecutive_failures >= UNAVAILABLE_THRESHOLD {
                info!("Broker tooling available again");
            }
            state.consecutive_failures = 0;
            self.healthy.store(true, Ordering::Relaxed);
        }
    }

    fn assemble(
        &self,
        lag: LagSnapshot,
        topic: TopicInfo,
        rates: Rates,
        wall_clock: SystemTime,
    ) -> Result<MetricsEvent> {
        let elapsed = wall_clock
            .duration_since(UNIX_EPOCH)
            .map_err(|e| DashboardError::Clock(e.to_string()))?;
        let timestamp = i64::try_from(elapsed.as_millis())
            .map_err(|e| DashboardError::Clock(e.to_string()))?;

        Ok(MetricsEvent {
            timestamp,
            stage: self.current_stage(),
            partition_count: topic.partition_count,
            consumer_count: lag.consumer_count,
            total_lag: lag.total_lag,
            partitions: lag.partitions,
            producer_rate: rates.producer,
            consumer_rate: rates.consumer,
        })
    }
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("client", &self.client)
            .field("poll_interval", &self.poll_interval)
            .field("current_stage", &self.current_stage())
            .finish_non_exhaustive()
    }
}

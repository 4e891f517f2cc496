use crate::collector::offset_store::{OffsetSnapshot, OffsetSnapshotStore};
use crate::collector::parser::PartitionLag;
use std::collections::VecDeque;
use std::time::Instant;

pub const DEFAULT_RATE_WINDOW: usize = 5;

/// Sliding window over the most recent rate samples, oldest evicted first.
#[derive(Debug, Clone)]
pub struct RateHistory {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl RateHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Arithmetic mean of the window, 0 when empty.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Summed per-second rates across partitions for one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateSample {
    pub producer: f64,
    pub consumer: f64,
}

/// Smoothed rates in messages per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rates {
    pub producer: i64,
    pub consumer: i64,
}

/// Derives producer (log end offset) and consumer (committed offset)
/// throughput from successive offset observations.
///
/// Negative deltas, e.g. after a topic was recreated without a `reset`, are
/// passed through unchanged and show up as a negative rate.
#[derive(Debug)]
pub struct RateEstimator {
    store: OffsetSnapshotStore,
    producer_history: RateHistory,
    consumer_history: RateHistory,
}

impl RateEstimator {
    pub fn new(window: usize) -> Self {
        Self {
            store: OffsetSnapshotStore::new(),
            producer_history: RateHistory::new(window),
            consumer_history: RateHistory::new(window),
        }
    }

    /// Compute this cycle's instantaneous rates and record `partitions` as the
    /// new baseline. Partitions seen for the first time contribute nothing.
    #[allow(clippy::cast_precision_loss)]
    pub fn sample(&mut self, partitions: &[PartitionLag], now: Instant) -> RateSample {
        let mut total = RateSample::default();

        for p in partitions {
            if let Some(prior) = self.store.get(p.partition) {
                let elapsed = now.saturating_duration_since(prior.observed_at).as_secs_f64();
                if elapsed > 0.0 {
                    let produced = p.log_end_offset.saturating_sub(prior.log_end_offset);
                    let consumed = p.current_offset.saturating_sub(prior.current_offset);
                    total.producer += produced as f64 / elapsed;
                    total.consumer += consumed as f64 / elapsed;
                }
            }

            self.store.put(
                p.partition,
                OffsetSnapshot {
                    log_end_offset: p.log_end_offset,
                    current_offset: p.current_offset,
                    observed_at: now,
                },
            );
        }

        total
    }

    /// Sample, push into the rolling windows and return the rounded means.
    pub fn update(&mut self, partitions: &[PartitionLag], now: Instant) -> Rates {
        let sample = self.sample(partitions, now);
        self.producer_history.push(sample.producer);
        self.consumer_history.push(sample.consumer);
        self.rates()
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn rates(&self) -> Rates {
        Rates {
            producer: self.producer_history.mean().round() as i64,
            consumer: self.consumer_history.mean().round() as i64,
        }
    }

    /// Forget all baselines and samples.
    pub fn reset(&mut self) {
        self.store.reset();
        self.producer_history.clear();
        self.consumer_history.clear();
    }

    #[cfg(test)]
    pub fn store(&self) -> &OffsetSnapshotStore {
        &self.store
    }

    #[cfg(test)]
    pub fn producer_history(&self) -> &RateHistory {
        &self.producer_history
    }
}

impl Default for RateEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_WINDOW)
    }
}

//! Parsing of `kafka-consumer-groups --describe` and `kafka-topics --describe`
//! output.
//!
//! Parsing is lenient: unknown lines are skipped, and a malformed offset or
//! lag column reads as 0 so the partition is still reported. Only the
//! partition id has to be a valid number.

use crate::broker::CommandOutput;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::trace;

/// Consumer id reported for partitions without an active member.
pub const UNASSIGNED: &str = "Unassigned";

const NOT_FOUND_MARKER: &str = "does not exist";
const SKIP_MARKERS: [&str; 4] = ["GROUP", "TOPIC", "Consumer group", NOT_FOUND_MARKER];
const PARTITION_MARKER: &str = "Partition:";
const MIN_ROW_COLUMNS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionLag {
    pub partition: u32,
    pub current_offset: i64,
    pub log_end_offset: i64,
    /// As reported by the broker, not recomputed from the offsets.
    pub lag: i64,
    pub consumer_id: String,
}

impl PartitionLag {
    pub fn is_assigned(&self) -> bool {
        self.consumer_id != UNASSIGNED
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LagSnapshot {
    /// Ascending by partition id, ids unique.
    pub partitions: Vec<PartitionLag>,
    pub total_lag: i64,
    pub consumer_count: usize,
}

impl LagSnapshot {
    fn from_sorted(partitions: Vec<PartitionLag>) -> Self {
        let total_lag = partitions
            .iter()
            .fold(0i64, |total, p| total.saturating_add(p.lag));
        let consumer_count = partitions
            .iter()
            .filter(|p| p.is_assigned())
            .map(|p| p.consumer_id.as_str())
            .collect::<HashSet<_>>()
            .len();

        Self {
            partitions,
            total_lag,
            consumer_count,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicInfo {
    pub partition_count: usize,
    /// `false` for a topic that has not been created yet.
    pub exists: bool,
}

impl TopicInfo {
    pub const fn missing() -> Self {
        Self {
            partition_count: 0,
            exists: false,
        }
    }
}

/// Parse the consumer group description, keeping rows for `topic` only.
///
/// Expected columns: GROUP TOPIC PARTITION CURRENT-OFFSET LOG-END-OFFSET LAG
/// CONSUMER-ID HOST CLIENT-ID. A repeated partition id keeps the last row.
pub fn parse_consumer_group_lag(raw: &str, topic: &str) -> LagSnapshot {
    let mut partitions: BTreeMap<u32, PartitionLag> = BTreeMap::new();

    for line in raw.lines() {
        if let Some(row) = parse_lag_row(line, topic) {
            partitions.insert(row.partition, row);
        }
    }

    LagSnapshot::from_sorted(partitions.into_values().collect())
}

fn parse_lag_row(line: &str, topic: &str) -> Option<PartitionLag> {
    let trimmed = line.trim();
    if trimmed.is_empty() || SKIP_MARKERS.iter().any(|m| trimmed.contains(m)) {
        return None;
    }

    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    if parts.len() < MIN_ROW_COLUMNS || parts[1] != topic {
        trace!(line = trimmed, "Skipping non-partition line");
        return None;
    }

    let Ok(partition) = parts[2].parse::<u32>() else {
        trace!(line = trimmed, "Skipping row with invalid partition id");
        return None;
    };

    let consumer_id = match parts.get(6) {
        Some(&"-") | None => UNASSIGNED.to_string(),
        Some(id) => (*id).to_string(),
    };

    Some(PartitionLag {
        partition,
        current_offset: lenient_i64(parts[3]),
        log_end_offset: lenient_i64(parts[4]),
        lag: lenient_i64(parts[5]),
        consumer_id,
    })
}

fn lenient_i64(token: &str) -> i64 {
    token.parse().unwrap_or(0)
}

/// Derive topic existence and partition count from a topic describe run.
/// A failed run or a "does not exist" notice means the topic is missing,
/// which is a normal state rather than an error.
pub fn parse_topic_description(output: &CommandOutput) -> TopicInfo {
    if !output.success
        || output.stdout.contains(NOT_FOUND_MARKER)
        || output.stderr.contains(NOT_FOUND_MARKER)
    {
        return TopicInfo::missing();
    }

    let partition_count = output
        .stdout
        .lines()
        .filter(|line| line.contains(PARTITION_MARKER))
        .count();

    TopicInfo {
        partition_count,
        exists: true,
    }
}

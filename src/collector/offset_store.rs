use std::collections::HashMap;
use std::time::Instant;

/// Offsets of one partition as seen at `observed_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetSnapshot {
    pub log_end_offset: i64,
    pub current_offset: i64,
    pub observed_at: Instant,
}

/// Last observed offsets per partition id. Entries are overwritten on every
/// poll and never expire; `reset` must run whenever the monitored topic or
/// group changes so a new topology is not read as a throughput jump.
#[derive(Debug, Default)]
pub struct OffsetSnapshotStore {
    entries: HashMap<u32, OffsetSnapshot>,
}

impl OffsetSnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, partition: u32) -> Option<OffsetSnapshot> {
        self.entries.get(&partition).copied()
    }

    pub fn put(&mut self, partition: u32, snapshot: OffsetSnapshot) {
        self.entries.insert(partition, snapshot);
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn snapshot(log_end: i64, current: i64, at: Instant) -> OffsetSnapshot {
        OffsetSnapshot {
            log_end_offset: log_end,
            current_offset: current,
            observed_at: at,
        }
    }

    #[test]
    fn test_put_overwrites_previous_entry() {
        let mut store = OffsetSnapshotStore::new();
        let t0 = Instant::now();

        store.put(0, snapshot(100, 90, t0));
        store.put(0, snapshot(150, 140, t0 + Duration::from_secs(1)));

        assert_eq!(store.len(), 1);
        let entry = store.get(0).unwrap();
        assert_eq!(entry.log_end_offset, 150);
        assert_eq!(entry.current_offset, 140);
        assert_eq!(entry.observed_at, t0 + Duration::from_secs(1));
    }

    #[test]
    fn test_get_unknown_partition() {
        let store = OffsetSnapshotStore::new();
        assert!(store.get(3).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_reset_clears_all_partitions() {
        let mut store = OffsetSnapshotStore::new();
        let now = Instant::now();
        for partition in 0..4 {
            store.put(partition, snapshot(10, 5, now));
        }
        assert_eq!(store.len(), 4);

        store.reset();
        assert!(store.is_empty());
        assert!(store.get(0).is_none());
    }
}

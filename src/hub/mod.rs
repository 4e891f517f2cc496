//! Fan-out of dashboard events to connected viewers.

pub mod connection;

use crate::error::Result;
use crate::metrics::types::{DashboardEvent, MetricsEvent};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, error, trace};

pub use connection::{ChannelConnection, Connection};

pub type ConnectionId = u64;

/// Outcome of one publish, for logging only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Tracks live viewer connections and the most recent metrics event.
///
/// The hub never owns a connection's lifecycle: whoever registers a connection
/// unregisters it when the peer goes away.
pub struct BroadcastHub {
    connections: DashMap<ConnectionId, Arc<dyn Connection>>,
    next_id: AtomicU64,
    latest: watch::Sender<Option<Arc<MetricsEvent>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
            latest,
        }
    }

    pub fn register(&self, connection: Arc<dyn Connection>) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections.insert(id, connection);
        debug!(
            connection = id,
            connections = self.connections.len(),
            "Viewer registered"
        );
        id
    }

    pub fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self.connections.remove(&id).is_some();
        if removed {
            debug!(
                connection = id,
                connections = self.connections.len(),
                "Viewer unregistered"
            );
        }
        removed
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Most recently published metrics event.
    pub fn latest(&self) -> Option<Arc<MetricsEvent>> {
        self.latest.borrow().clone()
    }

    /// Deliver `event` to every connection registered at call time. A failing
    /// connection is logged and skipped; it never affects the others.
    pub fn publish(&self, event: &DashboardEvent) -> PublishReport {
        if let DashboardEvent::Metrics(metrics) = event {
            self.latest.send_replace(Some(Arc::clone(metrics)));
        }

        let payload: Arc<str> = match serde_json::to_string(event) {
            Ok(json) => json.into(),
            Err(e) => {
                error!(error = %e, "Failed to serialize dashboard event");
                return PublishReport::default();
            }
        };

        let targets: Vec<(ConnectionId, Arc<dyn Connection>)> = self
            .connections
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        let mut report = PublishReport::default();
        for (id, connection) in targets {
            match connection.send(Arc::clone(&payload)) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    debug!(connection = id, error = %e, "Failed to deliver event");
                }
            }
        }

        trace!(
            delivered = report.delivered,
            failed = report.failed,
            "Published dashboard event"
        );
        report
    }

    /// Send one event to a single connection.
    pub fn send_to(&self, id: ConnectionId, event: &DashboardEvent) -> Result<()> {
        let payload: Arc<str> = serde_json::to_string(event)?.into();
        let connection = self
            .connections
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| {
                crate::error::DashboardError::Channel(format!("connection {id} not registered"))
            })?;
        connection.send(payload)
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("connections", &self.connections.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DashboardError;
    use crate::metrics::types::{StageActivated, StageTopology};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingConnection {
        received: Mutex<Vec<String>>,
    }

    impl Connection for RecordingConnection {
        fn send(&self, payload: Arc<str>) -> Result<()> {
            self.received.lock().unwrap().push(payload.to_string());
            Ok(())
        }
    }

    struct BrokenConnection;

    impl Connection for BrokenConnection {
        fn send(&self, _payload: Arc<str>) -> Result<()> {
            Err(DashboardError::Channel("peer went away".to_string()))
        }
    }

    fn metrics_event(total_lag: i64) -> DashboardEvent {
        DashboardEvent::Metrics(Arc::new(MetricsEvent {
            timestamp: 1,
            stage: 0,
            partition_count: 0,
            consumer_count: 0,
            total_lag,
            partitions: vec![],
            producer_rate: 0,
            consumer_rate: 0,
        }))
    }

    #[test]
    fn test_publish_isolates_failing_connection() {
        let hub = BroadcastHub::new();
        let first = Arc::new(RecordingConnection::default());
        let second = Arc::new(RecordingConnection::default());

        hub.register(first.clone());
        hub.register(Arc::new(BrokenConnection));
        hub.register(second.clone());

        let report = hub.publish(&metrics_event(7));

        assert_eq!(report, PublishReport { delivered: 2, failed: 1 });
        assert_eq!(first.received.lock().unwrap().len(), 1);
        assert_eq!(second.received.lock().unwrap().len(), 1);
        assert!(first.received.lock().unwrap()[0].contains("\"totalLag\":7"));
        // failing connections stay registered until their owner unregisters them
        assert_eq!(hub.connection_count(), 3);
    }

    #[test]
    fn test_unregistered_connection_receives_nothing() {
        let hub = BroadcastHub::new();
        let conn = Arc::new(RecordingConnection::default());
        let id = hub.register(conn.clone());

        assert!(hub.unregister(id));
        assert!(!hub.unregister(id));

        let report = hub.publish(&metrics_event(1));
        assert_eq!(report, PublishReport::default());
        assert!(conn.received.lock().unwrap().is_empty());
    }

    #[test]
    fn test_latest_tracks_metrics_only() {
        let hub = BroadcastHub::new();
        assert!(hub.latest().is_none());

        hub.publish(&metrics_event(3));
        hub.publish(&DashboardEvent::StageActivated(StageActivated {
            stage: 1,
            config: StageTopology {
                partitions: 1,
                consumers: 1,
                key_strategy: "single".to_string(),
                message_rate: 10,
            },
        }));

        assert_eq!(hub.latest().unwrap().total_lag, 3);
    }

    #[test]
    fn test_send_to_single_connection() {
        let hub = BroadcastHub::new();
        let target = Arc::new(RecordingConnection::default());
        let bystander = Arc::new(RecordingConnection::default());
        let id = hub.register(target.clone());
        hub.register(bystander.clone());

        hub.send_to(id, &metrics_event(9)).unwrap();

        assert_eq!(target.received.lock().unwrap().len(), 1);
        assert!(bystander.received.lock().unwrap().is_empty());
        assert!(hub.send_to(999, &metrics_event(9)).is_err());
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let hub = BroadcastHub::new();
        let a = hub.register(Arc::new(RecordingConnection::default()));
        let b = hub.register(Arc::new(RecordingConnection::default()));
        assert_ne!(a, b);
    }
}

use crate::error::{DashboardError, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Delivery endpoint for serialized events. `send` must not block.
pub trait Connection: Send + Sync {
    fn send(&self, payload: Arc<str>) -> Result<()>;
}

/// Connection backed by a bounded channel drained by the socket writer task.
/// A full buffer drops the event for this viewer only.
pub struct ChannelConnection {
    tx: mpsc::Sender<Arc<str>>,
}

impl ChannelConnection {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl Connection for ChannelConnection {
    fn send(&self, payload: Arc<str>) -> Result<()> {
        self.tx.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => DashboardError::Channel("viewer buffer full".to_string()),
            TrySendError::Closed(_) => DashboardError::Channel("viewer disconnected".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_connection_delivers() {
        let (conn, mut rx) = ChannelConnection::new(4);
        conn.send(Arc::from("hello")).unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }

    #[test]
    fn test_full_buffer_is_an_error() {
        let (conn, _rx) = ChannelConnection::new(1);
        conn.send(Arc::from("a")).unwrap();
        let err = conn.send(Arc::from("b")).unwrap_err();
        assert!(err.to_string().contains("buffer full"));
    }

    #[test]
    fn test_closed_receiver_is_an_error() {
        let (conn, rx) = ChannelConnection::new(1);
        drop(rx);
        let err = conn.send(Arc::from("a")).unwrap_err();
        assert!(err.to_string().contains("disconnected"));
    }
}

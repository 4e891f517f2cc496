use crate::http::server::AppState;
use crate::hub::{ChannelConnection, ConnectionId};
use crate::metrics::types::DashboardEvent;
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Events buffered per viewer before new ones are dropped for it.
const VIEWER_BUFFER: usize = 64;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| viewer_session(socket, state))
}

async fn viewer_session(socket: WebSocket, state: AppState) {
    let hub = Arc::clone(state.collector.hub());
    let (connection, rx) = ChannelConnection::new(VIEWER_BUFFER);
    let id = hub.register(Arc::new(connection));
    info!(connection = id, viewers = hub.connection_count(), "Viewer connected");

    // A fresh cycle is published to every viewer, this one included
    if state.collector.collect_once().await.is_none() {
        send_cached(&state, id);
    }

    pump(socket, rx).await;

    hub.unregister(id);
    info!(connection = id, viewers = hub.connection_count(), "Viewer disconnected");
}

fn send_cached(state: &AppState, id: ConnectionId) {
    let hub = state.collector.hub();
    let Some(latest) = hub.latest() else {
        return;
    };
    if let Err(e) = hub.send_to(id, &DashboardEvent::Metrics(latest)) {
        debug!(connection = id, error = %e, "Failed to send cached metrics");
    }
}

/// Forward queued events to the socket until either side goes away.
async fn pump(mut socket: WebSocket, mut rx: mpsc::Receiver<Arc<str>>) {
    loop {
        tokio::select! {
            payload = rx.recv() => {
                let Some(payload) = payload else { break };
                if let Err(e) = socket.send(Message::Text(payload.to_string().into())).await {
                    debug!(error = %e, "Socket write failed");
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(error = %e, "Socket read failed");
                        break;
                    }
                    // viewers only listen, anything they send is ignored
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

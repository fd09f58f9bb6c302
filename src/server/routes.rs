// HTTP and WebSocket handlers; unknown paths get an empty 404 and a closed connection.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::feed::{Broadcaster, Channel, Subscription};
use crate::market::Instrument;
use crate::server::AppState;

pub const ROOT_TEXT: &str = "Stock feed running";

pub async fn root() -> &'static str {
    ROOT_TEXT
}

/// Latest published catalog, including base prices.
pub async fn stock_info(State(state): State<AppState>) -> Json<Vec<Instrument>> {
    Json(state.broadcaster.catalog().to_vec())
}

pub async fn prices_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| stream_channel(socket, Channel::Prices, state.broadcaster))
}

pub async fn order_book_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| stream_channel(socket, Channel::OrderBook, state.broadcaster))
}

pub async fn reject() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, [(header::CONNECTION, "close")])
}

// Pump the subscriber queue into the socket until either side gives up, then
// leave the channel.
async fn stream_channel(socket: WebSocket, channel: Channel, broadcaster: Arc<Broadcaster>) {
    let Subscription { id, receiver: mut queue, .. } = match broadcaster.subscribe(channel) {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(%channel, error = %e, "Could not build initial snapshot, closing socket");
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = queue.recv().await {
            // axum frames own a String, so the shared text is copied here
            if let Err(e) = sink.send(Message::Text(payload.to_string())).await {
                debug!(%id, error = %e, "Send failed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    debug!(%id, error = %e, "Read failed");
                    break;
                }
                _ => {} // clients have nothing to say on these channels
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    broadcaster.unsubscribe(channel, id);
}

pub mod channels;
pub mod events;
pub mod hub;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::state::AppState;
use channels::Outbox;
use events::{Broadcast, ChatEvent, ClientFrame};

/// Header carrying the session token, transmitted once per connection.
pub const TOKEN_HEADER: &str = "x-chat-token";

/// How long a closing session may spend flushing queued frames to a slow
/// peer before the socket is given up.
const DRAIN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Upgrade handler for `/ws`.
///
/// The session token must arrive in the `x-chat-token` header of the upgrade
/// request. A missing header fails authentication and an unknown token fails
/// validation, in both cases before anything is attached.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    if state.shutdown.is_cancelled() {
        return Err(AppError::BadRequest("server is shutting down".to_string()));
    }

    let token = headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::Unauthorized(format!("missing {TOKEN_HEADER} header")))?;

    let name = state
        .registry
        .lookup(&token)
        .await
        .ok_or_else(|| AppError::BadRequest("unknown session token".to_string()))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, token, name)))
}

async fn handle_socket(socket: WebSocket, state: AppState, token: String, name: String) {
    let outbox = state.channels.register(&token, state.outbox_capacity).await;
    let conn = state.shutdown.child_token();
    let (ws_sink, mut ws_stream) = socket.split();

    let outbound = tokio::spawn(deliver(ws_sink, outbox.clone(), conn.clone()));
    debug!(token = %token, name = %name, "stream attached");

    // Inbound loop: client text frames become chat events on the hub.
    loop {
        tokio::select! {
            _ = conn.cancelled() => break,
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let Ok(frame) = serde_json::from_str::<ClientFrame>(&text) else {
                            debug!(token = %token, "ignoring malformed client frame");
                            continue;
                        };
                        let event = ChatEvent::Chat {
                            name: name.clone(),
                            text: frame.text,
                        };
                        if state.hub.publish(event).await.is_err() {
                            // Intake closed: the shutdown frame is on its way.
                            break;
                        }
                    }
                    // Peer finished sending: start draining, not an error.
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(token = %token, error = %e, "stream receive error");
                        break;
                    }
                }
            }
        }
    }

    // Draining: let the outbound task flush what is already queued, then
    // release the queue. This runs on every exit path.
    conn.cancel();
    if let Err(e) = outbound.await {
        warn!(token = %token, error = %e, "outbound task failed");
    }
    state.channels.unregister(&token, &outbox).await;
    debug!(token = %token, "stream closed");
}

/// Outbound delivery loop: forward hub-fanned frames to the transport.
///
/// A delivered shutdown frame is terminal: the notice is the last event a
/// client sees. On cancellation the already-queued frames are flushed before
/// the socket is given up.
async fn deliver(
    mut sink: SplitSink<WebSocket, Message>,
    outbox: Outbox,
    conn: CancellationToken,
) {
    loop {
        tokio::select! {
            frame = outbox.pop() => {
                let terminal = frame.event == ChatEvent::Shutdown;
                if send_frame(&mut sink, &frame).await.is_err() {
                    return;
                }
                if terminal {
                    let _ = sink.send(Message::Close(None)).await;
                    return;
                }
            }
            _ = conn.cancelled() => {
                let flush = async {
                    while let Some(frame) = outbox.try_pop() {
                        if send_frame(&mut sink, &frame).await.is_err() {
                            return;
                        }
                    }
                    let _ = sink.send(Message::Close(None)).await;
                };
                let _ = tokio::time::timeout(DRAIN_TIMEOUT, flush).await;
                return;
            }
        }
    }
}

async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: &Broadcast,
) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "failed to serialize frame");
            return Ok(());
        }
    };
    sink.send(Message::Text(json.into())).await
}

//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::PlayerInput;
use crate::http::middleware::{verify_jwt, JwtClaims};
use crate::util::rate_limit::PlayerRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// JWT token for authentication
    pub token: String,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    // Verify JWT token before upgrading
    match verify_jwt(&query.token, &state.config.jwt_secret) {
        Ok(claims) => {
            info!(user_id = %claims.sub, "WebSocket upgrade for authenticated user");
            ws.on_upgrade(move |socket| handle_socket(socket, claims, state))
        }
        Err(e) => {
            error!(error = %e, "WebSocket auth failed");
            (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
    }
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, claims: JwtClaims, state: AppState) {
    let user_id = claims.sub;
    info!(user_id = %user_id, name = %claims.display_name(), "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    // Send welcome message
    let welcome = ServerMsg::Welcome {
        user_id,
        server_time: unix_millis(),
    };

    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(user_id = %user_id, error = %e, "Failed to send welcome");
        return;
    }

    // Register with matchmaking to get channels
    let (input_tx, outbound_rx) = state.matchmaking.register_player(user_id).await;

    // Run the session with split read/write
    run_session(user_id, ws_sink, ws_stream, input_tx, outbound_rx).await;

    // Leaves the match and drops matchmaking state
    state.matchmaking.unregister_player(user_id).await;

    info!(user_id = %user_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    user_id: Uuid,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    input_tx: mpsc::Sender<PlayerInput>,
    mut outbound_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = PlayerRateLimiter::new();

    // Spawn writer task: match broadcasts -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            match outbound_rx.recv().await {
                Ok(msg) => {
                    if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                        debug!(user_id = %user_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // State snapshots supersede each other, so skipping is safe
                    warn!(user_id = %user_id, lagged_count = n, "Client lagged, skipping messages");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(user_id = %user_id, "Outbound channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> match loop
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_message() {
                    warn!(user_id = %user_id, "Rate limited client message");
                    continue;
                }

                let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "Failed to parse client message");
                        continue;
                    }
                };

                if matches!(client_msg, ClientMsg::RequestRestart) && !rate_limiter.check_restart() {
                    debug!(user_id = %user_id, "Restart request throttled");
                    continue;
                }

                let input = PlayerInput {
                    user_id,
                    msg: client_msg,
                };

                if input_tx.send(input).await.is_err() {
                    debug!(user_id = %user_id, "Input channel closed");
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(user_id = %user_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(user_id = %user_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Abort writer task
    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

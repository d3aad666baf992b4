use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use genflow_core::error::CoreError;
use genflow_events::OwnerSubscription;
use serde::Deserialize;

use crate::auth::jwt::JwtConfig;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;
use crate::ws::manager::WsManager;

/// Query string of `/api/ws`. Browsers cannot set headers on a WebSocket
/// handshake, so the access token travels here.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

fn authenticate(params: &WsParams, config: &JwtConfig) -> AppResult<AuthUser> {
    let token = params
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized("Missing token".into())))?;
    AuthUser::from_token(token, config)
}

/// GET /api/ws?token=<jwt>
///
/// Authenticates before upgrading; the socket then carries only the
/// caller's job events.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> AppResult<impl IntoResponse> {
    let user = authenticate(&params, &state.config.jwt)?;
    let events = state.event_bus.subscribe_owner(user.owner_id);
    let ws_manager = Arc::clone(&state.ws_manager);

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, ws_manager, events)))
}

/// Drive one connection until either side closes.
///
/// A writer task merges control frames from the manager with the owner's
/// job events; the current task drains inbound frames.
async fn handle_socket(socket: WebSocket, ws_manager: Arc<WsManager>, mut events: OwnerSubscription) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let owner_id = events.owner_id();
    let mut control = ws_manager.add(conn_id.clone(), owner_id).await;
    let owner_connections = ws_manager.owner_connection_count(owner_id).await;
    tracing::info!(
        conn_id = %conn_id,
        owner_id,
        owner_connections,
        "WebSocket connected",
    );

    let (mut sink, mut stream) = socket.split();

    let writer_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                frame = control.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
                event = events.recv() => match event {
                    Some(event) => match serde_json::to_string(&event) {
                        Ok(text) => Message::Text(text.into()),
                        Err(e) => {
                            tracing::warn!(error = %e, job_id = event.job.id, "Failed to encode job event");
                            continue;
                        }
                    },
                    None => break,
                },
            };

            let closing = matches!(message, Message::Close(_));
            if sink.send(message).await.is_err() || closing {
                tracing::debug!(conn_id = %writer_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            // The channel is push-only.
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    let connected_secs = ws_manager
        .remove(&conn_id)
        .await
        .map(|open_for| open_for.num_seconds())
        .unwrap_or_default();
    send_task.abort();
    tracing::info!(conn_id = %conn_id, owner_id, connected_secs, "WebSocket disconnected");
}

/// WebSocket endpoint for family event channels
///
/// Clients connect, then explicitly join one or more family channels; no
/// channel is subscribed implicitly. While joined they receive
/// `task_created`, `task_updated`, and `task_deleted` events for that
/// family. Delivery is best-effort with no replay: a client that joins
/// late or lags simply misses events until its next REST fetch.
///
/// Membership is verified at join time, so a connected client cannot
/// subscribe to a family it does not belong to by guessing its ID.
///
/// # Authentication
///
/// Browsers cannot set an Authorization header on WebSocket connections,
/// so the JWT travels either as a `token` query parameter or as a
/// `jwt.<token>` entry in the `Sec-WebSocket-Protocol` list.
///
/// # Client frames
///
/// ```json
/// {"event": "join_family",  "familyId": "<uuid>"}
/// {"event": "leave_family", "familyId": "<uuid>"}
/// ```

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use choreboard_shared::{auth::jwt, models::membership::Membership};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::{app::AppState, error::ApiError};

/// Subprotocol the server selects for accepted connections.
const PROTOCOL: &str = "choreboard";

/// Outbound frames buffered per connection before backpressure applies.
const OUTBOUND_BUFFER: usize = 64;

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    /// JWT access token (alternative to the subprotocol carrier)
    pub token: Option<String>,
}

/// Messages a client may send on the socket
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ClientFrame {
    JoinFamily {
        #[serde(rename = "familyId")]
        family_id: Uuid,
    },
    LeaveFamily {
        #[serde(rename = "familyId")]
        family_id: Uuid,
    },
}

/// `GET /realtime` (WebSocket upgrade)
///
/// The token is validated before the upgrade completes; a bad token is a
/// plain 401 instead of a half-open socket.
pub async fn realtime_ws(
    State(state): State<AppState>,
    Query(query): Query<WsAuthQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let token = query
        .token
        .or_else(|| token_from_protocols(&headers))
        .ok_or_else(|| ApiError::Unauthorized("Missing token".to_string()))?;

    let claims = jwt::validate_access_token(&token, state.jwt_secret())?;
    let user_id = claims.sub;

    Ok(ws
        .protocols([PROTOCOL])
        .on_upgrade(move |socket| handle_socket(state, socket, user_id)))
}

/// Extracts a JWT from the WebSocket subprotocol list
///
/// The client offers `["choreboard", "jwt.<token>"]`; the server selects
/// `choreboard` and reads the token from the second entry.
fn token_from_protocols(headers: &HeaderMap) -> Option<String> {
    let raw = headers
        .get("sec-websocket-protocol")
        .and_then(|v| v.to_str().ok())?;

    for part in raw.split(',').map(|s| s.trim()) {
        if let Some(rest) = part.strip_prefix("jwt.") {
            if !rest.is_empty() {
                return Some(rest.to_string());
            }
        }
    }

    None
}

async fn handle_socket(state: AppState, socket: WebSocket, user_id: Uuid) {
    let (mut sink, mut stream) = socket.split();

    // All outbound frames funnel through one mpsc channel so the channel
    // forwarders and the control acks never interleave partial writes.
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    // One forwarder task per joined family, torn down on leave or on
    // connection close.
    let mut forwarders: HashMap<Uuid, tokio::task::JoinHandle<()>> = HashMap::new();

    while let Some(Ok(msg)) = stream.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        match serde_json::from_str::<ClientFrame>(&text) {
            Ok(ClientFrame::JoinFamily { family_id }) => {
                if forwarders.contains_key(&family_id) {
                    continue;
                }

                match Membership::get_role(&state.db, family_id, user_id).await {
                    Ok(Some(_)) => {
                        let receiver = state.channels.subscribe(family_id);
                        forwarders.insert(family_id, spawn_forwarder(receiver, tx.clone()));

                        tracing::debug!(
                            user_id = %user_id,
                            channel = %choreboard_shared::realtime::channel_name(family_id),
                            "Client joined family channel"
                        );
                        send_frame(&tx, json!({ "event": "joined", "familyId": family_id })).await;
                    }
                    Ok(None) => {
                        send_frame(
                            &tx,
                            json!({ "event": "error", "message": "not a member of this family" }),
                        )
                        .await;
                    }
                    Err(e) => {
                        tracing::error!("Membership lookup failed during channel join: {}", e);
                        send_frame(
                            &tx,
                            json!({ "event": "error", "message": "could not join channel" }),
                        )
                        .await;
                    }
                }
            }
            Ok(ClientFrame::LeaveFamily { family_id }) => {
                if let Some(handle) = forwarders.remove(&family_id) {
                    handle.abort();
                }
                send_frame(&tx, json!({ "event": "left", "familyId": family_id })).await;
            }
            Err(_) => {
                send_frame(
                    &tx,
                    json!({ "event": "error", "message": "unrecognized message" }),
                )
                .await;
            }
        }
    }

    // Connection teardown unsubscribes everything.
    for handle in forwarders.into_values() {
        handle.abort();
    }
    send_task.abort();
}

fn spawn_forwarder(
    mut receiver: broadcast::Receiver<choreboard_shared::realtime::FamilyEvent>,
    tx: mpsc::Sender<String>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let Ok(frame) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if tx.send(frame).await.is_err() {
                        break;
                    }
                }
                // At-most-once delivery: a lagged subscriber just misses
                // the dropped events, there is no replay.
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn send_frame(tx: &mpsc::Sender<String>, frame: serde_json::Value) {
    let _ = tx.send(frame.to_string()).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_frame_parsing() {
        let frame: ClientFrame = serde_json::from_str(
            r#"{"event":"join_family","familyId":"550e8400-e29b-41d4-a716-446655440000"}"#,
        )
        .unwrap();
        assert!(matches!(frame, ClientFrame::JoinFamily { .. }));

        let frame: ClientFrame = serde_json::from_str(
            r#"{"event":"leave_family","familyId":"550e8400-e29b-41d4-a716-446655440000"}"#,
        )
        .unwrap();
        assert!(matches!(frame, ClientFrame::LeaveFamily { .. }));

        assert!(serde_json::from_str::<ClientFrame>(r#"{"event":"unknown"}"#).is_err());
    }

    #[test]
    fn test_token_from_protocols() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "sec-websocket-protocol",
            "choreboard, jwt.abc123".parse().unwrap(),
        );
        assert_eq!(token_from_protocols(&headers).as_deref(), Some("abc123"));

        let mut headers = HeaderMap::new();
        headers.insert("sec-websocket-protocol", "choreboard".parse().unwrap());
        assert_eq!(token_from_protocols(&headers), None);

        assert_eq!(token_from_protocols(&HeaderMap::new()), None);
    }
}

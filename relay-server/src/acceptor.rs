//! Upgrades incoming HTTP connections to WebSockets and demultiplexes by
//! URL path: `/` is an arena room, `/battle` is a battle room. Each
//! accepted connection gets a paired send/receive task — if either ends,
//! the other is aborted and a `Disconnect` event is posted to the room's
//! mailbox, mirroring the send/receive task pairing used for the host and
//! client sides of a connection elsewhere in this server.

use crate::arena::{self, ArenaEvent};
use crate::battle::{self, BattleEvent};
use crate::router::{parse_arena_inbound, parse_battle_inbound};
use crate::state::AppState;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use protocol::{ChallengeId, GameId, PlayerId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

const POLICY_VIOLATION: u16 = 1008;

struct ArenaParams {
    game_id: GameId,
    player_id: PlayerId,
}

struct BattleParams {
    challenge_id: ChallengeId,
    player_id: PlayerId,
}

fn parse_arena_params(query: &HashMap<String, String>) -> Option<ArenaParams> {
    let game_id = query.get("gameId")?.parse::<GameId>().ok()?;
    let player_id = query.get("playerId")?.trim();
    if player_id.is_empty() {
        return None;
    }
    Some(ArenaParams {
        game_id,
        player_id: PlayerId(player_id.to_string()),
    })
}

fn parse_battle_params(query: &HashMap<String, String>) -> Option<BattleParams> {
    let challenge_id = query.get("challengeId")?.trim();
    let player_id = query.get("playerId")?.trim();
    if challenge_id.is_empty() || player_id.is_empty() {
        return None;
    }
    Some(BattleParams {
        challenge_id: ChallengeId(challenge_id.to_string()),
        player_id: PlayerId(player_id.to_string()),
    })
}

fn origin_of(headers: &HeaderMap) -> Option<&str> {
    headers.get(axum::http::header::ORIGIN)?.to_str().ok()
}

/// `GET /` serves either the arena WebSocket upgrade or, absent upgrade
/// headers, the plain JSON status document — axum routes match on path and
/// method alone, so the two surfaces share this one handler and branch on
/// whether `WebSocketUpgrade` actually extracted.
pub async fn root_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    match ws {
        Some(ws) => arena_upgrade(ws, state, &headers, query).await,
        None => health_response(&state).into_response(),
    }
}

pub async fn battle_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    battle_upgrade(ws, state, &headers, query).await
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    health_response(&state).into_response()
}

fn health_response(state: &AppState) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "service": "relay-server",
        "games": state.arena_room_count(),
        "players": state.player_count.load(std::sync::atomic::Ordering::Relaxed),
        "uptime": state.started_at.elapsed().as_secs(),
        "timestamp": protocol::clock::now_ms(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn arena_upgrade(
    ws: WebSocketUpgrade,
    state: Arc<AppState>,
    headers: &HeaderMap,
    query: HashMap<String, String>,
) -> Response {
    if !state.config.origin_allowed(origin_of(headers)) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let Some(params) = parse_arena_params(&query) else {
        return ws
            .on_upgrade(|socket| async move { reject_with_policy_violation(socket).await });
    };

    ws.on_upgrade(move |socket| async move {
        let handle = state.arena_handle(params.game_id);
        run_connection(
            socket,
            params.player_id,
            handle,
            |peer, outbound| ArenaEvent::Join { peer, outbound },
            |peer, raw| match parse_arena_inbound(raw) {
                Ok(msg) => Some(ArenaEvent::Inbound { peer, msg }),
                Err(err) => {
                    tracing::warn!(?err, "dropping malformed arena frame");
                    None
                }
            },
            |peer| ArenaEvent::Disconnect { peer },
        )
        .await;
    })
}

async fn battle_upgrade(
    ws: WebSocketUpgrade,
    state: Arc<AppState>,
    headers: &HeaderMap,
    query: HashMap<String, String>,
) -> Response {
    if !state.config.origin_allowed(origin_of(headers)) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let Some(params) = parse_battle_params(&query) else {
        return ws
            .on_upgrade(|socket| async move { reject_with_policy_violation(socket).await });
    };

    ws.on_upgrade(move |socket| async move {
        let handle = state.battle_handle(params.challenge_id);
        run_connection(
            socket,
            params.player_id,
            handle,
            |peer, outbound| BattleEvent::Join { peer, outbound },
            |peer, raw| match parse_battle_inbound(raw) {
                Ok(msg) => Some(BattleEvent::Inbound { peer, msg }),
                Err(err) => {
                    tracing::warn!(?err, "dropping malformed battle frame");
                    None
                }
            },
            |peer| BattleEvent::Disconnect { peer },
        )
        .await;
    })
}

async fn reject_with_policy_violation(mut socket: WebSocket) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: POLICY_VIOLATION,
            reason: "Invalid parameters".into(),
        })))
        .await;
}

/// Drives one accepted connection until either side closes: a send task
/// forwards the room actor's outbound frames to the socket, a receive task
/// parses inbound frames and posts them to the room's mailbox. Whichever
/// finishes first, the other is aborted and a disconnect event is posted.
async fn run_connection<E: Send + 'static>(
    socket: WebSocket,
    peer: PlayerId,
    handle: mpsc::UnboundedSender<E>,
    make_join: impl FnOnce(PlayerId, mpsc::UnboundedSender<Message>) -> E,
    make_inbound: impl Fn(PlayerId, &str) -> Option<E> + Send + 'static,
    make_disconnect: impl FnOnce(PlayerId) -> E + Send + 'static,
) {
    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    if handle.send(make_join(peer.clone(), outbound_tx)).is_err() {
        return;
    }

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let recv_peer = peer.clone();
    let recv_handle = handle.clone();
    let mut receive_task = tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    if let Some(event) = make_inbound(recv_peer.clone(), &text) {
                        if recv_handle.send(event).is_err() {
                            break;
                        }
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => receive_task.abort(),
        _ = &mut receive_task => send_task.abort(),
    }

    let _ = handle.send(make_disconnect(peer));
}

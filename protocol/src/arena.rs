//! Wire envelopes for arena (free-for-all) rooms.

use crate::ids::PlayerId;
use crate::player_state::PlayerState;
use serde::{Deserialize, Serialize};

/// Messages a client may send to an arena room.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArenaInbound {
    Heartbeat,
    MarkReady,
    StartGame,
    SetDeadline {
        deadline: i64,
    },
    Update {
        data: PlayerState,
    },
    Eliminated,
    Winner {
        #[serde(rename = "winnerId")]
        winner_id: PlayerId,
    },
}

/// The phase of the arena state machine. Strictly forward-moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Waiting,
    Countdown,
    Active,
    Ended,
}

/// Snapshot of the arena state broadcast after every phase/ready-count change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateView {
    pub phase: Phase,
    pub countdown_start_time: Option<i64>,
    pub countdown_duration: u64,
    pub ready_players: usize,
    pub total_players: usize,
}

/// One entry of the initial roster snapshot sent to a newly joined peer.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
    #[serde(rename = "playerId")]
    pub player_id: PlayerId,
    pub data: Option<PlayerState>,
}

/// Messages the server sends to arena room peers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ArenaOutbound {
    #[serde(rename = "sync")]
    Sync { players: Vec<PlayerSnapshot> },
    #[serde(rename = "game_state_update", rename_all = "camelCase")]
    GameStateUpdate { game_state: GameStateView },
    #[serde(rename = "player_connected", rename_all = "camelCase")]
    PlayerConnected { player_id: PlayerId, timestamp: i64 },
    #[serde(rename = "player_disconnected", rename_all = "camelCase")]
    PlayerDisconnected { player_id: PlayerId, timestamp: i64 },
    #[serde(rename = "update", rename_all = "camelCase")]
    Update {
        player_id: PlayerId,
        data: PlayerState,
        timestamp: i64,
    },
    #[serde(rename = "eliminated", rename_all = "camelCase")]
    Eliminated { player_id: PlayerId, timestamp: i64 },
    #[serde(rename = "winner", rename_all = "camelCase")]
    Winner { winner_id: PlayerId, timestamp: i64 },
    #[serde(rename = "heartbeat_ack")]
    HeartbeatAck { timestamp: i64 },
    #[serde(rename = "error")]
    Error { message: String },
}

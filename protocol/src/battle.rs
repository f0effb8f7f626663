//! Wire envelopes for battle (2-peer) rooms.

use crate::ids::{ChallengeId, PlayerId};
use serde::{Deserialize, Serialize};

/// Messages a client may send to a battle room.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BattleInbound {
    Heartbeat,
    SubmitMove {
        round: u32,
        #[serde(rename = "move")]
        move_token: String,
    },
    GameEnded {
        winner: PlayerId,
    },
}

/// The battle state machine's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BattleStatus {
    Waiting,
    Ready,
    InProgress,
    Ended,
}

/// One move in a `round_complete` payload, in submission order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveView {
    pub player_address: PlayerId,
    #[serde(rename = "move")]
    pub move_token: String,
}

/// Messages the server sends to battle room peers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum BattleOutbound {
    #[serde(rename = "player_joined", rename_all = "camelCase")]
    PlayerJoined { player_id: PlayerId, timestamp: i64 },
    #[serde(rename = "game_ready")]
    GameReady { timestamp: i64 },
    #[serde(rename = "opponent_moved", rename_all = "camelCase")]
    OpponentMoved {
        player_id: PlayerId,
        round: u32,
        timestamp: i64,
    },
    #[serde(rename = "round_complete")]
    RoundComplete { round: u32, moves: Vec<MoveView> },
    #[serde(rename = "game_ended", rename_all = "camelCase")]
    GameEnded {
        winner: PlayerId,
        challenge_id: ChallengeId,
        timestamp: i64,
    },
    #[serde(rename = "opponent_left", rename_all = "camelCase")]
    OpponentLeft { player_id: PlayerId, timestamp: i64 },
    #[serde(rename = "heartbeat_ack")]
    HeartbeatAck { timestamp: i64 },
    #[serde(rename = "error")]
    Error { message: String },
}

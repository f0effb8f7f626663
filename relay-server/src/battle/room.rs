//! The battle state machine: pure transition functions over `BattleRoom`.
//!
//! Mirrors the arena state machine's shape (see `arena::room`): transitions
//! take `&mut self` plus the event payload and `now_ms`, and return the
//! `BattleEffect`s the actor must carry out. A battle room additionally has
//! to reject a third connection attempt, which `try_join` surfaces as an
//! explicit outcome rather than a silent no-op.

use protocol::battle::{BattleOutbound, BattleStatus, MoveView};
use protocol::{ChallengeId, PlayerId};
use std::collections::HashMap;
use std::time::Duration;

pub const READY_HOLD_DELAY: Duration = Duration::from_secs(1);
pub const CLEANUP_DELAY: Duration = Duration::from_secs(30);
pub const MAX_ROOM_AGE_MS: i64 = 30 * 60 * 1000;

pub struct BattleRoom {
    pub challenge_id: ChallengeId,
    pub status: BattleStatus,
    pub players: Vec<PlayerId>,
    pub moves: HashMap<u32, Vec<(PlayerId, String)>>,
    pub winner: Option<PlayerId>,
    pub created_ts: i64,
}

pub enum BattleEffect {
    Broadcast(BattleOutbound),
    BroadcastExcept(PlayerId, BattleOutbound),
    ArmReadyHold,
    ArmCleanup,
}

/// Whether a join attempt was accepted into the room.
pub enum JoinOutcome {
    Joined(Vec<BattleEffect>),
    Refused,
}

impl BattleRoom {
    pub fn new(challenge_id: ChallengeId, now_ms: i64) -> Self {
        BattleRoom {
            challenge_id,
            status: BattleStatus::Waiting,
            players: Vec::new(),
            moves: HashMap::new(),
            winner: None,
            created_ts: now_ms,
        }
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= 2
    }

    pub fn is_empty_roster(&self) -> bool {
        self.players.is_empty()
    }

    pub fn other_player(&self, peer: &PlayerId) -> Option<PlayerId> {
        self.players.iter().find(|p| *p != peer).cloned()
    }

    /// A reconnecting peer that is already on the roster is always allowed
    /// back in; only a genuinely new third peer is refused.
    pub fn try_join(&mut self, peer: PlayerId, now_ms: i64) -> JoinOutcome {
        if !self.players.contains(&peer) {
            if self.is_full() {
                return JoinOutcome::Refused;
            }
            self.players.push(peer.clone());
        }

        let mut effects = vec![BattleEffect::Broadcast(BattleOutbound::PlayerJoined {
            player_id: peer,
            timestamp: now_ms,
        })];

        if self.players.len() == 2 && self.status == BattleStatus::Waiting {
            self.status = BattleStatus::Ready;
            effects.push(BattleEffect::Broadcast(BattleOutbound::GameReady {
                timestamp: now_ms,
            }));
            effects.push(BattleEffect::ArmReadyHold);
        }

        JoinOutcome::Joined(effects)
    }

    pub fn ready_hold_fired(&mut self) -> Vec<BattleEffect> {
        if self.status != BattleStatus::Ready {
            return vec![];
        }
        self.status = BattleStatus::InProgress;
        vec![]
    }

    pub fn submit_move(
        &mut self,
        peer: PlayerId,
        round: u32,
        move_token: String,
        now_ms: i64,
    ) -> Vec<BattleEffect> {
        if self.status != BattleStatus::InProgress {
            return vec![];
        }
        let round_moves = self.moves.entry(round).or_default();
        if round_moves.iter().any(|(p, _)| *p == peer) {
            return vec![];
        }
        round_moves.push((peer.clone(), move_token));

        let mut effects = vec![BattleEffect::BroadcastExcept(
            peer.clone(),
            BattleOutbound::OpponentMoved {
                player_id: peer,
                round,
                timestamp: now_ms,
            },
        )];

        if round_moves.len() == 2 {
            let moves: Vec<MoveView> = round_moves
                .iter()
                .map(|(p, m)| MoveView {
                    player_address: p.clone(),
                    move_token: m.clone(),
                })
                .collect();
            effects.push(BattleEffect::Broadcast(BattleOutbound::RoundComplete {
                round,
                moves,
            }));
        }

        effects
    }

    /// `peer` disconnected. If an opponent is still present mid-game, the
    /// battle ends immediately with them as winner.
    pub fn disconnect(&mut self, peer: &PlayerId, now_ms: i64) -> Vec<BattleEffect> {
        let Some(remaining) = self.other_player(peer) else {
            return vec![];
        };
        if self.status != BattleStatus::InProgress {
            return vec![];
        }
        let mut effects = vec![BattleEffect::Broadcast(BattleOutbound::OpponentLeft {
            player_id: peer.clone(),
            timestamp: now_ms,
        })];
        effects.extend(self.game_ended(remaining, now_ms));
        effects
    }

    /// Marks the room Ended with `winner`, broadcasts `game_ended`, and
    /// arms the 30 s post-game cleanup timer. Accepts any peer's claim at
    /// face value, same as the arena's `winner` message.
    pub fn game_ended(&mut self, winner: PlayerId, now_ms: i64) -> Vec<BattleEffect> {
        self.status = BattleStatus::Ended;
        self.winner = Some(winner.clone());
        vec![
            BattleEffect::Broadcast(BattleOutbound::GameEnded {
                winner,
                challenge_id: self.challenge_id.clone(),
                timestamp: now_ms,
            }),
            BattleEffect::ArmCleanup,
        ]
    }

    /// Whether the room has aged past the passive cleanup threshold without
    /// ever reaching (or while no longer in) `InProgress`.
    pub fn is_stale(&self, now_ms: i64) -> bool {
        self.status != BattleStatus::InProgress && now_ms - self.created_ts > MAX_ROOM_AGE_MS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(s: &str) -> PlayerId {
        PlayerId(s.to_string())
    }

    fn cid(s: &str) -> ChallengeId {
        ChallengeId(s.to_string())
    }

    #[test]
    fn first_peer_joins_waiting() {
        let mut room = BattleRoom::new(cid("x"), 0);
        let outcome = room.try_join(pid("a"), 0);
        assert!(matches!(outcome, JoinOutcome::Joined(_)));
        assert_eq!(room.status, BattleStatus::Waiting);
    }

    #[test]
    fn second_peer_triggers_ready_and_arms_hold() {
        let mut room = BattleRoom::new(cid("x"), 0);
        room.try_join(pid("a"), 0);
        let outcome = room.try_join(pid("b"), 10);
        match outcome {
            JoinOutcome::Joined(effects) => {
                assert_eq!(room.status, BattleStatus::Ready);
                assert!(effects
                    .iter()
                    .any(|e| matches!(e, BattleEffect::ArmReadyHold)));
            }
            JoinOutcome::Refused => panic!("expected join"),
        }
    }

    #[test]
    fn third_peer_is_refused() {
        let mut room = BattleRoom::new(cid("x"), 0);
        room.try_join(pid("a"), 0);
        room.try_join(pid("b"), 0);
        assert!(matches!(room.try_join(pid("c"), 0), JoinOutcome::Refused));
    }

    #[test]
    fn reconnecting_existing_peer_is_never_refused_even_when_full() {
        let mut room = BattleRoom::new(cid("x"), 0);
        room.try_join(pid("a"), 0);
        room.try_join(pid("b"), 0);
        assert!(matches!(room.try_join(pid("a"), 0), JoinOutcome::Joined(_)));
    }

    #[test]
    fn ready_hold_advances_to_in_progress() {
        let mut room = BattleRoom::new(cid("x"), 0);
        room.try_join(pid("a"), 0);
        room.try_join(pid("b"), 0);
        room.ready_hold_fired();
        assert_eq!(room.status, BattleStatus::InProgress);
    }

    #[test]
    fn round_completes_after_both_moves_in_submission_order() {
        let mut room = BattleRoom::new(cid("x"), 0);
        room.try_join(pid("a"), 0);
        room.try_join(pid("b"), 0);
        room.ready_hold_fired();

        room.submit_move(pid("a"), 0, "rock".into(), 10);
        let effects = room.submit_move(pid("b"), 0, "paper".into(), 20);

        let round_complete = effects
            .iter()
            .find_map(|e| match e {
                BattleEffect::Broadcast(BattleOutbound::RoundComplete { round, moves }) => {
                    Some((*round, moves.clone()))
                }
                _ => None,
            })
            .expect("round_complete effect");
        assert_eq!(round_complete.0, 0);
        assert_eq!(round_complete.1[0].player_address, pid("a"));
        assert_eq!(round_complete.1[1].player_address, pid("b"));
    }

    #[test]
    fn duplicate_move_in_same_round_is_ignored() {
        let mut room = BattleRoom::new(cid("x"), 0);
        room.try_join(pid("a"), 0);
        room.try_join(pid("b"), 0);
        room.ready_hold_fired();

        room.submit_move(pid("a"), 0, "rock".into(), 10);
        room.submit_move(pid("a"), 0, "scissors".into(), 15);
        assert_eq!(room.moves.get(&0).unwrap().len(), 1);
    }

    #[test]
    fn disconnect_mid_game_ends_with_remaining_peer_as_winner() {
        let mut room = BattleRoom::new(cid("x"), 0);
        room.try_join(pid("a"), 0);
        room.try_join(pid("b"), 0);
        room.ready_hold_fired();

        let effects = room.disconnect(&pid("a"), 100);
        assert_eq!(room.status, BattleStatus::Ended);
        assert_eq!(room.winner, Some(pid("b")));
        assert!(effects
            .iter()
            .any(|e| matches!(e, BattleEffect::ArmCleanup)));
    }

    #[test]
    fn stale_waiting_room_past_thirty_minutes_is_stale() {
        let room = BattleRoom::new(cid("x"), 0);
        assert!(!room.is_stale(MAX_ROOM_AGE_MS));
        assert!(room.is_stale(MAX_ROOM_AGE_MS + 1));
    }

    #[test]
    fn in_progress_room_never_counts_as_stale() {
        let mut room = BattleRoom::new(cid("x"), 0);
        room.try_join(pid("a"), 0);
        room.try_join(pid("b"), 0);
        room.ready_hold_fired();
        assert!(!room.is_stale(MAX_ROOM_AGE_MS * 10));
    }
}

//! The arena state machine: pure transition functions over `ArenaRoom`.
//!
//! Every function here takes `&mut self` plus the event's payload and the
//! current wall-clock time (as `now_ms`, passed in rather than read from
//! `protocol::clock` so tests can pin it) and returns the list of
//! `ArenaEffect`s the caller (the room actor) must carry out. No socket, no
//! timer, and no registry handle is visible at this layer, which is what
//! makes the arena's phase transition table directly testable.

use protocol::arena::{ArenaOutbound, GameStateView, Phase, PlayerSnapshot};
use protocol::{GameId, PlayerId, PlayerState};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

pub const DEFAULT_COUNTDOWN_MS: u64 = 15_000;
pub const AUTO_START_DELAY: Duration = Duration::from_secs(1);
pub const COUNTDOWN_DURATION: Duration = Duration::from_millis(DEFAULT_COUNTDOWN_MS);

pub struct ArenaRoom {
    pub game_id: GameId,
    pub phase: Phase,
    pub countdown_start_ts: Option<i64>,
    pub countdown_duration_ms: u64,
    pub start_ts: Option<i64>,
    pub winner: Option<PlayerId>,
    pub players: HashMap<PlayerId, PlayerState>,
    pub ready: HashSet<PlayerId>,
}

/// What the actor must do in response to a transition. Kept free of I/O
/// types so `ArenaRoom` itself stays pure and synchronously testable.
pub enum ArenaEffect {
    BroadcastState,
    Broadcast(ArenaOutbound),
    BroadcastExcept(PlayerId, ArenaOutbound),
    SendTo(PlayerId, ArenaOutbound),
    ArmAutoStart,
    ArmCountdown,
    ArmDeadline(Duration),
    CancelCountdown,
    CancelDeadline,
}

impl ArenaRoom {
    pub fn new(game_id: GameId) -> Self {
        ArenaRoom {
            game_id,
            phase: Phase::Waiting,
            countdown_start_ts: None,
            countdown_duration_ms: DEFAULT_COUNTDOWN_MS,
            start_ts: None,
            winner: None,
            players: HashMap::new(),
            ready: HashSet::new(),
        }
    }

    pub fn state_view(&self, total_players: usize) -> GameStateView {
        GameStateView {
            phase: self.phase,
            countdown_start_time: self.countdown_start_ts,
            countdown_duration: self.countdown_duration_ms,
            ready_players: self.ready.len(),
            total_players,
        }
    }

    pub fn roster_snapshot(&self) -> Vec<PlayerSnapshot> {
        self.players
            .iter()
            .map(|(id, state)| PlayerSnapshot {
                player_id: id.clone(),
                data: Some(state.clone()),
            })
            .collect()
    }

    pub fn mark_ready(&mut self, peer: PlayerId) -> Vec<ArenaEffect> {
        if self.phase != Phase::Waiting {
            return vec![];
        }
        let was_below_two = self.ready.len() < 2;
        let newly_inserted = self.ready.insert(peer);
        let mut effects = vec![ArenaEffect::BroadcastState];
        if newly_inserted && was_below_two && self.ready.len() >= 2 {
            effects.push(ArenaEffect::ArmAutoStart);
        }
        effects
    }

    /// Shared by manual `start_game` and the auto-start timer firing.
    /// `requester` is `Some` only for an explicit `start_game` request, so
    /// the "No players ready" error only ever targets that requester.
    pub fn attempt_start(&mut self, requester: Option<PlayerId>, now_ms: i64) -> Vec<ArenaEffect> {
        if self.phase != Phase::Waiting {
            return vec![];
        }
        match self.ready.len() {
            0 => match requester {
                Some(requester) => vec![ArenaEffect::SendTo(
                    requester,
                    ArenaOutbound::Error {
                        message: "No players ready".into(),
                    },
                )],
                None => vec![],
            },
            1 => {
                let winner = self.ready.iter().next().cloned().expect("len == 1");
                self.phase = Phase::Ended;
                self.winner = Some(winner.clone());
                vec![
                    ArenaEffect::BroadcastState,
                    ArenaEffect::Broadcast(ArenaOutbound::Winner {
                        winner_id: winner,
                        timestamp: now_ms,
                    }),
                ]
            }
            _ => {
                self.phase = Phase::Countdown;
                self.countdown_start_ts = Some(now_ms);
                vec![ArenaEffect::BroadcastState, ArenaEffect::ArmCountdown]
            }
        }
    }

    pub fn set_deadline(&mut self, deadline_ms: i64, now_ms: i64) -> Vec<ArenaEffect> {
        let delay_ms = (deadline_ms - now_ms).max(0) as u64;
        vec![ArenaEffect::ArmDeadline(Duration::from_millis(delay_ms))]
    }

    pub fn deadline_fired(&mut self, now_ms: i64) -> Vec<ArenaEffect> {
        self.attempt_start(None, now_ms)
    }

    pub fn countdown_fired(&mut self, now_ms: i64) -> Vec<ArenaEffect> {
        if self.phase != Phase::Countdown {
            return vec![];
        }
        self.phase = Phase::Active;
        self.start_ts = Some(now_ms);
        vec![ArenaEffect::BroadcastState]
    }

    pub fn update(&mut self, peer: PlayerId, data: PlayerState, now_ms: i64) -> Vec<ArenaEffect> {
        self.players.insert(peer.clone(), data.clone());
        vec![ArenaEffect::BroadcastExcept(
            peer.clone(),
            ArenaOutbound::Update {
                player_id: peer,
                data,
                timestamp: now_ms,
            },
        )]
    }

    pub fn eliminated(&mut self, peer: PlayerId, now_ms: i64) -> Vec<ArenaEffect> {
        match self.players.get_mut(&peer) {
            Some(state) => state.alive = false,
            None => {
                self.players.insert(
                    peer.clone(),
                    PlayerState {
                        alive: false,
                        extra: Default::default(),
                    },
                );
            }
        }

        let mut effects = vec![ArenaEffect::Broadcast(ArenaOutbound::Eliminated {
            player_id: peer,
            timestamp: now_ms,
        })];

        if self.phase == Phase::Active {
            let alive: Vec<&PlayerId> = self
                .players
                .iter()
                .filter(|(_, state)| state.alive)
                .map(|(id, _)| id)
                .collect();
            if alive.len() == 1 {
                let winner = alive[0].clone();
                self.phase = Phase::Ended;
                self.winner = Some(winner.clone());
                effects.push(ArenaEffect::CancelCountdown);
                effects.push(ArenaEffect::Broadcast(ArenaOutbound::Winner {
                    winner_id: winner,
                    timestamp: now_ms,
                }));
                effects.push(ArenaEffect::BroadcastState);
            }
        }
        effects
    }

    pub fn force_winner(&mut self, winner: PlayerId, now_ms: i64) -> Vec<ArenaEffect> {
        self.phase = Phase::Ended;
        self.winner = Some(winner.clone());
        vec![
            ArenaEffect::CancelCountdown,
            ArenaEffect::CancelDeadline,
            ArenaEffect::Broadcast(ArenaOutbound::Winner {
                winner_id: winner,
                timestamp: now_ms,
            }),
            ArenaEffect::BroadcastState,
        ]
    }

    /// A peer disconnecting only drops its readiness vote; its last known
    /// `PlayerState` (and `alive` flag) is kept so elimination math stays
    /// correct for peers who already sent at least one `update`.
    pub fn disconnect(&mut self, peer: &PlayerId) -> Vec<ArenaEffect> {
        self.ready.remove(peer);
        vec![ArenaEffect::BroadcastState]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(s: &str) -> PlayerId {
        PlayerId(s.to_string())
    }

    fn effect_count(effects: &[ArenaEffect], matches: impl Fn(&ArenaEffect) -> bool) -> usize {
        effects.iter().filter(|e| matches(e)).count()
    }

    #[test]
    fn mark_ready_is_idempotent() {
        let mut room = ArenaRoom::new(1);
        room.mark_ready(pid("a"));
        let before = room.ready.len();
        room.mark_ready(pid("a"));
        assert_eq!(room.ready.len(), before);
    }

    #[test]
    fn second_ready_player_arms_auto_start_once() {
        let mut room = ArenaRoom::new(1);
        let first = room.mark_ready(pid("a"));
        assert_eq!(
            effect_count(&first, |e| matches!(e, ArenaEffect::ArmAutoStart)),
            0
        );
        let second = room.mark_ready(pid("b"));
        assert_eq!(
            effect_count(&second, |e| matches!(e, ArenaEffect::ArmAutoStart)),
            1
        );
        let third = room.mark_ready(pid("c"));
        assert_eq!(
            effect_count(&third, |e| matches!(e, ArenaEffect::ArmAutoStart)),
            0
        );
    }

    #[test]
    fn start_game_with_zero_ready_errors_requester_without_state_change() {
        let mut room = ArenaRoom::new(1);
        let effects = room.attempt_start(Some(pid("asker")), 0);
        assert_eq!(room.phase, Phase::Waiting);
        assert!(matches!(effects[0], ArenaEffect::SendTo(_, _)));
    }

    #[test]
    fn start_game_with_one_ready_skips_countdown() {
        let mut room = ArenaRoom::new(1);
        room.mark_ready(pid("solo"));
        room.attempt_start(Some(pid("solo")), 1000);
        assert_eq!(room.phase, Phase::Ended);
        assert_eq!(room.winner, Some(pid("solo")));
        assert!(room.countdown_start_ts.is_none());
    }

    #[test]
    fn start_game_with_two_ready_enters_countdown() {
        let mut room = ArenaRoom::new(1);
        room.mark_ready(pid("a"));
        room.mark_ready(pid("b"));
        room.attempt_start(None, 1300);
        assert_eq!(room.phase, Phase::Countdown);
        assert_eq!(room.countdown_start_ts, Some(1300));
    }

    #[test]
    fn countdown_then_active_matches_scenario_timestamps() {
        let mut room = ArenaRoom::new(7);
        room.mark_ready(pid("alice"));
        room.mark_ready(pid("bob"));
        room.attempt_start(None, 1300);
        room.countdown_fired(16300);
        assert_eq!(room.phase, Phase::Active);
        assert_eq!(room.start_ts, Some(16300));
    }

    #[test]
    fn phase_never_goes_backwards_via_countdown_fired_in_waiting() {
        let mut room = ArenaRoom::new(1);
        let effects = room.countdown_fired(1000);
        assert_eq!(room.phase, Phase::Waiting);
        assert!(effects.is_empty());
    }

    #[test]
    fn elimination_ends_game_when_one_alive_remains() {
        let mut room = ArenaRoom::new(1);
        room.phase = Phase::Active;
        for name in ["p1", "p2", "p3"] {
            room.players.insert(
                pid(name),
                PlayerState {
                    alive: true,
                    extra: Default::default(),
                },
            );
        }
        room.eliminated(pid("p1"), 10);
        assert_eq!(room.phase, Phase::Active);
        let effects = room.eliminated(pid("p2"), 20);
        assert_eq!(room.phase, Phase::Ended);
        assert_eq!(room.winner, Some(pid("p3")));
        assert!(effects
            .iter()
            .any(|e| matches!(e, ArenaEffect::CancelCountdown)));
    }

    #[test]
    fn eliminated_peer_never_seen_via_update_is_still_tracked() {
        let mut room = ArenaRoom::new(1);
        room.phase = Phase::Active;
        room.players.insert(
            pid("only_known"),
            PlayerState {
                alive: true,
                extra: Default::default(),
            },
        );
        room.eliminated(pid("only_known"), 5);
        // No other player ever sent `update`, so nobody is counted towards
        // the alive set and no winner is declared.
        assert_eq!(room.phase, Phase::Active);
        assert!(room.winner.is_none());
    }

    #[test]
    fn winner_message_force_ends_any_phase() {
        let mut room = ArenaRoom::new(1);
        room.phase = Phase::Active;
        room.force_winner(pid("z"), 99);
        assert_eq!(room.phase, Phase::Ended);
        assert_eq!(room.winner, Some(pid("z")));
    }

    #[test]
    fn set_deadline_in_the_past_arms_zero_delay() {
        let mut room = ArenaRoom::new(1);
        let effects = room.set_deadline(500, 1000);
        match &effects[0] {
            ArenaEffect::ArmDeadline(d) => assert_eq!(*d, Duration::from_millis(0)),
            _ => panic!("expected ArmDeadline"),
        }
    }
}

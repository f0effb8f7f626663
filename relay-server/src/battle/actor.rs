//! The battle room actor. Structurally identical to `arena::actor`: one
//! task owns the room, reached only through its mailbox, multiplexed
//! against fixed heartbeat/stale-sweep/age-check intervals and timer
//! firings.

use super::room::{BattleEffect, BattleRoom, JoinOutcome, CLEANUP_DELAY, READY_HOLD_DELAY};
use crate::registry::ConnectionRegistry;
use crate::timer::{FiredTimer, TimerWheel};
use axum::extract::ws::Message;
use protocol::battle::{BattleInbound, BattleOutbound};
use protocol::clock::now_ms;
use protocol::{ChallengeId, PlayerId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::interval;

const HEARTBEAT_PING_INTERVAL: Duration = Duration::from_secs(30);
const STALE_SWEEP_INTERVAL: Duration = Duration::from_secs(30);
const AGE_CHECK_INTERVAL: Duration = Duration::from_secs(60);
const STALE_THRESHOLD_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BattleTimerKind {
    ReadyHold,
    Cleanup,
}

pub enum BattleEvent {
    Join {
        peer: PlayerId,
        outbound: UnboundedSender<Message>,
    },
    Inbound {
        peer: PlayerId,
        msg: BattleInbound,
    },
    Disconnect {
        peer: PlayerId,
    },
}

pub type BattleHandle = UnboundedSender<BattleEvent>;

/// Spawns the actor task and returns the mailbox handle. `on_empty` fires
/// once the room is both connectionless and past its useful life (idle
/// past the age threshold, or cleaned up after a finished game), so the
/// caller can drop the room from the global table.
pub fn spawn(
    challenge_id: ChallengeId,
    player_count: Arc<AtomicUsize>,
    on_empty: impl FnOnce(ChallengeId) + Send + 'static,
) -> BattleHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run(challenge_id, rx, player_count, on_empty));
    tx
}

async fn run(
    challenge_id: ChallengeId,
    mut mailbox: UnboundedReceiver<BattleEvent>,
    player_count: Arc<AtomicUsize>,
    on_empty: impl FnOnce(ChallengeId) + Send + 'static,
) {
    let mut room = BattleRoom::new(challenge_id.clone(), now_ms());
    let mut registry = ConnectionRegistry::new();
    let mut timers: TimerWheel<BattleTimerKind> = TimerWheel::new();
    let (timer_tx, mut timer_rx) = mpsc::unbounded_channel::<FiredTimer<BattleTimerKind>>();

    let mut ping_tick = interval(HEARTBEAT_PING_INTERVAL);
    let mut sweep_tick = interval(STALE_SWEEP_INTERVAL);
    let mut age_tick = interval(AGE_CHECK_INTERVAL);
    let mut cleaned_up = false;

    loop {
        tokio::select! {
            event = mailbox.recv() => {
                match event {
                    Some(event) => handle_event(&mut room, &mut registry, &mut timers, &timer_tx, &player_count, event),
                    None => break,
                }
            }
            Some(fired) = timer_rx.recv() => {
                if timers.is_current(&fired) {
                    match fired.key {
                        BattleTimerKind::ReadyHold => {
                            room.ready_hold_fired();
                        }
                        BattleTimerKind::Cleanup => {
                            player_count.fetch_sub(registry.len(), Ordering::Relaxed);
                            registry.close_all("Battle finished, room closing");
                            cleaned_up = true;
                        }
                    }
                }
            }
            _ = ping_tick.tick() => {
                for peer in registry.peers_of() {
                    registry.mark_ping_sent(&peer);
                    registry.send_to(&peer, Message::Ping(Vec::new().into()));
                }
            }
            _ = sweep_tick.tick() => {
                let evicted = registry.sweep_stale(now_ms(), STALE_THRESHOLD_MS);
                for peer in evicted {
                    player_count.fetch_sub(1, Ordering::Relaxed);
                    tracing::info!(challenge_id = %challenge_id, %peer, "evicted stale battle connection");
                    let effects = room.disconnect(&peer, now_ms());
                    apply(&mut registry, &mut timers, &timer_tx, effects);
                }
            }
            _ = age_tick.tick() => {
                if room.is_stale(now_ms()) {
                    player_count.fetch_sub(registry.len(), Ordering::Relaxed);
                    registry.close_all("Room expired");
                    cleaned_up = true;
                }
            }
        }

        if cleaned_up {
            break;
        }
        if registry.is_empty() && room.is_empty_roster() {
            break;
        }
    }

    on_empty(challenge_id);
}

fn handle_event(
    room: &mut BattleRoom,
    registry: &mut ConnectionRegistry,
    timers: &mut TimerWheel<BattleTimerKind>,
    timer_tx: &UnboundedSender<FiredTimer<BattleTimerKind>>,
    player_count: &Arc<AtomicUsize>,
    event: BattleEvent,
) {
    match event {
        BattleEvent::Join { peer, outbound } => {
            let now = now_ms();
            match room.try_join(peer.clone(), now) {
                JoinOutcome::Joined(effects) => {
                    match registry.add(peer, outbound, now) {
                        Some(prior) => {
                            let _ = prior.sender.send(close_with_reason(
                                "Replaced by a new connection for the same player",
                            ));
                        }
                        None => {
                            player_count.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    apply(registry, timers, timer_tx, effects);
                }
                JoinOutcome::Refused => {
                    let _ = outbound.send(close_with_reason("Room is full"));
                }
            }
        }
        BattleEvent::Inbound { peer, msg } => {
            let now = now_ms();
            match msg {
                BattleInbound::Heartbeat => {
                    registry.touch(&peer, now);
                    registry.send_to(&peer, to_message(&BattleOutbound::HeartbeatAck { timestamp: now }));
                }
                BattleInbound::SubmitMove { round, move_token } => {
                    let effects = room.submit_move(peer, round, move_token, now);
                    apply(registry, timers, timer_tx, effects);
                }
                BattleInbound::GameEnded { winner } => {
                    let effects = room.game_ended(winner, now);
                    apply(registry, timers, timer_tx, effects);
                }
            }
        }
        BattleEvent::Disconnect { peer } => {
            if registry.remove(&peer).is_none() {
                return;
            }
            player_count.fetch_sub(1, Ordering::Relaxed);
            let effects = room.disconnect(&peer, now_ms());
            apply(registry, timers, timer_tx, effects);
        }
    }
}

fn apply(
    registry: &mut ConnectionRegistry,
    timers: &mut TimerWheel<BattleTimerKind>,
    timer_tx: &UnboundedSender<FiredTimer<BattleTimerKind>>,
    effects: Vec<BattleEffect>,
) {
    for effect in effects {
        match effect {
            BattleEffect::Broadcast(msg) => broadcast(registry, &msg, None),
            BattleEffect::BroadcastExcept(peer, msg) => broadcast(registry, &msg, Some(&peer)),
            BattleEffect::ArmReadyHold => {
                timers.arm(BattleTimerKind::ReadyHold, READY_HOLD_DELAY, timer_tx.clone());
            }
            BattleEffect::ArmCleanup => {
                timers.arm(BattleTimerKind::Cleanup, CLEANUP_DELAY, timer_tx.clone());
            }
        }
    }
}

fn broadcast(registry: &mut ConnectionRegistry, msg: &BattleOutbound, exclude: Option<&PlayerId>) {
    registry.broadcast(&to_message(msg), exclude);
}

fn to_message(msg: &BattleOutbound) -> Message {
    Message::Text(serde_json::to_string(msg).expect("BattleOutbound always serializes").into())
}

fn close_with_reason(reason: &'static str) -> Message {
    Message::Close(Some(axum::extract::ws::CloseFrame {
        code: 4000,
        reason: reason.into(),
    }))
}

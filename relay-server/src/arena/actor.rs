//! The arena room actor: the sole task that ever mutates an `ArenaRoom`.
//!
//! It owns a `ConnectionRegistry`, a `TimerWheel<ArenaTimerKind>`, and the
//! `ArenaRoom` itself, multiplexing its mailbox against fixed heartbeat and
//! stale-sweep intervals and the timer wheel's firings: one task per room,
//! consuming a mailbox, with no lock ever held across an `.await`.

use super::room::{ArenaEffect, ArenaRoom};
use crate::registry::ConnectionRegistry;
use crate::timer::{FiredTimer, TimerWheel};
use axum::extract::ws::Message;
use protocol::arena::{ArenaInbound, ArenaOutbound};
use protocol::clock::now_ms;
use protocol::{GameId, PlayerId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::interval;

const HEARTBEAT_PING_INTERVAL: Duration = Duration::from_secs(30);
const STALE_SWEEP_INTERVAL: Duration = Duration::from_secs(30);
const STALE_THRESHOLD_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArenaTimerKind {
    AutoStart,
    Countdown,
    Deadline,
}

pub enum ArenaEvent {
    Join {
        peer: PlayerId,
        outbound: UnboundedSender<Message>,
    },
    Inbound {
        peer: PlayerId,
        msg: ArenaInbound,
    },
    Disconnect {
        peer: PlayerId,
    },
}

pub type ArenaHandle = UnboundedSender<ArenaEvent>;

/// Spawns the actor task and returns the mailbox handle used by the
/// acceptor and receive tasks. `on_empty` is invoked once the room has no
/// connections left and its roster is empty, so the caller can remove it
/// from the global room table — the room actor cannot remove itself from a
/// map it does not own a lock on.
pub fn spawn(
    game_id: GameId,
    player_count: Arc<AtomicUsize>,
    on_empty: impl FnOnce(GameId) + Send + 'static,
) -> ArenaHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run(game_id, rx, player_count, on_empty));
    tx
}

async fn run(
    game_id: GameId,
    mut mailbox: UnboundedReceiver<ArenaEvent>,
    player_count: Arc<AtomicUsize>,
    on_empty: impl FnOnce(GameId) + Send + 'static,
) {
    let mut room = ArenaRoom::new(game_id);
    let mut registry = ConnectionRegistry::new();
    let mut timers: TimerWheel<ArenaTimerKind> = TimerWheel::new();
    let (timer_tx, mut timer_rx) = mpsc::unbounded_channel::<FiredTimer<ArenaTimerKind>>();

    let mut ping_tick = interval(HEARTBEAT_PING_INTERVAL);
    let mut sweep_tick = interval(STALE_SWEEP_INTERVAL);

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
                    handle_timer(&mut room, &mut registry, &mut timers, &timer_tx, fired.key);
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
                if !evicted.is_empty() {
                    player_count.fetch_sub(evicted.len(), Ordering::Relaxed);
                    for peer in evicted {
                        tracing::info!(game_id, %peer, "evicted stale arena connection");
                        let effects = room.disconnect(&peer);
                        apply(&mut room, &mut registry, &mut timers, &timer_tx, effects);
                        broadcast(&mut registry, &ArenaOutbound::PlayerDisconnected { player_id: peer, timestamp: now_ms() }, None);
                    }
                }
            }
        }

        if registry.is_empty() {
            break;
        }
    }

    on_empty(game_id);
}

fn handle_event(
    room: &mut ArenaRoom,
    registry: &mut ConnectionRegistry,
    timers: &mut TimerWheel<ArenaTimerKind>,
    timer_tx: &UnboundedSender<FiredTimer<ArenaTimerKind>>,
    player_count: &Arc<AtomicUsize>,
    event: ArenaEvent,
) {
    match event {
        ArenaEvent::Join { peer, outbound } => {
            let now = now_ms();
            match registry.add(peer.clone(), outbound, now) {
                Some(prior) => {
                    let _ = prior.sender.send(close_with_reason(
                        "Replaced by a new connection for the same player",
                    ));
                }
                None => {
                    player_count.fetch_add(1, Ordering::Relaxed);
                }
            }
            registry.send_to(
                &peer,
                to_message(&ArenaOutbound::Sync {
                    players: room.roster_snapshot(),
                }),
            );
            broadcast(
                registry,
                &ArenaOutbound::PlayerConnected {
                    player_id: peer.clone(),
                    timestamp: now,
                },
                Some(&peer),
            );
            broadcast_state(room, registry);
        }
        ArenaEvent::Inbound { peer, msg } => {
            let now = now_ms();
            match msg {
                ArenaInbound::Heartbeat => {
                    registry.touch(&peer, now);
                    registry.send_to(&peer, to_message(&ArenaOutbound::HeartbeatAck { timestamp: now }));
                }
                ArenaInbound::MarkReady => {
                    let effects = room.mark_ready(peer);
                    apply(room, registry, timers, timer_tx, effects);
                }
                ArenaInbound::StartGame => {
                    let effects = room.attempt_start(Some(peer), now);
                    apply(room, registry, timers, timer_tx, effects);
                }
                ArenaInbound::SetDeadline { deadline } => {
                    let effects = room.set_deadline(deadline, now);
                    apply(room, registry, timers, timer_tx, effects);
                }
                ArenaInbound::Update { data } => {
                    let effects = room.update(peer, data, now);
                    apply(room, registry, timers, timer_tx, effects);
                }
                ArenaInbound::Eliminated => {
                    let effects = room.eliminated(peer, now);
                    apply(room, registry, timers, timer_tx, effects);
                }
                ArenaInbound::Winner { winner_id } => {
                    let effects = room.force_winner(winner_id, now);
                    apply(room, registry, timers, timer_tx, effects);
                }
            }
        }
        ArenaEvent::Disconnect { peer } => {
            if registry.remove(&peer).is_none() {
                return;
            }
            player_count.fetch_sub(1, Ordering::Relaxed);
            let effects = room.disconnect(&peer);
            apply(room, registry, timers, timer_tx, effects);
            broadcast(
                registry,
                &ArenaOutbound::PlayerDisconnected {
                    player_id: peer,
                    timestamp: now_ms(),
                },
                None,
            );
        }
    }
}

fn handle_timer(
    room: &mut ArenaRoom,
    registry: &mut ConnectionRegistry,
    timers: &mut TimerWheel<ArenaTimerKind>,
    timer_tx: &UnboundedSender<FiredTimer<ArenaTimerKind>>,
    kind: ArenaTimerKind,
) {
    let now = now_ms();
    let effects = match kind {
        ArenaTimerKind::AutoStart => room.attempt_start(None, now),
        ArenaTimerKind::Countdown => room.countdown_fired(now),
        ArenaTimerKind::Deadline => room.deadline_fired(now),
    };
    apply(room, registry, timers, timer_tx, effects);
}

fn apply(
    room: &mut ArenaRoom,
    registry: &mut ConnectionRegistry,
    timers: &mut TimerWheel<ArenaTimerKind>,
    timer_tx: &UnboundedSender<FiredTimer<ArenaTimerKind>>,
    effects: Vec<ArenaEffect>,
) {
    for effect in effects {
        match effect {
            ArenaEffect::BroadcastState => broadcast_state(room, registry),
            ArenaEffect::Broadcast(msg) => broadcast(registry, &msg, None),
            ArenaEffect::BroadcastExcept(peer, msg) => broadcast(registry, &msg, Some(&peer)),
            ArenaEffect::SendTo(peer, msg) => {
                registry.send_to(&peer, to_message(&msg));
            }
            ArenaEffect::ArmAutoStart => {
                timers.arm(ArenaTimerKind::AutoStart, super::room::AUTO_START_DELAY, timer_tx.clone());
            }
            ArenaEffect::ArmCountdown => {
                timers.arm(ArenaTimerKind::Countdown, super::room::COUNTDOWN_DURATION, timer_tx.clone());
            }
            ArenaEffect::ArmDeadline(delay) => {
                timers.arm(ArenaTimerKind::Deadline, delay, timer_tx.clone());
            }
            ArenaEffect::CancelCountdown => timers.cancel(&ArenaTimerKind::Countdown),
            ArenaEffect::CancelDeadline => timers.cancel(&ArenaTimerKind::Deadline),
        }
    }
}

fn broadcast_state(room: &ArenaRoom, registry: &mut ConnectionRegistry) {
    let view = room.state_view(registry.len());
    broadcast(
        registry,
        &ArenaOutbound::GameStateUpdate { game_state: view },
        None,
    );
}

fn broadcast(registry: &mut ConnectionRegistry, msg: &ArenaOutbound, exclude: Option<&PlayerId>) {
    registry.broadcast(&to_message(msg), exclude);
}

fn to_message(msg: &ArenaOutbound) -> Message {
    Message::Text(serde_json::to_string(msg).expect("ArenaOutbound always serializes").into())
}

fn close_with_reason(reason: &'static str) -> Message {
    Message::Close(Some(axum::extract::ws::CloseFrame {
        code: 4000,
        reason: reason.into(),
    }))
}

//! Per-room connection bookkeeping.
//!
//! One instance lives inside each room actor's own state — never shared
//! across tasks — so every method here is a plain synchronous call, not an
//! async-locked one. This realizes a single-writer discipline: the room
//! actor is both the only writer into the room's game state and the only
//! writer into its connection table.

use axum::extract::ws::Message;
use protocol::PlayerId;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;

pub struct ConnectionRecord {
    pub sender: UnboundedSender<Message>,
    pub last_heartbeat_ts: i64,
    pub alive: bool,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    connections: HashMap<PlayerId, ConnectionRecord>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a connection, replacing (and returning) any prior record for
    /// the same peer. The caller is responsible for closing the replaced
    /// transport — see `close_with_reason` in `acceptor.rs` — so a player
    /// reconnecting under the same id never leaks the old socket.
    pub fn add(
        &mut self,
        peer: PlayerId,
        sender: UnboundedSender<Message>,
        now_ms: i64,
    ) -> Option<ConnectionRecord> {
        self.connections.insert(
            peer,
            ConnectionRecord {
                sender,
                last_heartbeat_ts: now_ms,
                alive: true,
            },
        )
    }

    pub fn remove(&mut self, peer: &PlayerId) -> Option<ConnectionRecord> {
        self.connections.remove(peer)
    }

    pub fn touch(&mut self, peer: &PlayerId, now_ms: i64) {
        if let Some(record) = self.connections.get_mut(peer) {
            record.last_heartbeat_ts = now_ms;
            record.alive = true;
        }
    }

    pub fn mark_ping_sent(&mut self, peer: &PlayerId) {
        if let Some(record) = self.connections.get_mut(peer) {
            record.alive = false;
        }
    }

    /// Best-effort send; returns whether a frame was enqueued.
    pub fn send_to(&self, peer: &PlayerId, msg: Message) -> bool {
        match self.connections.get(peer) {
            Some(record) => record.sender.send(msg).is_ok(),
            None => false,
        }
    }

    /// Sends `msg` to every connection except `exclude` (if given). Returns
    /// the count of frames enqueued. Frames for a single sender are always
    /// enqueued in call order, so FIFO-per-sender holds even though
    /// iteration order across peers is unspecified.
    pub fn broadcast(&self, msg: &Message, exclude: Option<&PlayerId>) -> usize {
        let mut sent = 0;
        for (peer, record) in self.connections.iter() {
            if Some(peer) == exclude {
                continue;
            }
            if record.sender.send(msg.clone()).is_ok() {
                sent += 1;
            }
        }
        sent
    }

    pub fn peers_of(&self) -> Vec<PlayerId> {
        self.connections.keys().cloned().collect()
    }

    /// Sends a close frame with `reason` to every connection and drops
    /// them all from the registry. Used when a room is torn down out from
    /// under still-open sockets (battle post-game cleanup, stale-room age
    /// deletion) rather than waiting for clients to hang up on their own.
    pub fn close_all(&mut self, reason: &'static str) {
        for record in self.connections.values() {
            let _ = record.sender.send(Message::Close(Some(
                axum::extract::ws::CloseFrame {
                    code: 1000,
                    reason: reason.into(),
                },
            )));
        }
        self.connections.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn contains(&self, peer: &PlayerId) -> bool {
        self.connections.contains_key(peer)
    }

    /// Evicts every connection whose `last_heartbeat_ts` is older than
    /// `max_age_ms`, or whose `alive` flag is false (meaning it never
    /// answered the previous heartbeat ping). Returns the evicted peers so
    /// the caller can broadcast `player_disconnected` for each.
    pub fn sweep_stale(&mut self, now_ms: i64, max_age_ms: i64) -> Vec<PlayerId> {
        let stale: Vec<PlayerId> = self
            .connections
            .iter()
            .filter(|(_, record)| now_ms - record.last_heartbeat_ts > max_age_ms || !record.alive)
            .map(|(peer, _)| peer.clone())
            .collect();
        for peer in &stale {
            self.connections.remove(peer);
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    fn peer(s: &str) -> PlayerId {
        PlayerId(s.to_string())
    }

    #[test]
    fn add_replaces_and_returns_prior_record() {
        let mut reg = ConnectionRegistry::new();
        let (tx1, _rx1) = unbounded_channel();
        let (tx2, _rx2) = unbounded_channel();
        assert!(reg.add(peer("alice"), tx1, 0).is_none());
        let prior = reg.add(peer("alice"), tx2, 10);
        assert!(prior.is_some());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn sweep_stale_evicts_past_threshold_or_dead_ping() {
        let mut reg = ConnectionRegistry::new();
        let (tx_a, _rx_a) = unbounded_channel();
        let (tx_b, _rx_b) = unbounded_channel();
        reg.add(peer("stale"), tx_a, 0);
        reg.add(peer("fresh"), tx_b, 59_000);
        reg.touch(&peer("fresh"), 59_000);

        let evicted = reg.sweep_stale(60_001, 60_000);
        assert_eq!(evicted, vec![peer("stale")]);
        assert!(reg.contains(&peer("fresh")));
    }

    #[test]
    fn sweep_stale_evicts_unanswered_ping() {
        let mut reg = ConnectionRegistry::new();
        let (tx, _rx) = unbounded_channel();
        reg.add(peer("ghost"), tx, 0);
        reg.mark_ping_sent(&peer("ghost"));

        let evicted = reg.sweep_stale(1_000, 60_000);
        assert_eq!(evicted, vec![peer("ghost")]);
    }

    #[test]
    fn broadcast_excludes_sender_and_counts_deliveries() {
        let mut reg = ConnectionRegistry::new();
        let (tx_a, mut rx_a) = unbounded_channel();
        let (tx_b, mut rx_b) = unbounded_channel();
        reg.add(peer("a"), tx_a, 0);
        reg.add(peer("b"), tx_b, 0);

        let sent = reg.broadcast(&Message::Text("hi".into()), Some(&peer("a")));
        assert_eq!(sent, 1);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }
}

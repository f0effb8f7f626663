//! Named, cancellable, per-room one-shot timers.
//!
//! A room actor owns one `TimerWheel` for its dynamically armed/cancelled
//! timers (arena countdown/deadline, battle ready-hold/cleanup). Fixed,
//! never-cancelled intervals (heartbeat ping, stale sweep) are plain
//! `tokio::time::interval`s in the actor's select loop instead — see
//! `SPEC_FULL.md` §4.6.
//!
//! Cancellation is generation-based rather than task-based: arming a timer
//! bumps a counter for that key, and a firing is only delivered if its
//! captured generation still matches the latest one when the sleep
//! elapses. This means `cancel` and rearm are synchronous, infallible, and
//! never need to join or abort the sleeping task.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct TimerWheel<K> {
    generations: HashMap<K, u64>,
}

impl<K> Default for TimerWheel<K> {
    fn default() -> Self {
        TimerWheel {
            generations: HashMap::new(),
        }
    }
}

impl<K> TimerWheel<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels any existing timer for `key` and schedules a new one-shot
    /// that fires `key` down `tx` after `delay`, unless superseded first.
    pub fn arm(&mut self, key: K, delay: Duration, tx: mpsc::UnboundedSender<FiredTimer<K>>) {
        let generation = self.generations.entry(key.clone()).or_insert(0);
        *generation += 1;
        let my_generation = *generation;

        let fired_key = key;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(FiredTimer {
                key: fired_key,
                generation: my_generation,
            });
        });
    }

    /// Removes the timer for `key` without firing it.
    pub fn cancel(&mut self, key: &K) {
        self.generations.remove(key);
    }

    /// Whether a firing delivered with this generation is still current.
    /// Call this from the receiving end with the `FiredTimer` pulled off
    /// the channel; a `false` result means the timer was cancelled or
    /// rearmed after this firing was scheduled and should be ignored.
    pub fn is_current(&self, fired: &FiredTimer<K>) -> bool {
        self.generations.get(&fired.key) == Some(&fired.generation)
    }
}

/// A timer key paired with the generation it was armed under, so the
/// receiver can tell a live firing from a stale one.
pub struct FiredTimer<K> {
    pub key: K,
    pub generation: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Kind {
        Countdown,
        Deadline,
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let mut wheel = TimerWheel::new();
        let (tx, mut rx) = unbounded_channel();
        wheel.arm(Kind::Countdown, Duration::from_millis(100), tx);

        tokio::time::advance(Duration::from_millis(150)).await;
        let fired = rx.recv().await.unwrap();
        assert!(wheel.is_current(&fired));
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_invalidates_previous_firing() {
        let mut wheel = TimerWheel::new();
        let (tx, mut rx) = unbounded_channel();
        wheel.arm(Kind::Countdown, Duration::from_millis(100), tx.clone());
        wheel.arm(Kind::Countdown, Duration::from_millis(100), tx);

        tokio::time::advance(Duration::from_millis(150)).await;
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(!wheel.is_current(&first));
        assert!(wheel.is_current(&second));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_invalidates_pending_firing() {
        let mut wheel = TimerWheel::new();
        let (tx, mut rx) = unbounded_channel();
        wheel.arm(Kind::Deadline, Duration::from_millis(50), tx);
        wheel.cancel(&Kind::Deadline);

        tokio::time::advance(Duration::from_millis(100)).await;
        let fired = rx.recv().await.unwrap();
        assert!(!wheel.is_current(&fired));
    }
}

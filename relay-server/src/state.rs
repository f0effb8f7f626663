//! Global application state: the two per-flavor room tables plus the
//! counters the health endpoint reports.
//!
//! Each table only ever gains an entry at accept time and loses one when a
//! room actor calls back through `on_empty`; no other code walks these
//! maps, so a plain `Mutex<HashMap<_, _>>` (not `RwLock`) is enough — reads
//! are as rare as writes.

use crate::arena::{self, ArenaHandle};
use crate::battle::{self, BattleHandle};
use crate::config::Config;
use protocol::{ChallengeId, GameId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

pub struct AppState {
    pub config: Config,
    pub started_at: Instant,
    pub player_count: Arc<AtomicUsize>,
    arena_rooms: Mutex<HashMap<GameId, ArenaHandle>>,
    battle_rooms: Mutex<HashMap<ChallengeId, BattleHandle>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        AppState {
            config,
            started_at: Instant::now(),
            player_count: Arc::new(AtomicUsize::new(0)),
            arena_rooms: Mutex::new(HashMap::new()),
            battle_rooms: Mutex::new(HashMap::new()),
        }
    }

    pub fn arena_room_count(&self) -> usize {
        self.arena_rooms.lock().unwrap().len()
    }

    pub fn battle_room_count(&self) -> usize {
        self.battle_rooms.lock().unwrap().len()
    }

    pub fn total_room_count(&self) -> usize {
        self.arena_room_count() + self.battle_room_count()
    }

    /// Returns the existing room's handle, or spawns a fresh actor and
    /// registers it under `game_id` if none exists yet.
    pub fn arena_handle(self: &Arc<Self>, game_id: GameId) -> ArenaHandle {
        let mut rooms = self.arena_rooms.lock().unwrap();
        rooms
            .entry(game_id)
            .or_insert_with(|| {
                let state = self.clone();
                arena::spawn(game_id, self.player_count.clone(), move |game_id| {
                    state.arena_rooms.lock().unwrap().remove(&game_id);
                })
            })
            .clone()
    }

    pub fn battle_handle(self: &Arc<Self>, challenge_id: ChallengeId) -> BattleHandle {
        let mut rooms = self.battle_rooms.lock().unwrap();
        rooms
            .entry(challenge_id.clone())
            .or_insert_with(|| {
                let state = self.clone();
                battle::spawn(challenge_id, self.player_count.clone(), move |challenge_id| {
                    state.battle_rooms.lock().unwrap().remove(&challenge_id);
                })
            })
            .clone()
    }
}

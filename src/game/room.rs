//! Rooms and the room registry
//!
//! A room owns exactly one simulation behind a mutex, so a tick and a player
//! update can never interleave within a room while independent rooms stay
//! concurrent. Empty rooms carry an `empty_since` deadline checked by the
//! scheduler's sweep instead of an ad hoc timer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use crate::config::GameSettings;
use crate::util::time::unix_millis;
use crate::ws::protocol::{PlayerUpdate, ServerMsg};

use super::simulation::{GameState, Player, PlayerDescriptor, Simulation};

/// Grace period before an empty room is reclaimed
pub const EMPTY_ROOM_GRACE_MS: u64 = 60_000;
/// Default room capacity
pub const DEFAULT_MAX_PLAYERS: usize = 5;
/// Broadcast channel depth for per-room state fan-out
const STATE_CHANNEL_CAPACITY: usize = 64;

/// Room summary for lobby listings
#[derive(Debug, Clone, Serialize)]
pub struct RoomInfo {
    pub id: String,
    pub name: String,
    pub player_count: usize,
    pub max_players: usize,
    pub is_private: bool,
}

/// Join failure reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("Room not found")]
    NotFound,
    #[error("Room is full")]
    Full,
}

/// What a room tracks besides its simulation: the lifecycle deadline. Held
/// in one mutex with the simulation so joins and the sweep observe a
/// consistent (player count, deadline) pair.
struct RoomState {
    simulation: Simulation,
    /// Unix millis since the room became empty, None while populated
    empty_since: Option<u64>,
}

/// An isolated, independently simulated game session
pub struct Room {
    pub id: String,
    pub name: String,
    pub max_players: usize,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    state: Mutex<RoomState>,
    state_tx: broadcast::Sender<ServerMsg>,
}

impl Room {
    fn new(id: String, name: String, max_players: usize, is_private: bool, settings: GameSettings) -> Self {
        let seed = rand::thread_rng().gen();
        let (state_tx, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        Self {
            id,
            name,
            max_players,
            is_private,
            created_at: Utc::now(),
            state: Mutex::new(RoomState {
                simulation: Simulation::new(settings, seed),
                empty_since: None,
            }),
            state_tx,
        }
    }

    /// Subscribe to this room's per-tick state broadcast
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.state_tx.subscribe()
    }

    pub fn player_count(&self) -> usize {
        self.state.lock().simulation.player_count()
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            player_count: self.player_count(),
            max_players: self.max_players,
            is_private: self.is_private,
        }
    }

    /// Snapshot of the current world state
    pub fn snapshot(&self) -> GameState {
        self.state.lock().simulation.state().clone()
    }

    pub fn player(&self, player_id: Uuid) -> Option<Player> {
        self.state.lock().simulation.player(player_id).cloned()
    }

    /// Forward a client intent into the simulation
    pub fn update_player(&self, update: &PlayerUpdate) {
        self.state.lock().simulation.update_player(update);
    }

    fn join(&self, descriptor: PlayerDescriptor) -> Result<(), JoinError> {
        let mut state = self.state.lock();
        if state.simulation.player_count() >= self.max_players {
            return Err(JoinError::Full);
        }
        state.simulation.add_player(descriptor);
        // A join during the grace window cancels the pending reclaim
        state.empty_since = None;
        Ok(())
    }

    fn leave_at(&self, player_id: Uuid, now: u64) {
        let mut state = self.state.lock();
        state.simulation.remove_player(player_id);
        if state.simulation.player_count() == 0 && state.empty_since.is_none() {
            state.empty_since = Some(now);
        }
    }

    /// Advance the simulation one frame and broadcast the resulting state
    pub fn tick_and_broadcast(&self) {
        let snapshot = {
            let mut state = self.state.lock();
            state.simulation.tick();
            state.simulation.state().clone()
        };
        // Errors only mean no subscriber is listening right now
        let _ = self.state_tx.send(ServerMsg::GameStateUpdate { state: snapshot });
    }

    fn reclaimable_at(&self, now: u64) -> bool {
        let state = self.state.lock();
        state.simulation.player_count() == 0
            && state
                .empty_since
                .map_or(false, |since| now.saturating_sub(since) > EMPTY_ROOM_GRACE_MS)
    }
}

/// Owns all live rooms: creation, lookup, capacity-gated joining, and
/// grace-period reclamation
pub struct RoomRegistry {
    rooms: DashMap<String, Arc<Room>>,
    settings: GameSettings,
}

impl RoomRegistry {
    pub fn new(settings: GameSettings) -> Self {
        Self {
            rooms: DashMap::new(),
            settings,
        }
    }

    /// Create a room with a fresh simulation and a unique short code
    pub fn create_room(&self, name: Option<String>, max_players: usize, is_private: bool) -> Arc<Room> {
        let id = loop {
            let code = short_room_code();
            if !self.rooms.contains_key(&code) {
                break code;
            }
        };

        let name = name.unwrap_or_else(|| format!("Game Room {}", id));
        let room = Arc::new(Room::new(
            id.clone(),
            name,
            max_players,
            is_private,
            self.settings.clone(),
        ));
        self.rooms.insert(id, room.clone());

        info!(room_id = %room.id, name = %room.name, "Room created");
        room
    }

    pub fn get(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.get(room_id).map(|r| r.value().clone())
    }

    /// Room summaries, excluding private rooms unless asked for
    pub fn list(&self, include_private: bool) -> Vec<RoomInfo> {
        self.rooms
            .iter()
            .filter(|entry| include_private || !entry.value().is_private)
            .map(|entry| entry.value().info())
            .collect()
    }

    /// Every live room, private included (scheduler enumeration)
    pub fn rooms(&self) -> Vec<Arc<Room>> {
        self.rooms.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms.iter().map(|entry| entry.value().player_count()).sum()
    }

    /// Add a player to a room, failing when the room is missing or full
    pub fn join_room(&self, room_id: &str, descriptor: PlayerDescriptor) -> Result<(), JoinError> {
        let room = self.get(room_id).ok_or(JoinError::NotFound)?;
        room.join(descriptor)
    }

    /// Remove a player, arming the reclaim deadline when the room empties
    pub fn leave_room(&self, room_id: &str, player_id: Uuid) {
        self.leave_room_at(room_id, player_id, unix_millis());
    }

    pub fn leave_room_at(&self, room_id: &str, player_id: Uuid, now: u64) {
        if let Some(room) = self.get(room_id) {
            room.leave_at(player_id, now);
        }
    }

    /// Immediate unconditional removal
    pub fn remove_room(&self, room_id: &str) -> bool {
        self.rooms.remove(room_id).is_some()
    }

    /// Delete rooms that have sat empty past the grace period
    pub fn sweep_empty_rooms(&self) {
        self.sweep_empty_rooms_at(unix_millis());
    }

    pub fn sweep_empty_rooms_at(&self, now: u64) {
        let reclaimable: Vec<String> = self
            .rooms
            .iter()
            .filter(|entry| entry.value().reclaimable_at(now))
            .map(|entry| entry.key().clone())
            .collect();

        for room_id in reclaimable {
            if self.rooms.remove(&room_id).is_some() {
                info!(room_id = %room_id, "Room removed due to inactivity");
            }
        }
    }
}

/// Short human-typeable room code derived from a v4 UUID
fn short_room_code() -> String {
    Uuid::new_v4().simple().to_string()[..6].to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000_000;

    fn registry() -> RoomRegistry {
        RoomRegistry::new(GameSettings::default())
    }

    fn descriptor(name: &str) -> PlayerDescriptor {
        PlayerDescriptor {
            id: Uuid::new_v4(),
            user_id: None,
            username: name.to_string(),
        }
    }

    #[test]
    fn create_room_generates_short_unique_code() {
        let registry = registry();
        let a = registry.create_room(Some("Alpha".into()), 5, false);
        let b = registry.create_room(None, 5, false);

        assert_eq!(a.id.len(), 6);
        assert_ne!(a.id, b.id);
        assert_eq!(b.name, format!("Game Room {}", b.id));
        assert!(registry.get(&a.id).is_some());
    }

    #[test]
    fn list_filters_private_rooms() {
        let registry = registry();
        registry.create_room(Some("Public".into()), 5, false);
        registry.create_room(Some("Private".into()), 5, true);

        assert_eq!(registry.list(false).len(), 1);
        assert_eq!(registry.list(true).len(), 2);
        // Scheduler enumeration always sees every room
        assert_eq!(registry.rooms().len(), 2);
    }

    #[test]
    fn join_missing_room_fails() {
        let registry = registry();
        assert_eq!(
            registry.join_room("ZZZZZZ", descriptor("alice")),
            Err(JoinError::NotFound)
        );
    }

    #[test]
    fn join_at_capacity_fails_without_mutation() {
        let registry = registry();
        let room = registry.create_room(Some("Tiny".into()), 2, false);
        assert!(registry.join_room(&room.id, descriptor("a")).is_ok());
        assert!(registry.join_room(&room.id, descriptor("b")).is_ok());

        assert_eq!(
            registry.join_room(&room.id, descriptor("c")),
            Err(JoinError::Full)
        );
        assert_eq!(room.player_count(), 2);
    }

    #[test]
    fn leave_is_noop_for_unknown_player() {
        let registry = registry();
        let room = registry.create_room(Some("Solo".into()), 5, false);
        let desc = descriptor("alice");
        registry.join_room(&room.id, desc).unwrap();

        registry.leave_room_at(&room.id, Uuid::new_v4(), NOW);
        assert_eq!(room.player_count(), 1);
    }

    #[test]
    fn empty_room_reclaimed_after_grace_period() {
        let registry = registry();
        let room = registry.create_room(Some("Fleeting".into()), 5, false);
        let desc = descriptor("alice");
        let player_id = desc.id;
        registry.join_room(&room.id, desc).unwrap();
        registry.leave_room_at(&room.id, player_id, NOW);

        registry.sweep_empty_rooms_at(NOW + 59_000);
        assert!(registry.get(&room.id).is_some());

        registry.sweep_empty_rooms_at(NOW + 60_001);
        assert!(registry.get(&room.id).is_none());
    }

    #[test]
    fn rejoin_during_grace_window_cancels_reclaim() {
        let registry = registry();
        let room = registry.create_room(Some("Sticky".into()), 5, false);
        let desc = descriptor("alice");
        let player_id = desc.id;
        registry.join_room(&room.id, desc).unwrap();
        registry.leave_room_at(&room.id, player_id, NOW);

        // A join half way through the window cancels the pending deletion
        registry.join_room(&room.id, descriptor("bob")).unwrap();
        registry.sweep_empty_rooms_at(NOW + 60_001);
        assert!(registry.get(&room.id).is_some());
    }

    #[test]
    fn grace_deadline_restarts_when_room_empties_again() {
        let registry = registry();
        let room = registry.create_room(Some("Revolving".into()), 5, false);
        let first = descriptor("alice");
        let first_id = first.id;
        registry.join_room(&room.id, first).unwrap();
        registry.leave_room_at(&room.id, first_id, NOW);

        let second = descriptor("bob");
        let second_id = second.id;
        registry.join_room(&room.id, second).unwrap();
        registry.leave_room_at(&room.id, second_id, NOW + 50_000);

        // Not reclaimable relative to the second emptying
        registry.sweep_empty_rooms_at(NOW + 100_000);
        assert!(registry.get(&room.id).is_some());

        registry.sweep_empty_rooms_at(NOW + 110_001);
        assert!(registry.get(&room.id).is_none());
    }

    #[test]
    fn remove_room_is_immediate() {
        let registry = registry();
        let room = registry.create_room(Some("Doomed".into()), 5, false);
        registry.join_room(&room.id, descriptor("alice")).unwrap();

        assert!(registry.remove_room(&room.id));
        assert!(!registry.remove_room(&room.id));
        assert!(registry.get(&room.id).is_none());
    }
}

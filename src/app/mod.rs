//! Application state shared across routes

use std::sync::Arc;

use tracing::info;

use crate::config::{Config, GameSettings};
use crate::game::room::DEFAULT_MAX_PLAYERS;
use crate::game::RoomRegistry;
use crate::store::{LeaderboardStore, SupabaseClient};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<RoomRegistry>,
    pub leaderboard: LeaderboardStore,
    /// Room joined when join_game carries no room id
    pub default_room_id: String,
}

impl AppState {
    pub fn new(config: Config, settings: GameSettings) -> Self {
        let config = Arc::new(config);

        let supabase = SupabaseClient::new(&config);
        let leaderboard = LeaderboardStore::new(supabase);

        let registry = Arc::new(RoomRegistry::new(settings));

        // One public room always exists as the join-game default
        let default_room =
            registry.create_room(Some("Public Game".to_string()), DEFAULT_MAX_PLAYERS, false);
        info!(room_id = %default_room.id, "Created default room");

        Self {
            config,
            registry,
            leaderboard,
            default_room_id: default_room.id.clone(),
        }
    }
}

//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::geometry::Vec2;
use crate::game::room::RoomInfo;
use crate::game::simulation::GameState;

/// A movement/aim/shoot intent for one player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerUpdate {
    /// Must match the sender's bound player id
    pub id: Uuid,
    /// Requested position, clamped and collision-resolved by the server
    pub position: Vec2,
    /// Facing direction in radians
    pub direction: f32,
    /// Fire this update if the cooldown allows
    pub shooting: bool,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Join the default public room or a specific one
    JoinGame {
        username: String,
        room_id: Option<String>,
    },

    /// Player input, applied on receipt
    PlayerUpdate(PlayerUpdate),

    /// Leave the current room
    LeaveRoom,

    /// Request the public room list
    GetRooms,

    /// Create a new room
    CreateRoom {
        room_name: Option<String>,
        max_players: Option<usize>,
        is_private: Option<bool>,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { user_id: Uuid, server_time: u64 },

    /// Confirmation of a successful join
    GameJoined {
        id: Uuid,
        room_id: String,
        room_name: String,
        initial_state: GameState,
    },

    /// Full world snapshot, broadcast once per tick per room
    GameStateUpdate { state: GameState },

    /// Room summaries in response to a list request
    RoomsList { rooms: Vec<RoomInfo> },

    /// Confirmation of room creation
    RoomCreated { room: RoomInfo },

    /// Confirmation of leaving a room
    RoomLeft,

    /// Error message
    Error { message: String },
}

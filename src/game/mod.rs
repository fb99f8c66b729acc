//! Game simulation modules

pub mod geometry;
pub mod map;
pub mod room;
pub mod scheduler;
pub mod simulation;

pub use room::{JoinError, Room, RoomInfo, RoomRegistry};
pub use scheduler::TickScheduler;
pub use simulation::{GameState, Player, PlayerDescriptor, Simulation};

//! Per-connection session state
//!
//! A session binds one authenticated connection to at most one
//! (room, player) pair and serializes that connection's inbound events into
//! registry and simulation calls.

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::room::{JoinError, DEFAULT_MAX_PLAYERS};
use crate::game::simulation::PlayerDescriptor;

use super::protocol::{ClientMsg, PlayerUpdate, ServerMsg};

/// The (room, player) pair a connection is bound to
#[derive(Debug, Clone)]
struct Binding {
    room_id: String,
    player_id: Uuid,
}

/// One live connection's session
pub struct Session {
    user_id: Uuid,
    username: String,
    binding: Option<Binding>,
    /// Task piping the bound room's broadcast channel to this connection
    forwarder: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(user_id: Uuid, username: String) -> Self {
        Self {
            user_id,
            username,
            binding: None,
            forwarder: None,
        }
    }

    /// Dispatch one inbound client message
    pub async fn handle_msg(
        &mut self,
        msg: ClientMsg,
        state: &AppState,
        out_tx: &mpsc::Sender<ServerMsg>,
    ) {
        match msg {
            ClientMsg::JoinGame { username, room_id } => {
                self.handle_join(username, room_id, state, out_tx).await;
            }
            ClientMsg::PlayerUpdate(update) => self.handle_update(update, state),
            ClientMsg::LeaveRoom => {
                self.leave(state).await;
                let _ = out_tx.send(ServerMsg::RoomLeft).await;
            }
            ClientMsg::GetRooms => {
                let rooms = state.registry.list(false);
                let _ = out_tx.send(ServerMsg::RoomsList { rooms }).await;
            }
            ClientMsg::CreateRoom {
                room_name,
                max_players,
                is_private,
            } => {
                let name = room_name
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| format!("{}'s Room", self.username));
                let room = state.registry.create_room(
                    Some(name),
                    max_players.unwrap_or(DEFAULT_MAX_PLAYERS),
                    is_private.unwrap_or(false),
                );
                let _ = out_tx.send(ServerMsg::RoomCreated { room: room.info() }).await;
            }
        }
    }

    async fn handle_join(
        &mut self,
        username: String,
        room_id: Option<String>,
        state: &AppState,
        out_tx: &mpsc::Sender<ServerMsg>,
    ) {
        // Rebinding implies leaving the previous room first
        if self.binding.is_some() {
            self.leave(state).await;
        }

        let target_room_id = room_id.unwrap_or_else(|| state.default_room_id.clone());
        let Some(room) = state.registry.get(&target_room_id) else {
            let _ = out_tx
                .send(ServerMsg::Error {
                    message: "Room not found".to_string(),
                })
                .await;
            return;
        };

        let player_id = Uuid::new_v4();
        let descriptor = PlayerDescriptor {
            id: player_id,
            user_id: Some(self.user_id),
            username: if username.trim().is_empty() {
                self.username.clone()
            } else {
                username
            },
        };

        if let Err(err) = state.registry.join_room(&target_room_id, descriptor) {
            let message = match err {
                JoinError::NotFound => "Room not found".to_string(),
                JoinError::Full => "Room is full".to_string(),
            };
            let _ = out_tx.send(ServerMsg::Error { message }).await;
            return;
        }

        self.binding = Some(Binding {
            room_id: target_room_id.clone(),
            player_id,
        });
        self.forwarder = Some(spawn_forwarder(room.subscribe(), out_tx.clone(), player_id));

        let _ = out_tx
            .send(ServerMsg::GameJoined {
                id: player_id,
                room_id: target_room_id.clone(),
                room_name: room.name.clone(),
                initial_state: room.snapshot(),
            })
            .await;

        info!(
            user_id = %self.user_id,
            player_id = %player_id,
            room_id = %target_room_id,
            "Player joined room"
        );
    }

    /// Forward an input intent to the bound room. Events from unbound
    /// connections, or carrying a foreign player id, are dropped silently.
    fn handle_update(&self, update: PlayerUpdate, state: &AppState) {
        let Some(binding) = &self.binding else { return };
        if update.id != binding.player_id {
            return;
        }
        if let Some(room) = state.registry.get(&binding.room_id) {
            room.update_player(&update);
        }
    }

    /// Leave the bound room, if any, and fire the advisory leaderboard
    /// update for players with kills
    pub async fn leave(&mut self, state: &AppState) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }

        let Some(binding) = self.binding.take() else { return };

        let departed = state
            .registry
            .get(&binding.room_id)
            .and_then(|room| room.player(binding.player_id));
        state.registry.leave_room(&binding.room_id, binding.player_id);

        info!(
            user_id = %self.user_id,
            player_id = %binding.player_id,
            room_id = %binding.room_id,
            "Player left room"
        );

        // Advisory, fire-and-forget: a persistence failure never blocks or
        // rolls back the in-memory leave
        if let Some(player) = departed {
            if let (Some(user_id), kills @ 1..) = (player.user_id, player.kills) {
                let leaderboard = state.leaderboard.clone();
                tokio::spawn(async move {
                    if let Err(err) = leaderboard.record_session(user_id, kills).await {
                        warn!(user_id = %user_id, error = %err, "Failed to update leaderboard");
                    }
                });
            }
        }
    }
}

/// Pipe a room's state broadcasts into one connection's outbound queue
fn spawn_forwarder(
    mut state_rx: broadcast::Receiver<ServerMsg>,
    out_tx: mpsc::Sender<ServerMsg>,
    player_id: Uuid,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match state_rx.recv().await {
                Ok(msg) => {
                    if out_tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Keep the connection; it just misses snapshots
                    warn!(player_id = %player_id, lagged_count = n, "Client lagged behind state broadcasts");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(player_id = %player_id, "State channel closed");
                    break;
                }
            }
        }
    })
}

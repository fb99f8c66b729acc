//! Leaderboard persistence
//!
//! Advisory at-least-once increments invoked on disconnect for players who
//! scored kills. Failures are logged by the caller and never block the
//! in-memory leave.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::supabase::{SupabaseClient, SupabaseError};

/// Leaderboard row as stored in the `leaderboard` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub user_id: Uuid,
    pub total_kills: i64,
    pub matches_played: i64,
}

/// Increment payload
#[derive(Debug, Clone, Serialize)]
struct LeaderboardUpdate {
    total_kills: i64,
    matches_played: i64,
}

/// Leaderboard store operations
#[derive(Clone)]
pub struct LeaderboardStore {
    client: SupabaseClient,
}

impl LeaderboardStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Credit a finished session: add the session's kills and count one
    /// played match. Read-modify-write; at-least-once is acceptable here.
    pub async fn record_session(&self, user_id: Uuid, kills: u32) -> Result<(), SupabaseError> {
        let query = format!("user_id=eq.{}", user_id);

        match self.client.get_one::<LeaderboardRow>("leaderboard", &query).await? {
            Some(row) => {
                let update = LeaderboardUpdate {
                    total_kills: row.total_kills + i64::from(kills),
                    matches_played: row.matches_played + 1,
                };
                self.client.update("leaderboard", &query, &update).await
            }
            None => {
                let row = LeaderboardRow {
                    user_id,
                    total_kills: i64::from(kills),
                    matches_played: 1,
                };
                self.client.insert("leaderboard", &row).await
            }
        }
    }
}

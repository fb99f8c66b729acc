//! Data store modules for Supabase integration

pub mod leaderboard;
pub mod supabase;

pub use leaderboard::LeaderboardStore;
pub use supabase::SupabaseClient;

//! Configuration module - environment variable parsing and game settings

use std::env;
use std::net::SocketAddr;

use serde::Serialize;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Secret for verifying client JWTs
    pub jwt_secret: String,

    /// Supabase project URL (leaderboard persistence)
    pub supabase_url: String,
    /// Supabase service role key (bypasses RLS - server only!)
    pub supabase_service_role_key: String,

    /// Allowed client origin for CORS
    pub client_origin: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            jwt_secret: env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?,

            supabase_url: env::var("SUPABASE_URL")
                .map_err(|_| ConfigError::Missing("SUPABASE_URL"))?,
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .map_err(|_| ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY"))?,

            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

/// Gameplay settings, fixed at room construction
#[derive(Debug, Clone, Serialize)]
pub struct GameSettings {
    /// Map width in world units
    pub map_width: f32,
    /// Map height in world units
    pub map_height: f32,
    /// Player move speed (units per tick, enforced client-side)
    pub player_speed: f32,
    /// Projectile speed in units per tick
    pub projectile_speed: f32,
    /// Projectile lifetime in milliseconds
    pub projectile_lifetime_ms: u64,
    /// Player hitbox radius
    pub player_hitbox_radius: f32,
    /// Projectile hitbox radius
    pub projectile_hitbox_radius: f32,
    /// Base damage per projectile hit
    pub collision_damage: i32,
    /// Minimum time between shots in milliseconds
    pub shooting_cooldown_ms: u64,
    /// Dead time before respawn in milliseconds
    pub respawn_time_ms: u64,
    /// Interval between powerup spawns in milliseconds
    pub powerup_spawn_rate_ms: u64,
    /// Duration of a collected powerup effect in milliseconds
    pub powerup_duration_ms: u64,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            map_width: 800.0,
            map_height: 600.0,
            player_speed: 5.0,
            projectile_speed: 15.0,
            projectile_lifetime_ms: 1000,
            player_hitbox_radius: 20.0,
            projectile_hitbox_radius: 5.0,
            collision_damage: 20,
            shooting_cooldown_ms: 250,
            respawn_time_ms: 3000,
            powerup_spawn_rate_ms: 15_000,
            powerup_duration_ms: 10_000,
        }
    }
}

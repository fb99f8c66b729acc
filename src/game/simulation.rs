//! Per-room authoritative simulation
//!
//! Each room owns exactly one `Simulation`, the sole writer of that room's
//! `GameState`. Inbound player intents are applied on receipt and the world
//! advances one frame per `tick`.

use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::GameSettings;
use crate::util::time::unix_millis;
use crate::ws::protocol::PlayerUpdate;

use super::geometry::{
    circles_overlap, clamp_to_bounds, hitbox_overlaps_rect, resolve_hitbox_rect, Vec2,
};
use super::map::{MapTemplate, Obstacle};

/// Maximum live powerups in a room at once
const MAX_LIVE_POWERUPS: usize = 5;
/// Uncollected powerup lifetime in milliseconds
const POWERUP_LIFETIME_MS: u64 = 30_000;
/// Powerup pickup radius
const POWERUP_RADIUS: f32 = 15.0;
/// Margin kept between a spawned powerup and any obstacle
const POWERUP_SPAWN_MARGIN: f32 = 15.0;
/// Attempts at sampling a non-overlapping powerup position before giving up
/// until the next spawn interval
const POWERUP_SPAWN_ATTEMPTS: u32 = 100;
/// Score awarded per kill
const KILL_SCORE: u32 = 100;
/// Health granted by HEALTH_RESTORE, capped at MAX_HEALTH
const HEALTH_RESTORE_AMOUNT: i32 = 50;
/// Maximum player health
const MAX_HEALTH: i32 = 100;

/// Powerup types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PowerupKind {
    SpeedBoost,
    DamageBoost,
    HealthRestore,
    RapidFire,
    Shield,
}

impl PowerupKind {
    pub const ALL: [PowerupKind; 5] = [
        PowerupKind::SpeedBoost,
        PowerupKind::DamageBoost,
        PowerupKind::HealthRestore,
        PowerupKind::RapidFire,
        PowerupKind::Shield,
    ];
}

/// Identity of a player entering a room, assigned by the session layer
#[derive(Debug, Clone)]
pub struct PlayerDescriptor {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub username: String,
}

/// Authoritative player state
#[derive(Debug, Clone, Serialize)]
pub struct Player {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub username: String,
    pub position: Vec2,
    /// Facing direction in radians
    pub direction: f32,
    /// Health in [0, 100]
    pub health: i32,
    pub kills: u32,
    pub score: u32,
    /// Unix millis of the last shot, for cooldown enforcement
    pub last_shot_time: u64,
    /// Active powerup effects, at most one of each kind
    pub powerups: Vec<PowerupKind>,
    /// When set, the player is dead until this Unix-millis deadline passes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub respawn_time: Option<u64>,
}

impl Player {
    fn is_respawning(&self, now: u64) -> bool {
        self.respawn_time.map_or(false, |t| t > now)
    }

    fn has_powerup(&self, kind: PowerupKind) -> bool {
        self.powerups.contains(&kind)
    }
}

/// Live projectile
#[derive(Debug, Clone, Serialize)]
pub struct Projectile {
    pub id: Uuid,
    /// Owning player, immune to self-collision
    pub player_id: Uuid,
    pub position: Vec2,
    pub direction: f32,
    /// Units advanced per tick
    pub speed: f32,
    pub created_at: u64,
    pub damage: i32,
    /// Hit radius
    pub size: f32,
}

/// Uncollected powerup on the map
#[derive(Debug, Clone, Serialize)]
pub struct Powerup {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: PowerupKind,
    pub position: Vec2,
    pub radius: f32,
    pub created_at: u64,
}

/// One room's authoritative world state
#[derive(Debug, Clone, Serialize)]
pub struct GameState {
    pub players: HashMap<Uuid, Player>,
    pub projectiles: Vec<Projectile>,
    pub powerups: Vec<Powerup>,
    pub obstacles: Vec<Obstacle>,
    pub last_update_time: u64,
}

/// A collected powerup effect scheduled to wear off. Swept during the tick's
/// powerup-expiry step rather than by an out-of-band timer, so expiry is
/// deterministic and removal of the player cancels it outright.
#[derive(Debug, Clone)]
struct PowerupGrant {
    player_id: Uuid,
    kind: PowerupKind,
    expires_at: u64,
}

/// The authoritative per-room simulation
pub struct Simulation {
    state: GameState,
    settings: GameSettings,
    map: MapTemplate,
    grants: Vec<PowerupGrant>,
    last_powerup_spawn: u64,
    rng: ChaCha8Rng,
}

impl Simulation {
    pub fn new(settings: GameSettings, seed: u64) -> Self {
        let map = MapTemplate::by_name("default").unwrap_or_else(MapTemplate::default_arena);
        Self::with_map(settings, map, seed)
    }

    pub fn with_map(settings: GameSettings, map: MapTemplate, seed: u64) -> Self {
        let now = unix_millis();
        Self {
            state: GameState {
                players: HashMap::new(),
                projectiles: Vec::new(),
                powerups: Vec::new(),
                obstacles: map.obstacles.clone(),
                last_update_time: now,
            },
            settings,
            map,
            grants: Vec::new(),
            last_powerup_spawn: now,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Read-only view of the current world state
    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn player(&self, id: Uuid) -> Option<&Player> {
        self.state.players.get(&id)
    }

    pub fn player_count(&self) -> usize {
        self.state.players.len()
    }

    /// Add a player at a random spawn point. Capacity is enforced by the
    /// room registry, not here.
    pub fn add_player(&mut self, descriptor: PlayerDescriptor) {
        let spawn = self.random_spawn();
        let player = Player {
            id: descriptor.id,
            user_id: descriptor.user_id,
            username: descriptor.username,
            position: spawn,
            direction: 0.0,
            health: MAX_HEALTH,
            kills: 0,
            score: 0,
            last_shot_time: 0,
            powerups: Vec::new(),
            respawn_time: None,
        };
        self.state.players.insert(player.id, player);
    }

    /// Remove a player; a no-op if absent
    pub fn remove_player(&mut self, player_id: Uuid) {
        self.state.players.remove(&player_id);
        self.grants.retain(|g| g.player_id != player_id);
    }

    /// Apply a client movement/aim/shoot intent
    pub fn update_player(&mut self, update: &PlayerUpdate) {
        self.update_player_at(update, unix_millis());
    }

    pub fn update_player_at(&mut self, update: &PlayerUpdate, now: u64) {
        let respawning = match self.state.players.get(&update.id) {
            None => return,
            Some(player) => player.is_respawning(now),
        };
        if respawning {
            return;
        }

        let resolved = self.resolve_movement(update.position);

        let mut fired: Option<Projectile> = None;
        if let Some(player) = self.state.players.get_mut(&update.id) {
            // Clear a stale respawn deadline the moment it is observed past
            player.respawn_time = None;

            player.position = resolved;
            player.direction = update.direction;

            if update.shooting {
                let cooldown = if player.has_powerup(PowerupKind::RapidFire) {
                    self.settings.shooting_cooldown_ms / 2
                } else {
                    self.settings.shooting_cooldown_ms
                };

                if now.saturating_sub(player.last_shot_time) >= cooldown {
                    let damage = if player.has_powerup(PowerupKind::DamageBoost) {
                        self.settings.collision_damage * 3 / 2
                    } else {
                        self.settings.collision_damage
                    };

                    fired = Some(Projectile {
                        id: Uuid::new_v4(),
                        player_id: player.id,
                        position: player.position,
                        direction: player.direction,
                        speed: self.settings.projectile_speed,
                        created_at: now,
                        damage,
                        size: self.settings.projectile_hitbox_radius,
                    });
                    player.last_shot_time = now;
                }
            }
        }

        if let Some(projectile) = fired {
            self.state.projectiles.push(projectile);
        }
    }

    /// Clamp a requested position into map bounds, then push it out of any
    /// overlapped obstacle along the axis of minimum penetration. Obstacles
    /// are processed in list order with no backtracking: a correction made
    /// for one obstacle may land inside a later one.
    fn resolve_movement(&self, target: Vec2) -> Vec2 {
        let half = self.settings.player_hitbox_radius;
        let mut position = clamp_to_bounds(target, half, self.settings.map_width, self.settings.map_height);

        for obstacle in &self.state.obstacles {
            if hitbox_overlaps_rect(
                position,
                half,
                obstacle.position.x,
                obstacle.position.y,
                obstacle.width,
                obstacle.height,
            ) {
                position = resolve_hitbox_rect(
                    position,
                    half,
                    obstacle.position.x,
                    obstacle.position.y,
                    obstacle.width,
                    obstacle.height,
                );
            }
        }

        position
    }

    /// Advance the world by one frame
    pub fn tick(&mut self) {
        self.tick_at(unix_millis());
    }

    pub fn tick_at(&mut self, now: u64) {
        self.state.last_update_time = now;

        self.step_projectiles(now);
        self.resolve_projectile_hits(now);
        self.collect_powerups(now);
        self.expire_powerups(now);
        self.spawn_powerup(now);
        self.respawn_players(now);
    }

    /// Advance every projectile and drop those hitting an obstacle, expiring,
    /// or leaving the map
    fn step_projectiles(&mut self, now: u64) {
        let settings = self.settings.clone();
        let mut projectiles = std::mem::take(&mut self.state.projectiles);
        let obstacles = &self.state.obstacles;

        projectiles.retain_mut(|projectile| {
            let next = Vec2 {
                x: projectile.position.x + projectile.direction.cos() * projectile.speed,
                y: projectile.position.y + projectile.direction.sin() * projectile.speed,
            };

            for obstacle in obstacles {
                if hitbox_overlaps_rect(
                    next,
                    projectile.size,
                    obstacle.position.x,
                    obstacle.position.y,
                    obstacle.width,
                    obstacle.height,
                ) {
                    return false;
                }
            }

            projectile.position = next;

            let expired = now.saturating_sub(projectile.created_at) > settings.projectile_lifetime_ms;
            let out_of_bounds = next.x < 0.0
                || next.x > settings.map_width
                || next.y < 0.0
                || next.y > settings.map_height;

            !expired && !out_of_bounds
        });

        self.state.projectiles = projectiles;
    }

    /// Test surviving projectiles against players; the first player hit takes
    /// the damage and the projectile is consumed
    fn resolve_projectile_hits(&mut self, now: u64) {
        let player_radius = self.settings.player_hitbox_radius;
        let respawn_ms = self.settings.respawn_time_ms;

        for i in (0..self.state.projectiles.len()).rev() {
            let (shooter_id, position, size, damage) = {
                let projectile = &self.state.projectiles[i];
                (
                    projectile.player_id,
                    projectile.position,
                    projectile.size,
                    projectile.damage,
                )
            };

            let target_id = self
                .state
                .players
                .values()
                .filter(|p| p.id != shooter_id && !p.is_respawning(now))
                .find(|p| circles_overlap(p.position, player_radius, position, size))
                .map(|p| p.id);

            let Some(target_id) = target_id else { continue };

            let mut killed = false;
            if let Some(target) = self.state.players.get_mut(&target_id) {
                let dealt = if target.has_powerup(PowerupKind::Shield) {
                    damage / 2
                } else {
                    damage
                };
                target.health = (target.health - dealt).max(0);

                if target.health == 0 {
                    killed = true;
                    target.respawn_time = Some(now + respawn_ms);
                    target.powerups.clear();
                }
            }

            if killed {
                self.grants.retain(|g| g.player_id != target_id);
                if let Some(shooter) = self.state.players.get_mut(&shooter_id) {
                    shooter.kills += 1;
                    shooter.score += KILL_SCORE;
                }
            }

            self.state.projectiles.remove(i);
        }
    }

    /// Hand each powerup to the first overlapping live player
    fn collect_powerups(&mut self, now: u64) {
        let player_radius = self.settings.player_hitbox_radius;
        let duration = self.settings.powerup_duration_ms;

        for i in (0..self.state.powerups.len()).rev() {
            let (kind, position, radius) = {
                let powerup = &self.state.powerups[i];
                (powerup.kind, powerup.position, powerup.radius)
            };

            let collector = self
                .state
                .players
                .values()
                .filter(|p| !p.is_respawning(now))
                .find(|p| circles_overlap(p.position, player_radius, position, radius))
                .map(|p| p.id);

            let Some(player_id) = collector else { continue };

            let mut granted = false;
            if let Some(player) = self.state.players.get_mut(&player_id) {
                if kind == PowerupKind::HealthRestore {
                    // One-shot effect, never enters the active set
                    player.health = (player.health + HEALTH_RESTORE_AMOUNT).min(MAX_HEALTH);
                } else if !player.has_powerup(kind) {
                    player.powerups.push(kind);
                    granted = true;
                }
                // A duplicate pickup is consumed without refreshing the timer
            }

            if granted {
                self.grants.push(PowerupGrant {
                    player_id,
                    kind,
                    expires_at: now + duration,
                });
            }

            self.state.powerups.remove(i);
        }
    }

    /// Remove powerups that aged out on the map and strip worn-off effects
    /// from players
    fn expire_powerups(&mut self, now: u64) {
        self.state
            .powerups
            .retain(|p| now.saturating_sub(p.created_at) < POWERUP_LIFETIME_MS);

        let mut expired = Vec::new();
        self.grants.retain(|grant| {
            if grant.expires_at <= now {
                expired.push((grant.player_id, grant.kind));
                false
            } else {
                true
            }
        });

        for (player_id, kind) in expired {
            if let Some(player) = self.state.players.get_mut(&player_id) {
                player.powerups.retain(|&k| k != kind);
            }
        }
    }

    /// Spawn a powerup of a random kind at a random non-obstacle position
    /// once per spawn interval, while under the population cap
    fn spawn_powerup(&mut self, now: u64) {
        if now.saturating_sub(self.last_powerup_spawn) < self.settings.powerup_spawn_rate_ms {
            return;
        }
        // The interval restarts even when the cap suppresses the spawn
        self.last_powerup_spawn = now;

        if self.state.powerups.len() >= MAX_LIVE_POWERUPS {
            return;
        }

        let kind = PowerupKind::ALL[self.rng.gen_range(0..PowerupKind::ALL.len())];

        for _ in 0..POWERUP_SPAWN_ATTEMPTS {
            let position = Vec2 {
                x: self.rng.gen_range(30.0..self.settings.map_width - 30.0),
                y: self.rng.gen_range(30.0..self.settings.map_height - 30.0),
            };

            let blocked = self.state.obstacles.iter().any(|obstacle| {
                hitbox_overlaps_rect(
                    position,
                    POWERUP_SPAWN_MARGIN,
                    obstacle.position.x,
                    obstacle.position.y,
                    obstacle.width,
                    obstacle.height,
                )
            });

            if !blocked {
                self.state.powerups.push(Powerup {
                    id: Uuid::new_v4(),
                    kind,
                    position,
                    radius: POWERUP_RADIUS,
                    created_at: now,
                });
                return;
            }
        }
    }

    /// Bring players whose respawn deadline has passed back at full health
    fn respawn_players(&mut self, now: u64) {
        let due: Vec<Uuid> = self
            .state
            .players
            .values()
            .filter(|p| p.respawn_time.map_or(false, |t| t <= now))
            .map(|p| p.id)
            .collect();

        for player_id in due {
            let spawn = self.random_spawn();
            if let Some(player) = self.state.players.get_mut(&player_id) {
                player.health = MAX_HEALTH;
                player.position = spawn;
                player.respawn_time = None;
            }
        }
    }

    fn random_spawn(&mut self) -> Vec2 {
        let index = self.rng.gen_range(0..self.map.spawns.len());
        self.map.spawns[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000_000;

    fn sim() -> Simulation {
        Simulation::new(GameSettings::default(), 42)
    }

    fn descriptor(name: &str) -> PlayerDescriptor {
        PlayerDescriptor {
            id: Uuid::new_v4(),
            user_id: Some(Uuid::new_v4()),
            username: name.to_string(),
        }
    }

    fn update(id: Uuid, x: f32, y: f32, shooting: bool) -> PlayerUpdate {
        PlayerUpdate {
            id,
            position: Vec2::new(x, y),
            direction: 0.0,
            shooting,
        }
    }

    /// Place a player at an exact position without collision resolution
    fn place(sim: &mut Simulation, id: Uuid, x: f32, y: f32) {
        sim.state.players.get_mut(&id).unwrap().position = Vec2::new(x, y);
    }

    #[test]
    fn add_player_spawns_at_template_spawn_with_full_health() {
        let mut sim = sim();
        let desc = descriptor("alice");
        let id = desc.id;
        sim.add_player(desc);

        let player = sim.player(id).unwrap();
        assert_eq!(player.health, 100);
        assert_eq!(player.kills, 0);
        assert_eq!(player.score, 0);
        assert!(player.powerups.is_empty());
        assert!(player.respawn_time.is_none());
        assert!(sim.map.spawns.contains(&player.position));
    }

    #[test]
    fn remove_player_is_idempotent() {
        let mut sim = sim();
        let desc = descriptor("alice");
        let id = desc.id;
        sim.add_player(desc);

        sim.remove_player(id);
        assert_eq!(sim.player_count(), 0);
        // Second removal is a no-op
        sim.remove_player(id);
        assert_eq!(sim.player_count(), 0);
    }

    #[test]
    fn update_for_unknown_player_is_ignored() {
        let mut sim = sim();
        sim.update_player_at(&update(Uuid::new_v4(), 100.0, 100.0, true), NOW);
        assert!(sim.state.projectiles.is_empty());
    }

    #[test]
    fn movement_into_obstacle_left_face_resolves_to_face() {
        let mut sim = sim();
        let desc = descriptor("alice");
        let id = desc.id;
        sim.add_player(desc);
        place(&mut sim, id, 90.0, 150.0);

        sim.update_player_at(&update(id, 125.0, 150.0, false), NOW);

        let player = sim.player(id).unwrap();
        assert_eq!(player.position.x, 80.0); // obstacle left edge minus hitbox radius
        assert_eq!(player.position.y, 150.0);
    }

    #[test]
    fn movement_to_obstacle_center_resolves_to_right_face() {
        let mut sim = sim();
        let desc = descriptor("alice");
        let id = desc.id;
        sim.add_player(desc);
        place(&mut sim, id, 90.0, 150.0);

        // Dead center of obs1: all four penetrations tie, the right face wins
        sim.update_player_at(&update(id, 150.0, 150.0, false), NOW);

        let player = sim.player(id).unwrap();
        assert_eq!(player.position.x, 220.0); // obstacle right edge plus hitbox radius
        assert_eq!(player.position.y, 150.0);
    }

    #[test]
    fn movement_is_clamped_to_map_bounds() {
        let mut sim = sim();
        let desc = descriptor("alice");
        let id = desc.id;
        sim.add_player(desc);

        sim.update_player_at(&update(id, -100.0, 900.0, false), NOW);

        let player = sim.player(id).unwrap();
        assert_eq!(player.position.x, 20.0);
        assert_eq!(player.position.y, 580.0);
    }

    #[test]
    fn resolved_position_never_inside_an_obstacle() {
        let mut sim = sim();
        let desc = descriptor("alice");
        let id = desc.id;
        sim.add_player(desc);

        // Probe a grid of requested positions across the map
        for gx in 0..40 {
            for gy in 0..30 {
                let target = Vec2::new(gx as f32 * 20.0, gy as f32 * 20.0);
                sim.update_player_at(
                    &update(id, target.x, target.y, false),
                    NOW,
                );
                let pos = sim.player(id).unwrap().position;
                for obstacle in &sim.state.obstacles {
                    assert!(
                        !hitbox_overlaps_rect(
                            pos,
                            sim.settings.player_hitbox_radius,
                            obstacle.position.x,
                            obstacle.position.y,
                            obstacle.width,
                            obstacle.height,
                        ),
                        "position {:?} overlaps obstacle {}",
                        pos,
                        obstacle.id
                    );
                }
            }
        }
    }

    #[test]
    fn shooting_respects_cooldown() {
        let mut sim = sim();
        let desc = descriptor("alice");
        let id = desc.id;
        sim.add_player(desc);
        place(&mut sim, id, 400.0, 50.0);

        sim.update_player_at(&update(id, 400.0, 50.0, true), NOW);
        assert_eq!(sim.state.projectiles.len(), 1);

        // Within the cooldown window no second projectile spawns
        sim.update_player_at(&update(id, 400.0, 50.0, true), NOW + 100);
        assert_eq!(sim.state.projectiles.len(), 1);

        sim.update_player_at(&update(id, 400.0, 50.0, true), NOW + 250);
        assert_eq!(sim.state.projectiles.len(), 2);
    }

    #[test]
    fn rapid_fire_halves_cooldown() {
        let mut sim = sim();
        let desc = descriptor("alice");
        let id = desc.id;
        sim.add_player(desc);
        place(&mut sim, id, 400.0, 50.0);
        sim.state
            .players
            .get_mut(&id)
            .unwrap()
            .powerups
            .push(PowerupKind::RapidFire);

        sim.update_player_at(&update(id, 400.0, 50.0, true), NOW);
        sim.update_player_at(&update(id, 400.0, 50.0, true), NOW + 125);
        assert_eq!(sim.state.projectiles.len(), 2);
    }

    #[test]
    fn damage_boost_scales_projectile_damage() {
        let mut sim = sim();
        let desc = descriptor("alice");
        let id = desc.id;
        sim.add_player(desc);
        place(&mut sim, id, 400.0, 50.0);
        sim.state
            .players
            .get_mut(&id)
            .unwrap()
            .powerups
            .push(PowerupKind::DamageBoost);

        sim.update_player_at(&update(id, 400.0, 50.0, true), NOW);
        assert_eq!(sim.state.projectiles[0].damage, 30);
    }

    #[test]
    fn projectile_hit_applies_base_damage() {
        let mut sim = sim();
        let shooter = descriptor("alice");
        let target = descriptor("bob");
        let (shooter_id, target_id) = (shooter.id, target.id);
        sim.add_player(shooter);
        sim.add_player(target);
        place(&mut sim, shooter_id, 300.0, 50.0);
        place(&mut sim, target_id, 330.0, 50.0);

        // Shoot straight along +x into the target
        sim.update_player_at(&update(shooter_id, 300.0, 50.0, true), NOW);
        sim.tick_at(NOW + 16);

        assert_eq!(sim.player(target_id).unwrap().health, 80);
        assert!(sim.state.projectiles.is_empty());
    }

    #[test]
    fn kill_awards_shooter_and_schedules_respawn() {
        let mut sim = sim();
        let shooter = descriptor("alice");
        let target = descriptor("bob");
        let (shooter_id, target_id) = (shooter.id, target.id);
        sim.add_player(shooter);
        sim.add_player(target);
        place(&mut sim, shooter_id, 300.0, 50.0);
        place(&mut sim, target_id, 330.0, 50.0);
        {
            let target = sim.state.players.get_mut(&target_id).unwrap();
            target.health = 20;
            target.powerups.push(PowerupKind::SpeedBoost);
        }
        sim.grants.push(PowerupGrant {
            player_id: target_id,
            kind: PowerupKind::SpeedBoost,
            expires_at: NOW + 10_000,
        });

        sim.update_player_at(&update(shooter_id, 300.0, 50.0, true), NOW);
        let tick_time = NOW + 16;
        sim.tick_at(tick_time);

        let shooter = sim.player(shooter_id).unwrap();
        assert_eq!(shooter.kills, 1);
        assert_eq!(shooter.score, 100);

        let target = sim.player(target_id).unwrap();
        assert_eq!(target.health, 0);
        assert_eq!(target.respawn_time, Some(tick_time + 3000));
        assert!(target.powerups.is_empty());
        // Death also purges the victim's pending effect expirations
        assert!(sim.grants.iter().all(|g| g.player_id != target_id));
    }

    #[test]
    fn shield_halves_incoming_damage() {
        let mut sim = sim();
        let shooter = descriptor("alice");
        let target = descriptor("bob");
        let (shooter_id, target_id) = (shooter.id, target.id);
        sim.add_player(shooter);
        sim.add_player(target);
        place(&mut sim, shooter_id, 300.0, 50.0);
        place(&mut sim, target_id, 330.0, 50.0);
        sim.state
            .players
            .get_mut(&target_id)
            .unwrap()
            .powerups
            .push(PowerupKind::Shield);

        sim.update_player_at(&update(shooter_id, 300.0, 50.0, true), NOW);
        sim.tick_at(NOW + 16);

        assert_eq!(sim.player(target_id).unwrap().health, 90);
    }

    #[test]
    fn respawning_player_is_immune_and_immobile() {
        let mut sim = sim();
        let shooter = descriptor("alice");
        let target = descriptor("bob");
        let (shooter_id, target_id) = (shooter.id, target.id);
        sim.add_player(shooter);
        sim.add_player(target);
        place(&mut sim, shooter_id, 300.0, 50.0);
        place(&mut sim, target_id, 330.0, 50.0);
        sim.state.players.get_mut(&target_id).unwrap().respawn_time = Some(NOW + 3000);

        // Movement intents are dropped while dead
        sim.update_player_at(&update(target_id, 500.0, 500.0, false), NOW);
        assert_eq!(sim.player(target_id).unwrap().position, Vec2::new(330.0, 50.0));

        // Projectiles pass straight through
        sim.update_player_at(&update(shooter_id, 300.0, 50.0, true), NOW);
        sim.tick_at(NOW + 16);
        assert_eq!(sim.player(target_id).unwrap().health, 100);
        assert_eq!(sim.state.projectiles.len(), 1);
    }

    #[test]
    fn stale_respawn_deadline_cleared_on_update() {
        let mut sim = sim();
        let desc = descriptor("alice");
        let id = desc.id;
        sim.add_player(desc);
        sim.state.players.get_mut(&id).unwrap().respawn_time = Some(NOW - 1);

        sim.update_player_at(&update(id, 400.0, 50.0, false), NOW);

        let player = sim.player(id).unwrap();
        assert!(player.respawn_time.is_none());
        assert_eq!(player.position, Vec2::new(400.0, 50.0));
    }

    #[test]
    fn respawn_restores_health_at_spawn_point() {
        let mut sim = sim();
        let desc = descriptor("alice");
        let id = desc.id;
        sim.add_player(desc);
        {
            let player = sim.state.players.get_mut(&id).unwrap();
            player.health = 0;
            player.respawn_time = Some(NOW + 3000);
        }

        sim.tick_at(NOW + 2999);
        assert!(sim.player(id).unwrap().respawn_time.is_some());

        sim.tick_at(NOW + 3000);
        let player = sim.player(id).unwrap();
        assert_eq!(player.health, 100);
        assert!(player.respawn_time.is_none());
        assert!(sim.map.spawns.contains(&player.position));
    }

    #[test]
    fn projectile_destroyed_by_obstacle() {
        let mut sim = sim();
        let desc = descriptor("alice");
        let id = desc.id;
        sim.add_player(desc);
        // Flush against the left face of obs1 (100,100,100x100), shooting along +x
        place(&mut sim, id, 80.0, 150.0);

        sim.update_player_at(&update(id, 80.0, 150.0, true), NOW);
        assert_eq!(sim.state.projectiles.len(), 1);

        // 80 -> 95 grazes the face, 95 -> 110 is inside the obstacle
        sim.tick_at(NOW + 16);
        assert_eq!(sim.state.projectiles.len(), 1);
        sim.tick_at(NOW + 32);
        assert!(sim.state.projectiles.is_empty());
        // No obstacle damage: the map is unchanged
        assert_eq!(sim.state.obstacles.len(), 3);
    }

    #[test]
    fn projectile_expires_after_lifetime() {
        let mut sim = sim();
        let desc = descriptor("alice");
        let id = desc.id;
        sim.add_player(desc);
        place(&mut sim, id, 50.0, 550.0);

        sim.update_player_at(&update(id, 50.0, 550.0, true), NOW);
        sim.tick_at(NOW + 1001);
        assert!(sim.state.projectiles.is_empty());
    }

    #[test]
    fn projectile_removed_when_leaving_map() {
        let mut sim = sim();
        let desc = descriptor("alice");
        let id = desc.id;
        sim.add_player(desc);
        place(&mut sim, id, 780.0, 550.0);

        sim.update_player_at(&update(id, 780.0, 550.0, true), NOW);
        sim.tick_at(NOW + 16); // 795
        assert_eq!(sim.state.projectiles.len(), 1);
        sim.tick_at(NOW + 32); // 810, past the right edge
        assert!(sim.state.projectiles.is_empty());
    }

    fn drop_powerup(sim: &mut Simulation, kind: PowerupKind, x: f32, y: f32, created_at: u64) {
        sim.state.powerups.push(Powerup {
            id: Uuid::new_v4(),
            kind,
            position: Vec2::new(x, y),
            radius: POWERUP_RADIUS,
            created_at,
        });
    }

    #[test]
    fn health_restore_applies_immediately_and_does_not_persist() {
        let mut sim = sim();
        let desc = descriptor("alice");
        let id = desc.id;
        sim.add_player(desc);
        place(&mut sim, id, 400.0, 50.0);
        sim.state.players.get_mut(&id).unwrap().health = 40;
        drop_powerup(&mut sim, PowerupKind::HealthRestore, 410.0, 50.0, NOW);

        sim.tick_at(NOW + 16);

        let player = sim.player(id).unwrap();
        assert_eq!(player.health, 90);
        assert!(player.powerups.is_empty());
        assert!(sim.state.powerups.is_empty());
    }

    #[test]
    fn health_restore_caps_at_max() {
        let mut sim = sim();
        let desc = descriptor("alice");
        let id = desc.id;
        sim.add_player(desc);
        place(&mut sim, id, 400.0, 50.0);
        sim.state.players.get_mut(&id).unwrap().health = 80;
        drop_powerup(&mut sim, PowerupKind::HealthRestore, 410.0, 50.0, NOW);

        sim.tick_at(NOW + 16);
        assert_eq!(sim.player(id).unwrap().health, 100);
    }

    #[test]
    fn timed_powerup_wears_off_after_duration() {
        let mut sim = sim();
        let desc = descriptor("alice");
        let id = desc.id;
        sim.add_player(desc);
        place(&mut sim, id, 400.0, 50.0);
        drop_powerup(&mut sim, PowerupKind::RapidFire, 410.0, 50.0, NOW);

        sim.tick_at(NOW + 16);
        assert!(sim.player(id).unwrap().has_powerup(PowerupKind::RapidFire));

        sim.tick_at(NOW + 16 + 9_000);
        assert!(sim.player(id).unwrap().has_powerup(PowerupKind::RapidFire));

        sim.tick_at(NOW + 16 + 10_001);
        assert!(!sim.player(id).unwrap().has_powerup(PowerupKind::RapidFire));
    }

    #[test]
    fn duplicate_pickup_consumed_without_refresh() {
        let mut sim = sim();
        let desc = descriptor("alice");
        let id = desc.id;
        sim.add_player(desc);
        place(&mut sim, id, 400.0, 50.0);
        drop_powerup(&mut sim, PowerupKind::Shield, 410.0, 50.0, NOW);
        sim.tick_at(NOW + 16);

        // Second shield while the first is active: pickup consumed, no new grant
        drop_powerup(&mut sim, PowerupKind::Shield, 410.0, 50.0, NOW + 5_000);
        sim.tick_at(NOW + 5_016);
        assert!(sim.state.powerups.is_empty());
        assert_eq!(sim.grants.len(), 1);

        // Original grant still expires on its own schedule
        sim.tick_at(NOW + 16 + 10_001);
        assert!(!sim.player(id).unwrap().has_powerup(PowerupKind::Shield));
    }

    #[test]
    fn uncollected_powerup_expires_after_lifetime() {
        let mut sim = sim();
        drop_powerup(&mut sim, PowerupKind::Shield, 700.0, 100.0, NOW);

        sim.tick_at(NOW + 29_000);
        assert_eq!(sim.state.powerups.len(), 1);

        sim.tick_at(NOW + 30_000);
        assert!(sim.state.powerups.is_empty());
    }

    #[test]
    fn powerup_spawn_respects_interval_and_cap() {
        let mut sim = sim();
        sim.last_powerup_spawn = NOW;

        // Before the interval elapses nothing spawns
        sim.tick_at(NOW + 1_000);
        assert!(sim.state.powerups.is_empty());

        sim.tick_at(NOW + 15_000);
        assert_eq!(sim.state.powerups.len(), 1);

        // At the population cap the interval elapses with no sixth spawn
        for _ in 0..4 {
            drop_powerup(&mut sim, PowerupKind::Shield, 700.0, 100.0, NOW + 15_000);
        }
        sim.tick_at(NOW + 30_000);
        assert_eq!(sim.state.powerups.len(), 5);

        // Once population drops, the next interval spawns again
        sim.state.powerups.clear();
        for _ in 0..2 {
            drop_powerup(&mut sim, PowerupKind::Shield, 700.0, 100.0, NOW + 30_000);
        }
        sim.tick_at(NOW + 45_000);
        assert_eq!(sim.state.powerups.len(), 3);
    }

    #[test]
    fn spawned_powerups_avoid_obstacles() {
        let mut sim = sim();
        sim.last_powerup_spawn = NOW;

        for round in 1..=20u64 {
            sim.tick_at(NOW + round * 15_000);
            let powerup = sim.state.powerups.last().expect("powerup spawned");
            for obstacle in &sim.state.obstacles {
                assert!(!hitbox_overlaps_rect(
                    powerup.position,
                    POWERUP_SPAWN_MARGIN,
                    obstacle.position.x,
                    obstacle.position.y,
                    obstacle.width,
                    obstacle.height,
                ));
            }
            sim.state.powerups.clear();
        }
    }

    #[test]
    fn health_stays_within_bounds_under_fire() {
        let mut sim = sim();
        let shooter = descriptor("alice");
        let target = descriptor("bob");
        let (shooter_id, target_id) = (shooter.id, target.id);
        sim.add_player(shooter);
        sim.add_player(target);

        let mut now = NOW;
        for _ in 0..200 {
            place(&mut sim, shooter_id, 300.0, 50.0);
            place(&mut sim, target_id, 330.0, 50.0);
            sim.update_player_at(&update(shooter_id, 300.0, 50.0, true), now);
            now += 300;
            sim.tick_at(now);

            for player in sim.state.players.values() {
                assert!(player.health >= 0 && player.health <= 100);
            }
        }
    }
}

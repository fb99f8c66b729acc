//! Map templates - static obstacle layouts and spawn points

use serde::{Deserialize, Serialize};

use super::geometry::Vec2;

/// Static axis-aligned rectangular obstacle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: String,
    pub position: Vec2,
    pub width: f32,
    pub height: f32,
}

/// A named map layout: obstacles plus spawn points
#[derive(Debug, Clone)]
pub struct MapTemplate {
    pub name: &'static str,
    pub obstacles: Vec<Obstacle>,
    pub spawns: Vec<Vec2>,
}

impl MapTemplate {
    /// The default arena layout
    pub fn default_arena() -> Self {
        Self {
            name: "default",
            obstacles: vec![
                Obstacle {
                    id: "obs1".to_string(),
                    position: Vec2::new(100.0, 100.0),
                    width: 100.0,
                    height: 100.0,
                },
                Obstacle {
                    id: "obs2".to_string(),
                    position: Vec2::new(500.0, 380.0),
                    width: 80.0,
                    height: 80.0,
                },
                Obstacle {
                    id: "obs3".to_string(),
                    position: Vec2::new(400.0, 250.0),
                    width: 50.0,
                    height: 50.0,
                },
            ],
            spawns: vec![
                Vec2::new(50.0, 50.0),
                Vec2::new(750.0, 50.0),
                Vec2::new(50.0, 550.0),
                Vec2::new(750.0, 550.0),
            ],
        }
    }

    /// Look up a map template by name
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Self::default_arena()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_arena_has_obstacles_and_spawns() {
        let map = MapTemplate::default_arena();
        assert_eq!(map.obstacles.len(), 3);
        assert_eq!(map.spawns.len(), 4);
    }

    #[test]
    fn unknown_map_name_is_none() {
        assert!(MapTemplate::by_name("moonbase").is_none());
        assert!(MapTemplate::by_name("default").is_some());
    }
}

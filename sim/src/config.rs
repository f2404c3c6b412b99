//! World configuration.
//!
//! Every tunable constant of the simulation lives here. Defaults reproduce the
//! reference world: a 30x30 map ticking at 15 Hz.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Toggles for the autonomous systems. Intents are always applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub movement: bool,
    pub seeking: bool,
    pub spawning: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            movement: true,
            seeking: true,
            spawning: true,
        }
    }
}

/// Configuration for world construction and tick behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Ticks per second.
    pub tick_rate: u32,
    /// Seed for terrain noise and world population.
    pub seed: u32,
    /// World width in cells.
    pub width: u32,
    /// World height in cells.
    pub height: u32,
    /// Spatial hash resolution (cells along x and y).
    pub grid_dimensions: (u32, u32),
    /// Side length of a terrain chunk in cells.
    pub chunk_size: u32,
    /// Hard cap on smoothing passes per chunk.
    pub max_smoothing_passes: u32,
    pub max_obstacles: usize,
    pub max_monsters: usize,
    /// Monsters placed at world construction (capped by `max_monsters`).
    pub initial_monsters: usize,
    /// Accumulated milliseconds before the next monster spawns.
    pub monster_spawn_threshold_ms: f32,
    pub player_speed: f32,
    pub player_fov: f32,
    pub monster_speed: f32,
    pub monster_fov: f32,
    /// Monsters farther than this from every player fall asleep.
    pub monster_sleep_distance: f32,
    /// Weight applied to the A* heuristic.
    pub heuristic_weight: f32,
    /// Extra radius added to a player's fov when collecting visible terrain.
    pub snapshot_cell_margin: f32,
    pub features: FeatureFlags,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tick_rate: 15,
            seed: 23456,
            width: 30,
            height: 30,
            grid_dimensions: (10, 10),
            chunk_size: 20,
            max_smoothing_passes: 100,
            max_obstacles: 10,
            max_monsters: 1,
            initial_monsters: 1,
            monster_spawn_threshold_ms: 100.0,
            player_speed: 8.0,
            player_fov: 10.0,
            monster_speed: 2.0,
            monster_fov: 12.0,
            monster_sleep_distance: 20.0,
            heuristic_weight: 0.7,
            snapshot_cell_margin: 1.0,
            features: FeatureFlags::default(),
        }
    }
}

impl WorldConfig {
    /// Parse a JSON document; missing fields fall back to defaults.
    pub fn from_json_str(data: &str) -> Result<Self, ConfigError> {
        let config: WorldConfig = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid("world must have a non-zero size".into()));
        }
        if self.grid_dimensions.0 == 0 || self.grid_dimensions.1 == 0 {
            return Err(ConfigError::Invalid("spatial grid needs at least one cell".into()));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk size must be non-zero".into()));
        }
        if self.tick_rate == 0 {
            return Err(ConfigError::Invalid("tick rate must be non-zero".into()));
        }
        Ok(())
    }

    /// Nominal wall-clock budget for one tick.
    pub fn tick_budget(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = WorldConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_budget().as_millis(), 66);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = WorldConfig::from_json_str(r#"{ "seed": 7, "features": { "spawning": false } }"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.width, 30);
        assert!(config.features.movement);
        assert!(!config.features.spawning);
    }

    #[test]
    fn test_rejects_empty_world() {
        let err = WorldConfig::from_json_str(r#"{ "width": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}

//! Overworld - Simulation Core
//!
//! An authoritative, fixed-rate world simulation for a real-time multiplayer
//! overworld: players and autonomous monsters move over procedurally generated
//! terrain, and every tick produces a per-player visibility snapshot.
//! Uses `bevy_ecs` schedules to order the per-tick systems.

pub mod api;
pub mod components;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod geometry;
pub mod pathfinding;
pub mod profiler;
pub mod snapshot;
pub mod spatial;
pub mod store;
pub mod systems;
pub mod terrain;

pub use api::{GameWorld, WorldMeta};
pub use components::*;
pub use config::{FeatureFlags, WorldConfig};
pub use context::GameContext;
pub use engine::Engine;
pub use error::{ConfigError, EngineError, PathfindingError, StoreError};
pub use events::{Directions, EventQueue, EventScheduler, GameEvent};
pub use geometry::{Bounds, Point, Rect, Size};
pub use snapshot::{EntityDto, PlayerView, Snapshot};
pub use spatial::{GridHandle, SpatialHashGrid};
pub use store::IndexedStore;
pub use systems::*;
pub use terrain::{HeightBucket, MapCell, TemperatureBucket, TerrainGenerator};

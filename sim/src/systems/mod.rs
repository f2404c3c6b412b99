//! ECS systems for the world simulation.
//!
//! Each system is a thin bevy wrapper over a plain `apply_*` function taking
//! `&mut GameContext`, so the logic can be driven directly in tests.
//!
//! ## Tick order
//!
//! **Simulation schedule** (chained, single-threaded):
//! - `event_system` - drains queued intents
//! - `sleep_system` - parks seekers with no player nearby
//! - `seeking_system` - acquires targets and steers along A* paths
//! - `movement_system` - integrates velocity and resolves collisions
//! - `monster_spawn_system` - tops the monster population up
//!
//! **Snapshot schedule**:
//! - `visibility_system` - builds the per-player view

pub mod events;
pub mod movement;
pub mod seeking;
pub mod serialization;
pub mod sleep;
pub mod spawn;
pub mod visibility;

pub use events::*;
pub use movement::*;
pub use seeking::*;
pub use serialization::*;
pub use sleep::*;
pub use spawn::*;
pub use visibility::*;

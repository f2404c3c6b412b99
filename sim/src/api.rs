//! Public API for the simulation.
//!
//! [`GameWorld`] is the synchronous, manually steppable core: it owns the ECS
//! world holding the [`GameContext`] and runs one authoritative tick per call.
//! The fixed-rate timer lives in [`crate::engine::Engine`].
//!
//! ## Tick order
//!
//! 1. drain the event queue
//! 2. sleep
//! 3. seeking
//! 4. movement
//! 5. monster spawn
//! 6. visibility snapshot
//!
//! Steps 1-5 form the simulation schedule and step 6 the snapshot schedule; both
//! use the single-threaded executor and run back to back, so no system ever
//! observes a partially applied tick.

use crate::config::WorldConfig;
use crate::context::GameContext;
use crate::error::ConfigError;
use crate::events::{EventQueue, EventScheduler, GameEvent};
use crate::profiler::Profiler;
use crate::snapshot::Snapshot;
use crate::systems::*;
use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ExecutorKind;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

/// World dimensions exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldMeta {
    pub width: u32,
    pub height: u32,
}

/// The main simulation world container.
///
/// Holds the ECS world and schedules, providing a clean API for:
/// - Initializing and populating the world
/// - Stepping the simulation forward one tick
/// - Reading the latest snapshot
/// - Scheduling intents
pub struct GameWorld {
    world: World,
    simulation: Schedule,
    visibility: Schedule,
    tick: u64,
    time_ms: f64,
    snapshot: Snapshot,
    profiler: Profiler,
    meta: WorldMeta,
}

impl GameWorld {
    /// Create a populated world over noise terrain.
    pub fn new(config: WorldConfig) -> Result<Self, ConfigError> {
        let mut ctx = GameContext::new(config)?;
        ctx.populate();
        Ok(Self::with_context(ctx))
    }

    /// Wrap an existing context as-is (no population pass).
    pub fn with_context(ctx: GameContext) -> Self {
        let meta = WorldMeta {
            width: ctx.config.width,
            height: ctx.config.height,
        };
        let profiler = Profiler::new(ctx.config.tick_budget());

        let mut world = World::new();
        world.insert_resource(DeltaTime::default());
        world.insert_resource(EventQueue::default());
        world.insert_resource(SpawnTimer::default());
        world.insert_resource(LatestSnapshot::default());
        world.insert_resource(ctx);

        let mut simulation = Schedule::default();
        simulation.set_executor_kind(ExecutorKind::SingleThreaded);
        simulation.add_systems(
            (
                event_system,
                sleep_system,
                seeking_system,
                movement_system,
                monster_spawn_system,
            )
                .chain(),
        );

        let mut visibility = Schedule::default();
        visibility.set_executor_kind(ExecutorKind::SingleThreaded);
        visibility.add_systems(visibility_system);

        info!(width = meta.width, height = meta.height, "world created");

        Self {
            world,
            simulation,
            visibility,
            tick: 0,
            time_ms: 0.0,
            snapshot: Snapshot::default(),
            profiler,
            meta,
        }
    }

    /// Run one tick with `dt_ms` elapsed milliseconds and return its snapshot.
    ///
    /// Exceeding the tick budget is logged, never fatal.
    pub fn tick(&mut self, dt_ms: f32) -> &Snapshot {
        let started = Instant::now();

        if let Some(mut dt) = self.world.get_resource_mut::<DeltaTime>() {
            dt.0 = dt_ms;
        }

        let world = &mut self.world;
        let simulation = &mut self.simulation;
        let visibility = &mut self.visibility;
        self.profiler.time_section("events+systems", || simulation.run(world));
        self.profiler.time_section("snapshot", || visibility.run(world));

        if let Some(mut latest) = self.world.get_resource_mut::<LatestSnapshot>() {
            self.snapshot = std::mem::take(&mut latest.0);
        }

        self.tick += 1;
        self.time_ms += f64::from(dt_ms);

        let elapsed = started.elapsed();
        if self.profiler.record_tick(elapsed) {
            warn!(
                tick = self.tick,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = self.profiler.budget().as_secs_f64() * 1000.0,
                "tick overran its budget"
            );
        }

        &self.snapshot
    }

    /// Queue an intent for the next tick.
    pub fn schedule(&self, event: GameEvent) {
        if let Some(queue) = self.world.get_resource::<EventQueue>() {
            queue.schedule(event);
        }
    }

    /// Producer handle that can be moved to other threads.
    pub fn scheduler(&self) -> Option<EventScheduler> {
        self.world.get_resource::<EventQueue>().map(EventQueue::scheduler)
    }

    /// Snapshot produced by the most recent tick.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&self) -> Result<String, serde_json::Error> {
        self.snapshot.to_json()
    }

    pub fn meta(&self) -> WorldMeta {
        self.meta
    }

    /// Get the current tick number.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Get the elapsed simulation time in milliseconds.
    pub fn current_time_ms(&self) -> f64 {
        self.time_ms
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    pub fn context(&self) -> Option<&GameContext> {
        self.world.get_resource::<GameContext>()
    }

    pub fn context_mut(&mut self) -> Option<Mut<'_, GameContext>> {
        self.world.get_resource_mut::<GameContext>()
    }

    /// Get direct access to the ECS world (for advanced usage).
    pub fn world(&self) -> &World {
        &self.world
    }
}

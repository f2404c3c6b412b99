//! Monster spawn system - tops the monster population up over time.

use super::movement::DeltaTime;
use crate::components::Brand;
use crate::context::GameContext;
use crate::store::Slot;
use bevy_ecs::prelude::*;
use tracing::info;

/// Milliseconds accumulated toward the next spawn.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SpawnTimer {
    pub progress_ms: f32,
}

pub fn monster_spawn_system(dt: Res<DeltaTime>, mut timer: ResMut<SpawnTimer>, mut ctx: ResMut<GameContext>) {
    if !ctx.config.features.spawning {
        return;
    }
    apply_monster_spawn(&mut ctx, &mut timer, dt.0);
}

/// Accumulate `dt_ms` while below the cap and spawn once the threshold is crossed.
/// Leftover progress carries over to the next spawn.
pub fn apply_monster_spawn(ctx: &mut GameContext, timer: &mut SpawnTimer, dt_ms: f32) -> Option<Slot> {
    if ctx.count(Brand::Monster) >= ctx.config.max_monsters {
        return None;
    }
    timer.progress_ms += dt_ms;
    let threshold = ctx.config.monster_spawn_threshold_ms;
    if timer.progress_ms < threshold {
        return None;
    }

    let slot = ctx.spawn_monster()?;
    timer.progress_ms = if threshold > 0.0 {
        timer.progress_ms % threshold
    } else {
        0.0
    };
    info!(monsters = ctx.count(Brand::Monster), "monster spawned");
    Some(slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::context::test_support::*;
    use crate::geometry::Point;

    #[test]
    fn test_spawns_after_threshold() {
        let mut config = WorldConfig::default();
        config.max_monsters = 2;
        let mut ctx = flat_context(config);
        let mut timer = SpawnTimer::default();

        assert!(apply_monster_spawn(&mut ctx, &mut timer, 60.0).is_none());
        assert_eq!(ctx.count(Brand::Monster), 0);
        assert!(apply_monster_spawn(&mut ctx, &mut timer, 70.0).is_some());
        assert_eq!(ctx.count(Brand::Monster), 1);
        assert!((timer.progress_ms - 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_cap_freezes_progress() {
        let mut ctx = flat_context(WorldConfig::default());
        place_monster(&mut ctx, "m1", Point::new(3.0, 3.0), 12.0);
        let mut timer = SpawnTimer::default();

        for _ in 0..10 {
            assert!(apply_monster_spawn(&mut ctx, &mut timer, 500.0).is_none());
        }
        assert_eq!(ctx.count(Brand::Monster), 1);
        assert_eq!(timer.progress_ms, 0.0);
    }

    #[test]
    fn test_system_respects_flag() {
        let mut config = WorldConfig::default();
        config.features.spawning = false;
        let mut world = World::new();
        world.insert_resource(flat_context(config));
        world.insert_resource(SpawnTimer::default());
        world.insert_resource(DeltaTime(1000.0));

        let mut schedule = Schedule::default();
        schedule.add_systems(monster_spawn_system);
        schedule.run(&mut world);

        assert_eq!(world.resource::<GameContext>().count(Brand::Monster), 0);
    }
}

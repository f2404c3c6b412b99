//! Sleep system - parks seekers that are far from every player.

use crate::components::{Brand, GameEntity};
use crate::context::GameContext;
use crate::geometry::Point;
use bevy_ecs::prelude::*;

pub fn sleep_system(mut ctx: ResMut<GameContext>) {
    apply_sleep(&mut ctx);
}

/// Mark each seeker asleep unless some player is within its sleep distance.
pub fn apply_sleep(ctx: &mut GameContext) {
    let players: Vec<Point> = ctx
        .by_brand(Brand::Player)
        .into_iter()
        .filter_map(|player| ctx.position_of(player))
        .collect();

    for slot in ctx.entities.filtered(ctx.seekers) {
        let Some(entity) = ctx.entities.get_mut(slot) else {
            continue;
        };
        let Some(position) = ctx.grid.rect(entity.handle()).map(|r| r.center()) else {
            continue;
        };
        let Some(seeker) = GameEntity::as_seeker_mut(entity) else {
            continue;
        };
        let sleep = seeker.sleep_mut();
        let distance = sleep.distance;
        sleep.asleep = !players.iter().any(|p| p.within(position, distance));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::context::test_support::*;

    fn asleep(ctx: &GameContext, id: &str) -> bool {
        ctx.entity(id).and_then(|e| e.as_seeker()).unwrap().sleep().asleep
    }

    #[test]
    fn test_no_players_means_asleep() {
        let mut ctx = flat_context(WorldConfig::default());
        place_monster(&mut ctx, "m1", Point::new(5.0, 5.0), 12.0);
        apply_sleep(&mut ctx);
        assert!(asleep(&ctx, "m1"));
    }

    #[test]
    fn test_wakes_when_player_close() {
        let mut config = WorldConfig::default();
        config.monster_sleep_distance = 5.0;
        let mut ctx = flat_context(config);
        place_monster(&mut ctx, "near", Point::new(5.0, 5.0), 12.0);
        place_monster(&mut ctx, "far", Point::new(25.0, 25.0), 12.0);
        place_player(&mut ctx, "p1", Point::new(8.0, 5.0));

        apply_sleep(&mut ctx);
        assert!(!asleep(&ctx, "near"));
        assert!(asleep(&ctx, "far"));

        let handle = ctx.entity("p1").unwrap().handle();
        ctx.grid.move_to(handle, Point::new(24.0, 24.0));
        apply_sleep(&mut ctx);
        assert!(asleep(&ctx, "near"));
        assert!(!asleep(&ctx, "far"));
    }
}

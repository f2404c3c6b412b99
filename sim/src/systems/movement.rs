//! Movement system - integrates velocity into position and resolves collisions.

use crate::context::GameContext;
use crate::geometry::{Point, Rect};
use bevy_ecs::prelude::*;

/// Resource containing the elapsed milliseconds for the current tick.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct DeltaTime(pub f32);

/// System that moves every entity with a nonzero velocity.
pub fn movement_system(dt: Res<DeltaTime>, mut ctx: ResMut<GameContext>) {
    if !ctx.config.features.movement {
        return;
    }
    apply_movement(&mut ctx, dt.0);
}

/// Advance all movers by `dt_ms` milliseconds.
pub fn apply_movement(ctx: &mut GameContext, dt_ms: f32) {
    for slot in ctx.entities.filtered(ctx.movers) {
        let Some((handle, displacement)) = ctx.entities.get(slot).and_then(|entity| {
            let movement = entity.as_mobile()?.movement();
            if movement.velocity.is_zero() {
                return None;
            }
            let distance = movement.speed * dt_ms / 1000.0;
            Some((entity.handle(), movement.velocity.with_magnitude(distance)))
        }) else {
            continue;
        };
        let Some(rect) = ctx.grid.rect(handle) else {
            continue;
        };

        let next = resolve_move(ctx, rect, displacement);
        ctx.grid.move_to(handle, next);
    }
}

fn clamp_to_world(ctx: &GameContext, point: Point) -> Point {
    let max_x = (ctx.config.width as f32 - 1.0).max(0.0);
    let max_y = (ctx.config.height as f32 - 1.0).max(0.0);
    Point::new(point.x.clamp(0.0, max_x), point.y.clamp(0.0, max_y))
}

fn can_occupy(ctx: &mut GameContext, rect: Rect, point: Point) -> bool {
    ctx.terrain.get_cell_at(point).is_passable() && !ctx.collides_with_obstacle(rect.moved_to(point))
}

/// Where an entity occupying `rect` ends up after trying to move by `displacement`.
///
/// Impassable target terrain cancels the move. A blocked straight move falls
/// back to its vertical, then horizontal component so entities slide along
/// obstacles instead of sticking on a diagonal approach.
fn resolve_move(ctx: &mut GameContext, rect: Rect, displacement: Point) -> Point {
    let current = rect.center();
    let target = current.add(displacement);

    if !ctx.terrain.get_cell_at(target).is_passable() {
        return clamp_to_world(ctx, current);
    }

    let resolved = if !ctx.collides_with_obstacle(rect.moved_to(target)) {
        target
    } else {
        [Point::new(0.0, displacement.y), Point::new(displacement.x, 0.0)]
            .into_iter()
            .filter(|step| !step.is_zero())
            .map(|step| current.add(step))
            .find(|candidate| can_occupy(ctx, rect, *candidate))
            .unwrap_or(current)
    };
    clamp_to_world(ctx, resolved)
}

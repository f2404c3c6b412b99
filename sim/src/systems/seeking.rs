//! Seeking system - target acquisition, local A* and steering for seekers.
//!
//! Runs in three phases per tick:
//! 1. **Gather** (sequential): resolve targets, apply give-up rules and build a
//!    local walkability grid per seeker. This is the only phase touching the
//!    spatial grid.
//! 2. **Solve**: run A* for every request. Read-only, so it runs on rayon when
//!    the `parallel` feature is enabled.
//! 3. **Apply** (sequential): write velocity, orientation and debug path back.

use crate::components::GameEntity;
use crate::context::{GameContext, HANDLE_INDEX};
use crate::error::PathfindingError;
use crate::geometry::{Bounds, Point, Rect, Size};
use crate::pathfinding::{find_path, LocalGrid};
use crate::store::Slot;
use bevy_ecs::prelude::*;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// System that steers every awake seeker toward its target.
pub fn seeking_system(mut ctx: ResMut<GameContext>) {
    if !ctx.config.features.seeking {
        return;
    }
    apply_seeking(&mut ctx);
}

/// A* input for one seeker.
struct PathRequest {
    slot: Slot,
    position: Point,
    velocity: Point,
    grid: LocalGrid,
    start: (i32, i32),
    goal: (i32, i32),
}

struct PathOutcome {
    slot: Slot,
    position: Point,
    velocity: Point,
    result: Result<Vec<(i32, i32)>, PathfindingError>,
}

pub fn apply_seeking(ctx: &mut GameContext) {
    clear_paths(ctx);
    let requests: Vec<PathRequest> = ctx
        .entities
        .filtered(ctx.seekers)
        .into_iter()
        .filter_map(|slot| gather(ctx, slot))
        .collect();

    for outcome in solve_all(requests, ctx.config.heuristic_weight) {
        apply_outcome(ctx, outcome);
    }
}

/// Debug paths only live for the tick that computed them, asleep seekers included.
fn clear_paths(ctx: &mut GameContext) {
    for slot in ctx.entities.filtered(ctx.seekers) {
        if let Some(entity) = ctx.entities.get_mut(slot) {
            entity.core_mut().path = None;
        }
    }
}

fn solve_all(requests: Vec<PathRequest>, weight: f32) -> Vec<PathOutcome> {
    let solve = |request: PathRequest| PathOutcome {
        slot: request.slot,
        position: request.position,
        velocity: request.velocity,
        result: find_path(&request.grid, request.start, request.goal, weight),
    };

    #[cfg(feature = "parallel")]
    let outcomes: Vec<PathOutcome> = requests.into_par_iter().map(solve).collect();

    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<PathOutcome> = requests.into_iter().map(solve).collect();

    outcomes
}

/// Seeker fields copied out so the store can be mutated afterwards.
struct SeekerState {
    id: String,
    position: Point,
    size: Size,
    velocity: Point,
    fov: f32,
    target: Option<String>,
    can_seek: fn(&GameEntity) -> bool,
}

fn seeker_state(ctx: &GameContext, slot: Slot) -> Option<SeekerState> {
    let entity = ctx.entities.get(slot)?;
    let seeker = entity.as_seeker()?;
    if seeker.sleep().asleep {
        return None;
    }
    let rect = ctx.rect_of(entity)?;
    Some(SeekerState {
        id: entity.id().to_owned(),
        position: rect.center(),
        size: rect.size(),
        velocity: seeker.movement().velocity,
        fov: seeker.fov(),
        target: seeker.seeking().target.clone(),
        can_seek: seeker.seeking().can_seek,
    })
}

/// Nearest entity within fov satisfying `can_seek`; ties go to the smaller id.
fn acquire_target(ctx: &mut GameContext, state: &SeekerState) -> Option<String> {
    let handles = ctx.grid.find_nearby_radius(state.position, state.fov);
    handles
        .into_iter()
        .filter_map(|handle| {
            let candidate = ctx.entities.get_by_index(HANDLE_INDEX, handle)?;
            if candidate.id() == state.id || !(state.can_seek)(candidate) {
                return None;
            }
            let distance = ctx.grid.rect(handle)?.center().distance_to(state.position);
            Some((distance, candidate.id().to_owned()))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, id)| id)
}

fn stop_seeking(ctx: &mut GameContext, slot: Slot) {
    if let Some(seeker) = ctx.entities.get_mut(slot).and_then(GameEntity::as_seeker_mut) {
        seeker.seeking_mut().target = None;
        let (core, movement) = seeker.parts_mut();
        movement.velocity = Point::ZERO;
        core.path = None;
    }
}

fn gather(ctx: &mut GameContext, slot: Slot) -> Option<PathRequest> {
    let state = seeker_state(ctx, slot)?;

    let target_id = match &state.target {
        None => {
            let acquired = acquire_target(ctx, &state);
            if let Some(seeker) = ctx.entities.get_mut(slot).and_then(GameEntity::as_seeker_mut) {
                seeker.seeking_mut().target = acquired.clone();
            }
            acquired?
        }
        Some(id) => {
            let keep = ctx.entity(id).is_some_and(|target| {
                (state.can_seek)(target)
                    && ctx
                        .position_of(target)
                        .is_some_and(|p| p.distance_to(state.position) <= state.fov)
            });
            if !keep {
                stop_seeking(ctx, slot);
                return None;
            }
            id.clone()
        }
    };

    let goal = ctx.entity(&target_id).and_then(|t| ctx.position_of(t))?.round();
    let start = state.position.round();
    let grid = local_grid(ctx, &state);

    Some(PathRequest {
        slot,
        position: state.position,
        velocity: state.velocity,
        grid,
        start: (start.x as i32, start.y as i32),
        goal: (goal.x as i32, goal.y as i32),
    })
}

/// Walkability of the cells around a seeker, bounded by its field of view.
fn local_grid(ctx: &mut GameContext, state: &SeekerState) -> LocalGrid {
    let bounds = Bounds::new(
        (state.position.x - state.fov).floor() as i32,
        (state.position.y - state.fov).floor() as i32,
        (state.position.x + state.fov).ceil() as i32,
        (state.position.y + state.fov).ceil() as i32,
    );
    let mut grid = LocalGrid::new(bounds);

    for (x, y) in bounds.cells() {
        let point = Point::new(x as f32, y as f32);
        if !ctx.terrain.in_bounds(x, y) || !ctx.terrain.get_cell_at(point).is_passable() {
            grid.set_blocked(x, y, true);
        }
    }

    let area = Rect::new(
        (bounds.min_x + bounds.max_x) as f32 / 2.0,
        (bounds.min_y + bounds.max_y) as f32 / 2.0,
        bounds.width() as f32,
        bounds.height() as f32,
    );
    let entities = &ctx.entities;
    let obstacles: Vec<Rect> = ctx
        .grid
        .find_nearby_filtered(area.center(), area.size(), |handle, _| {
            entities
                .get_by_index(HANDLE_INDEX, handle)
                .is_some_and(GameEntity::is_obstacle)
        })
        .into_iter()
        .filter_map(|handle| ctx.grid.rect(handle))
        .collect();

    for obstacle in obstacles {
        let (min, max) = (obstacle.min(), obstacle.max());
        let covered = Bounds::new(
            min.x.floor() as i32,
            min.y.floor() as i32,
            max.x.ceil() as i32,
            max.y.ceil() as i32,
        );
        for (x, y) in covered.cells() {
            let footprint = Rect::centered(Point::new(x as f32, y as f32), state.size);
            if grid.contains(x, y) && footprint.overlaps(&obstacle) {
                grid.set_blocked(x, y, true);
            }
        }
    }
    grid
}

fn apply_outcome(ctx: &mut GameContext, outcome: PathOutcome) {
    let Some(seeker) = ctx.entities.get_mut(outcome.slot).and_then(GameEntity::as_seeker_mut) else {
        return;
    };
    let (core, movement) = seeker.parts_mut();

    match outcome.result {
        Err(err) => {
            debug!(seeker = %core.id, %err, "pathing failed, keeping velocity");
            core.path = None;
        }
        Ok(path) if path.is_empty() => {
            movement.velocity = Point::ZERO;
            core.path = None;
        }
        Ok(path) => {
            let points: Vec<Point> = path.iter().map(|&(x, y)| Point::new(x as f32, y as f32)).collect();
            let next = points[0];
            let steering = outcome
                .velocity
                .add(next.sub(outcome.position))
                .with_magnitude(1.0);
            movement.velocity = steering;
            core.face(steering.x);
            core.path = Some(points);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Orientation;
    use crate::config::WorldConfig;
    use crate::context::test_support::*;
    use crate::systems::movement::apply_movement;
    use crate::systems::sleep::apply_sleep;

    fn seeker_view(ctx: &GameContext, id: &str) -> (Option<String>, Point, Option<Vec<Point>>) {
        let seeker = ctx.entity(id).and_then(|e| e.as_seeker()).unwrap();
        (
            seeker.seeking().target.clone(),
            seeker.movement().velocity,
            seeker.core().path.clone(),
        )
    }

    #[test]
    fn test_first_step_moves_toward_target() {
        let mut ctx = flat_context(WorldConfig::default());
        place_monster(&mut ctx, "m1", Point::new(0.0, 0.0), 5.0);
        place_player(&mut ctx, "p1", Point::new(3.0, 0.0));

        apply_seeking(&mut ctx);
        let (target, velocity, path) = seeker_view(&ctx, "m1");
        assert_eq!(target.as_deref(), Some("p1"));
        assert!(velocity.x > 0.0);
        assert_eq!(path.unwrap().last(), Some(&Point::new(3.0, 0.0)));

        apply_movement(&mut ctx, 100.0);
        let pos = ctx.position_of(ctx.entity("m1").unwrap()).unwrap();
        assert!(pos.x > 0.0);
    }

    #[test]
    fn test_no_candidate_leaves_velocity_alone() {
        let mut ctx = flat_context(WorldConfig::default());
        place_monster(&mut ctx, "m1", Point::new(5.0, 5.0), 5.0);
        place_monster(&mut ctx, "m2", Point::new(6.0, 5.0), 5.0);
        place_player(&mut ctx, "far", Point::new(20.0, 20.0));
        {
            let seeker = ctx.entity_mut("m1").and_then(GameEntity::as_seeker_mut).unwrap();
            seeker.parts_mut().1.velocity = Point::new(0.0, 1.0);
        }

        apply_seeking(&mut ctx);
        let (target, velocity, _) = seeker_view(&ctx, "m1");
        assert!(target.is_none());
        assert_eq!(velocity, Point::new(0.0, 1.0));
    }

    #[test]
    fn test_picks_nearest_target() {
        let mut ctx = flat_context(WorldConfig::default());
        place_monster(&mut ctx, "m1", Point::new(10.0, 10.0), 12.0);
        place_player(&mut ctx, "far", Point::new(18.0, 10.0));
        place_player(&mut ctx, "near", Point::new(7.0, 10.0));

        apply_seeking(&mut ctx);
        let (target, velocity, _) = seeker_view(&ctx, "m1");
        assert_eq!(target.as_deref(), Some("near"));
        assert!(velocity.x < 0.0);
        let seeker = ctx.entity("m1").unwrap();
        assert_eq!(seeker.core().orientation, Orientation::Left);
    }

    #[test]
    fn test_gives_up_when_target_leaves() {
        let mut ctx = flat_context(WorldConfig::default());
        place_monster(&mut ctx, "m1", Point::new(5.0, 5.0), 5.0);
        place_player(&mut ctx, "p1", Point::new(7.0, 5.0));
        apply_seeking(&mut ctx);
        assert!(seeker_view(&ctx, "m1").0.is_some());

        ctx.remove_entity("p1");
        apply_seeking(&mut ctx);
        let (target, velocity, path) = seeker_view(&ctx, "m1");
        assert!(target.is_none());
        assert_eq!(velocity, Point::ZERO);
        assert!(path.is_none());
    }

    #[test]
    fn test_gives_up_when_target_out_of_reach() {
        let mut ctx = flat_context(WorldConfig::default());
        place_monster(&mut ctx, "m1", Point::new(5.0, 5.0), 5.0);
        place_player(&mut ctx, "p1", Point::new(7.0, 5.0));
        apply_seeking(&mut ctx);

        let handle = ctx.entity("p1").unwrap().handle();
        ctx.grid.move_to(handle, Point::new(20.0, 5.0));
        apply_seeking(&mut ctx);
        let (target, velocity, _) = seeker_view(&ctx, "m1");
        assert!(target.is_none());
        assert_eq!(velocity, Point::ZERO);
    }

    #[test]
    fn test_asleep_seeker_is_skipped() {
        let mut ctx = flat_context(WorldConfig::default());
        place_monster(&mut ctx, "m1", Point::new(5.0, 5.0), 5.0);
        place_player(&mut ctx, "p1", Point::new(7.0, 5.0));
        ctx.entity_mut("m1")
            .and_then(GameEntity::as_seeker_mut)
            .unwrap()
            .sleep_mut()
            .asleep = true;

        apply_seeking(&mut ctx);
        assert!(seeker_view(&ctx, "m1").0.is_none());
    }

    #[test]
    fn test_path_cleared_once_asleep() {
        let mut ctx = flat_context(WorldConfig::default());
        place_monster(&mut ctx, "m1", Point::new(5.0, 5.0), 8.0);
        place_player(&mut ctx, "p1", Point::new(8.0, 5.0));
        apply_sleep(&mut ctx);
        apply_seeking(&mut ctx);
        let (target, velocity, path) = seeker_view(&ctx, "m1");
        assert!(path.is_some());

        let handle = ctx.entity("p1").unwrap().handle();
        ctx.grid.move_to(handle, Point::new(29.0, 29.0));
        for _ in 0..4 {
            apply_sleep(&mut ctx);
            apply_seeking(&mut ctx);
            assert!(ctx.entity("m1").and_then(|e| e.as_seeker()).unwrap().sleep().asleep);
            let (still_target, still_velocity, stale) = seeker_view(&ctx, "m1");
            assert!(stale.is_none());
            assert_eq!(still_target, target);
            assert_eq!(still_velocity, velocity);
        }

        let snapshot = crate::snapshot::Snapshot::build(&mut ctx);
        let dto = snapshot.view("p1").unwrap().entities.iter().find(|e| e.id == "m1");
        assert!(dto.map_or(true, |m| m.path.is_none()));
    }

    #[test]
    fn test_path_failure_keeps_velocity_and_spares_others() {
        let mut ctx = flat_context(WorldConfig::default());
        let failing = place_monster(&mut ctx, "m1", Point::new(5.0, 5.0), 5.0);
        place_monster(&mut ctx, "m2", Point::new(20.0, 20.0), 5.0);
        place_player(&mut ctx, "p1", Point::new(7.0, 5.0));
        place_player(&mut ctx, "p2", Point::new(22.0, 20.0));
        let kept = Point::new(0.0, -1.0);
        ctx.entity_mut("m1")
            .and_then(GameEntity::as_seeker_mut)
            .unwrap()
            .parts_mut()
            .1
            .velocity = kept;

        clear_paths(&mut ctx);
        let requests: Vec<PathRequest> = ctx
            .entities
            .filtered(ctx.seekers)
            .into_iter()
            .filter_map(|slot| gather(&mut ctx, slot))
            .collect();
        assert_eq!(requests.len(), 2);

        for mut outcome in solve_all(requests, ctx.config.heuristic_weight) {
            if outcome.slot == failing {
                outcome.result = Err(PathfindingError::GoalOutOfBounds { x: 99, y: 99 });
            }
            apply_outcome(&mut ctx, outcome);
        }

        let (_, velocity, path) = seeker_view(&ctx, "m1");
        assert_eq!(velocity, kept);
        assert!(path.is_none());

        let (target, velocity, path) = seeker_view(&ctx, "m2");
        assert_eq!(target.as_deref(), Some("p2"));
        assert!(velocity.x > 0.0);
        assert!(path.is_some());
    }

    #[test]
    fn test_paths_around_obstacle_wall() {
        let mut ctx = flat_context(WorldConfig::default());
        place_monster(&mut ctx, "m1", Point::new(5.0, 10.0), 8.0);
        place_player(&mut ctx, "p1", Point::new(9.0, 10.0));
        for y in 8..=12 {
            place_obstacle(&mut ctx, &format!("t{y}"), Point::new(7.0, y as f32));
        }

        apply_seeking(&mut ctx);
        let (_, _, path) = seeker_view(&ctx, "m1");
        let path = path.unwrap();
        assert_eq!(path.last(), Some(&Point::new(9.0, 10.0)));
        assert!(path.iter().all(|p| p.x != 7.0 || p.y < 8.0 || p.y > 12.0));
    }

    #[test]
    fn test_adjacent_target_steers_directly() {
        let mut ctx = flat_context(WorldConfig::default());
        place_monster(&mut ctx, "m1", Point::new(5.0, 5.0), 5.0);
        place_player(&mut ctx, "p1", Point::new(5.0, 6.0));

        apply_seeking(&mut ctx);
        let (_, velocity, _) = seeker_view(&ctx, "m1");
        assert!((velocity.y - 1.0).abs() < 1e-5);
        assert!(velocity.x.abs() < 1e-5);
    }
}

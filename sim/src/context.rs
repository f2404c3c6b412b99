//! The root aggregate of a running world.
//!
//! [`GameContext`] owns the entity store, the spatial grid, the terrain and the
//! world RNG. Entities enter and leave the world only through it so the store
//! and the grid never drift apart.

use crate::components::{
    seeks_players, Brand, EntityCore, GameEntity, Monster, Movement, Obstacle, Player, Seeking, Sleep,
};
use crate::config::WorldConfig;
use crate::error::{ConfigError, StoreError};
use crate::geometry::{Point, Rect, Size};
use crate::spatial::{GridHandle, SpatialHashGrid};
use crate::store::{FilterId, IndexedStore, Slot};
use crate::terrain::TerrainGenerator;
use bevy_ecs::prelude::*;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};
use uuid::Builder;

/// Unique index: entity id → entity.
pub const ID_INDEX: &str = "id";
/// Unique index: grid handle → entity.
pub const HANDLE_INDEX: &str = "handle";
/// Group: brand → entities.
pub const BRAND_GROUP: &str = "brand";

const PLAYER_SPRITES: [&str; 2] = ["adventurer", "enchantress"];
const MONSTER_SPRITE: &str = "zombie";
const OBSTACLE_SPRITE: &str = "tree";

/// Every entity occupies one cell.
pub const ENTITY_SIZE: Size = Size { w: 1.0, h: 1.0 };

const MAX_SPAWN_ATTEMPTS: usize = 1000;

/// Root aggregate: entities, spatial grid, terrain and world RNG.
#[derive(Resource)]
pub struct GameContext {
    pub config: WorldConfig,
    pub entities: IndexedStore<GameEntity>,
    pub grid: SpatialHashGrid,
    pub terrain: TerrainGenerator,
    pub rng: ChaCha8Rng,
    /// Live set of entities with movement.
    pub movers: FilterId,
    /// Live set of entities with seeking.
    pub seekers: FilterId,
}

impl GameContext {
    /// Empty world over noise terrain generated from the configured seed.
    pub fn new(config: WorldConfig) -> Result<Self, ConfigError> {
        let terrain = TerrainGenerator::new(
            config.width,
            config.height,
            config.chunk_size,
            config.seed,
            config.max_smoothing_passes,
        );
        Self::with_terrain(config, terrain)
    }

    /// Empty world over the given terrain.
    pub fn with_terrain(config: WorldConfig, terrain: TerrainGenerator) -> Result<Self, ConfigError> {
        config.validate()?;

        let grid = SpatialHashGrid::new(
            config.grid_dimensions,
            Point::ZERO,
            Point::new(config.width as f32, config.height as f32),
        );

        let mut entities = IndexedStore::new();
        entities
            .add_index(ID_INDEX, |e: &GameEntity| e.id().to_owned())
            .add_index(HANDLE_INDEX, |e: &GameEntity| e.handle())
            .add_group(BRAND_GROUP, |e: &GameEntity| e.brand());
        let movers = entities.create_filter(|e: &GameEntity| e.as_mobile().is_some());
        let seekers = entities.create_filter(|e: &GameEntity| e.as_seeker().is_some());

        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(u64::from(config.seed)),
            config,
            entities,
            grid,
            terrain,
            movers,
            seekers,
        })
    }

    /// Place the initial obstacles and monsters. Called once per world.
    pub fn populate(&mut self) {
        let obstacles = (0..self.config.max_obstacles)
            .filter(|_| self.spawn_obstacle().is_some())
            .count();
        let initial = self.config.initial_monsters.min(self.config.max_monsters);
        let monsters = (0..initial).filter(|_| self.spawn_monster().is_some()).count();
        info!(obstacles, monsters, "world populated");
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn entity(&self, id: &str) -> Option<&GameEntity> {
        self.entities.get_by_index(ID_INDEX, id)
    }

    pub fn entity_mut(&mut self, id: &str) -> Option<&mut GameEntity> {
        self.entities.get_by_index_mut(ID_INDEX, id)
    }

    pub fn entity_by_handle(&self, handle: GridHandle) -> Option<&GameEntity> {
        self.entities.get_by_index(HANDLE_INDEX, handle)
    }

    pub fn rect_of(&self, entity: &GameEntity) -> Option<Rect> {
        self.grid.rect(entity.handle())
    }

    pub fn position_of(&self, entity: &GameEntity) -> Option<Point> {
        self.rect_of(entity).map(|r| r.center())
    }

    pub fn by_brand(&self, brand: Brand) -> Vec<&GameEntity> {
        self.entities.get_by_group(BRAND_GROUP, brand)
    }

    pub fn count(&self, brand: Brand) -> usize {
        self.entities.group_slots(BRAND_GROUP, brand).len()
    }

    /// Whether `rect` overlaps any obstacle.
    pub fn collides_with_obstacle(&mut self, rect: Rect) -> bool {
        let entities = &self.entities;
        !self
            .grid
            .find_nearby_filtered(rect.center(), rect.size(), |handle, _| {
                entities
                    .get_by_index(HANDLE_INDEX, handle)
                    .is_some_and(GameEntity::is_obstacle)
            })
            .is_empty()
    }

    /// Passable terrain and no obstacle in a 1x1 box at `point`.
    pub fn is_cell_walkable(&mut self, point: Point) -> bool {
        self.terrain.get_cell_at(point).is_passable() && !self.collides_with_obstacle(Rect::centered(point, ENTITY_SIZE))
    }

    /// Random walkable integer cell inside the world, or `None` after a bounded search.
    pub fn find_valid_spawn_position(&mut self) -> Option<Point> {
        for _ in 0..MAX_SPAWN_ATTEMPTS {
            let x = self.rng.gen_range(0..self.config.width);
            let y = self.rng.gen_range(0..self.config.height);
            let candidate = Point::new(x as f32, y as f32);
            if self.is_cell_walkable(candidate) {
                return Some(candidate);
            }
        }
        warn!(attempts = MAX_SPAWN_ATTEMPTS, "no valid spawn position found");
        None
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Register a rectangle in the grid and the entity built around its handle.
    /// The grid entry is rolled back if the store rejects the entity.
    pub fn insert<F>(&mut self, position: Point, size: Size, build: F) -> Result<Slot, StoreError>
    where
        F: FnOnce(GridHandle) -> GameEntity,
    {
        let handle = self.grid.add(Rect::centered(position, size));
        self.entities.add(build(handle)).inspect_err(|_| {
            self.grid.remove(handle);
        })
    }

    /// Remove an entity by id from the store and the grid. Absent ids are a no-op.
    pub fn remove_entity(&mut self, id: &str) -> Option<GameEntity> {
        let entity = self.entities.delete_by_index(ID_INDEX, id)?;
        self.grid.remove(entity.handle());
        Some(entity)
    }

    fn next_uuid(&mut self) -> String {
        Builder::from_random_bytes(self.rng.gen()).into_uuid().to_string()
    }

    pub fn spawn_player(&mut self, id: &str) -> Option<Slot> {
        let position = self.find_valid_spawn_position()?;
        let sprite = PLAYER_SPRITES.choose(&mut self.rng).copied().unwrap_or(PLAYER_SPRITES[0]);
        let speed = self.config.player_speed;
        let fov = self.config.player_fov;

        let spawned = self.insert(position, ENTITY_SIZE, |handle| {
            GameEntity::Player(Player {
                core: EntityCore::new(id, sprite, handle),
                movement: Movement::new(speed),
                fov,
            })
        });
        match spawned {
            Ok(slot) => {
                info!(player = id, x = position.x, y = position.y, "player spawned");
                Some(slot)
            }
            Err(err) => {
                warn!(%err, "player not spawned");
                None
            }
        }
    }

    pub fn spawn_monster(&mut self) -> Option<Slot> {
        let position = self.find_valid_spawn_position()?;
        let id = self.next_uuid();
        let config = &self.config;
        let (speed, fov, distance) = (config.monster_speed, config.monster_fov, config.monster_sleep_distance);

        let slot = self
            .insert(position, ENTITY_SIZE, |handle| {
                GameEntity::Monster(Monster {
                    core: EntityCore::new(id.clone(), MONSTER_SPRITE, handle),
                    movement: Movement::new(speed),
                    fov,
                    seeking: Seeking::new(seeks_players),
                    sleep: Sleep { asleep: false, distance },
                })
            })
            .ok()?;
        debug!(monster = %id, x = position.x, y = position.y, "monster spawned");
        Some(slot)
    }

    pub fn spawn_obstacle(&mut self) -> Option<Slot> {
        let position = self.find_valid_spawn_position()?;
        let id = self.next_uuid();
        self.insert(position, ENTITY_SIZE, |handle| {
            GameEntity::Obstacle(Obstacle {
                core: EntityCore::new(id, OBSTACLE_SPRITE, handle),
            })
        })
        .ok()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::terrain::{HeightBucket, TemperatureBucket};

    pub fn flat(_: i32, _: i32) -> (HeightBucket, TemperatureBucket) {
        (HeightBucket::Ground, TemperatureBucket::Warm)
    }

    /// A context over all-ground terrain with no entities.
    pub fn flat_context(config: WorldConfig) -> GameContext {
        let terrain = TerrainGenerator::with_source(config.width, config.height, config.chunk_size, flat);
        GameContext::with_terrain(config, terrain).unwrap()
    }

    pub fn place_player(ctx: &mut GameContext, id: &str, at: Point) -> Slot {
        let (speed, fov) = (ctx.config.player_speed, ctx.config.player_fov);
        ctx.insert(at, ENTITY_SIZE, |handle| {
            GameEntity::Player(Player {
                core: EntityCore::new(id, "adventurer", handle),
                movement: Movement::new(speed),
                fov,
            })
        })
        .unwrap()
    }

    pub fn place_monster(ctx: &mut GameContext, id: &str, at: Point, fov: f32) -> Slot {
        let speed = ctx.config.monster_speed;
        let distance = ctx.config.monster_sleep_distance;
        ctx.insert(at, ENTITY_SIZE, |handle| {
            GameEntity::Monster(Monster {
                core: EntityCore::new(id, "zombie", handle),
                movement: Movement::new(speed),
                fov,
                seeking: Seeking::new(seeks_players),
                sleep: Sleep { asleep: false, distance },
            })
        })
        .unwrap()
    }

    pub fn place_obstacle(ctx: &mut GameContext, id: &str, at: Point) -> Slot {
        ctx.insert(at, ENTITY_SIZE, |handle| {
            GameEntity::Obstacle(Obstacle {
                core: EntityCore::new(id, "tree", handle),
            })
        })
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_populate_respects_caps() {
        let mut ctx = flat_context(WorldConfig::default());
        ctx.populate();
        assert_eq!(ctx.count(Brand::Obstacle), 10);
        assert_eq!(ctx.count(Brand::Monster), 1);
        assert_eq!(ctx.count(Brand::Player), 0);
        assert_eq!(ctx.grid.len(), ctx.entities.len());
        assert_eq!(ctx.entities.filtered(ctx.movers).len(), 1);
        assert_eq!(ctx.entities.filtered(ctx.seekers).len(), 1);
    }

    #[test]
    fn test_population_is_reproducible() {
        let positions = |ctx: &GameContext| {
            let mut v: Vec<(String, Point)> = ctx
                .entities
                .iter()
                .map(|e| (e.id().to_owned(), ctx.position_of(e).unwrap()))
                .collect();
            v.sort_by(|a, b| a.0.cmp(&b.0));
            v
        };
        let mut a = flat_context(WorldConfig::default());
        let mut b = flat_context(WorldConfig::default());
        a.populate();
        b.populate();
        assert_eq!(positions(&a), positions(&b));
    }

    #[test]
    fn test_spawn_positions_are_walkable_and_in_bounds() {
        let mut ctx = flat_context(WorldConfig::default());
        ctx.populate();
        for _ in 0..20 {
            let p = ctx.find_valid_spawn_position().unwrap();
            assert!(p.x >= 0.0 && p.x <= 29.0 && p.y >= 0.0 && p.y <= 29.0);
            assert!(ctx.is_cell_walkable(p));
        }
    }

    #[test]
    fn test_spawn_search_gives_up_on_all_sea() {
        fn sea(_: i32, _: i32) -> (crate::terrain::HeightBucket, crate::terrain::TemperatureBucket) {
            (crate::terrain::HeightBucket::Sea, crate::terrain::TemperatureBucket::Cold)
        }
        let config = WorldConfig::default();
        let terrain = TerrainGenerator::with_source(config.width, config.height, config.chunk_size, sea);
        let mut ctx = GameContext::with_terrain(config, terrain).unwrap();
        assert!(ctx.find_valid_spawn_position().is_none());
        assert!(ctx.spawn_player("p1").is_none());
    }

    #[test]
    fn test_generated_ids_are_random_uuids() {
        let mut ctx = flat_context(WorldConfig::default());
        let ids: Vec<String> = (0..3).map(|_| ctx.next_uuid()).collect();
        for id in &ids {
            let parsed = uuid::Uuid::parse_str(id).unwrap();
            assert_eq!(parsed.get_version_num(), 4);
        }
        assert_ne!(ids[0], ids[1]);

        let mut again = flat_context(WorldConfig::default());
        assert_eq!(again.next_uuid(), ids[0]);
    }

    #[test]
    fn test_obstacle_blocks_cell() {
        let mut ctx = flat_context(WorldConfig::default());
        place_obstacle(&mut ctx, "tree", Point::new(4.0, 4.0));
        assert!(!ctx.is_cell_walkable(Point::new(4.0, 4.0)));
        assert!(ctx.is_cell_walkable(Point::new(5.0, 4.0)));
    }

    #[test]
    fn test_remove_entity_clears_grid() {
        let mut ctx = flat_context(WorldConfig::default());
        place_player(&mut ctx, "p1", Point::new(2.0, 2.0));
        assert!(ctx.entity("p1").is_some());

        let removed = ctx.remove_entity("p1").unwrap();
        assert_eq!(removed.id(), "p1");
        assert!(ctx.grid.get(removed.handle()).is_none());
        assert!(ctx.remove_entity("p1").is_none());
        assert!(ctx.grid.is_empty());
    }

    #[test]
    fn test_duplicate_id_rolls_back_grid() {
        let mut ctx = flat_context(WorldConfig::default());
        place_player(&mut ctx, "p1", Point::new(2.0, 2.0));
        let err = ctx.insert(Point::new(3.0, 3.0), ENTITY_SIZE, |handle| {
            GameEntity::Obstacle(Obstacle {
                core: EntityCore::new("p1", "tree", handle),
            })
        });
        assert!(err.is_err());
        assert_eq!(ctx.grid.len(), 1);
    }
}

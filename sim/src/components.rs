//! Entity model for the world simulation.
//!
//! Every entity is one variant of [`GameEntity`], tagged by its [`Brand`].
//! Capabilities (movement, perception, seeking) are exposed through small traits
//! implemented by the variant structs and reached by matching on the variant.
//! Positions are not stored here: an entity owns a [`GridHandle`] and the
//! spatial grid holds its rectangle.

use crate::geometry::Point;
use crate::spatial::GridHandle;
use crate::store::StoreKey;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// TAGS
// ============================================================================

/// Discriminant identifying an entity's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Brand {
    Player,
    Monster,
    Obstacle,
}

impl Brand {
    pub fn as_str(self) -> &'static str {
        match self {
            Brand::Player => "player",
            Brand::Monster => "monster",
            Brand::Obstacle => "obstacle",
        }
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Brand> for StoreKey {
    fn from(brand: Brand) -> Self {
        StoreKey::from(brand.as_str())
    }
}

/// Facing direction, used by clients to flip sprites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Left,
    #[default]
    Right,
}

impl Orientation {
    /// Orientation implied by a horizontal component; `None` when it is zero.
    pub fn from_x(x: f32) -> Option<Self> {
        if x < 0.0 {
            Some(Orientation::Left)
        } else if x > 0.0 {
            Some(Orientation::Right)
        } else {
            None
        }
    }
}

// ============================================================================
// CAPABILITY DATA
// ============================================================================

/// Fields every entity carries.
#[derive(Debug, Clone)]
pub struct EntityCore {
    pub id: String,
    pub sprite_id: String,
    pub handle: GridHandle,
    pub orientation: Orientation,
    /// Path computed this tick, for debug display only.
    pub path: Option<Vec<Point>>,
}

impl EntityCore {
    pub fn new(id: impl Into<String>, sprite_id: impl Into<String>, handle: GridHandle) -> Self {
        Self {
            id: id.into(),
            sprite_id: sprite_id.into(),
            handle,
            orientation: Orientation::default(),
            path: None,
        }
    }

    /// Point the entity along the sign of `x`; unchanged when `x` is zero.
    pub fn face(&mut self, x: f32) {
        if let Some(orientation) = Orientation::from_x(x) {
            self.orientation = orientation;
        }
    }
}

/// Velocity direction plus scalar speed (units per second).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Movement {
    pub velocity: Point,
    pub speed: f32,
}

impl Movement {
    pub fn new(speed: f32) -> Self {
        Self {
            velocity: Point::ZERO,
            speed,
        }
    }
}

/// Predicate selecting which entities a seeker will pursue.
pub type SeekPredicate = fn(&GameEntity) -> bool;

/// Target pursuit state. The target is an id, re-resolved every tick.
#[derive(Debug, Clone)]
pub struct Seeking {
    pub target: Option<String>,
    pub can_seek: SeekPredicate,
}

impl Seeking {
    pub fn new(can_seek: SeekPredicate) -> Self {
        Self { target: None, can_seek }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sleep {
    pub asleep: bool,
    /// Player distance beyond which the entity sleeps.
    pub distance: f32,
}

/// Monsters pursue players.
pub fn seeks_players(candidate: &GameEntity) -> bool {
    candidate.brand() == Brand::Player
}

// ============================================================================
// CAPABILITY TRAITS
// ============================================================================

pub trait Mobile {
    fn core(&self) -> &EntityCore;
    fn movement(&self) -> &Movement;
    /// Split borrow of the shared core and the movement state.
    fn parts_mut(&mut self) -> (&mut EntityCore, &mut Movement);
}

pub trait Perceptive {
    fn fov(&self) -> f32;
}

pub trait Seeker: Mobile + Perceptive {
    fn seeking(&self) -> &Seeking;
    fn seeking_mut(&mut self) -> &mut Seeking;
    fn sleep(&self) -> &Sleep;
    fn sleep_mut(&mut self) -> &mut Sleep;
}

// ============================================================================
// VARIANTS
// ============================================================================

#[derive(Debug, Clone)]
pub struct Player {
    pub core: EntityCore,
    pub movement: Movement,
    pub fov: f32,
}

#[derive(Debug, Clone)]
pub struct Monster {
    pub core: EntityCore,
    pub movement: Movement,
    pub fov: f32,
    pub seeking: Seeking,
    pub sleep: Sleep,
}

#[derive(Debug, Clone)]
pub struct Obstacle {
    pub core: EntityCore,
}

impl Mobile for Player {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn movement(&self) -> &Movement {
        &self.movement
    }

    fn parts_mut(&mut self) -> (&mut EntityCore, &mut Movement) {
        (&mut self.core, &mut self.movement)
    }
}

impl Perceptive for Player {
    fn fov(&self) -> f32 {
        self.fov
    }
}

impl Mobile for Monster {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn movement(&self) -> &Movement {
        &self.movement
    }

    fn parts_mut(&mut self) -> (&mut EntityCore, &mut Movement) {
        (&mut self.core, &mut self.movement)
    }
}

impl Perceptive for Monster {
    fn fov(&self) -> f32 {
        self.fov
    }
}

impl Seeker for Monster {
    fn seeking(&self) -> &Seeking {
        &self.seeking
    }

    fn seeking_mut(&mut self) -> &mut Seeking {
        &mut self.seeking
    }

    fn sleep(&self) -> &Sleep {
        &self.sleep
    }

    fn sleep_mut(&mut self) -> &mut Sleep {
        &mut self.sleep
    }
}

/// A simulated entity.
#[derive(Debug, Clone)]
pub enum GameEntity {
    Player(Player),
    Monster(Monster),
    Obstacle(Obstacle),
}

impl GameEntity {
    pub fn brand(&self) -> Brand {
        match self {
            GameEntity::Player(_) => Brand::Player,
            GameEntity::Monster(_) => Brand::Monster,
            GameEntity::Obstacle(_) => Brand::Obstacle,
        }
    }

    pub fn core(&self) -> &EntityCore {
        match self {
            GameEntity::Player(p) => &p.core,
            GameEntity::Monster(m) => &m.core,
            GameEntity::Obstacle(o) => &o.core,
        }
    }

    pub fn core_mut(&mut self) -> &mut EntityCore {
        match self {
            GameEntity::Player(p) => &mut p.core,
            GameEntity::Monster(m) => &mut m.core,
            GameEntity::Obstacle(o) => &mut o.core,
        }
    }

    pub fn id(&self) -> &str {
        &self.core().id
    }

    pub fn handle(&self) -> GridHandle {
        self.core().handle
    }

    pub fn is_obstacle(&self) -> bool {
        matches!(self, GameEntity::Obstacle(_))
    }

    pub fn as_mobile(&self) -> Option<&dyn Mobile> {
        match self {
            GameEntity::Player(p) => Some(p),
            GameEntity::Monster(m) => Some(m),
            GameEntity::Obstacle(_) => None,
        }
    }

    pub fn as_mobile_mut(&mut self) -> Option<&mut dyn Mobile> {
        match self {
            GameEntity::Player(p) => Some(p),
            GameEntity::Monster(m) => Some(m),
            GameEntity::Obstacle(_) => None,
        }
    }

    pub fn as_perceptive(&self) -> Option<&dyn Perceptive> {
        match self {
            GameEntity::Player(p) => Some(p),
            GameEntity::Monster(m) => Some(m),
            GameEntity::Obstacle(_) => None,
        }
    }

    pub fn as_seeker(&self) -> Option<&dyn Seeker> {
        match self {
            GameEntity::Monster(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_seeker_mut(&mut self) -> Option<&mut dyn Seeker> {
        match self {
            GameEntity::Monster(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut Player> {
        match self {
            GameEntity::Player(p) => Some(p),
            _ => None,
        }
    }
}

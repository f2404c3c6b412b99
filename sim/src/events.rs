//! Event queue for externally produced intents.
//!
//! Producers (the transport layer) hold cloneable [`EventScheduler`]s and only
//! append. The tick drains the queue once, before any system runs, applying each
//! intent in FIFO order.

use crate::components::{Brand, GameEntity};
use crate::context::GameContext;
use crate::geometry::Point;
use bevy_ecs::prelude::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Pressed direction keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Directions {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl Directions {
    /// Unnormalized direction: right +x, left -x, up -y, down +y.
    pub fn to_vector(self) -> Point {
        let mut v = Point::ZERO;
        if self.right {
            v.x += 1.0;
        }
        if self.left {
            v.x -= 1.0;
        }
        if self.up {
            v.y -= 1.0;
        }
        if self.down {
            v.y += 1.0;
        }
        v
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePayload {
    pub player_id: String,
    pub directions: Directions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPayload {
    pub player_id: String,
}

/// Inbound intent, in its wire shape `{"type": ..., "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum GameEvent {
    #[serde(rename = "move")]
    Move(MovePayload),
    #[serde(rename = "player joined")]
    PlayerJoined(PlayerPayload),
    #[serde(rename = "player left")]
    PlayerLeft(PlayerPayload),
}

impl GameEvent {
    pub fn from_json_str(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    pub fn moved(player_id: impl Into<String>, directions: Directions) -> Self {
        GameEvent::Move(MovePayload {
            player_id: player_id.into(),
            directions,
        })
    }

    pub fn joined(player_id: impl Into<String>) -> Self {
        GameEvent::PlayerJoined(PlayerPayload {
            player_id: player_id.into(),
        })
    }

    pub fn left(player_id: impl Into<String>) -> Self {
        GameEvent::PlayerLeft(PlayerPayload {
            player_id: player_id.into(),
        })
    }
}

/// Cloneable producer handle. Never touches simulation state.
#[derive(Debug, Clone)]
pub struct EventScheduler {
    tx: Sender<GameEvent>,
}

impl EventScheduler {
    /// Append an intent. Returns `false` once the owning world is gone.
    pub fn schedule(&self, event: GameEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// FIFO intent buffer, drained once per tick.
#[derive(Resource, Debug)]
pub struct EventQueue {
    tx: Sender<GameEvent>,
    rx: Receiver<GameEvent>,
}

impl Default for EventQueue {
    fn default() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }
}

impl EventQueue {
    pub fn scheduler(&self) -> EventScheduler {
        EventScheduler { tx: self.tx.clone() }
    }

    pub fn schedule(&self, event: GameEvent) {
        // The queue holds its own receiver, so the channel cannot be disconnected.
        let _ = self.tx.send(event);
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Apply every intent queued when the drain starts. Intents scheduled while
    /// draining wait for the next tick. Returns the number applied.
    pub fn process(&self, ctx: &mut GameContext) -> usize {
        let pending = self.rx.len();
        let mut applied = 0;
        for _ in 0..pending {
            let Ok(event) = self.rx.try_recv() else {
                break;
            };
            apply_event(ctx, event);
            applied += 1;
        }
        applied
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Dispatch one intent to its handler.
pub fn apply_event(ctx: &mut GameContext, event: GameEvent) {
    match event {
        GameEvent::Move(payload) => on_player_movement(ctx, payload),
        GameEvent::PlayerJoined(payload) => on_player_joined(ctx, payload),
        GameEvent::PlayerLeft(payload) => on_player_left(ctx, payload),
    }
}

fn on_player_movement(ctx: &mut GameContext, MovePayload { player_id, directions }: MovePayload) {
    let Some(player) = ctx.entity_mut(&player_id).and_then(GameEntity::as_player_mut) else {
        debug!(player = %player_id, "move for unknown player ignored");
        return;
    };
    let velocity = directions.to_vector().with_magnitude(player.movement.speed);
    player.movement.velocity = velocity;
    player.core.face(velocity.x);
}

fn on_player_joined(ctx: &mut GameContext, PlayerPayload { player_id }: PlayerPayload) {
    if ctx.entity(&player_id).is_some() {
        warn!(player = %player_id, "duplicate join ignored");
        return;
    }
    if ctx.spawn_player(&player_id).is_some() {
        info!(player = %player_id, "player joined");
    }
}

fn on_player_left(ctx: &mut GameContext, PlayerPayload { player_id }: PlayerPayload) {
    match ctx.entity(&player_id).map(GameEntity::brand) {
        Some(Brand::Player) => {
            ctx.remove_entity(&player_id);
            info!(player = %player_id, "player left");
        }
        _ => debug!(player = %player_id, "leave for unknown player ignored"),
    }
}

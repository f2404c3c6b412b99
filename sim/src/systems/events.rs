//! Intent drain - applies queued intents before any other system runs.

use crate::context::GameContext;
use crate::events::EventQueue;
use bevy_ecs::prelude::*;
use tracing::trace;

pub fn event_system(queue: Res<EventQueue>, mut ctx: ResMut<GameContext>) {
    let applied = queue.process(&mut ctx);
    if applied > 0 {
        trace!(applied, "intents applied");
    }
}

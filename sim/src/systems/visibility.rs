//! Visibility system - builds the per-player snapshot at the end of a tick.

use crate::context::GameContext;
use crate::snapshot::Snapshot;
use bevy_ecs::prelude::*;

/// The snapshot produced by the most recent tick.
#[derive(Resource, Debug, Clone, Default)]
pub struct LatestSnapshot(pub Snapshot);

pub fn visibility_system(mut ctx: ResMut<GameContext>, mut latest: ResMut<LatestSnapshot>) {
    latest.0 = Snapshot::build(&mut ctx);
}

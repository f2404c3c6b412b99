//! Per-player visibility snapshots.
//!
//! Every tick each player receives the entities and terrain cells inside its
//! field of view. Snapshots are assembled fresh; there is no diffing here.

use crate::components::{Brand, GameEntity, Orientation};
use crate::context::GameContext;
use crate::geometry::{Point, Rect, Size};
use crate::terrain::MapCell;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Transport-safe projection of an entity. Velocity, seeking and sleep state stay internal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDto {
    pub id: String,
    pub brand: Brand,
    pub sprite_id: String,
    pub orientation: Orientation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Point>>,
    pub size: Size,
    pub position: Point,
}

impl EntityDto {
    pub fn project(entity: &GameEntity, rect: Rect) -> Self {
        let core = entity.core();
        Self {
            id: core.id.clone(),
            brand: entity.brand(),
            sprite_id: core.sprite_id.clone(),
            orientation: core.orientation,
            path: core.path.clone(),
            size: rect.size(),
            position: rect.center(),
        }
    }
}

/// What a single player can see this tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub cells: Vec<MapCell>,
    pub entities: Vec<EntityDto>,
}

/// Visible world state for every connected player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub field_of_view: BTreeMap<String, PlayerView>,
}

impl Snapshot {
    /// Build the snapshot from the current world state.
    ///
    /// Entity gathering uses the spatial grid and runs sequentially; terrain
    /// enumeration only reads the generator and runs in parallel when the
    /// `parallel` feature is enabled.
    pub fn build(ctx: &mut GameContext) -> Self {
        let margin = ctx.config.snapshot_cell_margin;
        let viewers: Vec<(String, Point, f32)> = ctx
            .by_brand(Brand::Player)
            .into_iter()
            .filter_map(|player| {
                let center = ctx.position_of(player)?;
                let fov = player.as_perceptive()?.fov();
                Some((player.id().to_owned(), center, fov))
            })
            .collect();

        let mut entity_views = Vec::with_capacity(viewers.len());
        for (_, center, fov) in &viewers {
            let handles = ctx.grid.find_nearby_radius(*center, *fov);
            let mut entities: Vec<EntityDto> = handles
                .into_iter()
                .filter_map(|handle| {
                    let entity = ctx.entity_by_handle(handle)?;
                    let rect = ctx.grid.rect(handle)?;
                    Some(EntityDto::project(entity, rect))
                })
                .collect();
            entities.sort_by(|a, b| a.id.cmp(&b.id));
            entity_views.push(entities);
        }

        let terrain = &ctx.terrain;
        let visible_cells = |(_, center, fov): &(String, Point, f32)| terrain.get_field_of_view(*center, fov + margin);

        #[cfg(feature = "parallel")]
        let cells: Vec<Vec<MapCell>> = viewers.par_iter().map(visible_cells).collect();

        #[cfg(not(feature = "parallel"))]
        let cells: Vec<Vec<MapCell>> = viewers.iter().map(visible_cells).collect();

        let field_of_view = viewers
            .into_iter()
            .zip(entity_views.into_iter().zip(cells))
            .map(|((id, _, _), (entities, cells))| (id, PlayerView { cells, entities }))
            .collect();

        Self { field_of_view }
    }

    pub fn view(&self, player_id: &str) -> Option<&PlayerView> {
        self.field_of_view.get(player_id)
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

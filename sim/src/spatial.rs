//! Spatial partitioning for efficient neighbor queries.
//!
//! A fixed-resolution uniform grid laid over the world rectangle. Items are
//! center-anchored rectangles registered into every cell their bounding box
//! touches, so queries cost O(cells touched × items per cell) rather than O(n).
//!
//! Items live in a generational arena owned by the grid; callers hold
//! [`GridHandle`]s and map them back to entities through a side index.

use crate::geometry::{Bounds, Point, Rect, Size};
use crate::store::StoreKey;

/// Generational handle to an item in the grid. Never embeds the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridHandle {
    index: u32,
    generation: u32,
}

impl From<GridHandle> for StoreKey {
    fn from(handle: GridHandle) -> Self {
        StoreKey::Uint((u64::from(handle.generation) << 32) | u64::from(handle.index))
    }
}

/// A rectangle registered in the grid together with the cells it occupies.
#[derive(Debug, Clone)]
pub struct GridItem {
    pub rect: Rect,
    /// Inclusive cell range currently holding this item.
    cells: Bounds,
    /// Stamp of the last query that visited this item.
    query_id: u64,
}

impl GridItem {
    pub fn cells(&self) -> Bounds {
        self.cells
    }

    pub fn center(&self) -> Point {
        self.rect.center()
    }
}

#[derive(Debug)]
struct ItemSlot {
    generation: u32,
    item: Option<GridItem>,
}

/// Grid-based spatial partitioning structure.
#[derive(Debug)]
pub struct SpatialHashGrid {
    /// Number of cells along x and y.
    columns: u32,
    rows: u32,
    start: Point,
    end: Point,
    /// Row-major buckets of handles.
    cells: Vec<Vec<GridHandle>>,
    items: Vec<ItemSlot>,
    free: Vec<u32>,
    /// Monotonic query counter used to dedup items spanning several cells.
    query_id: u64,
    len: usize,
}

impl SpatialHashGrid {
    /// Create a grid of `dimensions` cells covering the rectangle `start..end`.
    pub fn new(dimensions: (u32, u32), start: Point, end: Point) -> Self {
        let columns = dimensions.0.max(1);
        let rows = dimensions.1.max(1);
        Self {
            columns,
            rows,
            start,
            end,
            cells: vec![Vec::new(); (columns * rows) as usize],
            items: Vec::new(),
            free: Vec::new(),
            query_id: 0,
            len: 0,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Normalize a world position into a cell coordinate, clamped to the grid.
    pub fn cell_index(&self, position: Point) -> (i32, i32) {
        let span_x = (self.end.x - self.start.x).max(f32::EPSILON);
        let span_y = (self.end.y - self.start.y).max(f32::EPSILON);
        let nx = ((position.x - self.start.x) / span_x).clamp(0.0, 1.0);
        let ny = ((position.y - self.start.y) / span_y).clamp(0.0, 1.0);
        let cx = ((nx * self.columns as f32).floor() as i32).min(self.columns as i32 - 1);
        let cy = ((ny * self.rows as f32).floor() as i32).min(self.rows as i32 - 1);
        (cx, cy)
    }

    /// Inclusive range of cells touched by a rectangle's bounding box.
    pub fn cell_range(&self, rect: &Rect) -> Bounds {
        let (min_x, min_y) = self.cell_index(rect.min());
        let (max_x, max_y) = self.cell_index(rect.max());
        Bounds::new(min_x, min_y, max_x, max_y)
    }

    #[inline]
    fn bucket(&self, x: i32, y: i32) -> usize {
        (y as u32 * self.columns + x as u32) as usize
    }

    fn link(&mut self, handle: GridHandle, cells: Bounds) {
        for (x, y) in cells.cells() {
            let bucket = self.bucket(x, y);
            self.cells[bucket].push(handle);
        }
    }

    fn unlink(&mut self, handle: GridHandle, cells: Bounds) {
        for (x, y) in cells.cells() {
            let bucket = self.bucket(x, y);
            self.cells[bucket].retain(|h| *h != handle);
        }
    }

    /// Register a rectangle and return its handle.
    pub fn add(&mut self, rect: Rect) -> GridHandle {
        let cells = self.cell_range(&rect);
        let item = GridItem {
            rect,
            cells,
            query_id: 0,
        };
        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.items[index as usize];
                slot.item = Some(item);
                GridHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.items.push(ItemSlot {
                    generation: 0,
                    item: Some(item),
                });
                GridHandle {
                    index: (self.items.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        self.link(handle, cells);
        self.len += 1;
        handle
    }

    /// Unregister a handle from every cell it occupies. Stale handles are ignored.
    pub fn remove(&mut self, handle: GridHandle) -> Option<GridItem> {
        let slot = self.items.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let item = slot.item.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.unlink(handle, item.cells);
        self.len -= 1;
        Some(item)
    }

    pub fn get(&self, handle: GridHandle) -> Option<&GridItem> {
        let slot = self.items.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.item.as_ref()
    }

    pub fn rect(&self, handle: GridHandle) -> Option<Rect> {
        self.get(handle).map(|item| item.rect)
    }

    /// Recompute the cell range from the item's current rectangle and re-link
    /// only if it changed. Returns whether the membership changed.
    pub fn update(&mut self, handle: GridHandle) -> bool {
        let Some(item) = self.get(handle) else {
            return false;
        };
        let previous = item.cells;
        let cells = self.cell_range(&item.rect);
        if cells == previous {
            return false;
        }
        self.unlink(handle, previous);
        self.link(handle, cells);
        if let Some(item) = self.items[handle.index as usize].item.as_mut() {
            item.cells = cells;
        }
        true
    }

    /// Move an item's center and update its cell membership.
    pub fn move_to(&mut self, handle: GridHandle, center: Point) -> bool {
        let Some(slot) = self.items.get_mut(handle.index as usize) else {
            return false;
        };
        if slot.generation != handle.generation {
            return false;
        }
        let Some(item) = slot.item.as_mut() else {
            return false;
        };
        item.rect = item.rect.moved_to(center);
        self.update(handle)
    }

    /// Visit each item in the cells of `range` exactly once and keep those that
    /// satisfy `keep`.
    fn query<F>(&mut self, range: Bounds, mut keep: F) -> Vec<GridHandle>
    where
        F: FnMut(GridHandle, &GridItem) -> bool,
    {
        self.query_id += 1;
        let query_id = self.query_id;
        let mut found = Vec::new();

        for (x, y) in range.cells() {
            let bucket = (y as u32 * self.columns + x as u32) as usize;
            for &handle in &self.cells[bucket] {
                let Some(item) = self.items[handle.index as usize].item.as_mut() else {
                    continue;
                };
                if item.query_id == query_id {
                    continue;
                }
                item.query_id = query_id;
                if keep(handle, &*item) {
                    found.push(handle);
                }
            }
        }
        found
    }

    /// All items whose rectangle overlaps the box of `size` centered at `position`.
    pub fn find_nearby(&mut self, position: Point, size: Size) -> Vec<GridHandle> {
        self.find_nearby_filtered(position, size, |_, _| true)
    }

    /// Like [`find_nearby`](Self::find_nearby) with an extra predicate.
    pub fn find_nearby_filtered<F>(&mut self, position: Point, size: Size, mut predicate: F) -> Vec<GridHandle>
    where
        F: FnMut(GridHandle, &GridItem) -> bool,
    {
        let area = Rect::centered(position, size);
        let range = self.cell_range(&area);
        self.query(range, |handle, item| item.rect.overlaps(&area) && predicate(handle, item))
    }

    /// All items whose center lies within `radius` of `position`.
    pub fn find_nearby_radius(&mut self, position: Point, radius: f32) -> Vec<GridHandle> {
        let area = Rect::centered(position, Size::square(radius * 2.0));
        let range = self.cell_range(&area);
        self.query(range, |_, item| item.center().within(position, radius))
    }

    /// Items registered in a single cell (debugging/visualization).
    pub fn cell_count(&self, x: i32, y: i32) -> usize {
        if x < 0 || y < 0 || x >= self.columns as i32 || y >= self.rows as i32 {
            return 0;
        }
        self.cells[self.bucket(x, y)].len()
    }
}

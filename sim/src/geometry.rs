//! Small 2D geometry vocabulary shared by the grid, terrain and systems.
//!
//! Rectangles are center-anchored: `x`/`y` is the center, `w`/`h` the full extent.

use serde::{Deserialize, Serialize};

/// A point or vector in world units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn add(self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn magnitude(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    /// Rescale to the given length. The zero vector stays zero.
    pub fn with_magnitude(self, magnitude: f32) -> Point {
        let mag = self.magnitude();
        if mag < 0.0001 {
            Point::ZERO
        } else {
            Point::new(self.x / mag * magnitude, self.y / mag * magnitude)
        }
    }

    pub fn distance_to(self, other: Point) -> f32 {
        self.sub(other).magnitude()
    }

    /// Squared-distance containment check, avoids the sqrt.
    #[inline]
    pub fn within(self, other: Point, radius: f32) -> bool {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy <= radius * radius
    }

    pub fn round(self) -> Point {
        Point::new(self.x.round(), self.y.round())
    }
}

/// Width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub w: f32,
    pub h: f32,
}

impl Size {
    pub fn new(w: f32, h: f32) -> Self {
        Self { w, h }
    }

    pub fn square(side: f32) -> Self {
        Self { w: side, h: side }
    }
}

/// Center-anchored axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn centered(center: Point, size: Size) -> Self {
        Self::new(center.x, center.y, size.w, size.h)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.w, self.h)
    }

    pub fn min(&self) -> Point {
        Point::new(self.x - self.w / 2.0, self.y - self.h / 2.0)
    }

    pub fn max(&self) -> Point {
        Point::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Strict overlap; rectangles that only touch along an edge do not collide.
    pub fn overlaps(&self, other: &Rect) -> bool {
        let (a_min, a_max) = (self.min(), self.max());
        let (b_min, b_max) = (other.min(), other.max());
        a_min.x < b_max.x && a_max.x > b_min.x && a_min.y < b_max.y && a_max.y > b_min.y
    }

    pub fn moved_to(&self, center: Point) -> Rect {
        Rect::new(center.x, center.y, self.w, self.h)
    }
}

/// Inclusive integer bounds, used for cell ranges on the grid and terrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl Bounds {
    pub fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn width(&self) -> i32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> i32 {
        self.max_y - self.min_y + 1
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Iterate every (x, y) in row-major order.
    pub fn cells(self) -> impl Iterator<Item = (i32, i32)> {
        let Bounds { min_x, min_y, max_x, max_y } = self;
        (min_y..=max_y).flat_map(move |y| (min_x..=max_x).map(move |x| (x, y)))
    }
}

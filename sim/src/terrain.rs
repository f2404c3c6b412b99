//! Terrain system - chunked procedural map of height and temperature buckets.
//!
//! Cells are produced lazily, one fixed-size square chunk at a time, from two
//! coherent-noise channels and memoized by chunk origin for the lifetime of the
//! generator. The height channel of a noise chunk is smoothed so adjacent cells
//! never differ by more than one level (within a chunk; seams between chunks
//! are left as they are).

use crate::geometry::Point;
use noise::{NoiseFn, OpenSimplex};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Height level of a cell. Only `Sea` is impassable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum HeightBucket {
    Sea = 0,
    Beach = 1,
    Ground = 2,
    Rock = 3,
}

impl HeightBucket {
    pub fn is_passable(self) -> bool {
        self != HeightBucket::Sea
    }

    fn from_level(level: u8) -> Self {
        match level {
            0 => HeightBucket::Sea,
            1 => HeightBucket::Beach,
            2 => HeightBucket::Ground,
            _ => HeightBucket::Rock,
        }
    }
}

impl From<HeightBucket> for u8 {
    fn from(bucket: HeightBucket) -> Self {
        bucket as u8
    }
}

impl TryFrom<u8> for HeightBucket {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0..=3 => Ok(HeightBucket::from_level(value)),
            other => Err(format!("invalid height bucket {other}")),
        }
    }
}

/// Temperature band of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum TemperatureBucket {
    Cold = 0,
    Warm = 1,
    Hot = 2,
}

impl From<TemperatureBucket> for u8 {
    fn from(bucket: TemperatureBucket) -> Self {
        bucket as u8
    }
}

impl TryFrom<u8> for TemperatureBucket {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TemperatureBucket::Cold),
            1 => Ok(TemperatureBucket::Warm),
            2 => Ok(TemperatureBucket::Hot),
            other => Err(format!("invalid temperature bucket {other}")),
        }
    }
}

/// Integer grid coordinate of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellPosition {
    pub x: i32,
    pub y: i32,
}

/// A single generated terrain cell. Immutable once generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapCell {
    pub height: HeightBucket,
    pub temperature: TemperatureBucket,
    pub position: CellPosition,
}

impl MapCell {
    pub fn is_passable(&self) -> bool {
        self.height.is_passable()
    }

    pub fn center(&self) -> Point {
        Point::new(self.position.x as f32, self.position.y as f32)
    }
}

// ============================================================================
// Noise sampling
// ============================================================================

/// Normalized noise → bucket, sampled every 5% of the [0, 1] range.
const HEIGHT_TABLE: [HeightBucket; 21] = {
    use HeightBucket::*;
    [
        Sea, Sea, Sea, Sea, Sea, Sea, Sea, Sea, Sea, // 0..=40
        Beach, Beach, // 45, 50
        Ground, Ground, Ground, Ground, Ground, Ground, Ground, Ground, Ground, Ground, // 55..=100
    ]
};

const TEMPERATURE_TABLE: [TemperatureBucket; 21] = {
    use TemperatureBucket::*;
    [
        Cold, Cold, Cold, Cold, Cold, // 0..=20
        Warm, Warm, Warm, Warm, Warm, Warm, Warm, Warm, Warm, Warm, // 25..=70
        Hot, Hot, Hot, Hot, Hot, Hot, // 75..=100
    ]
};

/// Octave parameters for one noise channel.
#[derive(Debug, Clone, Copy)]
struct NoiseChannel {
    frequency: f64,
    octaves: u32,
}

const HEIGHT_CHANNEL: NoiseChannel = NoiseChannel {
    frequency: 0.08,
    octaves: 4,
};

const TEMPERATURE_CHANNEL: NoiseChannel = NoiseChannel {
    frequency: 0.02,
    octaves: 1,
};

const BASE_AMPLITUDE: f64 = 2.0;
const PERSISTENCE: f64 = 0.5;

impl NoiseChannel {
    /// Fractal sum at an integer coordinate, normalized and clamped to [-1, 1].
    fn sample(&self, noise: &OpenSimplex, x: i32, y: i32) -> f64 {
        let mut value = 0.0;
        for octave in 0..self.octaves {
            let freq = self.frequency * 2f64.powi(octave as i32);
            let n = noise.get([x as f64 * freq, y as f64 * freq]);
            value += n * BASE_AMPLITUDE * PERSISTENCE.powi(octave as i32);
        }
        let normalizer = 2.0 - 1.0 / 2f64.powi(self.octaves.saturating_sub(1) as i32);
        (value / normalizer).clamp(-1.0, 1.0)
    }
}

/// Map a value in [-1, 1] to a 21-entry lookup table index.
fn table_index(n: f64) -> usize {
    let normalized = (n.clamp(-1.0, 1.0) + 1.0) / 2.0;
    ((normalized * 20.0).round() as usize).min(20)
}

// ============================================================================
// Smoothing
// ============================================================================

/// Outcome of smoothing one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SmoothingReport {
    /// Full passes executed.
    pub passes: u32,
    /// `true` if the last pass changed nothing.
    pub converged: bool,
}

/// Iteratively nudge heights so no 4-neighbor differs by more than one level.
///
/// Each pass reads from the previous pass's result; a cell moves one step toward
/// the first offending neighbor in top, bottom, left, right order. Stops once a
/// pass changes nothing or `max_passes` is reached.
pub fn smooth_heights(levels: &mut [u8], size: usize, max_passes: u32) -> SmoothingReport {
    let mut report = SmoothingReport::default();
    if size == 0 || levels.is_empty() {
        report.converged = true;
        return report;
    }
    let rows = levels.len() / size;

    while report.passes < max_passes {
        report.passes += 1;
        let mut changed = false;
        let current = levels.to_vec();

        for y in 0..rows {
            for x in 0..size {
                let index = y * size + x;
                let level = current[index];
                let neighbors = [
                    (y > 0).then(|| current[index - size]),
                    (y + 1 < rows).then(|| current[index + size]),
                    (x > 0).then(|| current[index - 1]),
                    (x + 1 < size).then(|| current[index + 1]),
                ];
                let offending = neighbors
                    .into_iter()
                    .flatten()
                    .find(|n| level.abs_diff(*n) > 1);
                if let Some(neighbor) = offending {
                    levels[index] = if level > neighbor { level - 1 } else { level + 1 };
                    changed = true;
                }
            }
        }

        if !changed {
            report.converged = true;
            break;
        }
    }
    report
}

// ============================================================================
// Chunks and generator
// ============================================================================

/// Custom terrain layout: cell coordinate → buckets.
pub type LayoutFn = fn(i32, i32) -> (HeightBucket, TemperatureBucket);

enum TerrainSource {
    Noise {
        height: OpenSimplex,
        temperature: OpenSimplex,
    },
    Layout(LayoutFn),
}

/// A generated square block of cells, row-major from its origin.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub origin: CellPosition,
    pub size: i32,
    pub cells: Vec<MapCell>,
    pub smoothing: SmoothingReport,
}

impl Chunk {
    fn cell(&self, x: i32, y: i32) -> MapCell {
        let index = ((y - self.origin.y) * self.size + (x - self.origin.x)) as usize;
        self.cells[index]
    }
}

/// Deterministic, chunk-cached terrain for one world.
pub struct TerrainGenerator {
    width: i32,
    height: i32,
    chunk_size: i32,
    max_smoothing_passes: u32,
    source: TerrainSource,
    chunks: RwLock<HashMap<(i32, i32), Arc<Chunk>>>,
}

impl fmt::Debug for TerrainGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerrainGenerator")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("chunk_size", &self.chunk_size)
            .field("cached_chunks", &self.chunk_count())
            .finish_non_exhaustive()
    }
}

impl TerrainGenerator {
    /// Noise-backed terrain. Height uses `seed`, temperature `seed + 1`.
    pub fn new(width: u32, height: u32, chunk_size: u32, seed: u32, max_smoothing_passes: u32) -> Self {
        Self::build(
            width,
            height,
            chunk_size,
            max_smoothing_passes,
            TerrainSource::Noise {
                height: OpenSimplex::new(seed),
                temperature: OpenSimplex::new(seed.wrapping_add(1)),
            },
        )
    }

    /// Terrain taken verbatim from a layout function (no smoothing).
    pub fn with_source(width: u32, height: u32, chunk_size: u32, layout: LayoutFn) -> Self {
        Self::build(width, height, chunk_size, 0, TerrainSource::Layout(layout))
    }

    fn build(width: u32, height: u32, chunk_size: u32, max_smoothing_passes: u32, source: TerrainSource) -> Self {
        Self {
            width: width as i32,
            height: height as i32,
            chunk_size: chunk_size.max(1) as i32,
            max_smoothing_passes,
            source,
            chunks: RwLock::new(HashMap::new()),
        }
    }

    pub fn width(&self) -> u32 {
        self.width as u32
    }

    pub fn height(&self) -> u32 {
        self.height as u32
    }

    /// Number of chunks generated so far.
    pub fn chunk_count(&self) -> usize {
        self.chunks.read().len()
    }

    fn generate_chunk(&self, origin: CellPosition) -> Chunk {
        let size = self.chunk_size;
        let coords = move || (0..size).flat_map(move |y| (0..size).map(move |x| (origin.x + x, origin.y + y)));

        let (heights, temperatures, smoothing): (Vec<HeightBucket>, Vec<TemperatureBucket>, SmoothingReport) =
            match &self.source {
                TerrainSource::Layout(layout) => {
                    let (heights, temperatures) = coords().map(|(x, y)| layout(x, y)).unzip();
                    let report = SmoothingReport {
                        passes: 0,
                        converged: true,
                    };
                    (heights, temperatures, report)
                }
                TerrainSource::Noise { height, temperature } => {
                    let mut levels: Vec<u8> = coords()
                        .map(|(x, y)| HEIGHT_TABLE[table_index(HEIGHT_CHANNEL.sample(height, x, y))] as u8)
                        .collect();
                    let report = smooth_heights(&mut levels, size as usize, self.max_smoothing_passes);
                    let heights = levels.into_iter().map(HeightBucket::from_level).collect();
                    let temperatures = coords()
                        .map(|(x, y)| TEMPERATURE_TABLE[table_index(TEMPERATURE_CHANNEL.sample(temperature, x, y))])
                        .collect();
                    (heights, temperatures, report)
                }
            };

        let cells = coords()
            .zip(heights.into_iter().zip(temperatures))
            .map(|((x, y), (height, temperature))| MapCell {
                height,
                temperature,
                position: CellPosition { x, y },
            })
            .collect();

        Chunk {
            origin,
            size,
            cells,
            smoothing,
        }
    }

    /// Fetch the chunk containing integer cell `(x, y)`, generating it on first use.
    pub fn chunk_for(&self, x: i32, y: i32) -> Arc<Chunk> {
        let key = (x.div_euclid(self.chunk_size), y.div_euclid(self.chunk_size));
        if let Some(chunk) = self.chunks.read().get(&key) {
            return Arc::clone(chunk);
        }

        let origin = CellPosition {
            x: key.0 * self.chunk_size,
            y: key.1 * self.chunk_size,
        };
        let generated = Arc::new(self.generate_chunk(origin));
        let mut chunks = self.chunks.write();
        Arc::clone(chunks.entry(key).or_insert(generated))
    }

    /// Cell containing `point` (coordinates are rounded to the nearest cell).
    pub fn get_cell_at(&self, point: Point) -> MapCell {
        let (x, y) = (point.x.round() as i32, point.y.round() as i32);
        self.chunk_for(x, y).cell(x, y)
    }

    fn clamp_to_map(&self, point: Point) -> (i32, i32) {
        (
            (point.x.round() as i32).clamp(0, (self.width - 1).max(0)),
            (point.y.round() as i32).clamp(0, (self.height - 1).max(0)),
        )
    }

    fn cells_inside(&self, min: (i32, i32), max: (i32, i32), fov: Option<(Point, f32)>) -> Vec<MapCell> {
        let mut cells = Vec::new();
        for y in min.1..=max.1 {
            for x in min.0..=max.0 {
                let visible = match fov {
                    Some((center, radius)) => {
                        Point::new(x as f32, y as f32).distance_to(center.round()) <= radius
                    }
                    None => true,
                };
                if visible {
                    cells.push(self.chunk_for(x, y).cell(x, y));
                }
            }
        }
        cells
    }

    /// All cells in the rectangle `min..=max`, clipped to the world.
    pub fn get_within_bounds(&self, min: Point, max: Point) -> Vec<MapCell> {
        self.cells_inside(self.clamp_to_map(min), self.clamp_to_map(max), None)
    }

    /// Cells within `radius` of `center`, clipped to the world.
    pub fn get_field_of_view(&self, center: Point, radius: f32) -> Vec<MapCell> {
        let offset = Point::new(radius, radius);
        let min = self.clamp_to_map(center.sub(offset));
        let max = self.clamp_to_map(center.add(offset));
        self.cells_inside(min, max, Some((center, radius)))
    }

    /// Whether an integer cell lies inside the world.
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }
}

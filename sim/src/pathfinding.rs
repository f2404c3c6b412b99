//! Weighted A* over a small local walkability grid.
//!
//! Seekers build a [`LocalGrid`] covering their field of view and search it with
//! 8-connected moves. Diagonal steps cannot cut past a blocked orthogonal cell.

use crate::error::PathfindingError;
use crate::geometry::Bounds;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

const STRAIGHT_COST: f32 = 1.0;
const DIAGONAL_COST: f32 = std::f32::consts::SQRT_2;

const NEIGHBORS: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

/// Walkability of the world cells inside `bounds`, in world coordinates.
#[derive(Debug, Clone)]
pub struct LocalGrid {
    bounds: Bounds,
    blocked: Vec<bool>,
}

impl LocalGrid {
    /// All cells open.
    pub fn new(bounds: Bounds) -> Self {
        let size = (bounds.width().max(0) * bounds.height().max(0)) as usize;
        Self {
            bounds,
            blocked: vec![false; size],
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.bounds.contains(x, y)
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        self.contains(x, y)
            .then(|| ((y - self.bounds.min_y) * self.bounds.width() + (x - self.bounds.min_x)) as usize)
    }

    pub fn set_blocked(&mut self, x: i32, y: i32, blocked: bool) {
        if let Some(i) = self.offset(x, y) {
            self.blocked[i] = blocked;
        }
    }

    /// Cells outside the grid count as blocked.
    pub fn is_blocked(&self, x: i32, y: i32) -> bool {
        self.offset(x, y).map_or(true, |i| self.blocked[i])
    }
}

/// Node in the A* open set.
#[derive(Debug, Clone, Copy)]
struct PathNode {
    cell: (i32, i32),
    f_cost: f32,
}

impl PartialEq for PathNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PathNode {}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap; ties broken by cell for determinism
        other
            .f_cost
            .partial_cmp(&self.f_cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.cell.cmp(&self.cell))
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Octile distance, admissible for 8-connected unit/√2 costs.
fn octile(a: (i32, i32), b: (i32, i32)) -> f32 {
    let dx = (a.0 - b.0).abs() as f32;
    let dy = (a.1 - b.1).abs() as f32;
    let (short, long) = if dx < dy { (dx, dy) } else { (dy, dx) };
    DIAGONAL_COST * short + STRAIGHT_COST * (long - short)
}

/// Find a path from `start` to `goal`.
///
/// The returned cells exclude `start` and include `goal`. An empty path means
/// either `start == goal` or the goal is unreachable. Start and goal are searched
/// even when marked blocked.
pub fn find_path(
    grid: &LocalGrid,
    start: (i32, i32),
    goal: (i32, i32),
    heuristic_weight: f32,
) -> Result<Vec<(i32, i32)>, PathfindingError> {
    let Some(start_index) = grid.offset(start.0, start.1) else {
        return Err(PathfindingError::StartOutOfBounds { x: start.0, y: start.1 });
    };
    let Some(goal_index) = grid.offset(goal.0, goal.1) else {
        return Err(PathfindingError::GoalOutOfBounds { x: goal.0, y: goal.1 });
    };
    if start == goal {
        return Ok(Vec::new());
    }

    let walkable = |cell: (i32, i32)| cell == start || cell == goal || !grid.is_blocked(cell.0, cell.1);

    let size = grid.blocked.len();
    let mut g_scores = vec![f32::INFINITY; size];
    let mut came_from: Vec<Option<(i32, i32)>> = vec![None; size];
    let mut closed = vec![false; size];
    let mut open_set = BinaryHeap::new();

    g_scores[start_index] = 0.0;
    open_set.push(PathNode {
        cell: start,
        f_cost: octile(start, goal) * heuristic_weight,
    });

    while let Some(PathNode { cell, .. }) = open_set.pop() {
        let Some(index) = grid.offset(cell.0, cell.1) else {
            continue;
        };
        if index == goal_index {
            return Ok(reconstruct_path(grid, &came_from, start, goal));
        }
        if closed[index] {
            continue;
        }
        closed[index] = true;

        for (dx, dy) in NEIGHBORS {
            let next = (cell.0 + dx, cell.1 + dy);
            let Some(next_index) = grid.offset(next.0, next.1) else {
                continue;
            };
            if closed[next_index] || !walkable(next) {
                continue;
            }
            let diagonal = dx != 0 && dy != 0;
            if diagonal && !(walkable((cell.0 + dx, cell.1)) && walkable((cell.0, cell.1 + dy))) {
                continue;
            }

            let step = if diagonal { DIAGONAL_COST } else { STRAIGHT_COST };
            let tentative_g = g_scores[index] + step;
            if tentative_g < g_scores[next_index] {
                g_scores[next_index] = tentative_g;
                came_from[next_index] = Some(cell);
                open_set.push(PathNode {
                    cell: next,
                    f_cost: tentative_g + octile(next, goal) * heuristic_weight,
                });
            }
        }
    }

    Ok(Vec::new()) // No path found
}

fn reconstruct_path(
    grid: &LocalGrid,
    came_from: &[Option<(i32, i32)>],
    start: (i32, i32),
    goal: (i32, i32),
) -> Vec<(i32, i32)> {
    let mut path = Vec::new();
    let mut current = goal;
    while current != start {
        path.push(current);
        let Some(previous) = grid.offset(current.0, current.1).and_then(|i| came_from[i]) else {
            break;
        };
        current = previous;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_grid() -> LocalGrid {
        LocalGrid::new(Bounds::new(0, 0, 9, 9))
    }

    #[test]
    fn test_straight_line() {
        let path = find_path(&open_grid(), (0, 0), (4, 0), 1.0).unwrap();
        assert_eq!(path, vec![(1, 0), (2, 0), (3, 0), (4, 0)]);
    }

    #[test]
    fn test_diagonal_shortcut() {
        let path = find_path(&open_grid(), (0, 0), (3, 3), 0.7).unwrap();
        assert_eq!(path, vec![(1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn test_same_cell_is_empty() {
        assert!(find_path(&open_grid(), (2, 2), (2, 2), 1.0).unwrap().is_empty());
    }

    #[test]
    fn test_routes_around_wall() {
        let mut grid = open_grid();
        for y in 0..9 {
            grid.set_blocked(3, y, true);
        }
        let path = find_path(&grid, (0, 0), (6, 0), 0.7).unwrap();
        assert_eq!(path.last(), Some(&(6, 0)));
        assert!(path.iter().all(|&(x, y)| !grid.is_blocked(x, y)));
        assert!(path.contains(&(3, 9)));
    }

    #[test]
    fn test_no_corner_cutting() {
        let mut grid = open_grid();
        grid.set_blocked(1, 0, true);
        let path = find_path(&grid, (0, 0), (1, 1), 1.0).unwrap();
        // Diagonal would clip the blocked (1, 0); go down then across.
        assert_eq!(path, vec![(0, 1), (1, 1)]);
    }

    #[test]
    fn test_unreachable_goal_is_empty() {
        let mut grid = open_grid();
        for (dx, dy) in NEIGHBORS {
            grid.set_blocked(5 + dx, 5 + dy, true);
        }
        assert!(find_path(&grid, (0, 0), (5, 5), 1.0).unwrap().is_empty());
    }

    #[test]
    fn test_blocked_goal_still_reached() {
        let mut grid = open_grid();
        grid.set_blocked(2, 0, true);
        let path = find_path(&grid, (0, 0), (2, 0), 1.0).unwrap();
        assert_eq!(path.last(), Some(&(2, 0)));
    }

    #[test]
    fn test_out_of_bounds_errors() {
        let grid = open_grid();
        assert_eq!(
            find_path(&grid, (-1, 0), (2, 2), 1.0),
            Err(PathfindingError::StartOutOfBounds { x: -1, y: 0 })
        );
        assert_eq!(
            find_path(&grid, (0, 0), (10, 2), 1.0),
            Err(PathfindingError::GoalOutOfBounds { x: 10, y: 2 })
        );
    }
}

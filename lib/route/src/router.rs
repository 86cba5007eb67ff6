//! The orthogonal router.
//!
//! Policy, in order:
//! 1. Try direct orthogonal routes (two L-shapes, two Z-shapes) between
//!    the port stubs; pick the clear one with the fewest direction
//!    changes, then shortest length.
//! 2. If every direct route hits an obstacle, detour around the nearer
//!    edge of the blocking obstacle, preferring the axis of greater
//!    source-to-target displacement.
//! 3. If the detour is also blocked, fall back to A* over a coarse
//!    routing grid with a turn penalty (so the grid route also favours
//!    fewer bends).
//!
//! All obstacle checks use bounds expanded by a margin, and "hit" means
//! crossing the interior; running along a padded boundary is fine.

use crate::path::{PortAnchor, RoutedPath};
use flowloom_core::{Point, Rect};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Router tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct RouterConfig {
    /// Length of the straight stub leaving each port.
    pub stub_length: f64,
    /// Margin added around obstacle bounds.
    pub obstacle_margin: f64,
    /// Corner radius passed through to the routed path.
    pub corner_radius: f64,
    /// Cell size for the A* fallback grid.
    pub grid_cell: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            stub_length: 16.0,
            obstacle_margin: 8.0,
            corner_radius: 6.0,
            grid_cell: 16.0,
        }
    }
}

/// Routes a connection from a source port to a target port.
///
/// `obstacles` are the bounds of intervening nodes; callers exclude the
/// endpoint nodes themselves. The returned path never crosses the
/// interior of a padded obstacle unless no such path exists at all (a
/// fully walled-in port), in which case the best direct candidate is
/// returned as a last resort.
#[must_use]
pub fn route(
    source: PortAnchor,
    target: PortAnchor,
    obstacles: &[Rect],
    config: &RouterConfig,
) -> RoutedPath {
    let padded: Vec<Rect> = obstacles
        .iter()
        .map(|r| r.expanded(config.obstacle_margin))
        .collect();

    let s = source.position;
    let t = target.position;
    let s1 = source.stub(config.stub_length);
    let t1 = target.stub(config.stub_length);

    let candidates = direct_candidates(s, s1, t1, t);
    if let Some(best) = pick_clear(&candidates, &padded, config.corner_radius) {
        return best;
    }

    // Detour around the first blocker of the dominant-axis candidate.
    let dominant_horizontal = (t1.x - s1.x).abs() >= (t1.y - s1.y).abs();
    let preferred = preferred_candidate(&candidates, dominant_horizontal);
    if let Some(blocker) = first_blocker(&preferred, &padded) {
        let detours = detour_candidates(s, s1, t1, t, &blocker, dominant_horizontal, config);
        if let Some(best) = pick_clear(&detours, &padded, config.corner_radius) {
            return best;
        }
    }

    if let Some(grid_path) = grid_route(s, s1, t1, t, &padded, config) {
        return grid_path;
    }

    // Walled in; return the preferred direct route so something draws.
    RoutedPath::new(preferred, config.corner_radius)
}

/// The four direct orthogonal candidates between the stubs.
fn direct_candidates(s: Point, s1: Point, t1: Point, t: Point) -> Vec<Vec<Point>> {
    let mid_x = (s1.x + t1.x) / 2.0;
    let mid_y = (s1.y + t1.y) / 2.0;
    vec![
        // Horizontal first, then vertical.
        vec![s, s1, Point::new(t1.x, s1.y), t1, t],
        // Vertical first, then horizontal.
        vec![s, s1, Point::new(s1.x, t1.y), t1, t],
        // Horizontal, vertical at the midpoint, horizontal.
        vec![
            s,
            s1,
            Point::new(mid_x, s1.y),
            Point::new(mid_x, t1.y),
            t1,
            t,
        ],
        // Vertical, horizontal at the midpoint, vertical.
        vec![
            s,
            s1,
            Point::new(s1.x, mid_y),
            Point::new(t1.x, mid_y),
            t1,
            t,
        ],
    ]
}

fn preferred_candidate(candidates: &[Vec<Point>], dominant_horizontal: bool) -> Vec<Point> {
    let index = if dominant_horizontal { 0 } else { 1 };
    candidates[index].clone()
}

/// Picks the clear candidate with the fewest bends, then shortest length.
fn pick_clear(
    candidates: &[Vec<Point>],
    padded: &[Rect],
    corner_radius: f64,
) -> Option<RoutedPath> {
    let mut best: Option<RoutedPath> = None;
    for waypoints in candidates {
        if first_blocker(waypoints, padded).is_some() {
            continue;
        }
        let path = RoutedPath::new(waypoints.clone(), corner_radius);
        let better = match &best {
            Some(current) => {
                path.bend_count() < current.bend_count()
                    || (path.bend_count() == current.bend_count()
                        && path.length() < current.length())
            }
            None => true,
        };
        if better {
            best = Some(path);
        }
    }
    best
}

/// Returns the first padded obstacle a candidate's segments cross.
fn first_blocker(waypoints: &[Point], padded: &[Rect]) -> Option<Rect> {
    for pair in waypoints.windows(2) {
        for rect in padded {
            if segment_crosses(rect, pair[0], pair[1]) {
                return Some(*rect);
            }
        }
    }
    None
}

/// Detour variants around either perpendicular edge of the blocker.
///
/// The variant hugging the edge nearer the straight line comes first, so
/// `pick_clear`'s tie-break prefers the nearer edge when both variants
/// are clear and equally shaped.
fn detour_candidates(
    s: Point,
    s1: Point,
    t1: Point,
    t: Point,
    blocker: &Rect,
    dominant_horizontal: bool,
    config: &RouterConfig,
) -> Vec<Vec<Point>> {
    let around = blocker.expanded(config.obstacle_margin);
    if dominant_horizontal {
        let over = vec![
            s,
            s1,
            Point::new(s1.x, around.y),
            Point::new(t1.x, around.y),
            t1,
            t,
        ];
        let under = vec![
            s,
            s1,
            Point::new(s1.x, around.bottom()),
            Point::new(t1.x, around.bottom()),
            t1,
            t,
        ];
        let mid = (s1.y + t1.y) / 2.0;
        if (around.y - mid).abs() <= (around.bottom() - mid).abs() {
            vec![over, under]
        } else {
            vec![under, over]
        }
    } else {
        let left = vec![
            s,
            s1,
            Point::new(around.x, s1.y),
            Point::new(around.x, t1.y),
            t1,
            t,
        ];
        let right = vec![
            s,
            s1,
            Point::new(around.right(), s1.y),
            Point::new(around.right(), t1.y),
            t1,
            t,
        ];
        let mid = (s1.x + t1.x) / 2.0;
        if (around.x - mid).abs() <= (around.right() - mid).abs() {
            vec![left, right]
        } else {
            vec![right, left]
        }
    }
}

/// Returns true if an axis-aligned segment crosses the rect interior.
/// Touching the boundary does not count.
fn segment_crosses(rect: &Rect, a: Point, b: Point) -> bool {
    const EPS: f64 = 1e-9;
    if (a.y - b.y).abs() < EPS {
        // Horizontal segment.
        let y = a.y;
        let (x0, x1) = (a.x.min(b.x), a.x.max(b.x));
        y > rect.y + EPS && y < rect.bottom() - EPS && x1 > rect.x + EPS && x0 < rect.right() - EPS
    } else if (a.x - b.x).abs() < EPS {
        // Vertical segment.
        let x = a.x;
        let (y0, y1) = (a.y.min(b.y), a.y.max(b.y));
        x > rect.x + EPS && x < rect.right() - EPS && y1 > rect.y + EPS && y0 < rect.bottom() - EPS
    } else {
        // Routed segments are always axis-aligned; treat anything else
        // conservatively as crossing.
        true
    }
}

/// A* over a coarse grid with a turn penalty.
fn grid_route(
    s: Point,
    s1: Point,
    t1: Point,
    t: Point,
    padded: &[Rect],
    config: &RouterConfig,
) -> Option<RoutedPath> {
    let cell = config.grid_cell.max(1.0);

    // Region covering stubs and every obstacle, with breathing room.
    let mut region = Rect::from_corners(s1, t1);
    for rect in padded {
        region = region.union(rect);
    }
    let region = region.expanded(cell * 4.0);

    let cols = (region.width / cell).ceil() as i64 + 1;
    let rows = (region.height / cell).ceil() as i64 + 1;
    if cols <= 0 || rows <= 0 || cols * rows > 250_000 {
        return None;
    }

    let to_cell = |p: Point| -> (i64, i64) {
        (
            (((p.x - region.x) / cell).floor()).clamp(0.0, (cols - 1) as f64) as i64,
            (((p.y - region.y) / cell).floor()).clamp(0.0, (rows - 1) as f64) as i64,
        )
    };
    let center = |c: (i64, i64)| -> Point {
        Point::new(
            region.x + (c.0 as f64 + 0.5) * cell,
            region.y + (c.1 as f64 + 0.5) * cell,
        )
    };
    let blocked = |c: (i64, i64)| -> bool {
        let p = center(c);
        padded.iter().any(|r| r.contains_interior(p))
    };

    let start = to_cell(s1);
    let goal = to_cell(t1);
    if blocked(start) || blocked(goal) {
        return None;
    }

    // State: (cell, incoming direction index). Direction 4 = none yet.
    const DIRS: [(i64, i64); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
    const TURN_PENALTY: u64 = 3;
    let heuristic = |c: (i64, i64)| -> u64 {
        ((c.0 - goal.0).unsigned_abs() + (c.1 - goal.1).unsigned_abs()) as u64
    };

    let mut open: BinaryHeap<Reverse<(u64, u64, (i64, i64), usize)>> = BinaryHeap::new();
    let mut best_cost: HashMap<((i64, i64), usize), u64> = HashMap::new();
    let mut came_from: HashMap<((i64, i64), usize), ((i64, i64), usize)> = HashMap::new();

    open.push(Reverse((heuristic(start), 0, start, 4)));
    best_cost.insert((start, 4), 0);

    let mut goal_state: Option<((i64, i64), usize)> = None;
    while let Some(Reverse((_, cost, cell_pos, dir))) = open.pop() {
        if best_cost.get(&(cell_pos, dir)).copied().unwrap_or(u64::MAX) < cost {
            continue;
        }
        if cell_pos == goal {
            goal_state = Some((cell_pos, dir));
            break;
        }
        for (next_dir, delta) in DIRS.iter().enumerate() {
            let next = (cell_pos.0 + delta.0, cell_pos.1 + delta.1);
            if next.0 < 0 || next.1 < 0 || next.0 >= cols || next.1 >= rows || blocked(next) {
                continue;
            }
            let step = 1 + if dir != 4 && dir != next_dir {
                TURN_PENALTY
            } else {
                0
            };
            let next_cost = cost + step;
            let key = (next, next_dir);
            if next_cost < best_cost.get(&key).copied().unwrap_or(u64::MAX) {
                best_cost.insert(key, next_cost);
                came_from.insert(key, (cell_pos, dir));
                open.push(Reverse((next_cost + heuristic(next), next_cost, next, next_dir)));
            }
        }
    }

    let mut state = goal_state?;
    let mut cells = vec![state.0];
    while let Some(previous) = came_from.get(&state) {
        cells.push(previous.0);
        state = *previous;
        if state.0 == start && state.1 == 4 {
            break;
        }
    }
    cells.reverse();

    let mut waypoints = vec![s, s1];
    let first = center(cells[0]);
    waypoints.push(Point::new(first.x, s1.y));
    for c in &cells {
        waypoints.push(center(*c));
    }
    let last = center(*cells.last().expect("non-empty path"));
    waypoints.push(Point::new(last.x, t1.y));
    waypoints.push(t1);
    waypoints.push(t);

    Some(RoutedPath::new(waypoints, config.corner_radius))
}

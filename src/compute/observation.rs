//! Observation encoder: grid world state to a fixed-length feature vector.
//!
//! Candidates are taken in the order forward, right, left. Feature layouts:
//!
//! - [`ObservationKind::Basic`]:
//!   `[danger_f, danger_r, danger_l, apple_distance, apple_angle, energy]`
//! - [`ObservationKind::TailReach`]:
//!   `[danger_f, danger_r, danger_l, apple_angle, length, reach_f, reach_r, reach_l]`
//!
//! In the tail-reach layout a candidate from which the tail cannot be reached
//! is always flagged as danger, even when the cell itself is free.

use std::collections::VecDeque;
use std::f32::consts::PI;

use super::grid::{Action, Cell, GridWorld};
use crate::schema::ObservationKind;

/// Distance of a cell the search has not visited.
const UNSEEN: u32 = u32::MAX;

/// Encode `world` using the `kind` layout.
pub fn encode(world: &GridWorld, kind: ObservationKind) -> Vec<f32> {
    let mut features = Vec::with_capacity(kind.feature_count());
    encode_into(world, kind, &mut features);
    features
}

/// Encode into a reusable buffer. The buffer is cleared first.
///
/// Allocates the search arena on every call; loops that encode many states
/// should hold an [`ObservationEncoder`] instead.
pub fn encode_into(world: &GridWorld, kind: ObservationKind, features: &mut Vec<f32>) {
    ObservationEncoder::new(kind).encode_into(world, features);
}

/// Encoder that keeps its reachability arena between calls.
///
/// The arena is resized to the board on demand, so one encoder can serve
/// worlds of different sizes.
#[derive(Debug)]
pub struct ObservationEncoder {
    kind: ObservationKind,
    search: ReachSearch,
}

impl ObservationEncoder {
    pub fn new(kind: ObservationKind) -> Self {
        Self {
            kind,
            search: ReachSearch::default(),
        }
    }

    pub fn kind(&self) -> ObservationKind {
        self.kind
    }

    /// Encode `world` into `features`, clearing the buffer first.
    pub fn encode_into(&mut self, world: &GridWorld, features: &mut Vec<f32>) {
        features.clear();
        let candidates = candidate_cells(world);
        let mut danger = candidates.map(|cell| danger_at(world, cell));

        match self.kind {
            ObservationKind::Basic => {
                features.extend_from_slice(&danger);
                features.push(apple_distance(world));
                features.push(apple_angle(world));
                features.push(world.energy() as f32 / world.energy_cap().max(1) as f32);
            }
            ObservationKind::TailReach => {
                self.search.prepare(world);
                let reach = candidates.map(|cell| self.search.reachability(world, cell));
                for (d, &r) in danger.iter_mut().zip(&reach) {
                    if r == 0.0 {
                        *d = 1.0;
                    }
                }
                features.extend_from_slice(&danger);
                features.push(apple_angle(world));
                features.push(world.len() as f32 / world.area() as f32);
                features.extend_from_slice(&reach);
            }
        }
    }
}

/// Cells reached by going forward, turning right and turning left.
pub fn candidate_cells(world: &GridWorld) -> [Cell; 3] {
    let head = world.head();
    let heading = world.direction();
    Action::CANDIDATE_MOVES.map(|action| head.offset(heading.apply(action)))
}

/// 1.0 if moving onto `cell` would end the episode by collision.
#[inline]
fn danger_at(world: &GridWorld, cell: Cell) -> f32 {
    if !world.in_bounds(cell) || world.hits_body(cell) {
        1.0
    } else {
        0.0
    }
}

/// Angle between the heading and the apple, in [-1, 1] (units of pi).
pub fn apple_angle(world: &GridWorld) -> f32 {
    let head = world.head();
    let apple = world.apple();
    let (hx, hy) = world.direction().delta();

    let to_apple = ((apple.y - head.y) as f32).atan2((apple.x - head.x) as f32);
    let heading = (hy as f32).atan2(hx as f32);
    wrap_angle(to_apple - heading) / PI
}

/// Wrap into (-pi, pi].
fn wrap_angle(mut angle: f32) -> f32 {
    if angle > PI {
        angle -= 2.0 * PI;
    } else if angle <= -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Euclidean head-to-apple distance over the board diagonal.
pub fn apple_distance(world: &GridWorld) -> f32 {
    let head = world.head();
    let apple = world.apple();
    let dx = (apple.x - head.x) as f32;
    let dy = (apple.y - head.y) as f32;
    (dx * dx + dy * dy).sqrt() / world.diagonal()
}

/// Tail reachability of `candidate`: 1.0 on the tail itself, 0.0 when the
/// cell is off the board, blocked, or cut off from the tail, otherwise the
/// inverse shortest-path length to the tail.
pub fn tail_reachability(world: &GridWorld, candidate: Cell) -> f32 {
    let mut search = ReachSearch::default();
    search.prepare(world);
    search.reachability(world, candidate)
}

/// Breadth-first search over cells indexed `y * width + x`. Every body
/// segment except the tail is an obstacle.
#[derive(Debug, Default)]
struct ReachSearch {
    /// Obstacles as `true`.
    blocked: Vec<bool>,
    dist: Vec<u32>,
    queue: VecDeque<usize>,
}

impl ReachSearch {
    /// Size the arena to `world` and mark its obstacles.
    fn prepare(&mut self, world: &GridWorld) {
        let area = world.area();
        self.blocked.clear();
        self.blocked.resize(area, false);
        self.dist.clear();
        self.dist.resize(area, UNSEEN);
        self.queue.clear();
        self.queue.reserve(area);

        let body = world.len().saturating_sub(1);
        for &cell in world.snake().iter().take(body) {
            self.blocked[world.index(cell)] = true;
        }
    }

    fn reachability(&mut self, world: &GridWorld, candidate: Cell) -> f32 {
        let goal = world.tail();
        if candidate == goal {
            return 1.0;
        }
        if !world.in_bounds(candidate) || self.blocked[world.index(candidate)] {
            return 0.0;
        }
        match self.path_length(world, candidate, goal) {
            Some(len) => 1.0 / len.max(1) as f32,
            None => 0.0,
        }
    }

    /// Moves from `start` to `goal`, or `None` when unreachable.
    fn path_length(&mut self, world: &GridWorld, start: Cell, goal: Cell) -> Option<u32> {
        self.dist.fill(UNSEEN);
        self.queue.clear();

        let width = world.width();
        let height = world.height();
        let goal_idx = world.index(goal);
        let start_idx = world.index(start);
        self.dist[start_idx] = 0;
        self.queue.push_back(start_idx);

        while let Some(idx) = self.queue.pop_front() {
            let d = self.dist[idx];
            if idx == goal_idx {
                return Some(d);
            }
            let (x, y) = (idx % width, idx / width);
            let neighbours = [
                (x > 0).then(|| idx - 1),
                (x + 1 < width).then(|| idx + 1),
                (y > 0).then(|| idx - width),
                (y + 1 < height).then(|| idx + width),
            ];
            for next in neighbours.into_iter().flatten() {
                if self.dist[next] == UNSEEN && !self.blocked[next] {
                    self.dist[next] = d + 1;
                    self.queue.push_back(next);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::grid::Direction;
    use crate::schema::GameConfig;
    use proptest::prelude::*;

    fn config(width: usize, height: usize) -> GameConfig {
        GameConfig {
            width,
            height,
            initial_energy: None,
            grow_on_eat: true,
        }
    }

    fn world(
        width: usize,
        height: usize,
        snake: &[(i32, i32)],
        direction: Direction,
        apple: (i32, i32),
    ) -> GridWorld {
        GridWorld::from_parts(
            &config(width, height),
            snake.iter().map(|&(x, y)| Cell::new(x, y)).collect(),
            direction,
            Cell::new(apple.0, apple.1),
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_feature_lengths() {
        let w = GridWorld::new(&config(10, 10), 3).unwrap();
        assert_eq!(encode(&w, ObservationKind::Basic).len(), 6);
        assert_eq!(encode(&w, ObservationKind::TailReach).len(), 8);
    }

    #[test]
    fn test_candidates_follow_turn_rule() {
        let w = world(6, 6, &[(2, 2), (1, 2), (0, 2)], Direction::Right, (5, 5));
        assert_eq!(
            candidate_cells(&w),
            [Cell::new(3, 2), Cell::new(2, 3), Cell::new(2, 1)]
        );

        let w = world(6, 6, &[(2, 2), (2, 3), (2, 4)], Direction::Up, (5, 5));
        assert_eq!(
            candidate_cells(&w),
            [Cell::new(2, 1), Cell::new(3, 2), Cell::new(1, 2)]
        );
    }

    #[test]
    fn test_apple_angle() {
        // Apple straight ahead.
        let w = world(8, 8, &[(2, 2), (1, 2), (0, 2)], Direction::Right, (6, 2));
        assert!(apple_angle(&w).abs() < 1e-6);

        // Apple directly behind: +pi, normalized to 1.
        let w = world(8, 8, &[(4, 2), (3, 2), (2, 2)], Direction::Right, (0, 2));
        assert!((apple_angle(&w) - 1.0).abs() < 1e-6);

        // Heading up, apple to the right: +pi/2 (y grows downward).
        let w = world(8, 8, &[(2, 4), (2, 5), (2, 6)], Direction::Up, (6, 4));
        assert!((apple_angle(&w) - 0.5).abs() < 1e-6);

        // Heading right, apple below: +pi/2 as well.
        let w = world(8, 8, &[(2, 2), (1, 2), (0, 2)], Direction::Right, (2, 6));
        assert!((apple_angle(&w) - 0.5).abs() < 1e-6);

        // Heading down, apple to the right: -pi/2.
        let w = world(8, 8, &[(2, 4), (2, 3), (2, 2)], Direction::Down, (6, 4));
        assert!((apple_angle(&w) + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_basic_features() {
        let w = world(6, 8, &[(2, 2), (1, 2), (0, 2)], Direction::Left, (5, 6));
        let f = encode(&w, ObservationKind::Basic);
        // Forward (1, 2) is the neck; right (2, 1) free; left (2, 3) free.
        assert_eq!(&f[..3], &[1.0, 0.0, 0.0]);
        assert!((f[3] - 5.0 / 10.0).abs() < 1e-6);
        assert!((f[5] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_wall_danger_and_reach() {
        // Head in the top-right corner heading right.
        let w = world(5, 5, &[(4, 0), (3, 0), (2, 0)], Direction::Right, (0, 4));
        let f = encode(&w, ObservationKind::TailReach);
        assert_eq!(f[0], 1.0); // forward: wall
        assert_eq!(f[1], 0.0); // right: (4, 1) free
        assert_eq!(f[2], 1.0); // left: wall
        assert_eq!(f[5], 0.0);
        assert_eq!(f[7], 0.0);
        // (4, 1) -> (3, 1) -> (2, 1) -> (2, 0): 3 moves.
        assert!((f[6] - 1.0 / 3.0).abs() < 1e-6);
        assert!((f[4] - 3.0 / 25.0).abs() < 1e-6);
    }

    #[test]
    fn test_candidate_on_tail() {
        let w = world(
            5,
            5,
            &[(1, 1), (2, 1), (2, 2), (1, 2)],
            Direction::Left,
            (4, 4),
        );
        // Left of heading Left is Down: (1, 2), the tail.
        assert_eq!(candidate_cells(&w)[2], Cell::new(1, 2));
        assert_eq!(tail_reachability(&w, Cell::new(1, 2)), 1.0);
        let f = encode(&w, ObservationKind::TailReach);
        assert_eq!(f[2], 0.0);
        assert_eq!(f[7], 1.0);
    }

    #[test]
    fn test_tail_ahead_and_path_round_corner() {
        // Body coils around the head; the tail sits at (1, 0).
        //
        //   . t o .
        //   . H o .
        //   . o o .
        //   . o o .
        let snake = [
            (1, 1),
            (1, 2),
            (1, 3),
            (2, 3),
            (2, 2),
            (2, 1),
            (2, 0),
            (1, 0),
        ];
        let w = world(4, 4, &snake, Direction::Up, (3, 3));
        assert_eq!(
            candidate_cells(&w),
            [Cell::new(1, 0), Cell::new(2, 1), Cell::new(0, 1)]
        );

        let f = encode(&w, ObservationKind::TailReach);
        // Forward is the tail: safe and trivially reachable.
        assert_eq!(f[0], 0.0);
        assert_eq!(f[5], 1.0);
        // Right is body.
        assert_eq!(f[1], 1.0);
        assert_eq!(f[6], 0.0);
        // Left: (0, 1) -> (0, 0) -> (1, 0).
        assert_eq!(f[2], 0.0);
        assert!((f[7] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_free_cell_without_path_to_tail_is_danger() {
        // The body seals off the left column and a pocket on the right;
        // the tail is only reachable from the bottom-right corner.
        //
        //   . o o o o
        //   . H . * o
        //   . o o . o
        //   . o o o o
        //   . o t . .
        let snake = [
            (1, 1),
            (1, 0),
            (2, 0),
            (3, 0),
            (4, 0),
            (4, 1),
            (4, 2),
            (4, 3),
            (3, 3),
            (2, 3),
            (2, 2),
            (1, 2),
            (1, 3),
            (1, 4),
            (2, 4),
        ];
        let w = world(5, 5, &snake, Direction::Down, (3, 1));
        assert_eq!(
            candidate_cells(&w),
            [Cell::new(1, 2), Cell::new(0, 1), Cell::new(2, 1)]
        );
        assert_eq!(tail_reachability(&w, Cell::new(0, 1)), 0.0);
        assert_eq!(tail_reachability(&w, Cell::new(2, 1)), 0.0);
        assert!((tail_reachability(&w, Cell::new(4, 4)) - 0.5).abs() < 1e-6);

        let f = encode(&w, ObservationKind::TailReach);
        assert_eq!(&f[..3], &[1.0, 1.0, 1.0]);
        assert_eq!(&f[5..], &[0.0, 0.0, 0.0]);

        // The basic layout only looks at the adjacent cells.
        let f = encode(&w, ObservationKind::Basic);
        assert_eq!(&f[..3], &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_encoder_reuses_arena_across_boards() {
        let sealed = [
            (1, 1),
            (1, 0),
            (2, 0),
            (3, 0),
            (4, 0),
            (4, 1),
            (4, 2),
            (4, 3),
            (3, 3),
            (2, 3),
            (2, 2),
            (1, 2),
            (1, 3),
            (1, 4),
            (2, 4),
        ];
        let worlds = [
            world(5, 5, &sealed, Direction::Down, (3, 1)),
            world(8, 3, &[(4, 1), (3, 1), (2, 1)], Direction::Right, (7, 2)),
            world(5, 5, &[(4, 0), (3, 0), (2, 0)], Direction::Right, (0, 4)),
            world(10, 10, &[(5, 5), (4, 5), (3, 5)], Direction::Up, (0, 0)),
        ];

        let mut encoder = ObservationEncoder::new(ObservationKind::TailReach);
        assert_eq!(encoder.kind(), ObservationKind::TailReach);
        let mut features = Vec::new();
        // Two passes so every board follows both a larger and a smaller one.
        for _ in 0..2 {
            for w in &worlds {
                encoder.encode_into(w, &mut features);
                assert_eq!(features, encode(w, ObservationKind::TailReach));
            }
        }
    }

    proptest! {
        #[test]
        fn prop_unreachable_implies_danger(seed in any::<u64>(), moves in prop::collection::vec(0usize..3, 0..120)) {
            let mut w = GridWorld::new(&config(7, 6), seed).unwrap();
            for m in moves {
                let f = encode(&w, ObservationKind::TailReach);
                for k in 0..3 {
                    prop_assert!((0.0..=1.0).contains(&f[5 + k]));
                    if f[5 + k] == 0.0 {
                        prop_assert_eq!(f[k], 1.0);
                    }
                }
                prop_assert!((-1.0..=1.0).contains(&f[3]));
                if w.step(Action::try_from(m).unwrap()).unwrap().terminal {
                    break;
                }
            }
        }
    }
}

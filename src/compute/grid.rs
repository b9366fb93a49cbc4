//! Deterministic snake grid world.
//!
//! The world is a step-based state machine: the only mutation after a reset
//! is [`GridWorld::step`]. Once a collision, starvation or a full board ends
//! the episode, further steps are no-ops.

use std::collections::VecDeque;
use std::fmt;

use rand::prelude::*;

use crate::schema::GameConfig;

/// Reward for eating an apple.
pub const APPLE_REWARD: f32 = 10.0;

/// Rejection-sampling attempts before apple placement falls back to
/// enumerating the free cells.
const APPLE_ATTEMPTS: usize = 64;

/// Board coordinate. `x` grows to the right, `y` grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Neighbouring cell one step in `direction`.
    #[inline]
    pub fn offset(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self::new(self.x + dx, self.y + dy)
    }

    #[inline]
    fn is_adjacent(self, other: Cell) -> bool {
        (self.x - other.x).abs() + (self.y - other.y).abs() == 1
    }
}

/// Heading of the snake, in clockwise order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    /// Rotate 90 degrees clockwise.
    #[inline]
    pub fn turn_right(self) -> Self {
        match self {
            Self::Up => Self::Right,
            Self::Right => Self::Down,
            Self::Down => Self::Left,
            Self::Left => Self::Up,
        }
    }

    /// Rotate 90 degrees counter-clockwise.
    #[inline]
    pub fn turn_left(self) -> Self {
        match self {
            Self::Up => Self::Left,
            Self::Left => Self::Down,
            Self::Down => Self::Right,
            Self::Right => Self::Up,
        }
    }

    /// Heading after taking `action`.
    #[inline]
    pub fn apply(self, action: Action) -> Self {
        match action {
            Action::TurnLeft => self.turn_left(),
            Action::Straight => self,
            Action::TurnRight => self.turn_right(),
        }
    }

    /// Unit move as `(dx, dy)`.
    #[inline]
    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Right => (1, 0),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
        }
    }
}

/// Relative move chosen by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    TurnLeft = 0,
    Straight = 1,
    TurnRight = 2,
}

impl Action {
    /// Candidate order used by the observation encoder.
    pub const CANDIDATE_MOVES: [Action; 3] =
        [Action::Straight, Action::TurnRight, Action::TurnLeft];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<usize> for Action {
    type Error = WorldError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::TurnLeft),
            1 => Ok(Self::Straight),
            2 => Ok(Self::TurnRight),
            other => Err(WorldError::InvalidAction(other)),
        }
    }
}

/// Why an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalReason {
    WallCollision,
    BodyCollision,
    Starvation,
    /// The snake covers every cell; nowhere left to place an apple.
    BoardFilled,
}

impl TerminalReason {
    /// Reward returned by the step that ended the episode.
    pub fn reward(self) -> f32 {
        match self {
            Self::WallCollision => -10.0,
            Self::BodyCollision => -30.0,
            Self::Starvation => -5.0,
            Self::BoardFilled => APPLE_REWARD,
        }
    }

    /// Short diagnostic label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WallCollision => "wall_collision",
            Self::BodyCollision => "body_collision",
            Self::Starvation => "starvation",
            Self::BoardFilled => "board_filled",
        }
    }
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub reward: f32,
    pub terminal: bool,
    /// Set whenever the world is terminal.
    pub reason: Option<TerminalReason>,
    /// An apple was eaten on this step.
    pub ate: bool,
}

/// Grid world errors.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("Action {0} is not one of 0 (left), 1 (straight), 2 (right)")]
    InvalidAction(usize),
    #[error("Board is fully occupied, no free cell for the apple")]
    BoardFull,
    #[error("Invalid world state: {0}")]
    InvalidState(String),
}

/// Snake game state.
#[derive(Debug, Clone)]
pub struct GridWorld {
    width: i32,
    height: i32,
    grow_on_eat: bool,
    energy_cap: u32,
    /// Head at the front.
    snake: VecDeque<Cell>,
    apple: Cell,
    direction: Direction,
    energy: i64,
    score: u32,
    steps: u64,
    terminal: Option<TerminalReason>,
    rng: StdRng,
}

impl GridWorld {
    /// Create a world in the canonical starting state.
    ///
    /// The config is expected to be validated; a board without room for the
    /// starting snake and an apple is still rejected.
    pub fn new(config: &GameConfig, seed: u64) -> Result<Self, WorldError> {
        let mut world = Self::empty(config, seed)?;
        world.reset()?;
        Ok(world)
    }

    /// Create a world from an explicit snake, heading and apple.
    pub fn from_parts(
        config: &GameConfig,
        snake: Vec<Cell>,
        direction: Direction,
        apple: Cell,
        seed: u64,
    ) -> Result<Self, WorldError> {
        let mut world = Self::empty(config, seed)?;

        if snake.is_empty() {
            return Err(WorldError::InvalidState("snake is empty".to_string()));
        }
        for (i, &cell) in snake.iter().enumerate() {
            if !world.in_bounds(cell) {
                return Err(WorldError::InvalidState(format!(
                    "segment {i} at ({}, {}) is out of bounds",
                    cell.x, cell.y
                )));
            }
            if snake[..i].contains(&cell) {
                return Err(WorldError::InvalidState(format!(
                    "segment {i} overlaps the body"
                )));
            }
            if i > 0 && !snake[i - 1].is_adjacent(cell) {
                return Err(WorldError::InvalidState(format!(
                    "segment {i} is not adjacent to segment {}",
                    i - 1
                )));
            }
        }
        if !world.in_bounds(apple) || snake.contains(&apple) {
            return Err(WorldError::InvalidState(
                "apple must be in bounds and off the snake".to_string(),
            ));
        }

        world.snake = snake.into();
        world.direction = direction;
        world.apple = apple;
        Ok(world)
    }

    fn empty(config: &GameConfig, seed: u64) -> Result<Self, WorldError> {
        let width = i32::try_from(config.width)
            .map_err(|_| WorldError::InvalidState("board width overflows".to_string()))?;
        let height = i32::try_from(config.height)
            .map_err(|_| WorldError::InvalidState("board height overflows".to_string()))?;
        if width <= 0 || height <= 0 {
            return Err(WorldError::InvalidState(format!(
                "board {width}x{height} has no cells"
            )));
        }

        let energy_cap = config.energy_cap();
        Ok(Self {
            width,
            height,
            grow_on_eat: config.grow_on_eat,
            energy_cap,
            snake: VecDeque::new(),
            apple: Cell::new(0, 0),
            direction: Direction::Right,
            energy: i64::from(energy_cap),
            score: 0,
            steps: 0,
            terminal: None,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Put a three-cell snake in the middle of the board facing right,
    /// restore energy, clear score and place a fresh apple.
    pub fn reset(&mut self) -> Result<(), WorldError> {
        let head = Cell::new(self.width / 2, self.height / 2);
        if head.x < 2 {
            return Err(WorldError::InvalidState(format!(
                "board width {} cannot hold the starting snake",
                self.width
            )));
        }

        self.snake.clear();
        self.snake.extend([
            head,
            Cell::new(head.x - 1, head.y),
            Cell::new(head.x - 2, head.y),
        ]);
        self.direction = Direction::Right;
        self.energy = i64::from(self.energy_cap);
        self.score = 0;
        self.steps = 0;
        self.terminal = None;
        self.place_apple()
    }

    /// Advance one step.
    pub fn step(&mut self, action: Action) -> Result<StepOutcome, WorldError> {
        if let Some(reason) = self.terminal {
            return Ok(StepOutcome {
                reward: 0.0,
                terminal: true,
                reason: Some(reason),
                ate: false,
            });
        }

        self.steps += 1;
        self.energy -= 1;
        self.direction = self.direction.apply(action);
        let new_head = self.head().offset(self.direction);

        if !self.in_bounds(new_head) {
            return Ok(self.finish(TerminalReason::WallCollision));
        }
        if self.hits_body(new_head) {
            return Ok(self.finish(TerminalReason::BodyCollision));
        }
        if self.energy <= 0 {
            return Ok(self.finish(TerminalReason::Starvation));
        }

        self.snake.push_front(new_head);

        if new_head != self.apple {
            self.snake.pop_back();
            return Ok(StepOutcome {
                reward: 0.0,
                terminal: false,
                reason: None,
                ate: false,
            });
        }

        self.score += 1;
        self.energy = i64::from(self.energy_cap);
        if !self.grow_on_eat {
            self.snake.pop_back();
        }

        match self.place_apple() {
            Ok(()) => Ok(StepOutcome {
                reward: APPLE_REWARD,
                terminal: false,
                reason: None,
                ate: true,
            }),
            Err(WorldError::BoardFull) => {
                let mut outcome = self.finish(TerminalReason::BoardFilled);
                outcome.ate = true;
                Ok(outcome)
            }
            Err(e) => Err(e),
        }
    }

    fn finish(&mut self, reason: TerminalReason) -> StepOutcome {
        self.terminal = Some(reason);
        StepOutcome {
            reward: reason.reward(),
            terminal: true,
            reason: Some(reason),
            ate: false,
        }
    }

    /// Move the apple to a uniformly random free cell.
    fn place_apple(&mut self) -> Result<(), WorldError> {
        let area = (self.width as usize) * (self.height as usize);
        if self.snake.len() >= area {
            return Err(WorldError::BoardFull);
        }

        for _ in 0..APPLE_ATTEMPTS {
            let cell = Cell::new(
                self.rng.gen_range(0..self.width),
                self.rng.gen_range(0..self.height),
            );
            if !self.snake.contains(&cell) {
                self.apple = cell;
                return Ok(());
            }
        }

        // Crowded board: pick among the free cells directly.
        let mut occupied = vec![false; area];
        for cell in &self.snake {
            occupied[self.index(*cell)] = true;
        }
        let free: Vec<usize> = (0..area).filter(|&i| !occupied[i]).collect();
        let idx = *free.choose(&mut self.rng).ok_or(WorldError::BoardFull)?;
        self.apple = Cell::new(idx as i32 % self.width, idx as i32 / self.width);
        Ok(())
    }

    /// Whether `cell` lies on the board.
    #[inline]
    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.x < self.width && cell.y >= 0 && cell.y < self.height
    }

    /// Whether moving the head onto `cell` would hit the body. The tail is
    /// excluded because it vacates its cell on the same step.
    #[inline]
    pub fn hits_body(&self, cell: Cell) -> bool {
        let body = self.snake.len().saturating_sub(1);
        self.snake.iter().take(body).any(|&c| c == cell)
    }

    /// Flat index of an in-bounds cell, row-major.
    #[inline]
    pub fn index(&self, cell: Cell) -> usize {
        (cell.y * self.width + cell.x) as usize
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width as usize
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height as usize
    }

    #[inline]
    pub fn area(&self) -> usize {
        self.width() * self.height()
    }

    /// Length of the board diagonal in cells.
    #[inline]
    pub fn diagonal(&self) -> f32 {
        ((self.width * self.width + self.height * self.height) as f32).sqrt()
    }

    #[inline]
    pub fn head(&self) -> Cell {
        self.snake[0]
    }

    #[inline]
    pub fn tail(&self) -> Cell {
        self.snake[self.snake.len() - 1]
    }

    pub fn snake(&self) -> &VecDeque<Cell> {
        &self.snake
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.snake.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.snake.is_empty()
    }

    #[inline]
    pub fn apple(&self) -> Cell {
        self.apple
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Remaining energy, never negative.
    #[inline]
    pub fn energy(&self) -> u32 {
        self.energy.clamp(0, i64::from(u32::MAX)) as u32
    }

    #[inline]
    pub fn energy_cap(&self) -> u32 {
        self.energy_cap
    }

    #[inline]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[inline]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    #[inline]
    pub fn terminal_reason(&self) -> Option<TerminalReason> {
        self.terminal
    }
}

impl fmt::Display for GridWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let border = "#".repeat(self.width() + 2);
        writeln!(f, "{border}")?;
        for y in 0..self.height {
            f.write_str("#")?;
            for x in 0..self.width {
                let cell = Cell::new(x, y);
                let c = if cell == self.head() {
                    'H'
                } else if self.snake.contains(&cell) {
                    'o'
                } else if cell == self.apple {
                    '*'
                } else {
                    '.'
                };
                write!(f, "{c}")?;
            }
            writeln!(f, "#")?;
        }
        write!(f, "{border}")
    }
}

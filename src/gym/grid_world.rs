use std::{collections::HashMap, fmt, fs, path::Path, str::FromStr};

use strum::{Display, VariantArray};

use crate::{
    assert_interval,
    env::{Adjacency, Environment, Transition},
    error::MdpError,
};

const WALL: char = '%';
const WIN: char = '+';
const LOSS: char = '-';

/// Position in the grid, `x` counting columns from the left and `y` counting rows from the bottom
///
/// Ordered lexicographically on `(x, y)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridState {
    pub x: i32,
    pub y: i32,
}

impl GridState {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    fn shifted(self, dir: Dir) -> Self {
        let (dx, dy) = dir.offset();
        Self::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for GridState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(VariantArray, Display, Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[strum(serialize_all = "lowercase")]
pub enum Dir {
    East,
    West,
    North,
    South,
}

impl Dir {
    fn offset(self) -> (i32, i32) {
        match self {
            Dir::East => (1, 0),
            Dir::West => (-1, 0),
            Dir::North => (0, 1),
            Dir::South => (0, -1),
        }
    }

    /// The two directions an agent may drift to when attempting this one
    fn perpendicular(self) -> [Dir; 2] {
        match self {
            Dir::East | Dir::West => [Dir::North, Dir::South],
            Dir::North | Dir::South => [Dir::East, Dir::West],
        }
    }
}

/// A rectangular grid world with stochastic movement
///
/// Layouts are blocks of characters: `%` is a wall, `+` a terminal worth `+1`, `-` a terminal
/// worth `-1`, anything else an ordinary cell. Moves succeed with probability `1 - 2 * slip` and
/// drift to either perpendicular direction with probability `slip` each. Bumping into a wall or
/// the edge of the grid leaves the agent in place.
#[derive(Debug, Clone)]
pub struct GridWorld {
    /// Layout rows, bottom row first
    cells: Vec<Vec<char>>,
    width: i32,
    height: i32,
    states: Vec<GridState>,
    terminals: HashMap<GridState, f64>,
    living_reward: f64,
    slip: f64,
}

impl GridWorld {
    /// Parse a layout, top line first
    pub fn parse(layout: &str) -> Result<Self, MdpError> {
        let lines = layout
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(|line| line.chars().collect::<Vec<_>>())
            .collect::<Vec<_>>();

        let width = lines.first().ok_or(MdpError::EmptyLayout)?.len();
        if let Some((line, row)) = lines.iter().enumerate().find(|(_, row)| row.len() != width) {
            return Err(MdpError::RaggedLayout {
                line: line + 1,
                expected: width,
                found: row.len(),
            });
        }

        let cells = lines.into_iter().rev().collect::<Vec<_>>();
        let (width, height) = (width as i32, cells.len() as i32);

        let mut states = Vec::new();
        let mut terminals = HashMap::new();
        for x in 0..width {
            for y in 0..height {
                let state = GridState::new(x, y);
                match cells[y as usize][x as usize] {
                    WALL => continue,
                    WIN => {
                        terminals.insert(state, 1.0);
                    }
                    LOSS => {
                        terminals.insert(state, -1.0);
                    }
                    _ => {}
                }
                states.push(state);
            }
        }

        Ok(Self {
            cells,
            width,
            height,
            states,
            terminals,
            living_reward: -0.04,
            slip: 0.1,
        })
    }

    /// Read and parse a layout file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MdpError> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// Override the reward received for every non-terminal step
    pub fn with_living_reward(mut self, living_reward: f64) -> Self {
        self.living_reward = living_reward;
        self
    }

    /// Override the drift probability toward each perpendicular direction
    ///
    /// **Panics** if `slip` is not in the interval `[0,0.5]`
    pub fn with_slip(mut self, slip: f64) -> Self {
        assert_interval!(slip, 0.0, 0.5);
        self.slip = slip;
        self
    }

    pub fn living_reward(&self) -> f64 {
        self.living_reward
    }

    pub fn terminals(&self) -> &HashMap<GridState, f64> {
        &self.terminals
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    fn cell(&self, pos: GridState) -> Option<char> {
        let in_bounds = (0..self.width).contains(&pos.x) && (0..self.height).contains(&pos.y);
        in_bounds.then(|| self.cells[pos.y as usize][pos.x as usize])
    }

    fn can_move_to(&self, pos: GridState) -> bool {
        self.cell(pos).is_some_and(|c| c != WALL)
    }

    /// Where an attempted move in `dir` actually ends up
    fn destination(&self, state: GridState, dir: Dir) -> GridState {
        let target = state.shifted(dir);
        if self.can_move_to(target) {
            target
        } else {
            state
        }
    }
}

impl FromStr for GridWorld {
    type Err = MdpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Environment for GridWorld {
    type State = GridState;
    type Action = Dir;

    fn states(&self) -> &[GridState] {
        &self.states
    }

    fn actions(&self, state: &GridState) -> Vec<Dir> {
        if self.is_terminal(state) || !self.can_move_to(*state) {
            return vec![];
        }

        Dir::VARIANTS
            .iter()
            .copied()
            .filter(|&dir| self.can_move_to(state.shifted(dir)))
            .collect()
    }

    fn transitions(&self, state: &GridState, action: Option<&Dir>) -> Vec<Transition<GridState>> {
        let Some(&dir) = action else {
            return vec![];
        };
        if !self.can_move_to(*state) {
            return vec![];
        }

        let [left, right] = dir.perpendicular();
        [(dir, 1.0 - 2.0 * self.slip), (left, self.slip), (right, self.slip)]
            .into_iter()
            .map(|(d, p)| Transition::new(self.destination(*state, d), p))
            .collect()
    }

    fn reward(&self, state: &GridState) -> f64 {
        self.terminals
            .get(state)
            .copied()
            .unwrap_or(self.living_reward)
    }

    fn is_terminal(&self, state: &GridState) -> bool {
        self.terminals.contains_key(state)
    }

    /// Accepts only traversable cells of this grid
    fn check(&self, state: &GridState) -> Result<(), MdpError> {
        self.can_move_to(*state)
            .then_some(())
            .ok_or_else(|| MdpError::UnknownState(state.to_string()))
    }
}

impl Adjacency for GridWorld {
    fn intended(&self, state: &GridState, action: &Dir) -> Option<GridState> {
        Some(state.shifted(*action))
    }
}

impl fmt::Display for GridWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.iter().rev() {
            writeln!(f, "{}", row.iter().collect::<String>())?;
        }
        Ok(())
    }
}

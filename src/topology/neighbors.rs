//! Cardinal directions and the per-rank neighbor table.

/// One of the four sides of a local block. North is row 0.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    /// Displacement `(d_row, d_col)` in the process grid.
    pub fn shift(self) -> (isize, isize) {
        match self {
            Direction::North => (-1, 0),
            Direction::South => (1, 0),
            Direction::East => (0, 1),
            Direction::West => (0, -1),
        }
    }
}

/// Neighbor ranks of one process; `None` at a physical domain edge.
///
/// The decomposition is non-periodic: a rank on the top row of the process
/// grid has no north neighbor, and its north margin keeps whatever boundary
/// value the caller put there.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NeighborMap {
    pub north: Option<usize>,
    pub south: Option<usize>,
    pub east: Option<usize>,
    pub west: Option<usize>,
}

impl NeighborMap {
    pub fn get(&self, dir: Direction) -> Option<usize> {
        match dir {
            Direction::North => self.north,
            Direction::South => self.south,
            Direction::East => self.east,
            Direction::West => self.west,
        }
    }

    /// Iterate over `(direction, rank)` for the sides that have a neighbor.
    pub fn iter(&self) -> impl Iterator<Item = (Direction, usize)> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(|d| self.get(d).map(|r| (d, r)))
    }
}

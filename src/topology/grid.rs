//! Domain decomposition: process grid, local block size, neighbor ranks.

use super::dims::{Dims, Offset};
use super::edges::EdgeLayout;
use super::neighbors::{Direction, NeighborMap};
use crate::algs::communicator::Communicator;
use crate::grid_error::GridError;

/// Ghost margin carried by every local block, in cells per side.
pub const HALO_WIDTH: usize = 1;

/// 2D arrangement of processes. Ranks are laid out row-major:
/// `rank = row * cols + col`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProcessGrid {
    pub rows: usize,
    pub cols: usize,
    pub rank: usize,
    pub coords: (usize, usize),
}

impl ProcessGrid {
    /// Choose the grid shape for `total` processes and locate `rank` in it.
    pub fn new(total: usize, rank: usize) -> Result<Self, GridError> {
        let (rows, cols) = Self::shape_for(total)?;
        if rank >= total {
            return Err(GridError::InvalidConfig(format!(
                "rank {rank} out of range for {total} processes"
            )));
        }
        Ok(Self {
            rows,
            cols,
            rank,
            coords: (rank / cols, rank % cols),
        })
    }

    /// `rows` starts at `floor(sqrt(total))` and moves up until it divides
    /// `total`; `cols = total / rows`.
    pub fn shape_for(total: usize) -> Result<(usize, usize), GridError> {
        if total == 0 {
            return Err(GridError::InvalidProcessCount(total));
        }
        let mut rows = total.isqrt().max(1);
        while total % rows != 0 {
            rows += 1;
        }
        Ok((rows, total / rows))
    }

    pub fn size(&self) -> usize {
        self.rows * self.cols
    }

    pub fn rank_of(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// Rank one step away in `dir`, or `None` past the grid edge.
    pub fn shift(&self, dir: Direction) -> Option<usize> {
        let (dr, dc) = dir.shift();
        let row = self.coords.0.checked_add_signed(dr)?;
        let col = self.coords.1.checked_add_signed(dc)?;
        (row < self.rows && col < self.cols).then(|| self.rank_of(row, col))
    }

    pub fn neighbors(&self) -> NeighborMap {
        NeighborMap {
            north: self.shift(Direction::North),
            south: self.shift(Direction::South),
            east: self.shift(Direction::East),
            west: self.shift(Direction::West),
        }
    }

    /// True if this rank touches the global boundary on side `dir`.
    pub fn on_boundary(&self, dir: Direction) -> bool {
        self.shift(dir).is_none()
    }
}

/// Everything one rank needs to know about the decomposition.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Topology {
    pub grid: ProcessGrid,
    /// Global interior size of the simulated field.
    pub global: Dims,
    /// Local block size including the ghost margin.
    pub block: Dims,
    pub neighbors: NeighborMap,
    pub edges: EdgeLayout,
}

impl Topology {
    /// Interior extent owned by this rank.
    pub fn interior(&self) -> Dims {
        Dims::new(
            self.block.height - 2 * HALO_WIDTH,
            self.block.width - 2 * HALO_WIDTH,
        )
    }

    /// Global position of this rank's first interior cell.
    pub fn global_offset(&self) -> Offset {
        offset_of(&self.grid, self.interior())
    }

    /// Same decomposition seen from another rank.
    pub fn for_rank(&self, rank: usize) -> Result<Topology, GridError> {
        build_topology(self.grid.size(), self.global.height, self.global.width, rank)
    }

    /// Build the topology for the calling rank of `comm`.
    pub fn for_comm<C: Communicator>(
        comm: &C,
        global_height: usize,
        global_width: usize,
    ) -> Result<Topology, GridError> {
        build_topology(comm.size(), global_height, global_width, comm.rank())
    }
}

fn offset_of(grid: &ProcessGrid, interior: Dims) -> Offset {
    Offset::new(grid.coords.0 * interior.height, grid.coords.1 * interior.width)
}

/// Partition a `global_height × global_width` field over `total`
/// processes and describe the share of `rank`.
///
/// Fails when the field does not split evenly over the process grid; there
/// is no support for remainder blocks.
pub fn build_topology(
    total: usize,
    global_height: usize,
    global_width: usize,
    rank: usize,
) -> Result<Topology, GridError> {
    let grid = ProcessGrid::new(total, rank)?;
    if global_height == 0 || global_width == 0 {
        return Err(GridError::InvalidConfig(format!(
            "global grid {global_height}x{global_width} is empty"
        )));
    }
    if global_height % grid.rows != 0 {
        return Err(GridError::IndivisibleGrid {
            axis: "height",
            axis_parts: "rows",
            global: global_height,
            parts: grid.rows,
        });
    }
    if global_width % grid.cols != 0 {
        return Err(GridError::IndivisibleGrid {
            axis: "width",
            axis_parts: "columns",
            global: global_width,
            parts: grid.cols,
        });
    }
    let interior = Dims::new(global_height / grid.rows, global_width / grid.cols);
    let block = interior.grow(HALO_WIDTH);
    log::debug!(
        "rank {rank}: process grid {}x{}, coords {:?}, local block {block}",
        grid.rows,
        grid.cols,
        grid.coords
    );
    Ok(Topology {
        grid,
        global: Dims::new(global_height, global_width),
        block,
        neighbors: grid.neighbors(),
        edges: EdgeLayout::new(block),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_stay_close_to_square() {
        assert_eq!(ProcessGrid::shape_for(1).unwrap(), (1, 1));
        assert_eq!(ProcessGrid::shape_for(4).unwrap(), (2, 2));
        assert_eq!(ProcessGrid::shape_for(6).unwrap(), (2, 3));
        assert_eq!(ProcessGrid::shape_for(8).unwrap(), (2, 4));
        assert_eq!(ProcessGrid::shape_for(12).unwrap(), (3, 4));
        // 5 is prime: sqrt floor 2 walks up to 5
        assert_eq!(ProcessGrid::shape_for(5).unwrap(), (5, 1));
        assert!(matches!(
            ProcessGrid::shape_for(0),
            Err(GridError::InvalidProcessCount(0))
        ));
    }

    #[test]
    fn two_by_two_over_4x4() {
        let t = build_topology(4, 4, 4, 0).unwrap();
        assert_eq!((t.grid.rows, t.grid.cols), (2, 2));
        assert_eq!(t.block, Dims::new(4, 4));
        assert_eq!(t.interior(), Dims::new(2, 2));
        assert_eq!(
            t.neighbors,
            NeighborMap {
                north: None,
                south: Some(2),
                east: Some(1),
                west: None,
            }
        );

        let t3 = t.for_rank(3).unwrap();
        assert_eq!(t3.grid.coords, (1, 1));
        assert_eq!(t3.global_offset(), Offset::new(2, 2));
        assert_eq!(t3.neighbors.north, Some(1));
        assert_eq!(t3.neighbors.west, Some(2));
        assert_eq!(t3.neighbors.south, None);
        assert_eq!(t3.neighbors.east, None);
    }

    #[test]
    fn indivisible_width_is_rejected() {
        let err = build_topology(6, 4, 7, 0).unwrap_err();
        assert!(matches!(
            err,
            GridError::IndivisibleGrid {
                axis: "width",
                parts: 3,
                ..
            }
        ));
    }

    #[test]
    fn rank_out_of_range_is_rejected() {
        assert!(build_topology(2, 4, 4, 2).is_err());
    }

    #[test]
    fn single_process_has_no_neighbors() {
        let t = build_topology(1, 3, 5, 0).unwrap();
        assert_eq!(t.block, Dims::new(5, 7));
        assert_eq!(t.neighbors.iter().count(), 0);
        assert!(Direction::ALL.iter().all(|&d| t.grid.on_boundary(d)));
    }
}

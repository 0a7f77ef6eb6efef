//! Cartesian domain decomposition.
//!
//! [`build_topology`] turns a process count and a global field size into
//! the per-rank [`Topology`]: process grid shape, this rank's coordinates,
//! local block size (with ghost margin), neighbor ranks, and the edge
//! transfer descriptors the halo exchange uses.

pub mod dims;
pub mod edges;
pub mod grid;
pub mod neighbors;

pub use dims::{Dims, Offset};
pub use edges::{EdgeLayout, EdgeSpan};
pub use grid::{HALO_WIDTH, ProcessGrid, Topology, build_topology};
pub use neighbors::{Direction, NeighborMap};

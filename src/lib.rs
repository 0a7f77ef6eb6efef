#![cfg_attr(docsrs, feature(doc_cfg))]
//! # halo-grid
//!
//! halo-grid is the distributed plumbing of a 2D stencil code: it splits a
//! global grid over a cartesian process grid, keeps one-cell ghost margins
//! coherent between neighboring ranks, and lets every rank write and read
//! its own sub-block of named global arrays in one shared file.
//!
//! ## Layers
//! - [`topology`]: process grid shape, local block size, neighbor ranks and
//!   edge transfer descriptors ([`topology::build_topology`]).
//! - [`algs::halo`]: the four-round ghost exchange, on top of the
//!   [`algs::communicator::Communicator`] façade (MPI, in-process threads,
//!   or a single rank).
//! - [`io`]: a fixed-capacity handle registry and the parallel array store.
//! - [`kernels`] and [`driver`]: the heat simulation and the two analysis
//!   tools built on the layers above.
//!
//! ## Failure model
//!
//! Every error is fatal to the whole job ([`fatal`]). Collective calls
//! (collective file operations, barriers, halo rounds) block until every
//! peer arrives. There is no timeout and no cancellation anywhere: a rank
//! that skips or diverges from a collective sequence leaves its peers
//! blocked forever, and the only recovery is terminating the job from
//! outside.
//!
//! ## Features
//! - `mpi-support`: the [`algs::communicator::MpiComm`] backend (rsmpi) and
//!   the `heat`, `derivative` and `mean` binaries.

pub mod algs;
pub mod cli;
pub mod config;
pub mod data;
pub mod driver;
pub mod fatal;
pub mod grid_error;
pub mod io;
pub mod kernels;
pub mod topology;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{CommTag, Communicator, LocalComm, NoComm, run_local};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::halo::HaloExchange;
    pub use crate::config::{AnalysisConfig, SimulationConfig};
    pub use crate::data::local_block::LocalBlock;
    pub use crate::fatal::{OrAbort, abort_job};
    pub use crate::grid_error::{ErrorKind, GridError};
    pub use crate::io::naming::{DatasetName, GroupName};
    pub use crate::io::registry::Handle;
    pub use crate::io::store::{Access, ArrayStore, Hyperslab};
    pub use crate::topology::dims::{Dims, Offset};
    pub use crate::topology::grid::{ProcessGrid, Topology, build_topology};
    pub use crate::topology::neighbors::{Direction, NeighborMap};
}

//! Drivers behind the `heat`, `derivative` and `mean` binaries.
//!
//! Each driver is an ordinary function generic over the [`Communicator`]
//! (`crate::algs::communicator::Communicator`), so the same code runs under
//! MPI, in-process thread universes, or a single rank. Errors are returned,
//! not handled; the binaries hand them to [`crate::fatal::abort_job`].

pub mod derivative;
pub mod mean;
pub mod simulate;

pub use derivative::DerivativeReport;
pub use mean::MeanReport;
pub use simulate::SimulationReport;

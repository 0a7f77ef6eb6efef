//! Communication and the halo exchange built on it.

pub mod communicator;
pub mod halo;
pub mod wire;

pub use communicator::{CommTag, Communicator, LocalComm, NoComm, Wait, run_local};
#[cfg(feature = "mpi-support")]
pub use communicator::MpiComm;
pub use halo::{HALO_TAG, HaloExchange};

//! Per-rank field storage.

pub mod local_block;

pub use local_block::LocalBlock;

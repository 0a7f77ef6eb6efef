//! Parallel chunked array store.
//!
//! - [`registry`]: fixed-capacity table mapping small integer handles to
//!   open files and groups.
//! - [`naming`]: typed dataset and group names.
//! - [`format`]: on-disk header, catalog and commit protocol.
//! - [`store`]: the collective/independent read and write operations.

pub mod format;
pub mod naming;
pub mod registry;
pub mod store;

pub use naming::{DatasetName, GroupName};
pub use registry::{DEFAULT_CAPACITY, Handle, HandleRegistry};
pub use store::{Access, ArrayStore, DatasetDescriptor, Hyperslab};

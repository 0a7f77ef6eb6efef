//! GridError: unified error type for halo-grid public APIs
//!
//! Every fallible operation in the crate returns `Result<_, GridError>`.
//! Nothing in the library recovers from an error locally; drivers hand
//! errors to [`crate::fatal`], which maps the [`ErrorKind`] to an exit code
//! and aborts the whole job.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`GridError`], used by the abort policy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad grid size, non-divisible dimensions, malformed arguments.
    Configuration,
    /// Handle table full.
    ResourceExhausted,
    /// Create/open/read/write/close failure at the storage layer.
    Io,
    /// A peer delivered something the protocol did not expect.
    Communication,
}

impl ErrorKind {
    /// Process exit status used when a job aborts with this kind of error.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Configuration => 2,
            ErrorKind::ResourceExhausted => 3,
            ErrorKind::Io => 4,
            ErrorKind::Communication => 5,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::ResourceExhausted => "resource-exhaustion",
            ErrorKind::Io => "I/O",
            ErrorKind::Communication => "communication",
        };
        f.write_str(s)
    }
}

/// Unified error type for halo-grid operations.
#[derive(Debug, Error)]
pub enum GridError {
    /// A run parameter is out of range or could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// No process grid can be built for this many processes.
    #[error("invalid process count {0}: at least one process is required")]
    InvalidProcessCount(usize),
    /// A global dimension does not split evenly over the process grid.
    #[error("global {axis} {global} is not divisible by {parts} process {axis_parts}")]
    IndivisibleGrid {
        axis: &'static str,
        axis_parts: &'static str,
        global: usize,
        parts: usize,
    },
    /// Every slot of the handle table is occupied.
    #[error("too many open files/groups: handle registry capacity {capacity} exhausted")]
    RegistryFull { capacity: usize },
    /// The handle does not name an open resource of the expected kind.
    #[error("invalid handle #{handle}: {reason}")]
    InvalidHandle { handle: usize, reason: &'static str },
    /// The call's access mode does not match the mode the file was opened with.
    #[error("access mode mismatch on {path:?}: file opened {opened}, call requested {requested}")]
    AccessMismatch {
        path: PathBuf,
        opened: &'static str,
        requested: &'static str,
    },
    /// A read or shape query named a dataset that was never written.
    #[error("dataset `{0}` does not exist")]
    DatasetNotFound(String),
    /// The dataset exists with a different global shape.
    #[error("dataset `{dataset}` has global dims {stored:?}, request used {requested:?}")]
    DimensionMismatch {
        dataset: String,
        stored: [usize; 2],
        requested: [usize; 2],
    },
    /// The addressed sub-block does not fit inside the dataset.
    #[error("block of {extent:?} at offset {offset:?} exceeds global dims {global:?} of `{dataset}`")]
    BlockOutOfBounds {
        dataset: String,
        offset: [usize; 2],
        extent: [usize; 2],
        global: [usize; 2],
    },
    /// A caller-provided buffer does not match its declared dimensions.
    #[error("buffer holds {actual} values but dims {dims:?} with margin {margin} need {expected}")]
    InvalidBuffer {
        dims: [usize; 2],
        margin: usize,
        expected: usize,
        actual: usize,
    },
    /// The backing file is not a store file, or its metadata is damaged.
    #[error("corrupt store {path:?}: {reason}")]
    CorruptStore { path: PathBuf, reason: String },
    /// Underlying filesystem failure.
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A neighbor sent a message of the wrong size or none at all.
    #[error("communication error with rank {neighbor}: {reason}")]
    CommError { neighbor: usize, reason: String },
}

impl GridError {
    /// Wrap an `std::io::Error` with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GridError::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify this error for the abort policy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GridError::InvalidConfig(_)
            | GridError::InvalidProcessCount(_)
            | GridError::IndivisibleGrid { .. }
            | GridError::AccessMismatch { .. } => ErrorKind::Configuration,
            GridError::RegistryFull { .. } => ErrorKind::ResourceExhausted,
            GridError::InvalidHandle { .. }
            | GridError::DatasetNotFound(_)
            | GridError::DimensionMismatch { .. }
            | GridError::BlockOutOfBounds { .. }
            | GridError::InvalidBuffer { .. }
            | GridError::CorruptStore { .. }
            | GridError::Io { .. } => ErrorKind::Io,
            GridError::CommError { .. } => ErrorKind::Communication,
        }
    }
}

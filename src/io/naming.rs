//! Typed names for datasets and groups.
//!
//! Names are built from structured identifiers rather than format strings.
//! The rendered paths are the ones the analysis tools expect: snapshots are
//! `/step0`, `/step1`, …; per-step analysis groups are `/1`, `/2`, ….

use std::fmt;

/// Name of a 2D dataset, relative to the file or group it is written through.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DatasetName {
    /// Simulation snapshot after `n` iterations: `step{n}`.
    Step(usize),
    /// Time derivative inside a per-step analysis group.
    Derivative,
    /// Spatial mean (1×1) inside a per-step analysis group.
    Mean,
    /// Element-wise mean over all processed steps.
    TemporalMean,
    /// Any other name; `/` separates path segments.
    Custom(String),
}

impl DatasetName {
    pub fn custom(name: impl Into<String>) -> Self {
        DatasetName::Custom(name.into())
    }

    /// Path segments of the name, with empty and `.` segments dropped.
    pub fn segments(&self) -> Vec<String> {
        match self {
            DatasetName::Step(n) => vec![format!("step{n}")],
            DatasetName::Derivative => vec!["derivative".into()],
            DatasetName::Mean => vec!["mean".into()],
            DatasetName::TemporalMean => vec!["temporal_mean".into()],
            DatasetName::Custom(s) => split_path(s),
        }
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments().join("/"))
    }
}

/// Name of a group.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GroupName {
    /// Analysis results for simulation step `n`: `/{n}`.
    Step(usize),
    Custom(String),
}

impl GroupName {
    pub fn segments(&self) -> Vec<String> {
        match self {
            GroupName::Step(n) => vec![n.to_string()],
            GroupName::Custom(s) => split_path(s),
        }
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments().join("/"))
    }
}

fn split_path(s: &str) -> Vec<String> {
    s.split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .map(str::to_owned)
        .collect()
}

/// Absolute object path of `segments` below `parent` (`""` is the root).
pub fn join(parent: &str, segments: &[String]) -> String {
    let mut path = parent.trim_end_matches('/').to_owned();
    for seg in segments {
        path.push('/');
        path.push_str(seg);
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}

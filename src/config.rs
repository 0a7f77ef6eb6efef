//! Run configuration for the simulation and analysis drivers.

use crate::grid_error::GridError;
use crate::io::registry::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Temperature held on the west edge of the domain.
pub const DEFAULT_BOUNDARY_VALUE: f64 = 1_000_000.0;

pub const DEFAULT_SIMULATION_FILE: &str = "heat.grid";
pub const DEFAULT_DIAGNOSTICS_FILE: &str = "diags.grid";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub iterations: usize,
    pub height: usize,
    pub width: usize,
    /// Write a snapshot every this many iterations; the final iteration is
    /// always written.
    pub snapshot_interval: usize,
    pub boundary_value: f64,
    pub output: PathBuf,
    pub capacity: usize,
}

impl SimulationConfig {
    pub fn new(iterations: usize, height: usize, width: usize) -> Self {
        Self {
            iterations,
            height,
            width,
            snapshot_interval: 1,
            boundary_value: DEFAULT_BOUNDARY_VALUE,
            output: PathBuf::from(DEFAULT_SIMULATION_FILE),
            capacity: DEFAULT_CAPACITY,
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_interval(mut self, snapshot_interval: usize) -> Self {
        self.snapshot_interval = snapshot_interval;
        self
    }

    pub fn with_boundary(mut self, boundary_value: f64) -> Self {
        self.boundary_value = boundary_value;
        self
    }

    pub fn validate(&self) -> Result<(), GridError> {
        if self.height == 0 || self.width == 0 {
            return Err(GridError::InvalidConfig(format!(
                "grid {}x{} must be non-empty",
                self.height, self.width
            )));
        }
        if self.snapshot_interval == 0 {
            return Err(GridError::InvalidConfig(
                "snapshot interval must be at least 1".into(),
            ));
        }
        if !self.boundary_value.is_finite() {
            return Err(GridError::InvalidConfig(format!(
                "boundary value {} is not finite",
                self.boundary_value
            )));
        }
        if self.capacity == 0 {
            return Err(GridError::InvalidConfig(
                "handle capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// True if the state after `step` iterations is written out.
    pub fn is_snapshot(&self, step: usize) -> bool {
        step == 0 || step == self.iterations || step % self.snapshot_interval == 0
    }
}

/// Input of the derivative and mean tools.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Snapshot steps to process, in the order given.
    pub steps: Vec<usize>,
    pub input: PathBuf,
    pub output: PathBuf,
    pub capacity: usize,
}

impl AnalysisConfig {
    pub fn new(steps: Vec<usize>) -> Self {
        Self {
            steps,
            input: PathBuf::from(DEFAULT_SIMULATION_FILE),
            output: PathBuf::from(DEFAULT_DIAGNOSTICS_FILE),
            capacity: DEFAULT_CAPACITY,
        }
    }

    pub fn with_paths(mut self, input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        self.input = input.into();
        self.output = output.into();
        self
    }

    pub fn validate(&self) -> Result<(), GridError> {
        if self.steps.is_empty() {
            return Err(GridError::InvalidConfig("no steps requested".into()));
        }
        if self.input == self.output {
            return Err(GridError::InvalidConfig(format!(
                "input and output are the same file {:?}",
                self.input
            )));
        }
        // two files plus one group
        if self.capacity < 3 {
            return Err(GridError::InvalidConfig(format!(
                "handle capacity {} is too small; analysis needs 3",
                self.capacity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_schedule_keeps_first_and_last() {
        let cfg = SimulationConfig::new(7, 4, 4).with_interval(3);
        let written: Vec<usize> = (0..=7).filter(|&s| cfg.is_snapshot(s)).collect();
        assert_eq!(written, vec![0, 3, 6, 7]);
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(SimulationConfig::new(1, 0, 4).validate().is_err());
        assert!(SimulationConfig::new(1, 4, 4).with_interval(0).validate().is_err());
        assert!(
            SimulationConfig::new(1, 4, 4)
                .with_boundary(f64::NAN)
                .validate()
                .is_err()
        );
        assert!(SimulationConfig::new(0, 4, 4).validate().is_ok());

        assert!(AnalysisConfig::new(vec![]).validate().is_err());
        assert!(
            AnalysisConfig::new(vec![1])
                .with_paths("a", "a")
                .validate()
                .is_err()
        );
        assert!(AnalysisConfig::new(vec![1, 2]).validate().is_ok());
    }

    #[test]
    fn serializes_as_json() {
        let cfg = SimulationConfig::new(10, 8, 6).with_output("out.grid");
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"iterations\":10"));
        let back: SimulationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}

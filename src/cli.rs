//! Command-line front ends of the three tools.

use crate::config::{
    AnalysisConfig, DEFAULT_BOUNDARY_VALUE, DEFAULT_DIAGNOSTICS_FILE, DEFAULT_SIMULATION_FILE,
    SimulationConfig,
};
use crate::grid_error::GridError;
use crate::io::registry::DEFAULT_CAPACITY;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Distributed 2D heat diffusion on a cartesian process grid")]
pub struct HeatCli {
    /// Number of iterations to run.
    pub iterations: usize,
    /// Global grid height.
    pub height: usize,
    /// Global grid width.
    pub width: usize,

    #[arg(long, default_value = DEFAULT_SIMULATION_FILE)]
    pub output: PathBuf,
    /// Write a snapshot every N iterations.
    #[arg(long, default_value = "1")]
    pub interval: usize,
    /// Fixed temperature of the west edge.
    #[arg(long, default_value_t = DEFAULT_BOUNDARY_VALUE)]
    pub boundary: f64,
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    pub capacity: usize,
}

impl HeatCli {
    pub fn into_config(self) -> SimulationConfig {
        SimulationConfig {
            iterations: self.iterations,
            height: self.height,
            width: self.width,
            snapshot_interval: self.interval,
            boundary_value: self.boundary,
            output: self.output,
            capacity: self.capacity,
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "Post-process heat snapshots")]
pub struct AnalysisCli {
    /// Snapshot steps to process.
    #[arg(required = true)]
    pub steps: Vec<usize>,

    #[arg(long, default_value = DEFAULT_SIMULATION_FILE)]
    pub input: PathBuf,
    #[arg(long, default_value = DEFAULT_DIAGNOSTICS_FILE)]
    pub output: PathBuf,
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    pub capacity: usize,
}

impl AnalysisCli {
    pub fn into_config(self) -> AnalysisConfig {
        AnalysisConfig {
            steps: self.steps,
            input: self.input,
            output: self.output,
            capacity: self.capacity,
        }
    }
}

/// Parse `args` into `P`. `--help` and `--version` print and exit 0; any
/// other parse failure becomes a configuration error so the caller can
/// abort the whole job with the matching code.
pub fn parse_args<P, I, T>(args: I) -> Result<P, GridError>
where
    P: Parser,
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    P::try_parse_from(args).map_err(|e| match e.kind() {
        clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => e.exit(),
        _ => GridError::InvalidConfig(e.to_string().trim_end().to_owned()),
    })
}

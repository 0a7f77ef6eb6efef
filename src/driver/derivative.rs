//! Time derivative between consecutive snapshots.

use crate::algs::communicator::Communicator;
use crate::config::AnalysisConfig;
use crate::grid_error::GridError;
use crate::io::naming::{DatasetName, GroupName};
use crate::io::store::{Access, ArrayStore, Hyperslab};
use crate::kernels::derivative;
use crate::topology::dims::Dims;

#[derive(Clone, Debug)]
pub struct DerivativeReport {
    pub global: Dims,
    /// Rows this rank processed.
    pub band: Hyperslab,
    pub steps: Vec<usize>,
}

/// For every requested step `s`, write `/s/derivative = /step{s} - /step{s-1}`
/// into the output file.
///
/// Rows are split evenly over the ranks and all file access is collective.
pub fn run<C: Communicator>(comm: &C, cfg: &AnalysisConfig) -> Result<DerivativeReport, GridError> {
    cfg.validate()?;
    if cfg.steps.contains(&0) {
        return Err(GridError::InvalidConfig(
            "step 0 has no previous snapshot to differentiate against".into(),
        ));
    }

    let mut store = ArrayStore::with_capacity(comm, cfg.capacity);
    let input = store.open_file(Access::Collective, &cfg.input)?;
    let global = store.global_dims(input, &DatasetName::Step(0))?;
    let band = Hyperslab::row_band(global, comm.rank(), comm.size())?;
    // every rank holds the same catalog, so all of them fail here together
    for &step in &cfg.steps {
        for needed in [step - 1, step] {
            match store.global_dims(input, &DatasetName::Step(needed)) {
                Ok(_) => {}
                Err(GridError::DatasetNotFound(name)) => {
                    return Err(GridError::InvalidConfig(format!(
                        "step {step} needs snapshot {name}, which {:?} does not contain",
                        cfg.input
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }
    let output = store.create_file(Access::Collective, &cfg.output)?;
    log::debug!(
        "rank {}: rows {}..{} of {global}",
        comm.rank(),
        band.offset.row,
        band.offset.row + band.local.height
    );

    let mut previous = vec![0.0; band.local.len()];
    let mut current = vec![0.0; band.local.len()];
    for &step in &cfg.steps {
        let group = store.create_group(output, &GroupName::Step(step))?;
        store.read_block(input, &mut previous, &band, Access::Collective, &DatasetName::Step(step - 1))?;
        store.read_block(input, &mut current, &band, Access::Collective, &DatasetName::Step(step))?;
        derivative(&previous, &mut current);
        store.write_block(group, &current, &band, Access::Collective, &DatasetName::Derivative)?;
        store.close_group(group)?;
    }

    store.close_file(input, Access::Collective)?;
    store.close_file(output, Access::Collective)?;
    if comm.rank() == 0 {
        log::info!("derivative: {} steps written to {:?}", cfg.steps.len(), cfg.output);
    }
    Ok(DerivativeReport {
        global,
        band,
        steps: cfg.steps.clone(),
    })
}

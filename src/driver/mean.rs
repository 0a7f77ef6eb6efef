//! Spatial and temporal means of snapshots.

use crate::algs::communicator::Communicator;
use crate::config::AnalysisConfig;
use crate::grid_error::GridError;
use crate::io::naming::{DatasetName, GroupName};
use crate::io::store::{Access, ArrayStore, Hyperslab};
use crate::kernels::{TemporalMean, spatial_mean};
use crate::topology::dims::Dims;

#[derive(Clone, Debug, PartialEq)]
pub struct MeanReport {
    pub global: Dims,
    /// `(step, spatial mean)` in the order processed.
    pub means: Vec<(usize, f64)>,
    pub temporal_mean: Option<Vec<f64>>,
}

/// Read each requested snapshot whole and reduce it.
///
/// Every rank opens the input independently and computes the same results;
/// only rank 0 creates the output file and writes a 1x1 `mean` per step
/// group plus `/temporal_mean` at the global dims.
pub fn run<C: Communicator>(comm: &C, cfg: &AnalysisConfig) -> Result<MeanReport, GridError> {
    cfg.validate()?;
    let mut store = ArrayStore::with_capacity(comm, cfg.capacity);
    let input = store.open_file(Access::Independent, &cfg.input)?;
    let global = store.global_dims(input, &DatasetName::Step(0))?;
    let whole = Hyperslab::whole(global);
    let scalar = Hyperslab::whole(Dims::new(1, 1));

    let output = if comm.rank() == 0 {
        Some(store.create_file(Access::Independent, &cfg.output)?)
    } else {
        None
    };

    let mut frame = vec![0.0; global.len()];
    let mut acc = TemporalMean::new(global.len());
    let mut means = Vec::with_capacity(cfg.steps.len());
    for &step in &cfg.steps {
        store.read_block(input, &mut frame, &whole, Access::Independent, &DatasetName::Step(step))?;
        let mean = spatial_mean(&frame);
        acc.add(&frame);
        means.push((step, mean));
        log::debug!("rank {}: step {step} mean {mean}", comm.rank());

        if let Some(out) = output {
            let group = store.create_group(out, &GroupName::Step(step))?;
            store.write_block(group, &[mean], &scalar, Access::Independent, &DatasetName::Mean)?;
            store.close_group(group)?;
        }
    }

    let temporal_mean = acc.mean();
    if let Some(out) = output {
        if let Some(tm) = &temporal_mean {
            store.write_block(out, tm, &whole, Access::Independent, &DatasetName::TemporalMean)?;
        }
        store.close_file(out, Access::Independent)?;
        log::info!("mean: {} steps written to {:?}", means.len(), cfg.output);
    }
    store.close_file(input, Access::Independent)?;

    Ok(MeanReport {
        global,
        means,
        temporal_mean,
    })
}

//! Heat diffusion time loop.

use crate::algs::communicator::Communicator;
use crate::algs::halo::HaloExchange;
use crate::config::SimulationConfig;
use crate::data::local_block::LocalBlock;
use crate::grid_error::GridError;
use crate::io::naming::DatasetName;
use crate::io::store::{Access, ArrayStore, Hyperslab};
use crate::kernels::{init_field, step_block};
use crate::topology::grid::Topology;

/// What one rank did during a simulation run.
#[derive(Clone, Debug)]
pub struct SimulationReport {
    pub topology: Topology,
    /// Steps written as `/step{n}`, in order.
    pub snapshots: Vec<usize>,
    /// This rank's interior after the last iteration, row-major.
    pub final_interior: Vec<f64>,
}

/// Run the simulation on the calling rank of `comm`.
///
/// Per iteration: stencil update of the whole local block, halo exchange of
/// the new buffer, buffer swap, then (on snapshot steps) a collective write
/// of the interior. The exchange must complete before the swap so the next
/// update reads fresh ghosts.
pub fn run<C: Communicator>(comm: &C, cfg: &SimulationConfig) -> Result<SimulationReport, GridError> {
    cfg.validate()?;
    let topology = Topology::for_comm(comm, cfg.height, cfg.width)?;
    let halo = HaloExchange::new(&topology);
    let slab = Hyperslab::for_topology(&topology);

    let mut block = LocalBlock::new(topology.block);
    init_field(&mut block, &topology.grid, cfg.boundary_value);

    let mut store = ArrayStore::with_capacity(comm, cfg.capacity);
    let file = store.create_file(Access::Collective, &cfg.output)?;
    store.write_block(file, block.current(), &slab, Access::Collective, &DatasetName::Step(0))?;
    let mut snapshots = vec![0];

    if comm.rank() == 0 {
        log::info!(
            "heat: {} iterations on {}x{} over {}x{} ranks, writing {:?}",
            cfg.iterations,
            cfg.height,
            cfg.width,
            topology.grid.rows,
            topology.grid.cols,
            cfg.output
        );
    }

    for ii in 0..cfg.iterations {
        step_block(&mut block);
        halo.exchange_next(comm, &mut block)?;
        block.swap();

        let step = ii + 1;
        if cfg.is_snapshot(step) {
            store.write_block(
                file,
                block.current(),
                &slab,
                Access::Collective,
                &DatasetName::Step(step),
            )?;
            snapshots.push(step);
            log::debug!("rank {}: wrote step {step}", comm.rank());
        }
    }

    store.close_file(file, Access::Collective)?;
    if comm.rank() == 0 {
        log::info!("heat: done, {} snapshots", snapshots.len());
    }
    Ok(SimulationReport {
        topology,
        snapshots,
        final_interior: block.interior(),
    })
}

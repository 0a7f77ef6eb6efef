//! `mpirun -n P heat <iterations> <height> <width>`

use halo_grid::algs::communicator::MpiComm;
use halo_grid::cli::{HeatCli, parse_args};
use halo_grid::driver::simulate;
use halo_grid::fatal::OrAbort;

fn main() {
    env_logger::init();
    let comm = match MpiComm::new() {
        Ok(comm) => comm,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(e.kind().exit_code());
        }
    };
    let cfg = parse_args::<HeatCli, _, _>(std::env::args_os())
        .or_abort(&comm)
        .into_config();
    simulate::run(&comm, &cfg).or_abort(&comm);
}

//! `mpirun -n P mean <step>...`

use halo_grid::algs::communicator::{Communicator, MpiComm};
use halo_grid::cli::{AnalysisCli, parse_args};
use halo_grid::driver::mean;
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
    let cfg = parse_args::<AnalysisCli, _, _>(std::env::args_os())
        .or_abort(&comm)
        .into_config();
    let report = mean::run(&comm, &cfg).or_abort(&comm);
    if comm.rank() == 0 {
        for (step, m) in &report.means {
            println!("{step} {m:.3}");
        }
    }
}

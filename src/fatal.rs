//! Job-wide abort policy.
//!
//! Every error is fatal to the whole job. A failing rank logs the error,
//! maps its [`ErrorKind`](crate::grid_error::ErrorKind) to an exit code, and
//! takes every other rank down with it through [`Communicator::abort`].
//! There is no local recovery and no partial retry.

use crate::algs::communicator::Communicator;
use crate::grid_error::GridError;

/// Log `err` and terminate the job with the exit code of its kind.
pub fn abort_job<C: Communicator>(comm: &C, err: &GridError) -> ! {
    let kind = err.kind();
    log::error!(
        "rank {}/{}: {kind} error: {err}; aborting job",
        comm.rank(),
        comm.size()
    );
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        log::error!("  caused by: {cause}");
        source = cause.source();
    }
    comm.abort(kind.exit_code())
}

/// `Result` extension that turns an error into a job abort.
pub trait OrAbort<T> {
    fn or_abort<C: Communicator>(self, comm: &C) -> T;
}

impl<T> OrAbort<T> for Result<T, GridError> {
    fn or_abort<C: Communicator>(self, comm: &C) -> T {
        match self {
            Ok(v) => v,
            Err(e) => abort_job(comm, &e),
        }
    }
}

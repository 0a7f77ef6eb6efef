//! Thin façade over in-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices*. Send handles and receive handles
//! are **waitable**; a receive only guarantees its buffer once `.wait()`
//! returned the payload.
//!
//! There is no timeout anywhere in this layer. A receive or barrier whose
//! peer never arrives blocks forever; recovery is external termination of
//! the job.

use crate::grid_error::GridError;
use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Typed message tag. Related messages reserve consecutive offsets from a base.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    pub const fn offset(self, n: u16) -> CommTag {
        CommTag(self.0.wrapping_add(n))
    }
}

/// Blocking/waitable point-to-point communication plus the two job-wide
/// primitives the store needs (barrier, abort).
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive from `peer`. The payload is returned by `wait`
    /// exactly as sent; the caller checks its length against `buf` and
    /// copies it into place.
    ///
    /// Backends may complete the receive inside `irecv` itself (`MpiComm`
    /// does). Such a backend blocks here until the peer sends and must
    /// override [`Communicator::sendrecv`].
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// Block until every rank of the job has entered the barrier.
    fn barrier(&self);

    /// Terminate the whole job with `code`. Never returns.
    fn abort(&self, code: i32) -> !;

    /// Combined send-and-receive: the receive is posted before the send and
    /// both are awaited, so a ring of paired calls cannot deadlock. `None`
    /// on either side skips that half. The received payload must fill
    /// `recv` exactly; a shorter or longer message is a `CommError`.
    ///
    /// This default assumes `irecv` returns without waiting for the peer.
    /// With a blocking `irecv` every rank of a ring would sit in its receive
    /// and none would reach its send.
    fn sendrecv(
        &self,
        tag: CommTag,
        send: Option<(usize, &[u8])>,
        recv: Option<(usize, &mut [u8])>,
    ) -> Result<(), GridError> {
        let pending = recv.map(|(src, buf)| {
            let h = self.irecv(src, tag.as_u16(), buf);
            (src, h, buf)
        });
        let sent = send.map(|(dst, bytes)| self.isend(dst, tag.as_u16(), bytes));

        let mut result = Ok(());
        if let Some((src, h, buf)) = pending {
            match h.wait() {
                Some(data) if data.len() == buf.len() => buf.copy_from_slice(&data),
                Some(data) => {
                    result = Err(GridError::CommError {
                        neighbor: src,
                        reason: format!("expected {} bytes, got {}", buf.len(), data.len()),
                    });
                }
                None => {
                    result = Err(GridError::CommError {
                        neighbor: src,
                        reason: "receive completed without payload".into(),
                    });
                }
            }
        }
        // always drain the send before returning, even on error
        if let Some(h) = sent {
            let _ = h.wait();
        }
        result
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    ///
    /// For a receive this is where the blocking happens, unless the backend
    /// already completed it in `irecv`.
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Single-rank communicator: no peers, barriers return immediately.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}
    fn barrier(&self) {}

    fn abort(&self, code: i32) -> ! {
        std::process::exit(code)
    }
}

// --- LocalComm: one thread per rank inside one process ---

type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Default)]
struct BarrierState {
    arrived: usize,
    generation: u64,
}

/// State shared by all ranks of one in-process universe.
struct Fabric {
    size: usize,
    mailbox: Mutex<HashMap<Key, VecDeque<Bytes>>>,
    delivered: Condvar,
    barrier: Mutex<BarrierState>,
    released: Condvar,
    aborted: AtomicBool,
}

impl Fabric {
    fn poison(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        // take each lock so a waiter cannot miss the flag between check and park
        drop(self.mailbox.lock());
        self.delivered.notify_all();
        drop(self.barrier.lock());
        self.released.notify_all();
    }

    fn check_alive(&self) {
        if self.aborted.load(Ordering::SeqCst) {
            panic!("job aborted by a peer rank");
        }
    }
}

/// Communicator for a universe of ranks running as threads of one process.
///
/// Sends never block. Messages between one `(src, dst, tag)` triple are
/// delivered in FIFO order. An abort (or a panic on any rank running under
/// [`run_local`]) wakes every blocked peer and makes it panic, so a failed
/// in-process job unwinds instead of hanging.
#[derive(Clone)]
pub struct LocalComm {
    rank: usize,
    fabric: Arc<Fabric>,
}

impl std::fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalComm")
            .field("rank", &self.rank)
            .field("size", &self.fabric.size)
            .finish()
    }
}

impl LocalComm {
    /// Build `size` connected communicators, one per rank.
    pub fn universe(size: usize) -> Vec<LocalComm> {
        let fabric = Arc::new(Fabric {
            size,
            mailbox: Mutex::new(HashMap::new()),
            delivered: Condvar::new(),
            barrier: Mutex::new(BarrierState::default()),
            released: Condvar::new(),
            aborted: AtomicBool::new(false),
        });
        (0..size)
            .map(|rank| LocalComm {
                rank,
                fabric: fabric.clone(),
            })
            .collect()
    }
}

/// Poisons the universe if its rank thread unwinds.
struct PanicGuard(Arc<Fabric>);

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.poison();
        }
    }
}

/// Deferred receive; the payload is taken from the mailbox on `wait`.
pub struct LocalRecv {
    fabric: Arc<Fabric>,
    key: Key,
}

impl Wait for LocalRecv {
    fn wait(self) -> Option<Vec<u8>> {
        let mut mailbox = self.fabric.mailbox.lock();
        loop {
            self.fabric.check_alive();
            if let Some(bytes) = mailbox.get_mut(&self.key).and_then(|q| q.pop_front()) {
                return Some(bytes.to_vec());
            }
            self.fabric.delivered.wait(&mut mailbox);
        }
    }
}

impl Communicator for LocalComm {
    type SendHandle = ();
    type RecvHandle = LocalRecv;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.fabric.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        let key = (self.rank, peer, tag);
        self.fabric
            .mailbox
            .lock()
            .entry(key)
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
        self.fabric.delivered.notify_all();
    }

    fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> LocalRecv {
        LocalRecv {
            fabric: self.fabric.clone(),
            key: (peer, self.rank, tag),
        }
    }

    fn barrier(&self) {
        let mut state = self.fabric.barrier.lock();
        self.fabric.check_alive();
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.fabric.size {
            state.arrived = 0;
            state.generation += 1;
            self.fabric.released.notify_all();
            return;
        }
        while state.generation == generation {
            self.fabric.released.wait(&mut state);
            self.fabric.check_alive();
        }
    }

    fn abort(&self, code: i32) -> ! {
        self.fabric.poison();
        panic!("job aborted by rank {} (exit code {code})", self.rank)
    }
}

/// Run `f` once per rank of a fresh in-process universe and collect the
/// per-rank results in rank order. A panic on any rank is re-raised here
/// after every rank has stopped.
pub fn run_local<T, F>(size: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(LocalComm) -> T + Sync,
{
    let comms = LocalComm::universe(size);
    let f = &f;
    std::thread::scope(|s| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                s.spawn(move || {
                    let _guard = PanicGuard(comm.fabric.clone());
                    f(comm)
                })
            })
            .collect();
        let mut results = Vec::with_capacity(size);
        let mut first_panic = None;
        for h in handles {
            match h.join() {
                Ok(v) => results.push(v),
                Err(payload) => {
                    first_panic.get_or_insert(payload);
                }
            }
        }
        if let Some(payload) = first_panic {
            std::panic::resume_unwind(payload);
        }
        results
    })
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{CommTag, Communicator, Wait};
    use crate::grid_error::GridError;
    use mpi::datatype::Equivalence;
    use mpi::environment::Universe;
    use mpi::point_to_point::{Destination, Source, send_receive_into_with_tags};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::Communicator as _;
    use mpi::traits::CommunicatorCollectives;

    /// Communicator over `MPI_COMM_WORLD`. Dropping it finalizes MPI.
    pub struct MpiComm {
        // field order matters: `world` must drop before `universe`
        pub world: SimpleCommunicator,
        _universe: Universe,
        pub rank: usize,
        pub size: usize,
    }

    impl MpiComm {
        pub fn new() -> Result<Self, GridError> {
            let universe = mpi::initialize().ok_or_else(|| GridError::CommError {
                neighbor: 0,
                reason: "MPI was already initialized".into(),
            })?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                world,
                _universe: universe,
                rank,
                size,
            })
        }
    }

    /// Completed receive. MPI receives run eagerly inside `irecv`, which
    /// blocks, so paired exchanges bypass the trait's default `sendrecv`
    /// and map onto `MPI_Sendrecv` instead.
    pub struct MpiRecv(Vec<u8>);

    impl Wait for MpiRecv {
        fn wait(self) -> Option<Vec<u8>> {
            Some(self.0)
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = ();
        type RecvHandle = MpiRecv;

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(buf, tag as i32);
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiRecv {
            let status = self
                .world
                .process_at_rank(peer as i32)
                .receive_into_with_tag(&mut *buf, tag as i32);
            let n = status.count(u8::equivalent_datatype()) as usize;
            MpiRecv(buf[..n.min(buf.len())].to_vec())
        }

        fn barrier(&self) {
            self.world.barrier();
        }

        fn abort(&self, code: i32) -> ! {
            self.world.abort(code)
        }

        /// Both halves present map onto `MPI_Sendrecv`; a missing half
        /// degrades to a plain blocking send or receive.
        fn sendrecv(
            &self,
            tag: CommTag,
            send: Option<(usize, &[u8])>,
            recv: Option<(usize, &mut [u8])>,
        ) -> Result<(), GridError> {
            let t = tag.as_u16() as i32;
            let expected = recv.as_ref().map(|(_, b)| b.len());
            let (src, status) = match (send, recv) {
                (Some((dst, out)), Some((src, inb))) => {
                    let dest = self.world.process_at_rank(dst as i32);
                    let source = self.world.process_at_rank(src as i32);
                    (src, send_receive_into_with_tags(out, &dest, t, inb, &source, t))
                }
                (Some((dst, out)), None) => {
                    self.world.process_at_rank(dst as i32).send_with_tag(out, t);
                    return Ok(());
                }
                (None, Some((src, inb))) => {
                    let status = self
                        .world
                        .process_at_rank(src as i32)
                        .receive_into_with_tag(inb, t);
                    (src, status)
                }
                (None, None) => return Ok(()),
            };
            let got = status.count(u8::equivalent_datatype()) as usize;
            match expected {
                Some(n) if n != got => Err(GridError::CommError {
                    neighbor: src,
                    reason: format!("expected {n} bytes, got {got}"),
                }),
                _ => Ok(()),
            }
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

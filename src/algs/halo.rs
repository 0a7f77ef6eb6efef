//! Four-directional ghost-zone exchange.
//!
//! Each call performs exactly four paired send/receive rounds, in this
//! order:
//!
//! 1. send the last interior row south, receive the north ghost row;
//! 2. send the first interior row north, receive the south ghost row;
//! 3. send the last interior column east, receive the west ghost column;
//! 4. send the first interior column west, receive the east ghost column.
//!
//! Every rank walks the same four rounds, so each send meets the receive
//! its neighbor posts in the same round. A side without a neighbor neither
//! sends nor receives, and its margin is left untouched.
//!
//! Ghost data is valid for one iteration only. The caller must finish the
//! stencil update of the whole buffer before exchanging it, and must
//! exchange again before the margins are read in the next update.

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::wire::{cast_slice, cast_slice_mut};
use crate::data::local_block::LocalBlock;
use crate::grid_error::GridError;
use crate::topology::edges::EdgeLayout;
use crate::topology::grid::Topology;
use crate::topology::neighbors::{Direction, NeighborMap};

/// Base tag for halo traffic; round `i` uses `HALO_TAG.offset(i)`.
pub const HALO_TAG: CommTag = CommTag(100);

/// `(send toward, receive from)` for each round.
const ROUNDS: [(Direction, Direction); 4] = [
    (Direction::South, Direction::North),
    (Direction::North, Direction::South),
    (Direction::East, Direction::West),
    (Direction::West, Direction::East),
];

/// Exchange plan for one rank: its neighbors plus the transfer descriptors
/// of its block shape. Built once from the [`Topology`] and reused every
/// iteration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HaloExchange {
    neighbors: NeighborMap,
    edges: EdgeLayout,
    tag: CommTag,
}

impl HaloExchange {
    pub fn new(topology: &Topology) -> Self {
        Self::from_parts(topology.neighbors, topology.edges)
    }

    pub fn from_parts(neighbors: NeighborMap, edges: EdgeLayout) -> Self {
        Self {
            neighbors,
            edges,
            tag: HALO_TAG,
        }
    }

    /// Refresh the ghost cells of `field` (a full block, margin included).
    pub fn exchange<C: Communicator>(&self, comm: &C, field: &mut [f64]) -> Result<(), GridError> {
        let block = self.edges.block();
        if field.len() != block.len() {
            return Err(GridError::InvalidBuffer {
                dims: block.to_array(),
                margin: 1,
                expected: block.len(),
                actual: field.len(),
            });
        }
        for (round, &(toward, from)) in ROUNDS.iter().enumerate() {
            self.round(comm, self.tag.offset(round as u16), toward, from, field)?;
        }
        Ok(())
    }

    /// Exchange the `next` buffer of `block`, the one just produced by the
    /// stencil update and about to become `current`.
    pub fn exchange_next<C: Communicator>(
        &self,
        comm: &C,
        block: &mut LocalBlock,
    ) -> Result<(), GridError> {
        self.exchange(comm, block.next_mut())
    }

    fn round<C: Communicator>(
        &self,
        comm: &C,
        tag: CommTag,
        toward: Direction,
        from: Direction,
        field: &mut [f64],
    ) -> Result<(), GridError> {
        let dst = self.neighbors.get(toward);
        let src = self.neighbors.get(from);
        if dst.is_none() && src.is_none() {
            return Ok(());
        }

        let outgoing = dst.map(|_| self.edges.send_span(toward).gather(field));
        let send = dst.zip(outgoing.as_deref()).map(|(d, v)| (d, cast_slice(v)));

        let ghost = self.edges.ghost_span(from);
        match src {
            // rows land straight in the buffer
            Some(s) if ghost.is_contiguous() => {
                let target = &mut field[ghost.start..ghost.start + ghost.count];
                comm.sendrecv(tag, send, Some((s, cast_slice_mut(target))))
            }
            Some(s) => {
                let mut incoming = vec![0.0f64; ghost.count];
                comm.sendrecv(tag, send, Some((s, cast_slice_mut(&mut incoming))))?;
                ghost.scatter(&incoming, field);
                Ok(())
            }
            None => comm.sendrecv(tag, send, None),
        }
    }
}

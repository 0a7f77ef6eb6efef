//! Fixed-capacity table of open store resources.
//!
//! The registry is an ordinary owned value (the [`ArrayStore`] holds one);
//! nothing about it is process-global. Handles are process-local: the same
//! number on two ranks names related resources only when both came out of
//! the same collective call sequence.
//!
//! [`ArrayStore`]: crate::io::store::ArrayStore

use crate::grid_error::GridError;
use std::fmt;

/// Slot count used when no capacity is configured.
pub const DEFAULT_CAPACITY: usize = 10;

/// Small integer naming one occupied registry slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(usize);

impl Handle {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
pub struct HandleRegistry<R> {
    slots: Vec<Option<R>>,
}

impl<R> Default for HandleRegistry<R> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl<R> HandleRegistry<R> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Store `resource` in the first free slot.
    ///
    /// A full table is [`GridError::RegistryFull`], which the abort policy
    /// treats as fatal to the whole job.
    pub fn allocate(&mut self, resource: R) -> Result<Handle, GridError> {
        match self.slots.iter().position(Option::is_none) {
            Some(i) => {
                self.slots[i] = Some(resource);
                Ok(Handle(i))
            }
            None => Err(GridError::RegistryFull {
                capacity: self.capacity(),
            }),
        }
    }

    /// Free the slot of `handle` and hand back its resource. The slot is
    /// reused by later allocations.
    pub fn release(&mut self, handle: Handle) -> Result<R, GridError> {
        self.slots
            .get_mut(handle.0)
            .and_then(Option::take)
            .ok_or(GridError::InvalidHandle {
                handle: handle.0,
                reason: "not open",
            })
    }

    pub fn get(&self, handle: Handle) -> Result<&R, GridError> {
        self.slots
            .get(handle.0)
            .and_then(Option::as_ref)
            .ok_or(GridError::InvalidHandle {
                handle: handle.0,
                reason: "not open",
            })
    }

    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut R, GridError> {
        self.slots
            .get_mut(handle.0)
            .and_then(Option::as_mut)
            .ok_or(GridError::InvalidHandle {
                handle: handle.0,
                reason: "not open",
            })
    }

    /// Occupied handles whose resource satisfies `pred`.
    pub fn handles_where(&self, pred: impl Fn(&R) -> bool) -> Vec<Handle> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().filter(|r| pred(r)).map(|_| Handle(i)))
            .collect()
    }
}

//! Two-dimensional extents and offsets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Height × width of a row-major 2D array.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dims {
    pub height: usize,
    pub width: usize,
}

impl Dims {
    pub const fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    /// Number of elements.
    pub const fn len(&self) -> usize {
        self.height * self.width
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extent left after removing `margin` cells on every side, or `None` if
    /// the margin does not fit.
    pub fn shrink(&self, margin: usize) -> Option<Dims> {
        Some(Dims {
            height: self.height.checked_sub(2 * margin)?,
            width: self.width.checked_sub(2 * margin)?,
        })
    }

    /// Extent after adding `margin` cells on every side.
    pub const fn grow(&self, margin: usize) -> Dims {
        Dims {
            height: self.height + 2 * margin,
            width: self.width + 2 * margin,
        }
    }

    /// Row-major linear index of `(row, col)`.
    #[inline]
    pub const fn index(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    pub const fn to_array(self) -> [usize; 2] {
        [self.height, self.width]
    }
}

impl From<[usize; 2]> for Dims {
    fn from([height, width]: [usize; 2]) -> Self {
        Dims { height, width }
    }
}

impl fmt::Display for Dims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.height, self.width)
    }
}

/// Position of a sub-block's first element inside a global array.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Offset {
    pub row: usize,
    pub col: usize,
}

impl Offset {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    pub const fn to_array(self) -> [usize; 2] {
        [self.row, self.col]
    }
}

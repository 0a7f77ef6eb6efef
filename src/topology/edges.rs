//! Row and column transfer descriptors for halo exchange.
//!
//! A local block of `height × width` cells carries a one-cell margin. Each
//! side has two lines of interest: the interior line adjacent to the margin
//! (sent to the neighbor) and the margin line itself (received from the
//! neighbor). Corners are never exchanged, so rows carry `width - 2` values
//! and columns `height - 2`.

use super::dims::Dims;
use super::neighbors::Direction;

/// A strided run of cells inside a row-major buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EdgeSpan {
    pub start: usize,
    pub count: usize,
    pub stride: usize,
}

impl EdgeSpan {
    pub fn is_contiguous(&self) -> bool {
        self.stride == 1
    }

    /// Linear indices covered by the span, in order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.count).map(move |i| self.start + i * self.stride)
    }

    /// Copy the span out of `buf` into a packed vector.
    pub fn gather(&self, buf: &[f64]) -> Vec<f64> {
        self.indices().map(|i| buf[i]).collect()
    }

    /// Write packed `values` back into the span of `buf`.
    pub fn scatter(&self, values: &[f64], buf: &mut [f64]) {
        debug_assert_eq!(values.len(), self.count);
        for (i, v) in self.indices().zip(values) {
            buf[i] = *v;
        }
    }
}

/// Send/ghost spans for all four sides of one block shape, computed once.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EdgeLayout {
    block: Dims,
}

impl EdgeLayout {
    /// `block` must be at least 3×3 (one interior cell plus margin).
    pub fn new(block: Dims) -> Self {
        debug_assert!(block.height >= 3 && block.width >= 3);
        Self { block }
    }

    pub fn block(&self) -> Dims {
        self.block
    }

    /// Contiguous interior row length (`width - 2`).
    pub fn row_len(&self) -> usize {
        self.block.width - 2
    }

    /// Strided interior column length (`height - 2`); stride is `width`.
    pub fn column_len(&self) -> usize {
        self.block.height - 2
    }

    /// Interior line adjacent to side `dir`: what this rank sends toward `dir`.
    pub fn send_span(&self, dir: Direction) -> EdgeSpan {
        let Dims { height, width } = self.block;
        match dir {
            Direction::North => self.row(1),
            Direction::South => self.row(height - 2),
            Direction::East => self.column(width - 2),
            Direction::West => self.column(1),
        }
    }

    /// Margin line on side `dir`: where data received from `dir` lands.
    pub fn ghost_span(&self, dir: Direction) -> EdgeSpan {
        let Dims { height, width } = self.block;
        match dir {
            Direction::North => self.row(0),
            Direction::South => self.row(height - 1),
            Direction::East => self.column(width - 1),
            Direction::West => self.column(0),
        }
    }

    fn row(&self, r: usize) -> EdgeSpan {
        EdgeSpan {
            start: self.block.index(r, 1),
            count: self.row_len(),
            stride: 1,
        }
    }

    fn column(&self, c: usize) -> EdgeSpan {
        EdgeSpan {
            start: self.block.index(1, c),
            count: self.column_len(),
            stride: self.block.width,
        }
    }
}

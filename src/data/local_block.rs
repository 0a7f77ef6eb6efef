//! Per-rank double-buffered field block with a one-cell ghost margin.

use crate::topology::dims::Dims;
use crate::topology::neighbors::Direction;

/// Two row-major buffers of `dims` cells: `current` (state at time t) and
/// `next` (state at t + dt). [`LocalBlock::swap`] exchanges them without
/// copying.
///
/// Interior cells `[1..height-1) × [1..width-1)` hold physical data. Margin
/// cells hold either a boundary value (physical edge) or the neighbor's most
/// recent interior edge (ghost).
#[derive(Clone, Debug, PartialEq)]
pub struct LocalBlock {
    dims: Dims,
    current: Vec<f64>,
    next: Vec<f64>,
}

impl LocalBlock {
    /// Zero-filled block.
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            current: vec![0.0; dims.len()],
            next: vec![0.0; dims.len()],
        }
    }

    pub fn dims(&self) -> Dims {
        self.dims
    }

    pub fn current(&self) -> &[f64] {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut [f64] {
        &mut self.current
    }

    pub fn next_mut(&mut self) -> &mut [f64] {
        &mut self.next
    }

    /// Split borrow for a stencil update: read `current`, write `next`.
    pub fn buffers_mut(&mut self) -> (&[f64], &mut [f64]) {
        (&self.current, &mut self.next)
    }

    pub fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
    }

    #[inline]
    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.current[self.dims.index(row, col)]
    }

    /// One full row of `current`, margin included.
    pub fn row(&self, row: usize) -> &[f64] {
        let start = self.dims.index(row, 0);
        &self.current[start..start + self.dims.width]
    }

    /// One full column of `current`, margin included.
    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.dims.height).map(|r| self.at(r, col)).collect()
    }

    /// Set every cell of the margin line on `side` of both buffers,
    /// corners included.
    pub fn fill_margin(&mut self, side: Direction, value: f64) {
        let Dims { height, width } = self.dims;
        let cells: Vec<usize> = match side {
            Direction::North => (0..width).map(|c| self.dims.index(0, c)).collect(),
            Direction::South => (0..width).map(|c| self.dims.index(height - 1, c)).collect(),
            Direction::West => (0..height).map(|r| self.dims.index(r, 0)).collect(),
            Direction::East => (0..height).map(|r| self.dims.index(r, width - 1)).collect(),
        };
        for i in cells {
            self.current[i] = value;
            self.next[i] = value;
        }
    }

    /// Copy of the interior of `current`, row-major.
    pub fn interior(&self) -> Vec<f64> {
        let Dims { height, width } = self.dims;
        (1..height - 1)
            .flat_map(|r| self.row(r)[1..width - 1].iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_exchanges_without_copy() {
        let mut b = LocalBlock::new(Dims::new(3, 3));
        b.next_mut()[4] = 7.0;
        let next_ptr = b.next_mut().as_ptr();
        b.swap();
        assert_eq!(b.at(1, 1), 7.0);
        assert_eq!(b.current().as_ptr(), next_ptr);
    }

    #[test]
    fn fill_margin_touches_only_that_side() {
        let mut b = LocalBlock::new(Dims::new(4, 5));
        b.fill_margin(Direction::West, 9.0);
        assert_eq!(b.column(0), vec![9.0; 4]);
        assert_eq!(b.column(1), vec![0.0; 4]);
        b.swap();
        assert_eq!(b.column(0), vec![9.0; 4]);
    }

    #[test]
    fn interior_strips_margin() {
        let mut b = LocalBlock::new(Dims::new(4, 4));
        for (i, v) in b.current_mut().iter_mut().enumerate() {
            *v = i as f64;
        }
        assert_eq!(b.interior(), vec![5.0, 6.0, 9.0, 10.0]);
        assert_eq!(b.row(2), &[8.0, 9.0, 10.0, 11.0]);
    }
}

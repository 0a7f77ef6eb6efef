//! Numerical kernels: heat stencil and the post-processing reductions.

use crate::data::local_block::LocalBlock;
use crate::topology::dims::Dims;
use crate::topology::grid::ProcessGrid;
use crate::topology::neighbors::Direction;

/// Reset `block` to zero and pin the west margin to `boundary_value` on
/// ranks in the first process column.
pub fn init_field(block: &mut LocalBlock, grid: &ProcessGrid, boundary_value: f64) {
    block.current_mut().fill(0.0);
    block.next_mut().fill(0.0);
    if grid.on_boundary(Direction::West) {
        block.fill_margin(Direction::West, boundary_value);
    }
}

/// One explicit diffusion step from `cur` into `next`, both `dims` in size.
///
/// Margin cells are copied unchanged (Dirichlet); each interior cell becomes
/// `0.5 * c + 0.125 * (w + e + n + s)`.
pub fn heat_step(cur: &[f64], next: &mut [f64], dims: Dims) {
    let Dims { height, width } = dims;
    debug_assert_eq!(cur.len(), dims.len());
    debug_assert_eq!(next.len(), dims.len());
    if height == 0 || width == 0 {
        return;
    }

    next[..width].copy_from_slice(&cur[..width]);
    let last = dims.index(height - 1, 0);
    next[last..last + width].copy_from_slice(&cur[last..last + width]);

    for r in 1..height.saturating_sub(1) {
        let row = dims.index(r, 0);
        next[row] = cur[row];
        next[row + width - 1] = cur[row + width - 1];
        for c in 1..width - 1 {
            let i = row + c;
            next[i] = 0.5 * cur[i]
                + 0.125 * (cur[i - 1] + cur[i + 1] + cur[i - width] + cur[i + width]);
        }
    }
}

/// [`heat_step`] on a block's own buffers (`current` → `next`).
pub fn step_block(block: &mut LocalBlock) {
    let dims = block.dims();
    let (cur, next) = block.buffers_mut();
    heat_step(cur, next, dims);
}

/// Turn `data` into `data - previous`, element-wise.
pub fn derivative(previous: &[f64], data: &mut [f64]) {
    debug_assert_eq!(previous.len(), data.len());
    for (d, p) in data.iter_mut().zip(previous) {
        *d -= p;
    }
}

/// Arithmetic mean of all values (NaN for an empty slice).
pub fn spatial_mean(data: &[f64]) -> f64 {
    data.iter().sum::<f64>() / data.len() as f64
}

/// Element-wise running mean over a sequence of equally sized arrays.
#[derive(Clone, Debug, Default)]
pub struct TemporalMean {
    sum: Vec<f64>,
    count: usize,
}

impl TemporalMean {
    pub fn new(len: usize) -> Self {
        Self {
            sum: vec![0.0; len],
            count: 0,
        }
    }

    pub fn add(&mut self, frame: &[f64]) {
        debug_assert_eq!(frame.len(), self.sum.len());
        for (s, v) in self.sum.iter_mut().zip(frame) {
            *s += v;
        }
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Mean of the frames added so far; `None` before the first one.
    pub fn mean(&self) -> Option<Vec<f64>> {
        (self.count > 0).then(|| {
            let n = self.count as f64;
            self.sum.iter().map(|s| s / n).collect()
        })
    }
}

#![allow(dead_code)]
use halo_grid::{
    data::local_block::LocalBlock,
    kernels::{init_field, step_block},
    topology::{dims::Dims, grid::ProcessGrid},
};
use std::path::PathBuf;

/// Scratch directory plus a file path inside it.
pub fn scratch(name: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    (dir, path)
}

/// Interior of the whole field after `iterations` steps on one block.
pub fn serial_reference(height: usize, width: usize, iterations: usize, boundary: f64) -> Vec<f64> {
    let mut block = LocalBlock::new(Dims::new(height + 2, width + 2));
    init_field(&mut block, &ProcessGrid::new(1, 0).unwrap(), boundary);
    for _ in 0..iterations {
        step_block(&mut block);
        block.swap();
    }
    block.interior()
}

/// Global row-major index of `(row, col)`.
pub fn gidx(width: usize, row: usize, col: usize) -> usize {
    row * width + col
}

/// Fill a block's interior with `f(global_row, global_col)`; margins stay 0.
pub fn fill_interior(
    block: &mut [f64],
    dims: Dims,
    offset: (usize, usize),
    f: impl Fn(usize, usize) -> f64,
) {
    for r in 1..dims.height - 1 {
        for c in 1..dims.width - 1 {
            block[dims.index(r, c)] = f(offset.0 + r - 1, offset.1 + c - 1);
        }
    }
}

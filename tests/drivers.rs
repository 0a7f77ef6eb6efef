mod util;

use halo_grid::algs::communicator::{NoComm, run_local};
use halo_grid::config::{AnalysisConfig, SimulationConfig};
use halo_grid::driver::{derivative, mean, simulate};
use halo_grid::grid_error::GridError;
use halo_grid::io::{Access, ArrayStore, DatasetName, GroupName, Hyperslab};
use halo_grid::kernels::spatial_mean;
use halo_grid::topology::Dims;
use serial_test::serial;
use std::path::Path;
use util::{scratch, serial_reference};

fn read_whole(path: &Path, dims: Dims, name: &DatasetName) -> Vec<f64> {
    let comm = NoComm;
    let mut store = ArrayStore::new(&comm);
    let f = store.open_file(Access::Independent, path).unwrap();
    let mut out = vec![0.0; dims.len()];
    store
        .read_block(f, &mut out, &Hyperslab::whole(dims), Access::Independent, name)
        .unwrap();
    store.close_file(f, Access::Independent).unwrap();
    out
}

fn read_in_group(path: &Path, step: usize, dims: Dims, name: &DatasetName) -> Vec<f64> {
    let comm = NoComm;
    let mut store = ArrayStore::new(&comm);
    let f = store.open_file(Access::Independent, path).unwrap();
    let g = store.create_group(f, &GroupName::Step(step)).unwrap();
    let mut out = vec![0.0; dims.len()];
    store
        .read_block(g, &mut out, &Hyperslab::whole(dims), Access::Independent, name)
        .unwrap();
    out
}

#[test]
#[serial]
fn simulation_snapshots_match_serial_run() {
    let (dir, heat) = scratch("heat.grid");
    let (h, w) = (8, 6);
    let cfg = SimulationConfig::new(5, h, w).with_output(&heat);
    let reports = run_local(4, |comm| simulate::run(&comm, &cfg).unwrap());
    assert!(reports.iter().all(|r| r.snapshots == vec![0, 1, 2, 3, 4, 5]));

    let dims = Dims::new(h, w);
    for step in [0, 3, 5] {
        let got = read_whole(&heat, dims, &DatasetName::Step(step));
        assert_eq!(got, serial_reference(h, w, step, 1_000_000.0), "step {step}");
    }
    drop(dir);
}

#[test]
#[serial]
fn snapshot_interval_skips_steps_but_keeps_the_last() {
    let (_dir, heat) = scratch("sparse.grid");
    let cfg = SimulationConfig::new(5, 4, 4).with_output(&heat).with_interval(2);
    let reports = run_local(2, |comm| simulate::run(&comm, &cfg).unwrap());
    assert_eq!(reports[0].snapshots, vec![0, 2, 4, 5]);

    let comm = NoComm;
    let mut store = ArrayStore::new(&comm);
    let f = store.open_file(Access::Independent, &heat).unwrap();
    assert_eq!(
        store.list_datasets(f).unwrap(),
        vec!["/step0", "/step2", "/step4", "/step5"]
    );
}

#[test]
#[serial]
fn derivative_of_consecutive_snapshots() {
    let (dir, heat) = scratch("heat.grid");
    let diags = dir.path().join("diags.grid");
    let (h, w) = (6, 4);
    let sim = SimulationConfig::new(4, h, w).with_output(&heat);
    run_local(4, |comm| simulate::run(&comm, &sim).unwrap());

    let cfg = AnalysisConfig::new(vec![1, 4]).with_paths(&heat, &diags);
    let reports = run_local(3, |comm| derivative::run(&comm, &cfg).unwrap());
    assert_eq!(reports[2].band.offset.row, 4);
    assert_eq!(reports[2].band.local, Dims::new(2, w));

    let dims = Dims::new(h, w);
    for step in [1, 4] {
        let prev = read_whole(&heat, dims, &DatasetName::Step(step - 1));
        let cur = read_whole(&heat, dims, &DatasetName::Step(step));
        let expected: Vec<f64> = cur.iter().zip(&prev).map(|(c, p)| c - p).collect();
        assert_eq!(
            read_in_group(&diags, step, dims, &DatasetName::Derivative),
            expected
        );
    }
}

#[test]
#[serial]
fn derivative_rejects_step_zero_and_uneven_rows() {
    let (dir, heat) = scratch("heat.grid");
    let diags = dir.path().join("diags.grid");
    let sim = SimulationConfig::new(2, 4, 4).with_output(&heat);
    run_local(1, |comm| simulate::run(&comm, &sim).unwrap());

    let zero = AnalysisConfig::new(vec![0, 1]).with_paths(&heat, &diags);
    let err = derivative::run(&NoComm, &zero).unwrap_err();
    assert!(matches!(err, GridError::InvalidConfig(_)));

    // 4 rows over 3 ranks; every rank sees the same error before writing
    let uneven = AnalysisConfig::new(vec![1]).with_paths(&heat, &diags);
    let errs = run_local(3, |comm| derivative::run(&comm, &uneven).unwrap_err());
    assert!(
        errs.iter()
            .all(|e| matches!(e, GridError::IndivisibleGrid { axis: "height", .. }))
    );
}

#[test]
#[serial]
fn derivative_needs_the_previous_snapshot() {
    let (dir, heat) = scratch("sparse.grid");
    let diags = dir.path().join("diags.grid");
    let sim = SimulationConfig::new(4, 4, 4).with_output(&heat).with_interval(2);
    run_local(2, |comm| simulate::run(&comm, &sim).unwrap());

    // /step1 was skipped by the interval
    let cfg = AnalysisConfig::new(vec![2]).with_paths(&heat, &diags);
    let errs = run_local(2, |comm| derivative::run(&comm, &cfg).unwrap_err());
    assert!(
        errs.iter()
            .all(|e| matches!(e, GridError::InvalidConfig(m) if m.contains("/step1")))
    );
    assert!(!diags.exists());
}

#[test]
#[serial]
fn mean_is_written_by_rank_zero_only() {
    let (dir, heat) = scratch("heat.grid");
    let diags = dir.path().join("diags.grid");
    let (h, w) = (4, 6);
    let sim = SimulationConfig::new(3, h, w).with_output(&heat);
    run_local(2, |comm| simulate::run(&comm, &sim).unwrap());

    let cfg = AnalysisConfig::new(vec![1, 3]).with_paths(&heat, &diags);
    let reports = run_local(3, |comm| mean::run(&comm, &cfg).unwrap());
    assert!(reports.iter().all(|r| *r == reports[0]));

    let dims = Dims::new(h, w);
    let s1 = read_whole(&heat, dims, &DatasetName::Step(1));
    let s3 = read_whole(&heat, dims, &DatasetName::Step(3));
    assert_eq!(reports[0].means, vec![(1, spatial_mean(&s1)), (3, spatial_mean(&s3))]);

    let m3 = read_in_group(&diags, 3, Dims::new(1, 1), &DatasetName::Mean);
    assert_eq!(m3, vec![spatial_mean(&s3)]);
    let tm = read_whole(&diags, dims, &DatasetName::TemporalMean);
    let expected: Vec<f64> = s1.iter().zip(&s3).map(|(a, b)| (a + b) / 2.0).collect();
    assert_eq!(tm, expected);
}

mod util;

use halo_grid::algs::communicator::{Communicator, NoComm, run_local};
use halo_grid::fatal::OrAbort;
use halo_grid::grid_error::GridError;
use halo_grid::io::{Access, ArrayStore, DatasetName, GroupName, Hyperslab};
use halo_grid::topology::{Dims, Offset, Topology};
use serial_test::serial;
use util::{fill_interior, gidx, scratch};

#[test]
fn independent_roundtrip_is_bit_identical() {
    let (_dir, path) = scratch("bits.grid");
    let g = Dims::new(3, 4);
    let values: Vec<f64> = vec![
        0.0, -0.0, 1.5, f64::MIN_POSITIVE,
        f64::MAX, -1e-300, std::f64::consts::PI, 1e6,
        f64::INFINITY, f64::NEG_INFINITY, 7.25, -3.0,
    ];
    let comm = NoComm;
    {
        let mut store = ArrayStore::new(&comm);
        let f = store.create_file(Access::Independent, &path).unwrap();
        store
            .write_block(f, &values, &Hyperslab::whole(g), Access::Independent, &DatasetName::Step(0))
            .unwrap();
        store.close_file(f, Access::Independent).unwrap();
    }
    let mut store = ArrayStore::new(&comm);
    let f = store.open_file(Access::Independent, &path).unwrap();
    assert_eq!(store.global_dims(f, &DatasetName::Step(0)).unwrap(), g);
    let mut back = vec![0.0; g.len()];
    store
        .read_block(f, &mut back, &Hyperslab::whole(g), Access::Independent, &DatasetName::Step(0))
        .unwrap();
    let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(&back), bits(&values));
    store.close_file(f, Access::Independent).unwrap();
}

#[test]
#[serial]
fn four_ranks_write_disjoint_blocks_collectively() {
    let (_dir, path) = scratch("collective.grid");
    let (h, w) = (8, 6);
    let dims = run_local(4, |comm| {
        let topo = Topology::for_comm(&comm, h, w).unwrap();
        let off = topo.global_offset();
        let mut block = vec![-1.0; topo.block.len()];
        fill_interior(&mut block, topo.block, (off.row, off.col), |r, c| {
            gidx(w, r, c) as f64
        });

        let mut store = ArrayStore::new(&comm);
        let f = store.create_file(Access::Collective, &path).unwrap();
        let slab = Hyperslab::for_topology(&topo);
        store
            .write_block(f, &block, &slab, Access::Collective, &DatasetName::Step(0))
            .unwrap();
        store.close_file(f, Access::Collective).unwrap();

        let f = store.open_file(Access::Collective, &path).unwrap();
        let dims = store.global_dims(f, &DatasetName::Step(0)).unwrap();

        // read back a neighbor's block, margin left alone
        let other = topo.for_rank((comm.rank() + 1) % comm.size()).unwrap();
        let mut theirs = vec![-1.0; other.block.len()];
        store
            .read_block(
                f,
                &mut theirs,
                &Hyperslab::for_topology(&other),
                Access::Collective,
                &DatasetName::Step(0),
            )
            .unwrap();
        let o = other.global_offset();
        assert_eq!(theirs[other.block.index(1, 1)], gidx(w, o.row, o.col) as f64);
        assert_eq!(theirs[0], -1.0);
        store.close_file(f, Access::Collective).unwrap();
        dims
    });
    assert!(dims.iter().all(|&d| d == Dims::new(8, 6)));

    let comm = NoComm;
    let mut store = ArrayStore::new(&comm);
    let f = store.open_file(Access::Independent, &path).unwrap();
    let mut whole = vec![0.0; h * w];
    store
        .read_block(
            f,
            &mut whole,
            &Hyperslab::whole(Dims::new(h, w)),
            Access::Independent,
            &DatasetName::Step(0),
        )
        .unwrap();
    let expected: Vec<f64> = (0..h * w).map(|i| i as f64).collect();
    assert_eq!(whole, expected);
}

#[test]
#[serial]
fn rank_with_empty_extent_still_joins_the_round() {
    let (_dir, path) = scratch("empty.grid");
    run_local(3, |comm| {
        let g = Dims::new(2, 2);
        let mut store = ArrayStore::new(&comm);
        let f = store.create_file(Access::Collective, &path).unwrap();
        let slab = if comm.rank() == 2 {
            // margin swallows the whole buffer: nothing to write
            Hyperslab::new(Dims::new(2, 2), 1, g, Offset::new(0, 0))
        } else {
            Hyperslab::new(Dims::new(1, 2), 0, g, Offset::new(comm.rank(), 0))
        };
        let data = vec![comm.rank() as f64 + 1.0; slab.local.len()];
        store
            .write_block(f, &data, &slab, Access::Collective, &DatasetName::Mean)
            .unwrap();
        store.close_file(f, Access::Collective).unwrap();
    });

    let comm = NoComm;
    let mut store = ArrayStore::new(&comm);
    let f = store.open_file(Access::Independent, &path).unwrap();
    let mut out = vec![0.0; 4];
    store
        .read_block(
            f,
            &mut out,
            &Hyperslab::whole(Dims::new(2, 2)),
            Access::Independent,
            &DatasetName::Mean,
        )
        .unwrap();
    assert_eq!(out, vec![1.0, 1.0, 2.0, 2.0]);
}

#[test]
#[serial]
fn independent_creation_keeps_collective_offsets_in_step() {
    let (_dir, path) = scratch("mixed.grid");
    let g = Dims::new(2, 2);
    let rejected = run_local(2, |comm| {
        let mut store = ArrayStore::new(&comm);
        let f = store.create_file(Access::Collective, &path).unwrap();
        let rejected = if comm.rank() == 1 {
            let err = store
                .write_block(
                    f,
                    &[9.0; 4],
                    &Hyperslab::whole(g),
                    Access::Independent,
                    &DatasetName::custom("side"),
                )
                .unwrap_err();
            matches!(err, GridError::AccessMismatch { .. })
        } else {
            true
        };
        let row = Hyperslab::new(Dims::new(1, 2), 0, g, Offset::new(comm.rank(), 0));
        let data = vec![comm.rank() as f64 + 1.0; 2];
        store
            .write_block(f, &data, &row, Access::Collective, &DatasetName::Step(0))
            .unwrap();
        store.close_file(f, Access::Collective).unwrap();
        rejected
    });
    assert_eq!(rejected, vec![true, true]);

    let comm = NoComm;
    let mut store = ArrayStore::new(&comm);
    let f = store.open_file(Access::Independent, &path).unwrap();
    assert_eq!(store.list_datasets(f).unwrap(), vec!["/step0"]);
    let mut out = vec![0.0; 4];
    store
        .read_block(f, &mut out, &Hyperslab::whole(g), Access::Independent, &DatasetName::Step(0))
        .unwrap();
    assert_eq!(out, vec![1.0, 1.0, 2.0, 2.0]);
}

#[test]
fn missing_dataset_and_dimension_mismatch() {
    let (_dir, path) = scratch("errors.grid");
    let comm = NoComm;
    let mut store = ArrayStore::new(&comm);
    let f = store.create_file(Access::Independent, &path).unwrap();
    let g = Dims::new(2, 3);
    store
        .write_block(f, &[1.0; 6], &Hyperslab::whole(g), Access::Independent, &DatasetName::Step(1))
        .unwrap();

    let mut out = vec![0.0; 6];
    let err = store
        .read_block(f, &mut out, &Hyperslab::whole(g), Access::Independent, &DatasetName::Step(2))
        .unwrap_err();
    assert!(matches!(err, GridError::DatasetNotFound(ref n) if n == "/step2"));

    let mut wrong = vec![0.0; 6];
    let err = store
        .read_block(
            f,
            &mut wrong,
            &Hyperslab::whole(Dims::new(3, 2)),
            Access::Independent,
            &DatasetName::Step(1),
        )
        .unwrap_err();
    assert!(matches!(err, GridError::DimensionMismatch { stored: [2, 3], .. }));

    // first write fixes the shape
    let err = store
        .write_block(
            f,
            &[0.0; 4],
            &Hyperslab::whole(Dims::new(2, 2)),
            Access::Independent,
            &DatasetName::Step(1),
        )
        .unwrap_err();
    assert!(matches!(err, GridError::DimensionMismatch { .. }));
    assert!(store.global_dims(f, &DatasetName::Step(9)).is_err());
}

#[test]
fn groups_nest_dataset_names() {
    let (_dir, path) = scratch("groups.grid");
    let comm = NoComm;
    let mut store = ArrayStore::new(&comm);
    let f = store.create_file(Access::Independent, &path).unwrap();
    let g3 = store.create_group(f, &GroupName::Step(3)).unwrap();
    let one = Hyperslab::whole(Dims::new(1, 1));
    store
        .write_block(g3, &[2.5], &one, Access::Independent, &DatasetName::Mean)
        .unwrap();
    store
        .write_block(g3, &[0.5], &one, Access::Independent, &DatasetName::custom("./derivative"))
        .unwrap();
    store.close_group(g3).unwrap();
    assert!(store.close_group(g3).is_err());

    // reopening the group sees what was written through it
    let again = store.create_group(f, &GroupName::Step(3)).unwrap();
    let mut v = [0.0];
    store
        .read_block(again, &mut v, &one, Access::Independent, &DatasetName::Mean)
        .unwrap();
    assert_eq!(v, [2.5]);
    assert_eq!(
        store.list_datasets(f).unwrap(),
        vec!["/3/derivative".to_string(), "/3/mean".to_string()]
    );
    assert_eq!(store.open_handles(), 2);

    // closing the file releases groups still open beneath it
    store.close_file(f, Access::Independent).unwrap();
    assert_eq!(store.open_handles(), 0);
}

#[test]
fn catalog_is_only_visible_after_close() {
    let (_dir, path) = scratch("commit.grid");
    let comm = NoComm;
    {
        let mut store = ArrayStore::new(&comm);
        let f = store.create_file(Access::Independent, &path).unwrap();
        store
            .write_block(
                f,
                &[1.0],
                &Hyperslab::whole(Dims::new(1, 1)),
                Access::Independent,
                &DatasetName::Mean,
            )
            .unwrap();
        // dropped without close_file
    }
    let mut store = ArrayStore::new(&comm);
    let f = store.open_file(Access::Independent, &path).unwrap();
    assert!(store.list_datasets(f).unwrap().is_empty());

    // appending after reopen keeps earlier datasets readable
    let one = Hyperslab::whole(Dims::new(1, 1));
    store
        .write_block(f, &[4.0], &one, Access::Independent, &DatasetName::Step(0))
        .unwrap();
    store.close_file(f, Access::Independent).unwrap();
    let f = store.open_file(Access::Independent, &path).unwrap();
    store
        .write_block(f, &[5.0], &one, Access::Independent, &DatasetName::Step(1))
        .unwrap();
    store.close_file(f, Access::Independent).unwrap();

    let f = store.open_file(Access::Independent, &path).unwrap();
    let mut v = [0.0];
    store
        .read_block(f, &mut v, &one, Access::Independent, &DatasetName::Step(0))
        .unwrap();
    assert_eq!(v, [4.0]);
    store
        .read_block(f, &mut v, &one, Access::Independent, &DatasetName::Step(1))
        .unwrap();
    assert_eq!(v, [5.0]);
}

#[test]
fn opening_a_foreign_file_fails() {
    let (_dir, path) = scratch("not-a-store");
    std::fs::write(&path, b"hello").unwrap();
    let comm = NoComm;
    let mut store = ArrayStore::new(&comm);
    let err = store.open_file(Access::Independent, &path).unwrap_err();
    assert!(matches!(err, GridError::CorruptStore { .. }));
    let err = store
        .open_file(Access::Independent, path.with_extension("missing"))
        .unwrap_err();
    assert!(matches!(err, GridError::Io { .. }));
}

#[test]
#[serial]
#[should_panic(expected = "exit code 3")]
fn eleventh_open_handle_aborts_every_rank() {
    let (_dir, path) = scratch("full.grid");
    run_local(2, |comm| {
        let mut store = ArrayStore::new(&comm);
        let f = store
            .create_file(Access::Collective, &path)
            .or_abort(&comm);
        // rank 0 exhausts its table; rank 1 waits in the next collective call
        if comm.rank() == 0 {
            for step in 0..10 {
                store.create_group(f, &GroupName::Step(step)).or_abort(&comm);
            }
        }
        store.close_file(f, Access::Collective).or_abort(&comm);
    });
}

//! Parallel chunked array store.
//!
//! Many ranks write and read disjoint rectangular sub-blocks of named 2D
//! `f64` datasets inside one shared file. See [`crate::io::format`] for the
//! byte layout.
//!
//! # Collective calls
//!
//! A call made with [`Access::Collective`] is a synchronization point: every
//! rank of the job must make the same call (same file, same dataset name,
//! same global dims) in the same relative order. Every rank keeps its own
//! replica of the file's catalog and updates it identically, which is what
//! lets each rank compute dataset payload offsets without talking to the
//! others. A rank that skips a collective call leaves its peers blocked
//! forever; nothing here detects or times out on that.
//!
//! # Independent calls
//!
//! [`Access::Independent`] files are owned by the calling process. Several
//! ranks may read one independently opened file concurrently, but only one
//! process may modify it; concurrent independent writers to the same file
//! are unsupported.
//!
//! # Errors
//!
//! Every error is meant to be fatal to the whole job (see
//! [`crate::fatal`]). A rank that fails halfway through a collective call
//! has already desynchronized its peers; callers must not retry.

use crate::algs::communicator::Communicator;
use crate::algs::wire::{f64s_from_le, f64s_to_le};
use crate::grid_error::GridError;
use crate::io::format::{
    self, Catalog, DatasetEntry, ELEMENT_SIZE, ElementType, HEADER_LEN, StoreHeader,
};
use crate::io::naming::{DatasetName, GroupName, join};
use crate::io::registry::{DEFAULT_CAPACITY, Handle, HandleRegistry};
use crate::topology::dims::{Dims, Offset};
use crate::topology::grid::{HALO_WIDTH, Topology};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

/// How a file is opened and how a transfer is performed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Access {
    /// All ranks participate; the call synchronizes the job.
    Collective,
    /// Only the calling process participates.
    Independent,
}

impl Access {
    pub fn is_collective(self) -> bool {
        self == Access::Collective
    }

    fn adverb(self) -> &'static str {
        match self {
            Access::Collective => "collectively",
            Access::Independent => "independently",
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.adverb())
    }
}

/// Where a local buffer lives inside a global dataset.
///
/// `local` is the full buffer shape, `margin` cells are stripped from every
/// side, and the remaining interior maps onto the global array starting at
/// `offset`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Hyperslab {
    pub local: Dims,
    pub margin: usize,
    pub global: Dims,
    pub offset: Offset,
}

impl Hyperslab {
    pub fn new(local: Dims, margin: usize, global: Dims, offset: Offset) -> Self {
        Self {
            local,
            margin,
            global,
            offset,
        }
    }

    /// Interior of a simulation block at its rank's global position.
    pub fn for_topology(topology: &Topology) -> Self {
        Self::new(
            topology.block,
            HALO_WIDTH,
            topology.global,
            topology.global_offset(),
        )
    }

    /// The whole dataset as one margin-free block.
    pub fn whole(global: Dims) -> Self {
        Self::new(global, 0, global, Offset::default())
    }

    /// Band of full-width rows owned by `rank` when `global` is split
    /// evenly by rows over `size` ranks.
    pub fn row_band(global: Dims, rank: usize, size: usize) -> Result<Self, GridError> {
        if size == 0 || global.height % size != 0 {
            return Err(GridError::IndivisibleGrid {
                axis: "height",
                axis_parts: "ranks",
                global: global.height,
                parts: size,
            });
        }
        let rows = global.height / size;
        Ok(Self::new(
            Dims::new(rows, global.width),
            0,
            global,
            Offset::new(rank * rows, 0),
        ))
    }

    /// Extent actually transferred (local minus margins).
    pub fn extent(&self) -> Option<Dims> {
        self.local.shrink(self.margin)
    }

    fn validate(&self, dataset: &str, buf_len: usize) -> Result<Dims, GridError> {
        let invalid_buffer = || GridError::InvalidBuffer {
            dims: self.local.to_array(),
            margin: self.margin,
            expected: self.local.len(),
            actual: buf_len,
        };
        if buf_len != self.local.len() {
            return Err(invalid_buffer());
        }
        let extent = self.extent().ok_or_else(invalid_buffer)?;
        let fits = self.offset.row + extent.height <= self.global.height
            && self.offset.col + extent.width <= self.global.width;
        if !fits {
            return Err(GridError::BlockOutOfBounds {
                dataset: dataset.to_owned(),
                offset: self.offset.to_array(),
                extent: extent.to_array(),
                global: self.global.to_array(),
            });
        }
        Ok(extent)
    }
}

/// Shape and encoding of one dataset, as recorded in the catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetDescriptor {
    pub path: String,
    pub dims: Dims,
    pub element: ElementType,
    pub access: Access,
}

#[derive(Debug)]
struct FileEntry {
    path: PathBuf,
    file: File,
    access: Access,
    catalog: Catalog,
    next_free: u64,
    /// Catalog changed since open.
    dirty: bool,
    /// This process wrote payload bytes since open.
    written: bool,
}

impl FileEntry {
    fn load(path: PathBuf, file: File, access: Access) -> Result<Self, GridError> {
        let header = format::read_header(&file, &path)?;
        let catalog = format::read_catalog(&file, &path, &header)?;
        Ok(Self {
            path,
            file,
            access,
            catalog,
            next_free: header.next_free(),
            dirty: false,
            written: false,
        })
    }

    /// Look up `dataset`, creating it at `global` if it does not exist yet.
    ///
    /// On a collectively opened file only a collective call may create a
    /// dataset: creation moves `next_free`, which must stay identical on
    /// every rank's catalog replica.
    fn dataset_or_create(
        &mut self,
        dataset: &str,
        global: Dims,
        access: Access,
    ) -> Result<DatasetEntry, GridError> {
        if let Some(entry) = self.catalog.datasets.get(dataset) {
            if entry.dims != global.to_array() {
                return Err(GridError::DimensionMismatch {
                    dataset: dataset.to_owned(),
                    stored: entry.dims,
                    requested: global.to_array(),
                });
            }
            return Ok(entry.clone());
        }
        if self.access.is_collective() && !access.is_collective() {
            return Err(GridError::AccessMismatch {
                path: self.path.clone(),
                opened: self.access.adverb(),
                requested: access.adverb(),
            });
        }
        let entry = DatasetEntry {
            dims: global.to_array(),
            element: ElementType::F64Le,
            offset: self.next_free,
        };
        self.next_free += entry.byte_len();
        self.dirty = true;
        // unwritten cells must read back as zeros rather than hitting EOF
        let len = self
            .file
            .metadata()
            .map_err(|e| GridError::io(&self.path, e))?
            .len();
        if len < self.next_free {
            self.file
                .set_len(self.next_free)
                .map_err(|e| GridError::io(&self.path, e))?;
        }
        self.catalog.datasets.insert(dataset.to_owned(), entry.clone());
        log::debug!(
            "{:?}: created dataset {dataset} {global} at byte {}",
            self.path,
            entry.offset
        );
        Ok(entry)
    }

    fn lookup(&self, dataset: &str) -> Result<&DatasetEntry, GridError> {
        self.catalog
            .datasets
            .get(dataset)
            .ok_or_else(|| GridError::DatasetNotFound(dataset.to_owned()))
    }

    fn check_access(&self, requested: Access) -> Result<(), GridError> {
        if requested.is_collective() && !self.access.is_collective() {
            return Err(GridError::AccessMismatch {
                path: self.path.clone(),
                opened: self.access.adverb(),
                requested: requested.adverb(),
            });
        }
        Ok(())
    }

    fn commit(&self) -> Result<(), GridError> {
        format::commit(&self.file, &self.path, &self.catalog, self.next_free)?;
        log::debug!(
            "{:?}: committed {} datasets, {} groups",
            self.path,
            self.catalog.datasets.len(),
            self.catalog.groups.len()
        );
        Ok(())
    }
}

#[derive(Debug)]
struct GroupEntry {
    file: Handle,
    path: String,
}

#[derive(Debug)]
enum Resource {
    File(FileEntry),
    Group(GroupEntry),
}

/// Store front end for one rank: a communicator plus the rank's own
/// handle registry.
pub struct ArrayStore<'c, C: Communicator> {
    comm: &'c C,
    registry: HandleRegistry<Resource>,
}

impl<'c, C: Communicator> ArrayStore<'c, C> {
    /// Store with the default registry capacity.
    pub fn new(comm: &'c C) -> Self {
        Self::with_capacity(comm, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(comm: &'c C, capacity: usize) -> Self {
        Self {
            comm,
            registry: HandleRegistry::with_capacity(capacity),
        }
    }

    pub fn comm(&self) -> &'c C {
        self.comm
    }

    /// Open files plus open groups.
    pub fn open_handles(&self) -> usize {
        self.registry.open_count()
    }

    /// Create (truncating) a store file.
    ///
    /// Collective: rank 0 creates the file, then every rank opens it.
    pub fn create_file(&mut self, access: Access, path: impl AsRef<Path>) -> Result<Handle, GridError> {
        let path = path.as_ref().to_path_buf();
        if !access.is_collective() || self.comm.rank() == 0 {
            let file = File::options()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)
                .map_err(|e| GridError::io(&path, e))?;
            format::write_header(&file, &path, &StoreHeader::new(0, 0, HEADER_LEN))?;
            file.sync_all().map_err(|e| GridError::io(&path, e))?;
        }
        if access.is_collective() {
            self.comm.barrier();
        }
        let file = open_rw(&path)?;
        let entry = FileEntry::load(path, file, access)?;
        log::info!("rank {}: created {:?} {access}", self.comm.rank(), entry.path);
        self.registry.allocate(Resource::File(entry))
    }

    /// Open an existing store file for reading and appending.
    pub fn open_file(&mut self, access: Access, path: impl AsRef<Path>) -> Result<Handle, GridError> {
        let path = path.as_ref().to_path_buf();
        let file = open_rw(&path)?;
        let entry = FileEntry::load(path, file, access)?;
        if access.is_collective() {
            self.comm.barrier();
        }
        log::info!(
            "rank {}: opened {:?} {access} ({} datasets)",
            self.comm.rank(),
            entry.path,
            entry.catalog.datasets.len()
        );
        self.registry.allocate(Resource::File(entry))
    }

    /// Create (or reopen) a group below a file or another group.
    ///
    /// On a collectively opened file this is a collective call: every rank
    /// must create the same groups in the same order so their catalog
    /// replicas stay identical.
    pub fn create_group(&mut self, parent: Handle, name: &GroupName) -> Result<Handle, GridError> {
        let (file_handle, base) = self.resolve(parent)?;
        let path = join(&base, &name.segments());
        let file = self.file_mut(file_handle)?;
        if file.catalog.groups.insert(path.clone()) {
            file.dirty = true;
        }
        log::debug!("group {path} opened under {file_handle}");
        self.registry.allocate(Resource::Group(GroupEntry {
            file: file_handle,
            path,
        }))
    }

    pub fn close_group(&mut self, handle: Handle) -> Result<(), GridError> {
        match self.registry.get(handle)? {
            Resource::Group(_) => {
                self.registry.release(handle)?;
                Ok(())
            }
            Resource::File(_) => Err(GridError::InvalidHandle {
                handle: handle.index(),
                reason: "is a file, not a group",
            }),
        }
    }

    /// Write the interior of `data` (see [`Hyperslab`]) into `name`,
    /// creating the dataset at `slab.global` on first use.
    ///
    /// Collective: every rank calls with the same name and global dims; a
    /// rank with nothing to contribute passes an empty extent and still
    /// takes part in the round. An independent write on a collectively
    /// opened file may only target a dataset that already exists.
    pub fn write_block(
        &mut self,
        handle: Handle,
        data: &[f64],
        slab: &Hyperslab,
        access: Access,
        name: &DatasetName,
    ) -> Result<(), GridError> {
        let (file_handle, base) = self.resolve(handle)?;
        let dataset = join(&base, &name.segments());
        let extent = slab.validate(&dataset, data.len())?;
        let file = self.file_mut(file_handle)?;
        file.check_access(access)?;
        let entry = file.dataset_or_create(&dataset, slab.global, access)?;

        let mut bytes = Vec::with_capacity(extent.width * ELEMENT_SIZE as usize);
        for i in 0..extent.height {
            let start = slab.local.index(slab.margin + i, slab.margin);
            bytes.clear();
            f64s_to_le(&data[start..start + extent.width], &mut bytes);
            let pos = entry.element_pos(slab.offset.row + i, slab.offset.col);
            file.file
                .write_all_at(&bytes, pos)
                .map_err(|e| GridError::io(&file.path, e))?;
        }
        file.written |= !extent.is_empty();
        log::trace!(
            "rank {}: wrote {extent} of {dataset} at {:?}",
            self.comm.rank(),
            slab.offset
        );

        if access.is_collective() {
            self.comm.barrier();
        }
        Ok(())
    }

    /// Read a sub-block of `name` into the interior of `out`; margin cells
    /// of `out` are left as they are.
    ///
    /// Collective: the round starts with a barrier, so blocks written by
    /// peers before the call are visible.
    pub fn read_block(
        &mut self,
        handle: Handle,
        out: &mut [f64],
        slab: &Hyperslab,
        access: Access,
        name: &DatasetName,
    ) -> Result<(), GridError> {
        let (file_handle, base) = self.resolve(handle)?;
        let dataset = join(&base, &name.segments());
        let extent = slab.validate(&dataset, out.len())?;
        self.file_ref(file_handle)?.check_access(access)?;
        if access.is_collective() {
            self.comm.barrier();
        }
        let file = self.file_ref(file_handle)?;
        let entry = file.lookup(&dataset)?;
        if entry.dims != slab.global.to_array() {
            return Err(GridError::DimensionMismatch {
                dataset,
                stored: entry.dims,
                requested: slab.global.to_array(),
            });
        }

        let mut bytes = vec![0u8; extent.width * ELEMENT_SIZE as usize];
        for i in 0..extent.height {
            let pos = entry.element_pos(slab.offset.row + i, slab.offset.col);
            file.file
                .read_exact_at(&mut bytes, pos)
                .map_err(|e| GridError::io(&file.path, e))?;
            let start = slab.local.index(slab.margin + i, slab.margin);
            f64s_from_le(&bytes, &mut out[start..start + extent.width]).map_err(|reason| {
                GridError::CorruptStore {
                    path: file.path.clone(),
                    reason,
                }
            })?;
        }
        Ok(())
    }

    /// Global shape of an existing dataset, without touching its payload.
    pub fn global_dims(&self, handle: Handle, name: &DatasetName) -> Result<Dims, GridError> {
        Ok(self.describe(handle, name)?.dims)
    }

    pub fn describe(&self, handle: Handle, name: &DatasetName) -> Result<DatasetDescriptor, GridError> {
        let (file_handle, base) = self.resolve(handle)?;
        let dataset = join(&base, &name.segments());
        let file = self.file_ref(file_handle)?;
        let entry = file.lookup(&dataset)?;
        Ok(DatasetDescriptor {
            dims: Dims::from(entry.dims),
            element: entry.element,
            access: file.access,
            path: dataset,
        })
    }

    /// Paths of all datasets in the file behind `handle`, sorted.
    pub fn list_datasets(&self, handle: Handle) -> Result<Vec<String>, GridError> {
        let (file_handle, _) = self.resolve(handle)?;
        Ok(self.file_ref(file_handle)?.catalog.datasets.keys().cloned().collect())
    }

    /// Persist the catalog and release the file handle together with every
    /// group still open beneath it.
    ///
    /// Collective: every rank flushes its payload writes, rank 0 commits the
    /// catalog, and nobody leaves before the commit is on disk.
    pub fn close_file(&mut self, handle: Handle, access: Access) -> Result<(), GridError> {
        let file = self.file_ref(handle)?;
        if file.access != access {
            return Err(GridError::AccessMismatch {
                path: file.path.clone(),
                opened: file.access.adverb(),
                requested: access.adverb(),
            });
        }
        let groups = self
            .registry
            .handles_where(|r| matches!(r, Resource::Group(g) if g.file == handle));
        for g in groups {
            log::debug!("closing group {g} left open under {handle}");
            self.registry.release(g)?;
        }
        let Resource::File(file) = self.registry.release(handle)? else {
            return Err(GridError::InvalidHandle {
                handle: handle.index(),
                reason: "is a group, not a file",
            });
        };

        if access.is_collective() {
            if file.written {
                file.file
                    .sync_data()
                    .map_err(|e| GridError::io(&file.path, e))?;
            }
            self.comm.barrier();
            if self.comm.rank() == 0 && file.dirty {
                file.commit()?;
            }
            self.comm.barrier();
        } else if file.dirty {
            file.commit()?;
        } else if file.written {
            file.file
                .sync_data()
                .map_err(|e| GridError::io(&file.path, e))?;
        }
        log::info!("rank {}: closed {:?}", self.comm.rank(), file.path);
        Ok(())
    }

    /// File handle and absolute base path behind a file or group handle.
    fn resolve(&self, handle: Handle) -> Result<(Handle, String), GridError> {
        match self.registry.get(handle)? {
            Resource::File(_) => Ok((handle, String::new())),
            Resource::Group(g) => Ok((g.file, g.path.clone())),
        }
    }

    fn file_ref(&self, handle: Handle) -> Result<&FileEntry, GridError> {
        match self.registry.get(handle)? {
            Resource::File(f) => Ok(f),
            Resource::Group(_) => Err(GridError::InvalidHandle {
                handle: handle.index(),
                reason: "is a group, not a file",
            }),
        }
    }

    fn file_mut(&mut self, handle: Handle) -> Result<&mut FileEntry, GridError> {
        match self.registry.get_mut(handle)? {
            Resource::File(f) => Ok(f),
            Resource::Group(_) => Err(GridError::InvalidHandle {
                handle: handle.index(),
                reason: "is a group, not a file",
            }),
        }
    }
}

impl<C: Communicator> Drop for ArrayStore<'_, C> {
    fn drop(&mut self) {
        for h in self
            .registry
            .handles_where(|r| matches!(r, Resource::File(f) if f.dirty))
        {
            log::warn!("store dropped with {h} still open; its catalog changes are lost");
        }
    }
}

fn open_rw(path: &Path) -> Result<File, GridError> {
    match File::options().read(true).write(true).open(path) {
        Ok(f) => Ok(f),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            log::debug!("{path:?} is read-only; opening without write access");
            File::open(path).map_err(|e| GridError::io(path, e))
        }
        Err(e) => Err(GridError::io(path, e)),
    }
}

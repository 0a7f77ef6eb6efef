//! On-disk layout of a store file.
//!
//! ```text
//! offset 0            StoreHeader (64 bytes, little-endian)
//! offset 64 ..        dataset payloads, each a dense row-major block of
//!                     f64 (little-endian) of its global dims
//! catalog_offset ..   catalog (JSON): dataset name → dims + payload offset,
//!                     plus the set of group paths
//! ```
//!
//! The header is the commit point. A commit appends the catalog after the
//! last payload byte and only then rewrites the header, so a reader always
//! sees either the previous or the new catalog. New payloads are allocated
//! after the old catalog, which stays intact until the next header write.

use crate::grid_error::GridError;
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::Path;

pub const MAGIC: [u8; 8] = *b"HALOGRD\0";

/// Bump when the layout or semantics change in incompatible ways.
pub const FORMAT_VERSION: u32 = 1;

pub const HEADER_LEN: u64 = size_of::<StoreHeader>() as u64;

pub const ELEMENT_SIZE: u64 = size_of::<f64>() as u64;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct StoreHeader {
    pub magic: [u8; 8],
    pub version_le: u32,
    pub reserved_le: u32,
    pub catalog_offset_le: u64,
    pub catalog_len_le: u64,
    /// First byte past the last payload at commit time.
    pub data_end_le: u64,
    pub padding: [u64; 3],
}

impl StoreHeader {
    pub fn new(catalog_offset: u64, catalog_len: u64, data_end: u64) -> Self {
        Self {
            magic: MAGIC,
            version_le: FORMAT_VERSION.to_le(),
            reserved_le: 0,
            catalog_offset_le: catalog_offset.to_le(),
            catalog_len_le: catalog_len.to_le(),
            data_end_le: data_end.to_le(),
            padding: [0; 3],
        }
    }

    pub fn version(&self) -> u32 {
        u32::from_le(self.version_le)
    }
    pub fn catalog_offset(&self) -> u64 {
        u64::from_le(self.catalog_offset_le)
    }
    pub fn catalog_len(&self) -> u64 {
        u64::from_le(self.catalog_len_le)
    }
    pub fn data_end(&self) -> u64 {
        u64::from_le(self.data_end_le)
    }

    /// First byte that new payloads may use without clobbering the
    /// committed catalog.
    pub fn next_free(&self) -> u64 {
        self.data_end()
            .max(self.catalog_offset() + self.catalog_len())
            .max(HEADER_LEN)
    }
}

/// Element encoding of a dataset. Only one exists today.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    #[serde(rename = "f64le")]
    F64Le,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetEntry {
    /// Global `[height, width]`; fixed at creation.
    pub dims: [usize; 2],
    pub element: ElementType,
    /// Byte offset of element `(0, 0)`.
    pub offset: u64,
}

impl DatasetEntry {
    pub fn byte_len(&self) -> u64 {
        (self.dims[0] * self.dims[1]) as u64 * ELEMENT_SIZE
    }

    /// Byte position of element `(row, col)`.
    pub fn element_pos(&self, row: usize, col: usize) -> u64 {
        self.offset + (row * self.dims[1] + col) as u64 * ELEMENT_SIZE
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub version: u32,
    pub datasets: BTreeMap<String, DatasetEntry>,
    pub groups: BTreeSet<String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            version: FORMAT_VERSION,
            ..Default::default()
        }
    }
}

pub fn write_header(file: &File, path: &Path, header: &StoreHeader) -> Result<(), GridError> {
    file.write_all_at(bytemuck::bytes_of(header), 0)
        .map_err(|e| GridError::io(path, e))
}

pub fn read_header(file: &File, path: &Path) -> Result<StoreHeader, GridError> {
    let mut header = StoreHeader::zeroed();
    file.read_exact_at(bytemuck::bytes_of_mut(&mut header), 0)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => GridError::CorruptStore {
                path: path.to_path_buf(),
                reason: "file shorter than header".into(),
            },
            _ => GridError::io(path, e),
        })?;
    if header.magic != MAGIC {
        return Err(GridError::CorruptStore {
            path: path.to_path_buf(),
            reason: "bad magic; not a store file".into(),
        });
    }
    if header.version() != FORMAT_VERSION {
        return Err(GridError::CorruptStore {
            path: path.to_path_buf(),
            reason: format!(
                "format version {} (expected {FORMAT_VERSION})",
                header.version()
            ),
        });
    }
    Ok(header)
}

/// Load the catalog the header points at. An empty catalog region means a
/// freshly created file with nothing committed yet.
pub fn read_catalog(file: &File, path: &Path, header: &StoreHeader) -> Result<Catalog, GridError> {
    if header.catalog_len() == 0 {
        return Ok(Catalog::new());
    }
    let mut raw = vec![0u8; header.catalog_len() as usize];
    file.read_exact_at(&mut raw, header.catalog_offset())
        .map_err(|e| GridError::io(path, e))?;
    let catalog: Catalog = serde_json::from_slice(&raw).map_err(|e| GridError::CorruptStore {
        path: path.to_path_buf(),
        reason: format!("unreadable catalog: {e}"),
    })?;
    for (name, entry) in &catalog.datasets {
        if entry.offset < HEADER_LEN || entry.offset + entry.byte_len() > header.next_free() {
            return Err(GridError::CorruptStore {
                path: path.to_path_buf(),
                reason: format!("dataset `{name}` lies outside the data region"),
            });
        }
    }
    Ok(catalog)
}

/// Append `catalog` at `data_end`, flush, then publish it through the header.
pub fn commit(file: &File, path: &Path, catalog: &Catalog, data_end: u64) -> Result<(), GridError> {
    let raw = serde_json::to_vec(catalog).map_err(|e| GridError::CorruptStore {
        path: path.to_path_buf(),
        reason: format!("catalog encoding failed: {e}"),
    })?;
    file.write_all_at(&raw, data_end)
        .map_err(|e| GridError::io(path, e))?;
    file.sync_data().map_err(|e| GridError::io(path, e))?;
    write_header(file, path, &StoreHeader::new(data_end, raw.len() as u64, data_end))?;
    file.sync_all().map_err(|e| GridError::io(path, e))
}

//! Region layout and its persisted store.
//!
//! The store holds an ordered list of `(x, y)` corners only. Region width and
//! height are session constants carried by [`RegionSize`].
//!
//! Binary layout (little endian):
//!
//! ```text
//! "PWL1" | count: u32 | count * (x: i32, y: i32)
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::LayoutError;

const LAYOUT_MAGIC: &[u8; 4] = b"PWL1";

/// Upper bound on stored regions, guards allocation on corrupt input.
const MAX_REGIONS: usize = 65_536;

pub const DEFAULT_REGION_WIDTH: u32 = 103;
pub const DEFAULT_REGION_HEIGHT: u32 = 43;

/// Top-left corner of one monitored stall.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
}

impl Region {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSize {
    pub width: u32,
    pub height: u32,
}

impl RegionSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl Default for RegionSize {
    fn default() -> Self {
        Self::new(DEFAULT_REGION_WIDTH, DEFAULT_REGION_HEIGHT)
    }
}

/// Ordered regions for one detection session. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionLayout {
    regions: Vec<Region>,
    size: RegionSize,
}

impl RegionLayout {
    pub fn new(regions: Vec<Region>, size: RegionSize) -> Self {
        Self { regions, size }
    }

    pub fn load(store: &dyn LayoutStore, size: RegionSize) -> Result<Self, LayoutError> {
        let regions = store.load()?;
        log::info!(
            "loaded {} regions ({}x{}) from {}",
            regions.len(),
            size.width,
            size.height,
            store.describe()
        );
        Ok(Self::new(regions, size))
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn size(&self) -> RegionSize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Capability that yields the persisted region corners.
pub trait LayoutStore {
    /// Load corners in stored order. Absence must map to [`LayoutError::NotFound`].
    fn load(&self) -> Result<Vec<Region>, LayoutError>;

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

/// Layout store backed by a file in the `PWL1` format.
#[derive(Clone, Debug)]
pub struct FileLayoutStore {
    path: PathBuf,
}

impl FileLayoutStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, regions: &[Region]) -> Result<(), LayoutError> {
        let bytes = encode_layout(regions)?;
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }
}

impl LayoutStore for FileLayoutStore {
    fn load(&self) -> Result<Vec<Region>, LayoutError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LayoutError::NotFound(self.path.display().to_string()));
            }
            Err(e) => return Err(LayoutError::Io(e)),
        };
        decode_layout(&bytes)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Layout store held in memory. `None` behaves like a missing file.
#[derive(Clone, Debug, Default)]
pub struct InMemoryLayoutStore {
    regions: Option<Vec<Region>>,
}

impl InMemoryLayoutStore {
    pub fn new(regions: Vec<Region>) -> Self {
        Self {
            regions: Some(regions),
        }
    }

    pub fn missing() -> Self {
        Self { regions: None }
    }
}

impl LayoutStore for InMemoryLayoutStore {
    fn load(&self) -> Result<Vec<Region>, LayoutError> {
        self.regions
            .clone()
            .ok_or_else(|| LayoutError::NotFound("memory".to_string()))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

pub fn encode_layout(regions: &[Region]) -> Result<Vec<u8>, LayoutError> {
    if regions.len() > MAX_REGIONS {
        return Err(LayoutError::Malformed(format!(
            "{} regions exceeds maximum {}",
            regions.len(),
            MAX_REGIONS
        )));
    }
    let mut out = Vec::with_capacity(8 + regions.len() * 8);
    out.extend_from_slice(LAYOUT_MAGIC);
    out.extend_from_slice(&(regions.len() as u32).to_le_bytes());
    for region in regions {
        out.extend_from_slice(&region.x.to_le_bytes());
        out.extend_from_slice(&region.y.to_le_bytes());
    }
    Ok(out)
}

pub fn decode_layout(bytes: &[u8]) -> Result<Vec<Region>, LayoutError> {
    let mut cursor = 0usize;
    let magic = read_slice(bytes, &mut cursor, LAYOUT_MAGIC.len())?;
    if magic != LAYOUT_MAGIC {
        return Err(LayoutError::Malformed("bad magic".to_string()));
    }
    let count = read_u32(bytes, &mut cursor)? as usize;
    if count > MAX_REGIONS {
        return Err(LayoutError::Malformed(format!(
            "region count {} exceeds maximum {}",
            count, MAX_REGIONS
        )));
    }
    let mut regions = Vec::with_capacity(count);
    for _ in 0..count {
        let x = read_i32(bytes, &mut cursor)?;
        let y = read_i32(bytes, &mut cursor)?;
        regions.push(Region::new(x, y));
    }
    if cursor != bytes.len() {
        return Err(LayoutError::Malformed(format!(
            "{} trailing bytes",
            bytes.len() - cursor
        )));
    }
    Ok(regions)
}

fn read_u32(bytes: &[u8], cursor: &mut usize) -> Result<u32, LayoutError> {
    let slice = read_slice(bytes, cursor, 4)?;
    Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

fn read_i32(bytes: &[u8], cursor: &mut usize) -> Result<i32, LayoutError> {
    let slice = read_slice(bytes, cursor, 4)?;
    Ok(i32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

fn read_slice<'a>(bytes: &'a [u8], cursor: &mut usize, len: usize) -> Result<&'a [u8], LayoutError> {
    if *cursor + len > bytes.len() {
        return Err(LayoutError::Malformed("truncated layout".to_string()));
    }
    let out = &bytes[*cursor..*cursor + len];
    *cursor += len;
    Ok(out)
}

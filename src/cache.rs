//! Binary cache of a computed likelihood lattice.
//!
//! Format (all little-endian):
//! - Header (40 bytes):
//!   - nx, ny, nz: u32
//!   - min x, y, z: f32
//!   - max x, y, z: f32
//!   - resolution: f32
//! - Cells: nx * ny * nz records of (distance: f32, probability: f32), x
//!   fastest, then y, then z.
//!
//! A cache only loads against the map it was computed from: every header
//! field must match the live lattice bit for bit.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::grid::Grid3d;
use crate::types::{Bounds3, CACHE_EXTENSION, GridCell, GridError, MapInfo};

/// Header size in bytes
pub const HEADER_SIZE: usize = 40;

/// Bytes per cell record
const RECORD_SIZE: usize = 8;

/// Cells encoded or decoded per buffered block
const BLOCK_CELLS: usize = 4096;

/// Default cache location for a map: same path, `grid` extension.
pub fn cache_path_for(map_path: &Path) -> PathBuf {
    map_path.with_extension(CACHE_EXTENSION)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CacheHeader {
    dims: [u32; 3],
    min: [f32; 3],
    max: [f32; 3],
    resolution: f32,
}

impl CacheHeader {
    fn new(info: &MapInfo, bounds: &Bounds3) -> Self {
        Self {
            dims: [info.width, info.height, info.depth],
            min: bounds.min.to_array(),
            max: bounds.max.to_array(),
            resolution: info.resolution,
        }
    }

    fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut header = [0u8; HEADER_SIZE];
        let words = self
            .dims
            .iter()
            .map(|d| d.to_le_bytes())
            .chain(self.min.iter().map(|v| v.to_le_bytes()))
            .chain(self.max.iter().map(|v| v.to_le_bytes()))
            .chain(std::iter::once(self.resolution.to_le_bytes()));
        for (chunk, word) in header.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word);
        }
        header
    }

    fn decode(header: &[u8; HEADER_SIZE]) -> Self {
        let word = |i: usize| {
            [
                header[4 * i],
                header[4 * i + 1],
                header[4 * i + 2],
                header[4 * i + 3],
            ]
        };
        let float = |i: usize| f32::from_le_bytes(word(i));
        Self {
            dims: [0, 1, 2].map(|i| u32::from_le_bytes(word(i))),
            min: [float(3), float(4), float(5)],
            max: [float(6), float(7), float(8)],
            resolution: float(9),
        }
    }

    /// Describe the first field that differs from `expected`, comparing floats bitwise.
    fn mismatch(&self, expected: &Self) -> Option<String> {
        if self.dims != expected.dims {
            return Some(format!(
                "dimensions {:?} differ from map {:?}",
                self.dims, expected.dims
            ));
        }
        let same = |a: &[f32], b: &[f32]| a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits());
        if !same(&self.min, &expected.min) || !same(&self.max, &expected.max) {
            return Some(format!(
                "bounds {:?}..{:?} differ from map {:?}..{:?}",
                self.min, self.max, expected.min, expected.max
            ));
        }
        if self.resolution.to_bits() != expected.resolution.to_bits() {
            return Some(format!(
                "resolution {} differs from map {}",
                self.resolution, expected.resolution
            ));
        }
        None
    }
}

/// Save a lattice to a cache file.
pub fn save_grid(
    path: impl AsRef<Path>,
    grid: &Grid3d<GridCell>,
    bounds: &Bounds3,
) -> Result<(), GridError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_grid(grid, bounds, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a lattice in cache format.
pub fn write_grid<W: Write>(
    grid: &Grid3d<GridCell>,
    bounds: &Bounds3,
    writer: &mut W,
) -> Result<(), GridError> {
    writer.write_all(&CacheHeader::new(grid.info(), bounds).encode())?;

    let mut block = Vec::with_capacity(BLOCK_CELLS * RECORD_SIZE);
    for cells in grid.data().chunks(BLOCK_CELLS) {
        block.clear();
        for cell in cells {
            block.extend_from_slice(&cell.distance.to_le_bytes());
            block.extend_from_slice(&cell.probability.to_le_bytes());
        }
        writer.write_all(&block)?;
    }
    Ok(())
}

/// Load a cache file computed for the lattice `info` covering `bounds`.
pub fn load_grid(
    path: impl AsRef<Path>,
    info: &MapInfo,
    bounds: &Bounds3,
) -> Result<Grid3d<GridCell>, GridError> {
    let mut reader = BufReader::new(File::open(path)?);
    read_grid(&mut reader, info, bounds)
}

/// Read a lattice in cache format, rejecting headers that do not describe
/// `info` and `bounds` with [`GridError::CacheMismatch`].
pub fn read_grid<R: Read>(
    reader: &mut R,
    info: &MapInfo,
    bounds: &Bounds3,
) -> Result<Grid3d<GridCell>, GridError> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let cached = CacheHeader::decode(&header);
    if let Some(reason) = cached.mismatch(&CacheHeader::new(info, bounds)) {
        return Err(GridError::CacheMismatch(reason));
    }

    let count = info.cell_count();
    let mut cells = Vec::with_capacity(count);
    let mut block = vec![0u8; BLOCK_CELLS * RECORD_SIZE];
    while cells.len() < count {
        let n = (count - cells.len()).min(BLOCK_CELLS);
        let bytes = &mut block[..n * RECORD_SIZE];
        reader.read_exact(bytes)?;
        cells.extend(bytes.chunks_exact(RECORD_SIZE).map(|record| GridCell {
            distance: f32::from_le_bytes([record[0], record[1], record[2], record[3]]),
            probability: f32::from_le_bytes([record[4], record[5], record[6], record[7]]),
        }));
    }

    let mut extra = [0u8; 1];
    if reader.read(&mut extra)? != 0 {
        return Err(GridError::CacheMismatch(format!(
            "more than {count} cell records"
        )));
    }

    Grid3d::new(info.clone(), cells)
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, ErrorKind};

    use glam::Vec3;

    use super::*;

    fn sample() -> (Grid3d<GridCell>, Bounds3) {
        let info = MapInfo {
            width: 3,
            height: 2,
            depth: 2,
            resolution: 0.1,
            origin: Vec3::new(-0.05, -0.05, 0.0),
        };
        let cells = (0..info.cell_count())
            .map(|i| match i {
                0 => GridCell::default(),
                _ => GridCell::from_distance(i as f32 * 0.1, 0.2),
            })
            .collect();
        let bounds = Bounds3 {
            min: info.origin,
            max: info.origin + info.dims().as_vec3() * info.resolution,
        };
        (Grid3d::new(info, cells).unwrap(), bounds)
    }

    #[test]
    fn round_trip_is_bit_exact() {
        let (grid, bounds) = sample();
        let mut bytes = Vec::new();
        write_grid(&grid, &bounds, &mut bytes).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + 12 * RECORD_SIZE);

        let loaded = read_grid(&mut Cursor::new(&bytes), grid.info(), &bounds).unwrap();
        for (a, b) in loaded.data().iter().zip(grid.data()) {
            assert_eq!(a.distance.to_bits(), b.distance.to_bits());
            assert_eq!(a.probability.to_bits(), b.probability.to_bits());
        }
    }

    #[test]
    fn header_layout() {
        let (grid, bounds) = sample();
        let mut bytes = Vec::new();
        write_grid(&grid, &bounds, &mut bytes).unwrap();

        assert_eq!(&bytes[0..4], &3u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &2u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &(-0.05f32).to_le_bytes());
        assert_eq!(&bytes[36..40], &0.1f32.to_le_bytes());
        assert_eq!(&bytes[40..44], &(-1.0f32).to_le_bytes());
        assert_eq!(&bytes[44..48], &0.0f32.to_le_bytes());
    }

    #[test]
    fn altered_resolution_is_a_mismatch() {
        let (grid, bounds) = sample();
        let mut bytes = Vec::new();
        write_grid(&grid, &bounds, &mut bytes).unwrap();
        bytes[36..40].copy_from_slice(&0.2f32.to_le_bytes());

        let result = read_grid(&mut Cursor::new(&bytes), grid.info(), &bounds);
        assert!(matches!(result, Err(GridError::CacheMismatch(_))));
    }

    #[test]
    fn different_bounds_are_a_mismatch() {
        let (grid, bounds) = sample();
        let mut bytes = Vec::new();
        write_grid(&grid, &bounds, &mut bytes).unwrap();

        let mut moved = bounds;
        moved.max.z += 0.001;
        let result = read_grid(&mut Cursor::new(&bytes), grid.info(), &moved);
        assert!(matches!(result, Err(GridError::CacheMismatch(_))));
    }

    #[test]
    fn truncated_and_oversized_files_are_rejected() {
        let (grid, bounds) = sample();
        let mut bytes = Vec::new();
        write_grid(&grid, &bounds, &mut bytes).unwrap();

        let short = &bytes[..bytes.len() - 3];
        match read_grid(&mut Cursor::new(short), grid.info(), &bounds) {
            Err(GridError::Io(e)) => assert_eq!(e.kind(), ErrorKind::UnexpectedEof),
            other => panic!("expected io error, got {other:?}"),
        }

        bytes.push(0);
        let result = read_grid(&mut Cursor::new(&bytes), grid.info(), &bounds);
        assert!(matches!(result, Err(GridError::CacheMismatch(_))));
    }

    #[test]
    fn cache_path_replaces_extension() {
        assert_eq!(
            cache_path_for(Path::new("/maps/lab.bt")),
            PathBuf::from("/maps/lab.grid")
        );
    }
}

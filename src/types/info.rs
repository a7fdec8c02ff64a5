//! Lattice metadata.

use glam::{UVec3, Vec3};

use crate::types::{Bounds3, GridError, MAX_LATTICE_CELLS};

#[derive(Debug, Clone, PartialEq)]
pub struct MapInfo {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub resolution: f32,
    /// Corner of cell (0, 0, 0) in world coordinates (meters).
    pub origin: Vec3,
}

impl MapInfo {
    /// Lattice covering `bounds` at `resolution`, one cell per voxel.
    pub fn from_bounds(bounds: &Bounds3, resolution: f32) -> Result<Self, GridError> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(GridError::InvalidMetadata(format!(
                "resolution must be positive, got {resolution}"
            )));
        }
        if bounds.is_empty() {
            return Err(GridError::InvalidMetadata(
                "map has no known voxels".to_string(),
            ));
        }

        let extent = bounds.max - bounds.min;
        let info = Self {
            width: cells_along(extent.x, resolution),
            height: cells_along(extent.y, resolution),
            depth: cells_along(extent.z, resolution),
            resolution,
            origin: bounds.min,
        };

        let count = (info.width as u64) * (info.height as u64) * (info.depth as u64);
        if count > MAX_LATTICE_CELLS as u64 {
            return Err(GridError::InvalidMetadata(format!(
                "lattice of {}x{}x{} cells exceeds the limit of {} cells",
                info.width, info.height, info.depth, MAX_LATTICE_CELLS
            )));
        }

        Ok(info)
    }

    #[inline]
    pub fn dims(&self) -> UVec3 {
        UVec3::new(self.width, self.height, self.depth)
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        (self.width as usize) * (self.height as usize) * (self.depth as usize)
    }

    #[inline]
    pub fn step_y(&self) -> usize {
        self.width as usize
    }

    #[inline]
    pub fn step_z(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Flat index of a cell; x fastest, then y, then z.
    #[inline]
    pub fn index(&self, cell: UVec3) -> usize {
        cell.x as usize + cell.y as usize * self.step_y() + cell.z as usize * self.step_z()
    }

    /// Cell containing `pos`. The caller guarantees `pos` lies in the lattice
    /// extent; coordinates on the far face snap to the last cell.
    #[inline]
    pub fn cell_of(&self, pos: Vec3) -> UVec3 {
        let rel = ((pos - self.origin) / self.resolution).floor().max(Vec3::ZERO);
        rel.as_uvec3().min(self.dims() - UVec3::ONE)
    }

    /// Center of a cell in world coordinates.
    #[inline]
    pub fn cell_center(&self, cell: UVec3) -> Vec3 {
        self.origin + (cell.as_vec3() + Vec3::splat(0.5)) * self.resolution
    }
}

/// Number of cells spanning `extent`. Extents are float sums of voxel sizes,
/// so ratios within 1e-3 of an integer are taken as that integer.
fn cells_along(extent: f32, resolution: f32) -> u32 {
    let ratio = extent / resolution;
    let rounded = ratio.round();
    let cells = if (ratio - rounded).abs() < 1e-3 {
        rounded
    } else {
        ratio.ceil()
    };
    (cells as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bounds_snaps_float_noise() {
        let bounds = Bounds3 {
            min: Vec3::splat(-0.05),
            max: Vec3::new(1.05, 0.25, 0.05),
        };
        let info = MapInfo::from_bounds(&bounds, 0.1).unwrap();
        assert_eq!(info.dims(), UVec3::new(11, 3, 1));
        assert_eq!(info.origin, bounds.min);
        assert_eq!(info.step_y(), 11);
        assert_eq!(info.step_z(), 33);
    }

    #[test]
    fn from_bounds_rounds_partial_cells_up() {
        let bounds = Bounds3 {
            min: Vec3::ZERO,
            max: Vec3::new(0.25, 0.1, 0.1),
        };
        let info = MapInfo::from_bounds(&bounds, 0.1).unwrap();
        assert_eq!(info.width, 3);
    }

    #[test]
    fn from_bounds_rejects_bad_resolution() {
        let bounds = Bounds3 {
            min: Vec3::ZERO,
            max: Vec3::ONE,
        };
        assert!(MapInfo::from_bounds(&bounds, 0.0).is_err());
        assert!(MapInfo::from_bounds(&bounds, f32::NAN).is_err());
        assert!(MapInfo::from_bounds(&Bounds3::empty(), 0.1).is_err());
    }

    #[test]
    fn cell_of_clamps_far_face() {
        let bounds = Bounds3 {
            min: Vec3::ZERO,
            max: Vec3::ONE,
        };
        let info = MapInfo::from_bounds(&bounds, 0.1).unwrap();
        assert_eq!(info.dims(), UVec3::splat(10));
        assert_eq!(info.cell_of(Vec3::splat(0.05)), UVec3::ZERO);
        assert_eq!(info.cell_of(Vec3::splat(1.0)), UVec3::splat(9));
        assert_eq!(info.index(UVec3::new(1, 2, 3)), 1 + 2 * 10 + 3 * 100);
        let center = info.cell_center(UVec3::new(1, 0, 0));
        assert!((center.x - 0.15).abs() < 1e-6);
    }
}

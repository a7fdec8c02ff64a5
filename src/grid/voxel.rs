//! Imported volumetric map: the part of an octree the likelihood field needs.

use std::path::Path;

use glam::{UVec3, Vec3};

use crate::loaders::octomap::{self, OcTree};
use crate::types::{Bounds3, GridError, MAX_LATTICE_CELLS, MapInfo};

/// Occupied voxels of a map at its finest resolution, plus the extent of all
/// known (occupied and free) space.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelMap {
    resolution: f32,
    bounds: Bounds3,
    occupied: Vec<Vec3>,
}

impl VoxelMap {
    /// Load an octree file (`.bt` or `.ot`) and import it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GridError> {
        let tree = octomap::load_octree(path)?;
        Self::from_octree(&tree)
    }

    /// Import an octree. Pruned occupied leaves are expanded into one voxel
    /// per finest-level cell they cover.
    pub fn from_octree(tree: &OcTree) -> Result<Self, GridError> {
        let resolution = tree.resolution();
        let leaves = tree.leaves();

        let mut bounds = Bounds3::empty();
        let mut occupied_count = 0usize;
        for leaf in &leaves {
            bounds.expand_to_include_cube(leaf.center(resolution), leaf.size(resolution));
            if leaf.occupied {
                occupied_count = occupied_count.saturating_add((leaf.span() as usize).pow(3));
            }
        }
        if occupied_count > MAX_LATTICE_CELLS {
            return Err(GridError::InvalidMetadata(format!(
                "map has {occupied_count} occupied voxels, more than the {MAX_LATTICE_CELLS} lattice limit"
            )));
        }

        let mut occupied = Vec::with_capacity(occupied_count);
        for leaf in leaves.iter().filter(|leaf| leaf.occupied) {
            let span = leaf.span();
            for z in 0..span {
                for y in 0..span {
                    for x in 0..span {
                        let key = leaf.key + UVec3::new(x, y, z);
                        occupied.push(octomap::key_to_coord(key, resolution));
                    }
                }
            }
        }

        Ok(Self {
            resolution: resolution as f32,
            bounds,
            occupied,
        })
    }

    /// Synthetic map from voxel centers of edge length `resolution`. Free
    /// voxels only extend the known space.
    pub fn from_voxels(
        resolution: f32,
        occupied: &[Vec3],
        free: &[Vec3],
    ) -> Result<Self, GridError> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(GridError::InvalidMetadata(format!(
                "resolution must be positive, got {resolution}"
            )));
        }
        let mut bounds = Bounds3::empty();
        for &center in occupied.iter().chain(free) {
            if !center.is_finite() {
                return Err(GridError::InvalidMetadata(format!(
                    "voxel center {center} is not finite"
                )));
            }
            bounds.expand_to_include_cube(center, resolution);
        }
        Ok(Self {
            resolution,
            bounds,
            occupied: occupied.to_vec(),
        })
    }

    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    pub fn bounds(&self) -> &Bounds3 {
        &self.bounds
    }

    /// Centers of the occupied voxels.
    pub fn occupied(&self) -> &[Vec3] {
        &self.occupied
    }

    /// Lattice covering the map at its own resolution.
    pub fn lattice_info(&self) -> Result<MapInfo, GridError> {
        MapInfo::from_bounds(&self.bounds, self.resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_cover_free_and_occupied_voxels() {
        let map = VoxelMap::from_voxels(
            0.1,
            &[Vec3::ZERO],
            &[Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, -0.5, 0.2)],
        )
        .unwrap();

        assert_eq!(map.occupied(), &[Vec3::ZERO]);
        let bounds = map.bounds();
        assert!((bounds.min - Vec3::new(-0.05, -0.55, -0.05)).length() < 1e-6);
        assert!((bounds.max - Vec3::new(1.05, 0.05, 0.25)).length() < 1e-6);

        let info = map.lattice_info().unwrap();
        assert_eq!(info.dims(), UVec3::new(11, 6, 3));
    }

    #[test]
    fn import_from_octree_matches_voxels() {
        let tree = OcTree::from_voxels(
            0.1,
            &[
                (Vec3::new(0.05, 0.05, 0.05), true),
                (Vec3::new(0.35, 0.05, 0.05), false),
            ],
        )
        .unwrap();
        let map = VoxelMap::from_octree(&tree).unwrap();

        assert_eq!(map.occupied().len(), 1);
        assert!((map.occupied()[0] - Vec3::splat(0.05)).length() < 1e-6);
        assert!((map.bounds().min - Vec3::ZERO).length() < 1e-6);
        assert!((map.bounds().max - Vec3::new(0.4, 0.1, 0.1)).length() < 1e-6);
        assert_eq!(map.lattice_info().unwrap().dims(), UVec3::new(4, 1, 1));
    }

    #[test]
    fn empty_map_has_no_lattice() {
        let map = VoxelMap::from_voxels(0.1, &[], &[]).unwrap();
        assert!(map.lattice_info().is_err());
        assert!(VoxelMap::from_voxels(-1.0, &[], &[]).is_err());
    }

    #[test]
    fn non_finite_centers_are_rejected() {
        let nan = Vec3::new(f32::NAN, 0.0, 0.0);
        let result = VoxelMap::from_voxels(0.1, &[Vec3::ZERO, nan], &[Vec3::ONE]);
        assert!(matches!(result, Err(GridError::InvalidMetadata(_))));

        let inf = Vec3::new(0.0, f32::INFINITY, 0.0);
        assert!(VoxelMap::from_voxels(0.1, &[Vec3::ZERO], &[inf]).is_err());
    }
}

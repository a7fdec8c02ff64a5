//! Immutable likelihood field and its read-only queries.
//!
//! A [`LikelihoodField`] never changes after construction, so one instance can
//! be shared by reference across threads scoring particles concurrently.

use std::path::Path;
use std::time::Instant;

use glam::{UVec3, Vec3};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::cache;
use crate::distance;
use crate::grid::{Grid3d, VoxelMap};
use crate::types::{Bounds3, GridCell, GridError, MapInfo, Pose3};
use crate::visualization::{
    OccupancySlice, PointCloud, StaticTransform, cell_to_occupancy, extract_points,
};

#[derive(Debug, Clone)]
pub struct LikelihoodField {
    grid: Grid3d<GridCell>,
    bounds: Bounds3,
    sensor_deviation: f32,
    points: Vec<Vec3>,
}

impl LikelihoodField {
    /// Compute the field of `map` with the distance transform.
    pub fn build(map: &VoxelMap, sensor_deviation: f32) -> Result<Self, GridError> {
        check_sensor_deviation(sensor_deviation)?;
        let info = map.lattice_info()?;

        let start = Instant::now();
        let cells = distance::build_cells(map, &info, sensor_deviation);
        log::info!(
            "built {}x{}x{} likelihood grid from {} occupied voxels in {:.1} ms",
            info.width,
            info.height,
            info.depth,
            map.occupied().len(),
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Self {
            grid: Grid3d::new(info, cells)?,
            bounds: *map.bounds(),
            sensor_deviation,
            points: extract_points(map),
        })
    }

    /// Wrap an already computed lattice of `map`, e.g. one read from a cache.
    ///
    /// Only the distances of `grid` are kept; probabilities are recomputed
    /// with `sensor_deviation`, since the cache does not record the deviation
    /// it was built with.
    pub fn from_grid(
        map: &VoxelMap,
        grid: Grid3d<GridCell>,
        sensor_deviation: f32,
    ) -> Result<Self, GridError> {
        check_sensor_deviation(sensor_deviation)?;
        let expected = map.lattice_info()?;
        if *grid.info() != expected {
            return Err(GridError::InvalidMetadata(format!(
                "lattice {:?} does not cover map lattice {:?}",
                grid.info(),
                expected
            )));
        }

        let cells = grid
            .into_data()
            .into_iter()
            .map(|cell| {
                if cell.is_known() {
                    GridCell::from_distance(cell.distance, sensor_deviation)
                } else {
                    GridCell::default()
                }
            })
            .collect();
        let grid = Grid3d::new(expected, cells)?;

        Ok(Self {
            grid,
            bounds: *map.bounds(),
            sensor_deviation,
            points: extract_points(map),
        })
    }

    pub fn grid(&self) -> &Grid3d<GridCell> {
        &self.grid
    }

    pub fn info(&self) -> &MapInfo {
        self.grid.info()
    }

    pub fn bounds(&self) -> &Bounds3 {
        &self.bounds
    }

    pub fn sensor_deviation(&self) -> f32 {
        self.sensor_deviation
    }

    /// Minimum corner of the bounding box; origin of the lattice frame.
    pub fn min_corner(&self) -> Vec3 {
        self.bounds.min
    }

    /// True iff `p` lies inside the bounding box, boundary included.
    #[inline]
    pub fn is_into_map(&self, p: Vec3) -> bool {
        self.bounds.contains(p)
    }

    /// Lattice cell containing `p`, `None` outside the map.
    #[inline]
    pub fn cell_coord(&self, p: Vec3) -> Option<UVec3> {
        self.is_into_map(p).then(|| self.info().cell_of(p))
    }

    /// Flat lattice index of the cell containing `p`.
    pub fn cell_index(&self, p: Vec3) -> Result<usize, GridError> {
        self.cell_coord(p)
            .map(|cell| self.info().index(cell))
            .ok_or_else(|| {
                GridError::OutOfBounds(format!(
                    "point {p} outside map bounds {}..{}",
                    self.bounds.min, self.bounds.max
                ))
            })
    }

    #[inline]
    pub fn cell(&self, p: Vec3) -> Option<&GridCell> {
        self.cell_coord(p).and_then(|cell| self.grid.get(&cell))
    }

    /// Sum of cell probabilities at `points` (sensor frame) moved by `pose`.
    /// Points falling outside the map contribute nothing.
    pub fn score_cloud(&self, points: &[Vec3], pose: &Pose3) -> f32 {
        let (sin, cos) = pose.yaw.sin_cos();
        let t = pose.position;
        points
            .iter()
            .map(|p| {
                let world = Vec3::new(
                    cos * p.x - sin * p.y + t.x,
                    sin * p.x + cos * p.y + t.y,
                    p.z + t.z,
                );
                self.cell(world).map_or(0.0, |cell| cell.probability)
            })
            .sum()
    }

    /// [`score_cloud`](Self::score_cloud) for every pose, in pose order.
    pub fn score_particles(&self, points: &[Vec3], poses: &[Pose3]) -> Vec<f32> {
        #[cfg(feature = "rayon")]
        let weights = poses
            .par_iter()
            .map(|pose| self.score_cloud(points, pose))
            .collect();
        #[cfg(not(feature = "rayon"))]
        let weights = poses
            .iter()
            .map(|pose| self.score_cloud(points, pose))
            .collect();
        weights
    }

    /// The lattice layer nearest to height `z`, as an occupancy slice.
    pub fn slice(&self, z: f32) -> Result<OccupancySlice, GridError> {
        if !(z >= self.bounds.min.z && z <= self.bounds.max.z) {
            return Err(GridError::OutOfBounds(format!(
                "slice height {z} outside map range {}..{}",
                self.bounds.min.z, self.bounds.max.z
            )));
        }

        let info = self.info();
        let layer = info.cell_of(Vec3::new(info.origin.x, info.origin.y, z)).z;
        let cells = self
            .grid
            .layer(layer)
            .ok_or_else(|| GridError::OutOfBounds(format!("no lattice layer {layer}")))?;

        Ok(OccupancySlice {
            width: info.width,
            height: info.height,
            resolution: info.resolution,
            origin: self.min_corner(),
            layer_z: info.cell_center(UVec3::new(0, 0, layer)).z,
            data: cells.iter().map(cell_to_occupancy).collect(),
        })
    }

    /// Occupied voxel centers, one per voxel.
    pub fn occupied_points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn point_cloud(&self, frame_id: &str) -> PointCloud {
        PointCloud {
            frame_id: frame_id.to_string(),
            points: self.points.clone(),
        }
    }

    /// Translation from `global_frame` to the lattice frame rooted at the minimum corner.
    pub fn world_transform(&self, global_frame: &str, grid_frame: &str) -> StaticTransform {
        StaticTransform {
            parent_frame: global_frame.to_string(),
            child_frame: grid_frame.to_string(),
            translation: self.min_corner(),
        }
    }

    /// Write the lattice to a cache file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), GridError> {
        cache::save_grid(path, &self.grid, &self.bounds)
    }
}

fn check_sensor_deviation(sensor_deviation: f32) -> Result<(), GridError> {
    if sensor_deviation.is_finite() && sensor_deviation > 0.0 {
        Ok(())
    } else {
        Err(GridError::InvalidMetadata(format!(
            "sensor deviation must be positive, got {sensor_deviation}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UNKNOWN;

    /// Wall of occupied voxels on the plane x = 0.05, free space out to x = 1.
    fn wall_map() -> VoxelMap {
        let mut occupied = Vec::new();
        let mut free = Vec::new();
        for z in 0..5 {
            for y in 0..5 {
                let y = 0.05 + y as f32 * 0.1;
                let z = 0.05 + z as f32 * 0.1;
                occupied.push(Vec3::new(0.05, y, z));
                free.push(Vec3::new(0.95, y, z));
            }
        }
        VoxelMap::from_voxels(0.1, &occupied, &free).unwrap()
    }

    #[test]
    fn field_is_send_and_sync() {
        fn assert_shareable<T: Send + Sync>() {}
        assert_shareable::<LikelihoodField>();
    }

    #[test]
    fn rejects_bad_sensor_deviation() {
        let map = wall_map();
        assert!(LikelihoodField::build(&map, 0.0).is_err());
        assert!(LikelihoodField::build(&map, f32::NAN).is_err());
    }

    #[test]
    fn cell_index_is_checked() {
        let field = LikelihoodField::build(&wall_map(), 0.2).unwrap();
        assert_eq!(field.info().dims(), UVec3::new(10, 5, 5));

        assert_eq!(field.cell_index(Vec3::new(0.05, 0.05, 0.05)).unwrap(), 0);
        assert_eq!(
            field.cell_index(Vec3::new(0.15, 0.25, 0.35)).unwrap(),
            1 + 2 * 10 + 3 * 50
        );
        assert_eq!(field.cell_index(Vec3::new(1.0, 0.5, 0.5)).unwrap(), 249);
        assert!(matches!(
            field.cell_index(Vec3::new(1.01, 0.2, 0.2)),
            Err(GridError::OutOfBounds(_))
        ));
        assert!(field.cell(Vec3::new(-0.01, 0.2, 0.2)).is_none());
    }

    #[test]
    fn score_cloud_ignores_points_outside() {
        let field = LikelihoodField::build(&wall_map(), 0.2).unwrap();
        let cloud = [Vec3::new(0.05, 0.25, 0.25), Vec3::new(5.0, 0.0, 0.0)];
        let weight = field.score_cloud(&cloud, &Pose3::default());
        assert_eq!(weight, 1.0);
    }

    #[test]
    fn score_cloud_rotates_about_z() {
        let field = LikelihoodField::build(&wall_map(), 0.2).unwrap();
        // A point on +y rotated by -90 degrees lands on +x, here on the wall.
        let cloud = [Vec3::new(0.0, 0.05, 0.25)];
        let pose = Pose3::from_xyz_yaw(0.0, 0.25, 0.0, -std::f32::consts::FRAC_PI_2);
        let weight = field.score_cloud(&cloud, &pose);
        assert!((weight - 1.0).abs() < 1e-6, "weight {weight}");
    }

    #[test]
    fn score_particles_matches_sequential_scores() {
        let field = LikelihoodField::build(&wall_map(), 0.2).unwrap();
        let cloud: Vec<Vec3> = field.occupied_points().to_vec();
        let poses: Vec<Pose3> = (0..8)
            .map(|i| Pose3::from_xyz_yaw(i as f32 * 0.1, 0.0, 0.0, 0.0))
            .collect();

        let weights = field.score_particles(&cloud, &poses);
        assert_eq!(weights.len(), poses.len());
        for (pose, weight) in poses.iter().zip(&weights) {
            assert_eq!(*weight, field.score_cloud(&cloud, pose));
        }
        assert_eq!(weights[0], 25.0);
    }

    #[test]
    fn slice_picks_nearest_layer() {
        let field = LikelihoodField::build(&wall_map(), 0.2).unwrap();

        let slice = field.slice(0.27).unwrap();
        assert_eq!(slice.width, 10);
        assert_eq!(slice.height, 5);
        assert_eq!(slice.data.len(), 50);
        assert!((slice.layer_z - 0.25).abs() < 1e-6);
        assert_eq!(slice.origin, field.min_corner());
        assert_eq!(slice.get(0, 3), Some(100));
        assert!(slice.get(9, 3).unwrap() < 100);
        assert!(slice.data.iter().all(|&v| v != UNKNOWN));

        let top = field.slice(0.5).unwrap();
        assert!((top.layer_z - 0.45).abs() < 1e-6);

        assert!(matches!(field.slice(0.51), Err(GridError::OutOfBounds(_))));
        assert!(field.slice(-0.01).is_err());
        assert!(field.slice(f32::NAN).is_err());
    }

    #[test]
    fn frame_exports() {
        let field = LikelihoodField::build(&wall_map(), 0.2).unwrap();
        assert_eq!(field.min_corner(), Vec3::ZERO);

        let cloud = field.point_cloud("grid3d");
        assert_eq!(cloud.frame_id, "grid3d");
        assert_eq!(cloud.points.len(), 25);

        let tf = field.world_transform("map", "grid3d");
        assert_eq!(tf.parent_frame, "map");
        assert_eq!(tf.child_frame, "grid3d");
        assert_eq!(tf.translation, field.min_corner());
    }

    #[test]
    fn from_grid_reweights_with_its_own_deviation() {
        let map = wall_map();
        let narrow = LikelihoodField::build(&map, 0.05).unwrap();
        let wide = LikelihoodField::build(&map, 0.5).unwrap();

        let reused = LikelihoodField::from_grid(&map, narrow.grid().clone(), 0.5).unwrap();
        for (a, b) in reused.grid().data().iter().zip(wide.grid().data()) {
            assert_eq!(a.distance.to_bits(), b.distance.to_bits());
            assert_eq!(a.probability.to_bits(), b.probability.to_bits());
        }
    }
}

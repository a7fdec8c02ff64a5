//! Lifecycle of a likelihood grid: import a map, reuse or compute the field,
//! then serve queries.

use std::io::ErrorKind;
use std::path::Path;

use glam::Vec3;

use crate::cache;
use crate::config::GridConfig;
use crate::grid::{LikelihoodField, VoxelMap};
use crate::types::{GridError, Pose3};
use crate::visualization::{OccupancySlice, PointCloud, StaticTransform};

#[derive(Debug, Clone, Default)]
pub enum GridState {
    /// No map has been opened yet.
    #[default]
    Unbuilt,
    Ready(Box<LikelihoodField>),
    /// The last import failed; holds the reason.
    Failed(String),
}

impl GridState {
    pub fn name(&self) -> &'static str {
        match self {
            GridState::Unbuilt => "unbuilt",
            GridState::Ready(_) => "ready",
            GridState::Failed(_) => "failed",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, GridState::Ready(_))
    }
}

/// A likelihood field together with the settings used to build it.
///
/// Queries fail with [`GridError::NotReady`] until a map has been opened.
#[derive(Debug, Clone)]
pub struct LikelihoodGrid {
    config: GridConfig,
    state: GridState,
}

impl LikelihoodGrid {
    pub fn new(sensor_deviation: f32) -> Self {
        Self::from_config(GridConfig::new(sensor_deviation))
    }

    pub fn from_config(config: GridConfig) -> Self {
        Self {
            config,
            state: GridState::Unbuilt,
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn state(&self) -> &GridState {
        &self.state
    }

    pub fn field(&self) -> Result<&LikelihoodField, GridError> {
        match &self.state {
            GridState::Ready(field) => Ok(field.as_ref()),
            other => Err(GridError::NotReady(other.name())),
        }
    }

    /// Import the octree at `map_path` and make the field ready, reading the
    /// cache when it matches the map and writing it otherwise.
    ///
    /// Cache problems never fail the import; they fall back to computing the
    /// field. A map that cannot be imported moves the grid to
    /// [`GridState::Failed`].
    pub fn open(&mut self, map_path: impl AsRef<Path>) -> Result<(), GridError> {
        let map_path = map_path.as_ref();
        let map = match VoxelMap::load(map_path) {
            Ok(map) => map,
            Err(e) => {
                log::error!("failed to import map {}: {e}", map_path.display());
                self.state = GridState::Failed(e.to_string());
                return Err(e);
            }
        };
        log::info!(
            "imported {} with {} occupied voxels at resolution {}",
            map_path.display(),
            map.occupied().len(),
            map.resolution()
        );

        let field = match self.build_field(&map, map_path) {
            Ok(field) => field,
            Err(e) => {
                log::error!("failed to build likelihood grid for {}: {e}", map_path.display());
                self.state = GridState::Failed(e.to_string());
                return Err(e);
            }
        };
        self.state = GridState::Ready(Box::new(field));
        Ok(())
    }

    /// Open the map named by the configuration.
    pub fn open_configured(&mut self) -> Result<(), GridError> {
        let map_path = self
            .config
            .map_path
            .clone()
            .ok_or_else(|| GridError::InvalidMetadata("no map_path configured".to_string()))?;
        self.open(map_path)
    }

    /// Compute the field of an in-memory map, bypassing the cache.
    pub fn build_from_map(&mut self, map: &VoxelMap) -> Result<(), GridError> {
        match LikelihoodField::build(map, self.config.sensor_deviation) {
            Ok(field) => {
                self.state = GridState::Ready(Box::new(field));
                Ok(())
            }
            Err(e) => {
                self.state = GridState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    fn build_field(&self, map: &VoxelMap, map_path: &Path) -> Result<LikelihoodField, GridError> {
        let sensor_deviation = self.config.sensor_deviation;
        if !self.config.use_cache {
            return LikelihoodField::build(map, sensor_deviation);
        }

        let cache_path = self
            .config
            .cache_path
            .clone()
            .unwrap_or_else(|| cache::cache_path_for(map_path));
        let info = map.lattice_info()?;
        log::debug!(
            "lattice {}x{}x{} at {} from {}",
            info.width,
            info.height,
            info.depth,
            info.resolution,
            info.origin
        );

        match cache::load_grid(&cache_path, &info, map.bounds()) {
            Ok(grid) => {
                log::info!("loaded likelihood grid from cache {}", cache_path.display());
                return LikelihoodField::from_grid(map, grid, sensor_deviation);
            }
            Err(GridError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                log::info!("no grid cache at {}", cache_path.display());
            }
            Err(e @ GridError::CacheMismatch(_)) => {
                log::warn!("ignoring grid cache {}: {e}", cache_path.display());
            }
            Err(e) => {
                log::warn!("failed to read grid cache {}: {e}", cache_path.display());
            }
        }

        let field = LikelihoodField::build(map, sensor_deviation)?;
        match field.save(&cache_path) {
            Ok(()) => log::info!("wrote grid cache {}", cache_path.display()),
            Err(e) => log::warn!("failed to write grid cache {}: {e}", cache_path.display()),
        }
        Ok(field)
    }

    pub fn is_into_map(&self, p: Vec3) -> Result<bool, GridError> {
        Ok(self.field()?.is_into_map(p))
    }

    pub fn cell_index(&self, p: Vec3) -> Result<usize, GridError> {
        self.field()?.cell_index(p)
    }

    pub fn score_cloud(&self, points: &[Vec3], pose: &Pose3) -> Result<f32, GridError> {
        Ok(self.field()?.score_cloud(points, pose))
    }

    pub fn score_particles(&self, points: &[Vec3], poses: &[Pose3]) -> Result<Vec<f32>, GridError> {
        Ok(self.field()?.score_particles(points, poses))
    }

    pub fn min_corner(&self) -> Result<Vec3, GridError> {
        Ok(self.field()?.min_corner())
    }

    pub fn slice(&self, z: f32) -> Result<OccupancySlice, GridError> {
        self.field()?.slice(z)
    }

    /// Occupied voxels in the configured grid frame.
    pub fn point_cloud(&self) -> Result<PointCloud, GridError> {
        Ok(self.field()?.point_cloud(&self.config.grid_frame_id))
    }

    /// Transform from the configured global frame to the grid frame.
    pub fn world_transform(&self) -> Result<StaticTransform, GridError> {
        Ok(self
            .field()?
            .world_transform(&self.config.global_frame_id, &self.config.grid_frame_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_voxel() -> VoxelMap {
        VoxelMap::from_voxels(0.1, &[Vec3::ZERO], &[Vec3::new(0.3, 0.0, 0.0)]).unwrap()
    }

    #[test]
    fn queries_fail_until_built() {
        let grid = LikelihoodGrid::new(0.2);
        assert_eq!(grid.state().name(), "unbuilt");
        assert!(matches!(
            grid.score_cloud(&[Vec3::ZERO], &Pose3::default()),
            Err(GridError::NotReady("unbuilt"))
        ));
        assert!(matches!(grid.slice(0.0), Err(GridError::NotReady(_))));
        assert!(grid.min_corner().is_err());
    }

    #[test]
    fn build_from_map_makes_grid_ready() {
        let mut grid = LikelihoodGrid::new(0.2);
        grid.build_from_map(&single_voxel()).unwrap();
        assert!(grid.state().is_ready());
        assert_eq!(grid.score_cloud(&[Vec3::ZERO], &Pose3::default()).unwrap(), 1.0);
        assert_eq!(grid.point_cloud().unwrap().frame_id, "grid3d");
        assert_eq!(grid.world_transform().unwrap().parent_frame, "map");
    }

    #[test]
    fn missing_map_fails_then_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let mut grid = LikelihoodGrid::new(0.2);

        assert!(grid.open(dir.path().join("missing.bt")).is_err());
        assert_eq!(grid.state().name(), "failed");
        assert!(matches!(grid.is_into_map(Vec3::ZERO), Err(GridError::NotReady("failed"))));

        grid.build_from_map(&single_voxel()).unwrap();
        assert!(grid.is_into_map(Vec3::ZERO).unwrap());
    }

    #[test]
    fn open_configured_needs_a_map_path() {
        let mut grid = LikelihoodGrid::from_config(GridConfig::default());
        assert!(matches!(
            grid.open_configured(),
            Err(GridError::InvalidMetadata(_))
        ));
        assert_eq!(grid.state().name(), "unbuilt");
    }
}

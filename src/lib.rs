pub mod cache;
pub mod config;
pub mod distance;
pub mod grid;
pub mod loaders;
#[cfg(feature = "rerun")]
pub mod rerun_viz;
pub mod types;
pub mod visualization;

pub use config::GridConfig;
pub use grid::{Grid3d, GridState, LikelihoodField, LikelihoodGrid, VoxelMap};
pub use loaders::{OcTree, load_octree};
pub use types::{Bounds3, GridCell, GridError, MapInfo, Pose3};

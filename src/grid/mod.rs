pub mod grid3d;
pub mod likelihood;
pub mod state;
pub mod voxel;

pub use grid3d::Grid3d;
pub use likelihood::LikelihoodField;
pub use state::{GridState, LikelihoodGrid};
pub use voxel::VoxelMap;

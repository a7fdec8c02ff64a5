pub mod octomap;

pub use octomap::{OcTree, load_octree};

pub mod cell;
pub mod constants;
pub mod error;
pub mod geometry;
pub mod info;

pub use cell::GridCell;
pub use constants::*;
pub use error::GridError;
pub use geometry::{Bounds3, Pose3};
pub use info::MapInfo;

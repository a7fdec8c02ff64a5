//! Message-shaped exports of a likelihood field for external visualization,
//! and a grayscale preview of a slice.

use glam::Vec3;
use image::{GrayImage, Luma};

use crate::grid::VoxelMap;
use crate::types::{GridCell, OCCUPIED, UNKNOWN};

/// One horizontal layer of the likelihood field, laid out like a ROS
/// `nav_msgs/OccupancyGrid`.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancySlice {
    pub width: u32,
    pub height: u32,
    pub resolution: f32,
    /// World position of cell (0, 0): the lattice minimum corner.
    pub origin: Vec3,
    /// Height of the center of the exported layer.
    pub layer_z: f32,
    /// Row-major values, x fastest: `0..=100` scaled probability, or
    /// [`UNKNOWN`] where no distance was computed.
    pub data: Vec<i8>,
}

impl OccupancySlice {
    pub fn get(&self, x: u32, y: u32) -> Option<i8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[(y as usize) * (self.width as usize) + (x as usize)])
    }
}

/// Occupied voxels as a point cloud in a caller-named frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    pub frame_id: String,
    pub points: Vec<Vec3>,
}

/// Static translation between two frames.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticTransform {
    pub parent_frame: String,
    pub child_frame: String,
    pub translation: Vec3,
}

/// One point per occupied voxel of `map`, at the voxel center.
pub fn extract_points(map: &VoxelMap) -> Vec<Vec3> {
    map.occupied().to_vec()
}

/// Slice value of a cell: probability scaled to `0..=100`.
pub fn cell_to_occupancy(cell: &GridCell) -> i8 {
    if !cell.is_known() {
        return UNKNOWN;
    }
    (cell.probability * OCCUPIED as f32)
        .round()
        .clamp(0.0, OCCUPIED as f32) as i8
}

/// Convert a slice to a grayscale image preview.
///
/// - high likelihood becomes dark,
/// - low likelihood becomes white-ish,
/// - **UNKNOWN** becomes mid-gray.
///
/// The slice's y=0 row is written to the **bottom** of the image.
pub fn slice_to_image(slice: &OccupancySlice) -> GrayImage {
    let width = slice.width;
    let height = slice.height;
    let mut img = GrayImage::new(width, height);

    for y_img in 0..height {
        let y_grid = height - 1 - y_img;
        for x in 0..width {
            let value = slice.get(x, y_grid).unwrap_or(UNKNOWN);
            img.put_pixel(x, y_img, Luma([occupancy_to_gray(value)]));
        }
    }

    img
}

fn occupancy_to_gray(value: i8) -> u8 {
    if value == UNKNOWN {
        return 205;
    }

    let v = (value as i16).clamp(0, 100);
    // 0 -> 254, 100 -> 0
    (254 - (v * 254) / 100) as u8
}

use std::error::Error;

use glam::{Vec2, Vec3};

use crate::visualization::{OccupancySlice, PointCloud, slice_to_image};

/// Slice preview as an RGB texture, y flipped like [`slice_to_image`].
pub fn slice_to_rgb_bytes(slice: &OccupancySlice) -> (u32, u32, Vec<u8>) {
    let gray = slice_to_image(slice);
    let (width, height) = (gray.width(), gray.height());
    let rgb_bytes = gray_to_rgb(&gray.into_raw());
    (width, height, rgb_bytes)
}

#[allow(clippy::too_many_arguments)]
pub fn log_textured_plane_mesh3d(
    rec: &rerun::RecordingStream,
    entity_path: &str,
    origin_xy_world: Vec2,
    width_world: f32,
    height_world: f32,
    z_world: f32,
    texture_width: u32,
    texture_height: u32,
    rgb_bytes: Vec<u8>,
) -> Result<(), Box<dyn Error>> {
    let (x0, y0) = (origin_xy_world.x, origin_xy_world.y);
    let (x1, y1) = (x0 + width_world, y0 + height_world);
    rec.log(
        entity_path,
        &rerun::Mesh3D::new([
            [x0, y1, z_world],
            [x1, y0, z_world],
            [x0, y0, z_world],
            [x1, y1, z_world],
        ])
        .with_vertex_normals([[0.0, 0.0, 1.0]])
        .with_triangle_indices([[2, 1, 0], [3, 1, 0]])
        // V runs top to bottom in the texture.
        .with_vertex_texcoords([[0.0, 0.0], [1.0, 1.0], [0.0, 1.0], [1.0, 0.0]])
        .with_albedo_texture(
            rerun::datatypes::ImageFormat {
                width: texture_width,
                height: texture_height,
                color_model: Some(rerun::datatypes::ColorModel::RGB),
                channel_datatype: Some(rerun::datatypes::ChannelDatatype::U8),
                ..Default::default()
            },
            rgb_bytes,
        ),
    )?;
    Ok(())
}

/// Log a likelihood slice as a textured plane at its layer height.
pub fn log_slice(
    rec: &rerun::RecordingStream,
    entity_path: &str,
    slice: &OccupancySlice,
) -> Result<(), Box<dyn Error>> {
    let (width, height, rgb_bytes) = slice_to_rgb_bytes(slice);
    log_textured_plane_mesh3d(
        rec,
        entity_path,
        slice.origin.truncate(),
        slice.width as f32 * slice.resolution,
        slice.height as f32 * slice.resolution,
        slice.layer_z,
        width,
        height,
        rgb_bytes,
    )
}

/// Log occupied voxel centers, one point per voxel.
pub fn log_point_cloud(
    rec: &rerun::RecordingStream,
    entity_path: &str,
    cloud: &PointCloud,
    color: Option<rerun::Color>,
    radius: Option<f32>,
) -> Result<(), Box<dyn Error>> {
    let mut points = rerun::Points3D::new(cloud.points.iter().map(|p| p.to_array()));
    if let Some(color) = color {
        points = points.with_colors([color]);
    }
    if let Some(radius) = radius {
        points = points.with_radii([radius]);
    }
    rec.log(entity_path, &points)?;
    Ok(())
}

/// Log a sensor cloud moved into the world by a particle pose.
pub fn log_scored_cloud(
    rec: &rerun::RecordingStream,
    entity_path: &str,
    points: &[Vec3],
    pose: &crate::types::Pose3,
    color: Option<rerun::Color>,
) -> Result<(), Box<dyn Error>> {
    let mut world = rerun::Points3D::new(points.iter().map(|&p| pose.transform_point(p).to_array()));
    if let Some(color) = color {
        world = world.with_colors([color]);
    }
    rec.log(entity_path, &world)?;
    Ok(())
}

fn gray_to_rgb(gray: &[u8]) -> Vec<u8> {
    gray.iter().flat_map(|&v| [v, v, v]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FREE, OCCUPIED, UNKNOWN};

    #[test]
    fn slice_rgb_matches_gray_image() {
        let slice = OccupancySlice {
            width: 2,
            height: 2,
            resolution: 1.0,
            origin: Vec3::ZERO,
            layer_z: 0.5,
            data: vec![UNKNOWN, FREE, OCCUPIED, FREE],
        };

        let (width, height, rgb) = slice_to_rgb_bytes(&slice);
        assert_eq!((width, height), (2, 2));
        assert_eq!(rgb.len(), 2 * 2 * 3);

        let gray = slice_to_image(&slice).into_raw();
        for (idx, g) in gray.iter().enumerate() {
            assert_eq!(&rgb[idx * 3..idx * 3 + 3], &[*g, *g, *g]);
        }
    }
}

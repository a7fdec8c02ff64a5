//! Geometric and spatial types used across the grid and query APIs.

use glam::Vec3;

/// Candidate sensor pose in world coordinates: translation plus rotation
/// about the vertical axis.
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct Pose3 {
    pub position: Vec3,
    pub yaw: f32,
}

impl Pose3 {
    pub fn new(position: Vec3, yaw: f32) -> Self {
        Self { position, yaw }
    }

    pub fn from_xyz_yaw(x: f32, y: f32, z: f32, yaw: f32) -> Self {
        Self::new(Vec3::new(x, y, z), yaw)
    }

    /// Transform a point from the sensor frame into the world frame.
    #[inline]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        let (sin, cos) = self.yaw.sin_cos();
        Vec3::new(
            cos * p.x - sin * p.y + self.position.x,
            sin * p.x + cos * p.y + self.position.y,
            p.z + self.position.z,
        )
    }
}

/// World-axis-aligned box in meters.
/// Convention: closed on both ends, [min, max] on every axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds3 {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds3 {
    /// Bounds that contain nothing; grows with `expand_to_include*`.
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    /// Returns true if nothing has been added (min > max in any axis).
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn expand_to_include(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Expand to include an axis-aligned cube given by its center and edge length.
    pub fn expand_to_include_cube(&mut self, center: Vec3, size: f32) {
        let half = Vec3::splat(0.5 * size);
        self.expand_to_include(center - half);
        self.expand_to_include(center + half);
    }

    /// Point containment, boundary inclusive.
    #[inline]
    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.y >= self.min.y
            && p.z >= self.min.z
            && p.x <= self.max.x
            && p.y <= self.max.y
            && p.z <= self.max.z
    }
}

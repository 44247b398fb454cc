//! Virtual image plane the compute kernel casts primary rays through.

use glam::Vec3;

use crate::{CameraState, Ray};

/// Three corners of the image plane in world space.
///
/// The plane is centered `screen_distance` units along the camera's forward
/// axis, with half-extents equal to the camera's `right` and `up` vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPlane {
    /// Top-left corner
    pub p0: Vec3,
    /// Top-right corner
    pub p1: Vec3,
    /// Bottom-left corner
    pub p2: Vec3,
}

impl ScreenPlane {
    /// Derive the plane for the given camera.
    pub fn derive(camera: &CameraState, screen_distance: f32) -> Self {
        let center = camera.position + camera.forward() * screen_distance;
        let right = camera.right();
        let up = camera.up();

        Self {
            p0: center - right + up,
            p1: center + right + up,
            p2: center - right - up,
        }
    }

    /// Plane center (midpoint of the p1-p2 diagonal).
    pub fn center(&self) -> Vec3 {
        (self.p1 + self.p2) * 0.5
    }

    /// Point on the plane at normalized coordinates; (0, 0) is `p0`, u runs
    /// toward `p1` and v toward `p2`.
    pub fn point_at(&self, u: f32, v: f32) -> Vec3 {
        self.p0 + (self.p1 - self.p0) * u + (self.p2 - self.p0) * v
    }

    /// Normalized primary ray from `origin` through the plane at (u, v).
    ///
    /// This is the ray-generation rule the trace kernel follows per pixel.
    pub fn primary_ray(&self, origin: Vec3, u: f32, v: f32) -> Ray {
        Ray::new(origin, (self.point_at(u, v) - origin).normalize())
    }
}

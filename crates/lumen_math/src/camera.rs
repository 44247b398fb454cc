//! Fly camera driven by translation and look deltas.
//!
//! World space is left-handed with +Y up: facing +X, the camera's `right`
//! axis is -Z. The basis is always derived from `yaw`/`pitch` so it stays
//! orthonormal no matter how many deltas are applied.

use glam::Vec3;

/// Pitch is clamped to +/- this many degrees so `forward` never lines up
/// with the world up axis.
pub const PITCH_LIMIT_DEGREES: f32 = 89.0;

/// Translation directions relative to the camera basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
    Right,
    Left,
}

/// Camera position and orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub position: Vec3,
    forward: Vec3,
    right: Vec3,
    up: Vec3,
    /// Degrees, unbounded.
    yaw: f32,
    /// Degrees, within [-PITCH_LIMIT_DEGREES, PITCH_LIMIT_DEGREES].
    pitch: f32,
}

impl CameraState {
    /// Camera at the origin looking down +X.
    pub fn new() -> Self {
        Self::with_position(Vec3::ZERO)
    }

    /// Camera at `position` looking down +X.
    pub fn with_position(position: Vec3) -> Self {
        let mut camera = Self {
            position,
            forward: Vec3::X,
            right: Vec3::ZERO,
            up: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
        };
        camera.update_basis();
        camera
    }

    /// Move `speed` units along the camera's forward or right axis.
    pub fn apply_translation(&mut self, direction: Direction, speed: f32) {
        let offset = match direction {
            Direction::Forward => self.forward * speed,
            Direction::Backward => -self.forward * speed,
            Direction::Right => self.right * speed,
            Direction::Left => -self.right * speed,
        };
        self.position += offset;
    }

    /// Rotate by the given yaw and pitch deltas (degrees).
    ///
    /// Pitch is clamped to [-89, 89] degrees before `forward` is rebuilt
    /// from spherical coordinates.
    pub fn apply_look_delta(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw += delta_yaw;
        self.pitch =
            (self.pitch + delta_pitch).clamp(-PITCH_LIMIT_DEGREES, PITCH_LIMIT_DEGREES);

        let yaw = self.yaw.to_radians();
        let pitch = self.pitch.to_radians();
        self.forward = Vec3::new(
            pitch.cos() * yaw.cos(),
            pitch.sin(),
            pitch.cos() * yaw.sin(),
        )
        .normalize();
        self.update_basis();
    }

    fn update_basis(&mut self) {
        self.right = Vec3::Y.cross(self.forward).normalize();
        self.up = self.forward.cross(self.right);
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    /// Yaw in degrees.
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Pitch in degrees.
    pub fn pitch(&self) -> f32 {
        self.pitch
    }
}

impl Default for CameraState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn assert_orthonormal(camera: &CameraState) {
        assert!((camera.forward().length() - 1.0).abs() < EPSILON);
        assert!((camera.right().length() - 1.0).abs() < EPSILON);
        assert!((camera.up().length() - 1.0).abs() < EPSILON);
        assert!(camera.forward().dot(camera.right()).abs() < EPSILON);
        assert!(camera.forward().dot(camera.up()).abs() < EPSILON);
        assert!(camera.right().dot(camera.up()).abs() < EPSILON);
    }

    #[test]
    fn test_camera_creation() {
        let camera = CameraState::new();

        assert_eq!(camera.position, Vec3::ZERO);
        assert_eq!(camera.forward(), Vec3::X);
        assert_eq!(camera.right(), Vec3::NEG_Z);
        assert_eq!(camera.up(), Vec3::Y);
        assert_eq!(camera.yaw(), 0.0);
        assert_eq!(camera.pitch(), 0.0);
    }

    #[test]
    fn test_translation_along_basis() {
        let mut camera = CameraState::new();

        camera.apply_translation(Direction::Forward, 0.5);
        assert_eq!(camera.position, Vec3::new(0.5, 0.0, 0.0));

        camera.apply_translation(Direction::Backward, 0.5);
        assert_eq!(camera.position, Vec3::ZERO);

        camera.apply_translation(Direction::Right, 2.0);
        assert_eq!(camera.position, Vec3::new(0.0, 0.0, -2.0));

        camera.apply_translation(Direction::Left, 2.0);
        assert_eq!(camera.position, Vec3::ZERO);
    }

    #[test]
    fn test_translation_keeps_orientation() {
        let mut camera = CameraState::new();
        camera.apply_look_delta(30.0, 10.0);
        let forward = camera.forward();

        camera.apply_translation(Direction::Forward, 1.0);

        assert_eq!(camera.forward(), forward);
        assert!((camera.position - forward).length() < EPSILON);
    }

    #[test]
    fn test_pitch_clamps_to_limit() {
        let mut camera = CameraState::new();

        camera.apply_look_delta(0.0, 95.0);
        assert_eq!(camera.pitch(), 89.0);
        let expected = 89.0_f32.to_radians().sin();
        assert!((camera.forward().y - expected).abs() < EPSILON);
        assert!((camera.forward().y - 95.0_f32.to_radians().sin()).abs() > 1e-3);

        camera.apply_look_delta(0.0, -400.0);
        assert_eq!(camera.pitch(), -89.0);
    }

    #[test]
    fn test_pitch_stays_bounded_over_sequence() {
        let mut camera = CameraState::new();
        let deltas = [
            (3.0, 40.0),
            (-12.0, 40.0),
            (7.5, 40.0),
            (0.0, -250.0),
            (190.0, 1.0),
            (-45.0, 88.0),
            (0.1, 0.9),
        ];

        for (delta_yaw, delta_pitch) in deltas {
            camera.apply_look_delta(delta_yaw, delta_pitch);
            assert!(camera.pitch().abs() <= PITCH_LIMIT_DEGREES);
            assert!(camera.pitch().abs() < 90.0);
            assert_orthonormal(&camera);
        }
    }

    #[test]
    fn test_basis_orthonormal_after_updates() {
        let mut camera = CameraState::new();

        for step in 0..64 {
            let angle = step as f32 * 13.7;
            camera.apply_look_delta(angle, (angle * 0.37).sin() * 20.0);
            camera.apply_translation(Direction::Forward, 0.25);
            assert_orthonormal(&camera);
        }
    }

    #[test]
    fn test_yaw_rotates_toward_z() {
        let mut camera = CameraState::new();
        camera.apply_look_delta(90.0, 0.0);

        assert!((camera.forward() - Vec3::Z).length() < EPSILON);
        assert!((camera.right() - Vec3::X).length() < EPSILON);
        assert!((camera.up() - Vec3::Y).length() < EPSILON);
    }
}

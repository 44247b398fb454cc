// Re-export glam for convenience
pub use glam::*;

// Lumen math types
mod camera;
mod ray;
mod screen_plane;

pub use camera::{CameraState, Direction, PITCH_LIMIT_DEGREES};
pub use ray::Ray;
pub use screen_plane::ScreenPlane;

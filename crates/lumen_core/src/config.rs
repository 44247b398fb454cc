//! Viewer configuration.
//!
//! All values are compile-time defaults; the viewer reads no files,
//! arguments or environment variables.

use thiserror::Error;

use crate::dispatch::DispatchGrid;

/// Errors raised while validating a configuration against the dispatch rules
/// or the device limits.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Image size must be non-zero, got {width}x{height}")]
    ZeroSize { width: u32, height: u32 },

    #[error("Image {axis} of {value} is not a power of two")]
    NotPowerOfTwo { axis: &'static str, value: u32 },

    #[error("Image {axis} of {value} is not divisible by the work-group size {group}")]
    NotDivisible {
        axis: &'static str,
        value: u32,
        group: u32,
    },

    #[error("Dispatch of {groups} work groups along {axis} exceeds the device limit of {limit}")]
    GridExceedsLimit {
        axis: &'static str,
        groups: u32,
        limit: u32,
    },

    #[error("Work-group size {size:?} exceeds the device limits")]
    WorkgroupExceedsLimit { size: [u32; 3] },

    #[error("Image {width}x{height} exceeds the device's maximum texture dimension of {limit}")]
    ImageExceedsLimit { width: u32, height: u32, limit: u32 },

    #[error("Accumulation storage of {bytes} bytes exceeds the device limit of {limit} bytes")]
    StorageExceedsLimit { bytes: u64, limit: u64 },
}

/// Viewer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// Shared image width in pixels (power of two)
    pub image_width: u32,
    /// Shared image height in pixels (power of two)
    pub image_height: u32,
    /// Distance from the camera to the screen plane
    pub screen_distance: f32,
    /// World units moved per frame while a movement key is held
    pub camera_speed: f32,
    /// Degrees of rotation per pixel of cursor travel
    pub mouse_sensitivity: f32,
    /// Base window title; the FPS readout is appended to it
    pub window_title: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            image_width: 1024,
            image_height: 1024,
            screen_distance: 1.0,
            camera_speed: 0.5,
            mouse_sensitivity: 0.1,
            window_title: "Lumen".to_string(),
        }
    }
}

impl ViewerConfig {
    /// Set the shared image resolution.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.image_width = width;
        self.image_height = height;
        self
    }

    /// Set camera movement speed and mouse sensitivity.
    pub fn with_controls(mut self, camera_speed: f32, mouse_sensitivity: f32) -> Self {
        self.camera_speed = camera_speed;
        self.mouse_sensitivity = mouse_sensitivity;
        self
    }

    /// Set the screen plane distance.
    pub fn with_screen_distance(mut self, screen_distance: f32) -> Self {
        self.screen_distance = screen_distance;
        self
    }

    /// Check the image resolution and return the dispatch grid that covers it.
    pub fn validate(&self) -> Result<DispatchGrid, ConfigError> {
        DispatchGrid::for_image(self.image_width, self.image_height)
    }
}

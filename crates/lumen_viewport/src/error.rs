use lumen_core::{AccessError, ImageOp};
use thiserror::Error;

/// Errors raised while issuing a frame's GPU commands.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("No command encoder is open to {0}")]
    NoEncoder(ImageOp),
}

impl FrameError {
    /// True when reconfiguring the surface can recover the next frame.
    pub fn is_surface_stale(&self) -> bool {
        matches!(
            self,
            FrameError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)
        )
    }

    /// True when the renderer cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FrameError::Surface(wgpu::SurfaceError::OutOfMemory))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::SharedImageState;

    #[test]
    fn test_classification() {
        let lost = FrameError::from(wgpu::SurfaceError::Lost);
        assert!(lost.is_surface_stale());
        assert!(!lost.is_fatal());

        let oom = FrameError::from(wgpu::SurfaceError::OutOfMemory);
        assert!(oom.is_fatal());

        let timeout = FrameError::from(wgpu::SurfaceError::Timeout);
        assert!(!timeout.is_fatal() && !timeout.is_surface_stale());
    }

    #[test]
    fn test_access_error_passes_through() {
        let err = FrameError::from(AccessError {
            state: SharedImageState::Idle,
            op: ImageOp::Present,
        });
        assert_eq!(err.to_string(), "Cannot present while the shared image is idle");
    }
}

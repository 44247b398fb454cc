//! Per-frame control loop.
//!
//! Each frame runs two phases in strict order:
//!
//! 1. **Input/update** - apply held movement keys and the cursor delta to the
//!    camera. If anything moved, re-derive the screen plane and restart
//!    accumulation.
//! 2. **Render** - bind the shared image for writing, advance and push the
//!    sample counter, push the view geometry if it changed, dispatch the trace
//!    kernel, insert the barrier, bind the image for reading and present.
//!
//! The GPU side is reached only through [`FrameTarget`], so the ordering can
//! be exercised without a device.

use lumen_math::{CameraState, Direction, ScreenPlane, Vec2, Vec3};

use crate::accumulation::AccumulationState;
use crate::config::{ConfigError, ViewerConfig};
use crate::dispatch::DispatchGrid;

/// View geometry consumed by the trace kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewUniforms {
    pub screen_p0: Vec3,
    pub screen_p1: Vec3,
    pub screen_p2: Vec3,
    pub camera_position: Vec3,
}

impl ViewUniforms {
    pub fn new(plane: &ScreenPlane, camera: &CameraState) -> Self {
        Self {
            screen_p0: plane.p0,
            screen_p1: plane.p1,
            screen_p2: plane.p2,
            camera_position: camera.position,
        }
    }
}

/// GPU command stream driven by the sequencer, in the order it is called.
pub trait FrameTarget {
    type Error;

    /// Bind the shared image as the trace kernel's write target.
    fn bind_image_write(&mut self) -> Result<(), Self::Error>;

    /// Upload the current sample index.
    fn push_frame_count(&mut self, frame_count: u32) -> Result<(), Self::Error>;

    /// Upload screen-plane corners and camera position.
    fn push_view(&mut self, view: &ViewUniforms) -> Result<(), Self::Error>;

    /// Launch the trace kernel over `grid`.
    fn dispatch(&mut self, grid: DispatchGrid) -> Result<(), Self::Error>;

    /// Make every image write from the dispatch visible to later reads.
    fn memory_barrier(&mut self) -> Result<(), Self::Error>;

    /// Bind the shared image for sampling by the presentation pass.
    fn bind_image_read(&mut self) -> Result<(), Self::Error>;

    /// Draw the full-screen quad and swap buffers.
    fn present(&mut self) -> Result<(), Self::Error>;
}

/// Movement keys held this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Movement {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

impl Movement {
    /// Directions for every held key.
    pub fn directions(&self) -> impl Iterator<Item = Direction> {
        [
            (self.forward, Direction::Forward),
            (self.backward, Direction::Backward),
            (self.right, Direction::Right),
            (self.left, Direction::Left),
        ]
        .into_iter()
        .filter_map(|(held, direction)| held.then_some(direction))
    }

    pub fn is_any(&self) -> bool {
        self.forward || self.backward || self.left || self.right
    }
}

/// Input polled at the start of a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameInput {
    pub movement: Movement,
    /// Cursor travel in pixels since the last re-centre (screen y grows downward).
    pub look_delta: Vec2,
    pub focused: bool,
}

/// What happened during one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// Sample index pushed to the kernel
    pub frame_count: u32,
    /// The camera changed during the input phase
    pub camera_moved: bool,
    /// A look delta was applied; the platform should re-centre the cursor
    pub look_applied: bool,
    /// Fresh view geometry was pushed
    pub view_pushed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Rendered(FrameReport),
    /// Termination was requested; no GPU command was issued.
    Terminated,
}

/// Owns the camera and accumulation state and drives one frame at a time.
#[derive(Debug, Clone)]
pub struct FrameSequencer {
    camera: CameraState,
    screen_plane: ScreenPlane,
    accumulation: AccumulationState,
    grid: DispatchGrid,
    screen_distance: f32,
    camera_speed: f32,
    mouse_sensitivity: f32,
    terminated: bool,
}

impl FrameSequencer {
    /// Camera at the origin looking down +X, counter at 1.
    pub fn new(config: &ViewerConfig) -> Result<Self, ConfigError> {
        let grid = config.validate()?;
        let camera = CameraState::new();
        let screen_plane = ScreenPlane::derive(&camera, config.screen_distance);

        Ok(Self {
            camera,
            screen_plane,
            accumulation: AccumulationState::new(),
            grid,
            screen_distance: config.screen_distance,
            camera_speed: config.camera_speed,
            mouse_sensitivity: config.mouse_sensitivity,
            terminated: false,
        })
    }

    /// Stop before the next frame issues any GPU command.
    pub fn request_termination(&mut self) {
        self.terminated = true;
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn screen_plane(&self) -> &ScreenPlane {
        &self.screen_plane
    }

    pub fn accumulation(&self) -> &AccumulationState {
        &self.accumulation
    }

    pub fn grid(&self) -> DispatchGrid {
        self.grid
    }

    /// Run both phases for one frame.
    pub fn frame<T: FrameTarget>(
        &mut self,
        input: &FrameInput,
        target: &mut T,
    ) -> Result<FrameStatus, T::Error> {
        if self.terminated {
            return Ok(FrameStatus::Terminated);
        }

        let (camera_moved, look_applied) = self.update(input);
        let (frame_count, view_pushed) = self.render(target)?;

        Ok(FrameStatus::Rendered(FrameReport {
            frame_count,
            camera_moved,
            look_applied,
            view_pushed,
        }))
    }

    /// Input/update phase. Returns `(camera_moved, look_applied)`.
    pub fn update(&mut self, input: &FrameInput) -> (bool, bool) {
        let mut moved = false;
        for direction in input.movement.directions() {
            self.camera.apply_translation(direction, self.camera_speed);
            moved = true;
        }

        let look_applied = input.focused && input.look_delta != Vec2::ZERO;
        if look_applied {
            // Cursor right turns right, cursor up looks up.
            let delta_yaw = -input.look_delta.x * self.mouse_sensitivity;
            let delta_pitch = -input.look_delta.y * self.mouse_sensitivity;
            self.camera.apply_look_delta(delta_yaw, delta_pitch);
        }

        let camera_moved = moved || look_applied;
        if camera_moved {
            self.screen_plane = ScreenPlane::derive(&self.camera, self.screen_distance);
            self.accumulation.on_camera_changed();
            log::trace!(
                "Camera moved to {:?}, yaw {:.2}, pitch {:.2}",
                self.camera.position,
                self.camera.yaw(),
                self.camera.pitch()
            );
        }

        (camera_moved, look_applied)
    }

    /// Render phase. Returns `(frame_count, view_pushed)`.
    pub fn render<T: FrameTarget>(&mut self, target: &mut T) -> Result<(u32, bool), T::Error> {
        target.bind_image_write()?;

        let frame_count = self.accumulation.on_frame_rendered();
        target.push_frame_count(frame_count)?;

        let view_pushed = self.accumulation.is_dirty();
        if view_pushed {
            target.push_view(&ViewUniforms::new(&self.screen_plane, &self.camera))?;
            self.accumulation.take_dirty();
        }

        target.dispatch(self.grid)?;
        target.memory_barrier()?;
        target.bind_image_read()?;
        target.present()?;

        Ok((frame_count, view_pushed))
    }
}

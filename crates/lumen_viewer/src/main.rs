use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use lumen_core::{FpsCounter, FrameInput, FrameSequencer, FrameStatus, Movement, ViewerConfig};
use lumen_math::Vec2;
use lumen_viewport::{FrameError, Renderer};
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window, WindowId},
};

/// Movement keys held right now.
fn movement_from_keys(keys: &HashSet<KeyCode>) -> Movement {
    Movement {
        forward: keys.contains(&KeyCode::KeyW),
        backward: keys.contains(&KeyCode::KeyS),
        left: keys.contains(&KeyCode::KeyA),
        right: keys.contains(&KeyCode::KeyD),
    }
}

/// Centre of the window's client area, where the hidden cursor is parked.
fn window_center(size: PhysicalSize<u32>) -> PhysicalPosition<f64> {
    PhysicalPosition::new(size.width as f64 / 2.0, size.height as f64 / 2.0)
}

/// Add one raw mouse-motion delta (pixels, y down) to the pending look delta.
fn accumulate_motion(look_delta: Vec2, motion: (f64, f64)) -> Vec2 {
    look_delta + Vec2::new(motion.0 as f32, motion.1 as f32)
}

/// Keep the cursor inside the window. Locked is preferred; some platforms
/// only support confining it.
fn grab_cursor(window: &Window) {
    let grabbed = window
        .set_cursor_grab(CursorGrabMode::Locked)
        .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
    if let Err(e) = grabbed {
        log::warn!("Could not grab cursor: {}", e);
    }
}

/// Best-effort park of the hidden cursor; look deltas do not depend on it.
fn park_cursor(window: &Window) {
    if let Err(e) = window.set_cursor_position(window_center(window.inner_size())) {
        log::debug!("Could not centre cursor: {}", e);
    }
}

/// Application state
struct App {
    config: ViewerConfig,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    sequencer: FrameSequencer,

    // Input state
    keys_pressed: HashSet<KeyCode>,
    look_delta: Vec2,
    focused: bool,

    fps: FpsCounter,
    last_frame_time: Instant,

    /// Error that stopped the event loop
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(config: ViewerConfig) -> Result<Self> {
        let sequencer = FrameSequencer::new(&config)?;
        Ok(Self {
            config,
            window: None,
            renderer: None,
            sequencer,
            keys_pressed: HashSet::new(),
            look_delta: Vec2::ZERO,
            focused: true,
            fps: FpsCounter::new(),
            last_frame_time: Instant::now(),
            fatal: None,
        })
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_attrs = Window::default_attributes()
            .with_title(self.config.window_title.clone())
            .with_inner_size(PhysicalSize::new(
                self.config.image_width,
                self.config.image_height,
            ))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attrs)?);

        // Initialize renderer (async in pollster block)
        let renderer = pollster::block_on(Renderer::new(window.clone(), &self.config))?;
        let (width, height) = renderer.image_size();
        log::info!(
            "Shared image {}x{}, {} bytes of accumulation storage",
            width,
            height,
            renderer.accumulation_size()
        );

        window.set_cursor_visible(false);
        grab_cursor(&window);
        park_cursor(&window);

        self.window = Some(window);
        self.renderer = Some(renderer);
        self.last_frame_time = Instant::now();

        log::info!("Window and renderer initialized");
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{:#}", err);
        self.fatal = Some(err);
        self.sequencer.request_termination();
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(renderer) = &mut self.renderer else {
            return;
        };

        let input = FrameInput {
            movement: movement_from_keys(&self.keys_pressed),
            look_delta: std::mem::take(&mut self.look_delta),
            focused: self.focused,
        };

        match self.sequencer.frame(&input, renderer) {
            Ok(FrameStatus::Terminated) => {
                event_loop.exit();
                return;
            }
            Ok(FrameStatus::Rendered(report)) => {
                if report.look_applied {
                    park_cursor(renderer.window());
                }
            }
            Err(e) => self.handle_frame_error(event_loop, e),
        }

        // Update FPS counter
        let now = Instant::now();
        let delta_time = (now - self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;

        if let Some(fps) = self.fps.tick(delta_time) {
            if let Some(window) = &self.window {
                window.set_title(&format!("{} - {:.0} FPS", self.config.window_title, fps));
            }
        }
    }

    fn handle_frame_error(&mut self, event_loop: &ActiveEventLoop, err: FrameError) {
        if err.is_surface_stale() {
            log::warn!("{}, reconfiguring", err);
            if let Some(renderer) = &mut self.renderer {
                renderer.reconfigure();
            }
        } else if err.is_fatal() {
            self.fail(event_loop, anyhow!(err).context("Rendering failed"));
        } else {
            log::error!("Frame skipped: {}", err);
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.init(event_loop) {
                self.fail(event_loop, e.context("Failed to initialize viewer"));
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested");
                self.sequencer.request_termination();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.resize((physical_size.width, physical_size.height));
                }
            }
            WindowEvent::Focused(focused) => {
                self.focused = focused;
                self.look_delta = Vec2::ZERO;
                if !focused {
                    self.keys_pressed.clear();
                }
                if let Some(window) = &self.window {
                    window.set_cursor_visible(!focused);
                    if focused {
                        grab_cursor(window);
                    } else if let Err(e) = window.set_cursor_grab(CursorGrabMode::None) {
                        log::debug!("Could not release cursor: {}", e);
                    }
                }
            }
            WindowEvent::KeyboardInput {
                event: KeyEvent { physical_key, state, .. },
                ..
            } => {
                if let PhysicalKey::Code(keycode) = physical_key {
                    match state {
                        ElementState::Pressed => {
                            if keycode == KeyCode::Escape {
                                log::info!("Escape pressed");
                                self.sequencer.request_termination();
                            }
                            self.keys_pressed.insert(keycode);
                        }
                        ElementState::Released => {
                            self.keys_pressed.remove(&keycode);
                        }
                    }
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.focused && self.window.is_some() {
                self.look_delta = accumulate_motion(self.look_delta, delta);
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        // Redraw continuously so samples keep accumulating
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Starting Lumen Viewer");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(ViewerConfig::default())?;

    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(err) => Err(err),
        None => {
            log::info!("Viewer closed");
            Ok(())
        }
    }
}

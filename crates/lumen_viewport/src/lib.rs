//! wgpu backend for the frame sequencer.
//!
//! A [`Renderer`] owns the window surface, the shared `rgba32float` image, the
//! accumulation buffer and the two pipelines that touch them: the trace
//! compute kernel, which writes the image, and the presentation pass, which
//! draws it over a full-screen quad.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use wgpu::{util::DeviceExt, Device, Instance, Queue, Surface, SurfaceConfiguration};
use winit::window::Window;

use lumen_core::{
    ComputeLimits, DispatchGrid, FrameTarget, ImageOp, SharedImageState, ViewUniforms,
    ViewerConfig,
};
use lumen_math::{CameraState, ScreenPlane};

mod error;
mod quad;
mod uniforms;

pub use error::FrameError;
pub use quad::{QuadVertex, QUAD_VERTICES};
pub use uniforms::{SampleIndex, TraceUniforms, UniformSlot};

const TRACE_SHADER: &str = include_str!("shaders/trace.wgsl");
const PRESENT_SHADER: &str = include_str!("shaders/present.wgsl");

/// Format of the shared image written by the trace kernel.
pub const IMAGE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Map the device limits onto the values the dispatch grid is checked against.
pub fn compute_limits(limits: &wgpu::Limits) -> ComputeLimits {
    ComputeLimits {
        max_workgroups_per_dimension: limits.max_compute_workgroups_per_dimension,
        max_workgroup_size: [
            limits.max_compute_workgroup_size_x,
            limits.max_compute_workgroup_size_y,
            limits.max_compute_workgroup_size_z,
        ],
        max_invocations_per_workgroup: limits.max_compute_invocations_per_workgroup,
        max_texture_dimension_2d: limits.max_texture_dimension_2d,
        max_storage_buffer_binding_size: u64::from(limits.max_storage_buffer_binding_size)
            .min(limits.max_buffer_size),
    }
}

/// Lowest-latency present mode the surface supports. Fifo is always available.
pub fn choose_present_mode(available: &[wgpu::PresentMode]) -> wgpu::PresentMode {
    [wgpu::PresentMode::Immediate, wgpu::PresentMode::Mailbox]
        .into_iter()
        .find(|mode| available.contains(mode))
        .unwrap_or(wgpu::PresentMode::Fifo)
}

/// Run `create` inside a validation error scope and fail if it raised anything.
async fn validated<T>(device: &Device, what: &str, create: impl FnOnce() -> T) -> Result<T> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    match device.pop_error_scope().await {
        Some(err) => Err(anyhow!("Failed to create {what}: {err}")),
        None => Ok(value),
    }
}

/// GPU state for the viewer.
///
/// Fields drop top to bottom, so per-frame state and pipelines are released
/// before the buffers, the device and finally the surface.
pub struct Renderer {
    // Per-frame state
    encoder: Option<wgpu::CommandEncoder>,
    image_state: SharedImageState,
    sample_index: SampleIndex,

    // Pipelines
    trace_pipeline: wgpu::ComputePipeline,
    trace_bind_group: wgpu::BindGroup,
    present_pipeline: wgpu::RenderPipeline,
    present_bind_group: wgpu::BindGroup,

    // Resources
    quad_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    accumulation_buffer: wgpu::Buffer,
    image: wgpu::Texture,

    pub config: SurfaceConfiguration,
    pub size: (u32, u32),
    pub queue: Queue,
    pub device: Device,
    pub surface: Surface<'static>,
    window: Arc<Window>,
}

impl Renderer {
    /// Create a renderer drawing into `window`.
    pub async fn new(window: Arc<Window>, viewer: &ViewerConfig) -> Result<Self> {
        let grid = viewer.validate()?;
        let size = window.inner_size();

        let instance = Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow!("Failed to find suitable GPU adapter"))?;

        let info = adapter.get_info();
        log::info!("Using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Lumen Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let limits = compute_limits(&device.limits());
        log::info!(
            "Compute limits: {} groups per dimension, work-group size {:?}, {} invocations",
            limits.max_workgroups_per_dimension,
            limits.max_workgroup_size,
            limits.max_invocations_per_workgroup
        );
        log::info!(
            "Resource limits: {} texels per texture side, {} bytes per storage buffer",
            limits.max_texture_dimension_2d,
            limits.max_storage_buffer_binding_size
        );
        grid.check_limits(&limits)?;
        log::info!(
            "Dispatching {}x{}x{} work groups for a {}x{} image",
            grid.x,
            grid.y,
            grid.z,
            viewer.image_width,
            viewer.image_height
        );

        // Configure surface
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow!("Surface reports no supported formats"))?;
        let present_mode = choose_present_mode(&surface_caps.present_modes);
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        log::info!("Surface {:?}, present mode {:?}", surface_format, present_mode);

        let config = SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        // Shared image and accumulation storage
        let (image, image_view, accumulation_buffer) = validated(&device, "shared image", || {
            let image = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Shared Image"),
                size: wgpu::Extent3d {
                    width: viewer.image_width,
                    height: viewer.image_height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: IMAGE_FORMAT,
                usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            let image_view = image.create_view(&wgpu::TextureViewDescriptor::default());

            let accumulation_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Accumulation Buffer"),
                size: grid.accumulation_bytes(),
                usage: wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            });

            (image, image_view, accumulation_buffer)
        })
        .await?;

        // Initial view, replaced by the first frame's push
        let camera = CameraState::new();
        let plane = ScreenPlane::derive(&camera, viewer.screen_distance);
        let initial = TraceUniforms::new(&ViewUniforms::new(&plane, &camera), 1);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Trace Uniform Buffer"),
            contents: bytemuck::bytes_of(&initial),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let quad_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Vertex Buffer"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        // Trace pipeline
        let trace_shader = validated(&device, "trace shader", || {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Trace Shader"),
                source: wgpu::ShaderSource::Wgsl(TRACE_SHADER.into()),
            })
        })
        .await?;

        let trace_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Trace Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::StorageTexture {
                            access: wgpu::StorageTextureAccess::WriteOnly,
                            format: IMAGE_FORMAT,
                            view_dimension: wgpu::TextureViewDimension::D2,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let trace_bind_group = validated(&device, "trace bind group", || {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Trace Bind Group"),
                layout: &trace_bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&image_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: accumulation_buffer.as_entire_binding(),
                    },
                ],
            })
        })
        .await?;

        let trace_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Trace Pipeline Layout"),
            bind_group_layouts: &[&trace_bind_group_layout],
            push_constant_ranges: &[],
        });

        let trace_pipeline = validated(&device, "trace pipeline", || {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Trace Pipeline"),
                layout: Some(&trace_pipeline_layout),
                module: &trace_shader,
                entry_point: "main",
                compilation_options: Default::default(),
                cache: None,
            })
        })
        .await?;

        // Presentation pipeline
        let present_shader = validated(&device, "present shader", || {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Present Shader"),
                source: wgpu::ShaderSource::Wgsl(PRESENT_SHADER.into()),
            })
        })
        .await?;

        let present_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Present Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                }],
            });

        let present_bind_group = validated(&device, "present bind group", || {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Present Bind Group"),
                layout: &present_bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&image_view),
                }],
            })
        })
        .await?;

        let present_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Present Pipeline Layout"),
                bind_group_layouts: &[&present_bind_group_layout],
                push_constant_ranges: &[],
            });

        let present_pipeline = validated(&device, "present pipeline", || {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Present Pipeline"),
                layout: Some(&present_pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &present_shader,
                    entry_point: "vs_main",
                    buffers: &[QuadVertex::desc()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &present_shader,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: config.format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })
        .await?;

        log::info!("Renderer initialized");

        Ok(Self {
            encoder: None,
            image_state: SharedImageState::default(),
            sample_index: SampleIndex::new(),
            trace_pipeline,
            trace_bind_group,
            present_pipeline,
            present_bind_group,
            quad_buffer,
            uniform_buffer,
            accumulation_buffer,
            image,
            size: (config.width, config.height),
            config,
            queue,
            device,
            surface,
            window,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Shared image size in pixels.
    pub fn image_size(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// Bytes reserved for the running average.
    pub fn accumulation_size(&self) -> wgpu::BufferAddress {
        self.accumulation_buffer.size()
    }

    /// Reconfigure the surface for a new window size. The shared image keeps
    /// its size and is stretched over the window.
    pub fn resize(&mut self, new_size: (u32, u32)) {
        if new_size.0 > 0 && new_size.1 > 0 {
            self.size = new_size;
            self.config.width = new_size.0;
            self.config.height = new_size.1;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Reconfigure the surface at its current size after it was lost.
    pub fn reconfigure(&mut self) {
        self.resize(self.size);
    }

    fn write_slot(&self, slot: UniformSlot, bytes: &[u8]) {
        debug_assert_eq!(bytes.len() as wgpu::BufferAddress, slot.size());
        self.queue
            .write_buffer(&self.uniform_buffer, slot.offset(), bytes);
    }

    fn encoder_for(&mut self, op: ImageOp) -> Result<&mut wgpu::CommandEncoder, FrameError> {
        self.encoder.as_mut().ok_or(FrameError::NoEncoder(op))
    }

    /// Drop any half-recorded frame.
    fn abandon_frame(&mut self) {
        self.encoder = None;
        self.image_state.reset();
    }
}

impl FrameTarget for Renderer {
    type Error = FrameError;

    fn bind_image_write(&mut self) -> Result<(), FrameError> {
        if self.image_state != SharedImageState::Idle {
            log::warn!("Abandoning frame left {}", self.image_state);
            self.abandon_frame();
        }
        self.image_state.apply(ImageOp::BindWrite)?;
        self.encoder = Some(
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Trace Encoder"),
                }),
        );
        Ok(())
    }

    fn push_frame_count(&mut self, frame_count: u32) -> Result<(), FrameError> {
        let sample = self.sample_index.next(frame_count);
        self.write_slot(UniformSlot::FrameCount, bytemuck::bytes_of(&sample));
        Ok(())
    }

    fn push_view(&mut self, view: &ViewUniforms) -> Result<(), FrameError> {
        for (slot, value) in uniforms::view_writes(view) {
            self.write_slot(slot, bytemuck::cast_slice(&value));
        }
        Ok(())
    }

    fn dispatch(&mut self, grid: DispatchGrid) -> Result<(), FrameError> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or(FrameError::NoEncoder(ImageOp::Dispatch))?;
        self.image_state.apply(ImageOp::Dispatch)?;

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Trace Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.trace_pipeline);
        pass.set_bind_group(0, &self.trace_bind_group, &[]);
        pass.dispatch_workgroups(grid.x, grid.y, grid.z);
        Ok(())
    }

    /// Queued uniform writes land before this submission, and every write
    /// it makes to the image completes before any later submission samples it.
    fn memory_barrier(&mut self) -> Result<(), FrameError> {
        self.encoder_for(ImageOp::Barrier)?;
        self.image_state.apply(ImageOp::Barrier)?;

        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
        Ok(())
    }

    fn bind_image_read(&mut self) -> Result<(), FrameError> {
        self.image_state.apply(ImageOp::BindRead)?;
        self.encoder = Some(
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Present Encoder"),
                }),
        );
        Ok(())
    }

    fn present(&mut self) -> Result<(), FrameError> {
        self.encoder_for(ImageOp::Present)?;

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(err) => {
                self.abandon_frame();
                return Err(err.into());
            }
        };
        self.image_state.apply(ImageOp::Present)?;

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .encoder
            .take()
            .ok_or(FrameError::NoEncoder(ImageOp::Present))?;
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Present Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.present_pipeline);
            pass.set_bind_group(0, &self.present_bind_group, &[]);
            pass.set_vertex_buffer(0, self.quad_buffer.slice(..));
            pass.draw(0..QUAD_VERTICES.len() as u32, 0..1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_mode_preference() {
        use wgpu::PresentMode::*;

        assert_eq!(choose_present_mode(&[Fifo, Mailbox, Immediate]), Immediate);
        assert_eq!(choose_present_mode(&[Fifo, Mailbox]), Mailbox);
        assert_eq!(choose_present_mode(&[Fifo]), Fifo);
        assert_eq!(choose_present_mode(&[]), Fifo);
    }

    #[test]
    fn test_default_limits_fit_default_grid() {
        let grid = ViewerConfig::default().validate().unwrap();
        let limits = compute_limits(&wgpu::Limits::default());

        assert!(grid.check_limits(&limits).is_ok());
    }

    #[test]
    fn test_downlevel_limits_map() {
        let limits = compute_limits(&wgpu::Limits::downlevel_defaults());

        assert_eq!(limits.max_workgroups_per_dimension, 65535);
        assert_eq!(limits.max_invocations_per_workgroup, 256);
        assert_eq!(limits.max_texture_dimension_2d, 2048);
    }

    #[test]
    fn test_default_limits_reject_oversized_image() {
        let grid = ViewerConfig::default()
            .with_resolution(8192, 8192)
            .validate()
            .unwrap();
        let limits = compute_limits(&wgpu::Limits::default());

        assert!(matches!(
            grid.check_limits(&limits),
            Err(lumen_core::ConfigError::StorageExceedsLimit { .. })
        ));
    }

    #[test]
    fn test_shaders_declare_entry_points() {
        assert!(TRACE_SHADER.contains("@workgroup_size(16, 8, 1)"));
        assert!(TRACE_SHADER.contains("fn main("));
        assert!(PRESENT_SHADER.contains("fn vs_main("));
        assert!(PRESENT_SHADER.contains("fn fs_main("));
    }
}

//! Lumen Core - GPU-agnostic control logic for the progressive ray-tracing viewer.
//!
//! This crate provides:
//!
//! - **Configuration**: `ViewerConfig` and its validation into a `DispatchGrid`
//! - **Accumulation**: the sample counter and dirty flag that drive progressive refinement
//! - **Shared image ordering**: the write / barrier / read state machine
//! - **Frame sequencing**: `FrameSequencer`, which drives any `FrameTarget` once per frame
//!
//! Nothing here touches the GPU directly. The wgpu implementation of
//! `FrameTarget` lives in `lumen_viewport`.
//!
//! # Example
//!
//! ```ignore
//! use lumen_core::{FrameSequencer, FrameInput, ViewerConfig};
//!
//! let mut sequencer = FrameSequencer::new(&ViewerConfig::default())?;
//! let status = sequencer.frame(&FrameInput::default(), &mut renderer)?;
//! ```

pub mod accumulation;
pub mod config;
pub mod dispatch;
pub mod image;
pub mod sequencer;
pub mod stats;

// Re-export commonly used types
pub use accumulation::AccumulationState;
pub use config::{ConfigError, ViewerConfig};
pub use dispatch::{ComputeLimits, DispatchGrid, ACCUMULATION_TEXEL_BYTES, WORKGROUP_SIZE};
pub use image::{AccessError, ImageOp, SharedImageState};
pub use sequencer::{
    FrameInput, FrameReport, FrameSequencer, FrameStatus, FrameTarget, Movement, ViewUniforms,
};
pub use stats::FpsCounter;

//! Uniform block shared with `trace.wgsl`.
//!
//! Every field is written individually, so each one is addressed through a
//! [`UniformSlot`] that names its byte offset in the block.

use std::mem::{offset_of, size_of};

use lumen_core::ViewUniforms;

/// Host mirror of `TraceUniforms` in `trace.wgsl`. Each `vec3<f32>` occupies
/// 16 bytes, and `frame_count` packs into the last vector's padding.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TraceUniforms {
    pub screen_p0: [f32; 3],
    _pad0: f32,
    pub screen_p1: [f32; 3],
    _pad1: f32,
    pub screen_p2: [f32; 3],
    _pad2: f32,
    pub camera_position: [f32; 3],
    pub frame_count: u32,
}

impl TraceUniforms {
    pub fn new(view: &ViewUniforms, frame_count: u32) -> Self {
        Self {
            screen_p0: view.screen_p0.to_array(),
            screen_p1: view.screen_p1.to_array(),
            screen_p2: view.screen_p2.to_array(),
            camera_position: view.camera_position.to_array(),
            frame_count,
            ..Default::default()
        }
    }
}

/// Named location of one kernel input inside the uniform buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformSlot {
    ScreenP0,
    ScreenP1,
    ScreenP2,
    CameraPosition,
    FrameCount,
}

impl UniformSlot {
    pub const ALL: [UniformSlot; 5] = [
        UniformSlot::ScreenP0,
        UniformSlot::ScreenP1,
        UniformSlot::ScreenP2,
        UniformSlot::CameraPosition,
        UniformSlot::FrameCount,
    ];

    /// Member name in the WGSL struct.
    pub const fn name(self) -> &'static str {
        match self {
            UniformSlot::ScreenP0 => "screen_p0",
            UniformSlot::ScreenP1 => "screen_p1",
            UniformSlot::ScreenP2 => "screen_p2",
            UniformSlot::CameraPosition => "camera_position",
            UniformSlot::FrameCount => "frame_count",
        }
    }

    /// Byte offset in the uniform buffer.
    pub const fn offset(self) -> wgpu::BufferAddress {
        let offset = match self {
            UniformSlot::ScreenP0 => offset_of!(TraceUniforms, screen_p0),
            UniformSlot::ScreenP1 => offset_of!(TraceUniforms, screen_p1),
            UniformSlot::ScreenP2 => offset_of!(TraceUniforms, screen_p2),
            UniformSlot::CameraPosition => offset_of!(TraceUniforms, camera_position),
            UniformSlot::FrameCount => offset_of!(TraceUniforms, frame_count),
        };
        offset as wgpu::BufferAddress
    }

    /// Bytes written to the slot.
    pub const fn size(self) -> wgpu::BufferAddress {
        let size = match self {
            UniformSlot::FrameCount => size_of::<u32>(),
            _ => size_of::<[f32; 3]>(),
        };
        size as wgpu::BufferAddress
    }
}

/// Maps the sequencer's frame counter onto the sample index the kernel
/// blends with.
///
/// The kernel overwrites its accumulation buffer when the index is <= 1. The
/// counter only restarts at 1 after a camera move, so the first batch after
/// start-up is shifted down until it begins at 1 as well. Without that shift
/// the zeroed buffer would be blended in as a black sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleIndex {
    offset: Option<u32>,
}

impl SampleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample index for the frame the sequencer numbered `frame_count`.
    pub fn next(&mut self, frame_count: u32) -> u32 {
        let offset = match self.offset {
            None => frame_count.saturating_sub(1),
            Some(_) if frame_count <= 1 => 0,
            Some(offset) => offset,
        };
        self.offset = Some(offset);
        frame_count.saturating_sub(offset)
    }
}

/// Slot writes for one view update, in block order.
pub fn view_writes(view: &ViewUniforms) -> [(UniformSlot, [f32; 3]); 4] {
    [
        (UniformSlot::ScreenP0, view.screen_p0.to_array()),
        (UniformSlot::ScreenP1, view.screen_p1.to_array()),
        (UniformSlot::ScreenP2, view.screen_p2.to_array()),
        (UniformSlot::CameraPosition, view.camera_position.to_array()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_math::{CameraState, ScreenPlane, Vec3};

    const TRACE_SHADER: &str = include_str!("shaders/trace.wgsl");

    fn sample_view() -> ViewUniforms {
        let camera = CameraState::with_position(Vec3::new(1.0, 2.0, 3.0));
        ViewUniforms::new(&ScreenPlane::derive(&camera, 1.0), &camera)
    }

    fn write_slot(block: &mut [u8], slot: UniformSlot, bytes: &[u8]) {
        let start = slot.offset() as usize;
        assert_eq!(bytes.len() as u64, slot.size());
        block[start..start + bytes.len()].copy_from_slice(bytes);
    }

    #[test]
    fn test_first_batch_starts_by_overwriting() {
        let mut index = SampleIndex::new();

        // The sequencer's first frames are numbered 2, 3, 4.
        let indices: Vec<u32> = [2, 3, 4].into_iter().map(|n| index.next(n)).collect();

        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn test_batch_after_camera_move_is_unshifted() {
        let mut index = SampleIndex::new();
        index.next(2);
        index.next(3);

        // Camera moved: the counter restarts at 1.
        let indices: Vec<u32> = [1, 2, 3].into_iter().map(|n| index.next(n)).collect();

        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn test_block_is_64_bytes() {
        assert_eq!(size_of::<TraceUniforms>(), 64);
    }

    #[test]
    fn test_slot_offsets() {
        let offsets: Vec<_> = UniformSlot::ALL.iter().map(|slot| slot.offset()).collect();
        assert_eq!(offsets, vec![0, 16, 32, 48, 60]);
    }

    #[test]
    fn test_slot_writes_match_block() {
        let view = sample_view();
        let mut block = [0u8; size_of::<TraceUniforms>()];

        for (slot, value) in view_writes(&view) {
            write_slot(&mut block, slot, bytemuck::cast_slice(&value));
        }
        write_slot(&mut block, UniformSlot::FrameCount, bytemuck::bytes_of(&7u32));

        let expected = TraceUniforms::new(&view, 7);
        assert_eq!(&block[..], bytemuck::bytes_of(&expected));
    }

    #[test]
    fn test_slots_declared_in_shader_order() {
        let mut last = 0;
        for slot in UniformSlot::ALL {
            let position = TRACE_SHADER
                .find(&format!("{}:", slot.name()))
                .unwrap_or_else(|| panic!("{} missing from trace.wgsl", slot.name()));
            assert!(position >= last, "{} out of order", slot.name());
            last = position;
        }
    }
}

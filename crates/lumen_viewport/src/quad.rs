//! Full-screen quad used by the presentation pass.

/// Clip-space vertex of the presentation quad.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
}

impl QuadVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

const fn vertex(x: f32, y: f32) -> QuadVertex {
    QuadVertex { position: [x, y] }
}

/// Two triangles covering clip space from (-1, -1) to (1, 1).
pub const QUAD_VERTICES: [QuadVertex; 6] = [
    vertex(-1.0, -1.0),
    vertex(-1.0, 1.0),
    vertex(1.0, 1.0),
    vertex(-1.0, -1.0),
    vertex(1.0, 1.0),
    vertex(1.0, -1.0),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_area(a: [f32; 2], b: [f32; 2], c: [f32; 2]) -> f32 {
        0.5 * ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1]))
    }

    #[test]
    fn test_vertices_stay_in_clip_space() {
        for v in QUAD_VERTICES {
            assert!(v.position.iter().all(|c| c.abs() == 1.0));
        }
    }

    #[test]
    fn test_triangles_cover_clip_space() {
        let areas: Vec<f32> = QUAD_VERTICES
            .chunks(3)
            .map(|tri| signed_area(tri[0].position, tri[1].position, tri[2].position))
            .collect();

        // Same winding means the triangles do not fold over each other.
        assert!(areas.iter().all(|a| *a < 0.0) || areas.iter().all(|a| *a > 0.0));
        let total: f32 = areas.iter().map(|a| a.abs()).sum();
        assert!((total - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_stride() {
        assert_eq!(QuadVertex::desc().array_stride, 8);
    }
}

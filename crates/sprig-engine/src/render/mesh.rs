//! Shared unit quad (corners at ±0.5).

use super::backend::{GraphicsBackend, MeshDesc, MeshHandle, VertexLayout};

/// Index count of one quad (two triangles).
pub const QUAD_INDEX_COUNT: u32 = 6;

#[rustfmt::skip]
const QUAD_POSITIONS: [f32; 8] = [
     0.5,  0.5, // top right
     0.5, -0.5, // bottom right
    -0.5, -0.5, // bottom left
    -0.5,  0.5, // top left
];

// UV (0,0) sits on the local bottom-left corner. The screen matrix flips y,
// so v = 0 (the first uploaded row) ends up at the top of the screen.
#[rustfmt::skip]
const QUAD_POSITIONS_UV: [f32; 16] = [
     0.5,  0.5, 1.0, 1.0,
     0.5, -0.5, 1.0, 0.0,
    -0.5, -0.5, 0.0, 0.0,
    -0.5,  0.5, 0.0, 1.0,
];

const QUAD_INDICES: [u32; QUAD_INDEX_COUNT as usize] = [0, 1, 2, 2, 3, 0];

/// The two attribute streams of the unit quad, uploaded once per renderer.
#[derive(Debug, Copy, Clone)]
pub struct QuadMeshes {
    pub solid: MeshHandle,
    pub textured: MeshHandle,
}

impl QuadMeshes {
    pub fn new<B: GraphicsBackend>(backend: &mut B) -> Self {
        let solid = backend.create_mesh(&MeshDesc {
            label: "sprig quad",
            layout: VertexLayout::Position,
            vertices: &QUAD_POSITIONS,
            indices: &QUAD_INDICES,
        });
        let textured = backend.create_mesh(&MeshDesc {
            label: "sprig textured quad",
            layout: VertexLayout::PositionUv,
            vertices: &QUAD_POSITIONS_UV,
            indices: &QUAD_INDICES,
        });
        Self { solid, textured }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_arrays_match_their_layouts() {
        assert_eq!(QUAD_POSITIONS.len(), 4 * VertexLayout::Position.components());
        assert_eq!(QUAD_POSITIONS_UV.len(), 4 * VertexLayout::PositionUv.components());
    }

    #[test]
    fn indices_cover_all_four_corners() {
        for corner in 0..4u32 {
            assert!(QUAD_INDICES.contains(&corner));
        }
        assert!(QUAD_INDICES.iter().all(|&i| i < 4));
    }
}

//! GPU draw backend seam.
//!
//! The renderer never talks to wgpu directly. It builds self-contained
//! [`DrawCall`]s (program, mesh, texture, uniforms) and hands them to a
//! [`GraphicsBackend`]. Every bind is scoped to the call it belongs to, so no
//! draw relies on state left behind by another.

mod handle;
mod headless;
mod gpu;

use std::borrow::Cow;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::paint::Color;

pub use self::handle::{MeshHandle, ProgramHandle, TextureHandle};
pub use self::headless::HeadlessBackend;
pub use self::gpu::WgpuBackend;

use super::capture::{CaptureError, PixelReadback};
use super::programs::ShaderError;

/// Vertex format of a mesh, and the format a program expects.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VertexLayout {
    /// `location(0)`: `vec2<f32>` position.
    Position,
    /// `location(0)`: `vec2<f32>` position, `location(1)`: `vec2<f32>` UV.
    PositionUv,
}

impl VertexLayout {
    /// Number of `f32` components per vertex.
    #[inline]
    pub const fn components(self) -> usize {
        match self {
            VertexLayout::Position => 2,
            VertexLayout::PositionUv => 4,
        }
    }

    /// Whether programs with this layout sample a texture at unit 0.
    #[inline]
    pub const fn is_textured(self) -> bool {
        matches!(self, VertexLayout::PositionUv)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum StageKind {
    Vertex,
    Fragment,
}

/// One shader stage: WGSL source plus the entry point to use.
#[derive(Debug, Clone)]
pub struct ShaderStage<'a> {
    pub kind: StageKind,
    pub source: Cow<'a, str>,
    pub entry_point: &'a str,
}

impl<'a> ShaderStage<'a> {
    pub fn vertex(source: impl Into<Cow<'a, str>>, entry_point: &'a str) -> Self {
        Self { kind: StageKind::Vertex, source: source.into(), entry_point }
    }

    pub fn fragment(source: impl Into<Cow<'a, str>>, entry_point: &'a str) -> Self {
        Self { kind: StageKind::Fragment, source: source.into(), entry_point }
    }
}

/// Everything needed to build a program.
#[derive(Debug, Clone)]
pub struct ProgramDesc<'a> {
    pub label: &'a str,
    pub layout: VertexLayout,
    pub stages: Vec<ShaderStage<'a>>,
}

impl<'a> ProgramDesc<'a> {
    /// Returns the stage of the given kind, if present.
    pub fn stage(&self, kind: StageKind) -> Option<&ShaderStage<'a>> {
        self.stages.iter().find(|s| s.kind == kind)
    }
}

/// Index-buffered mesh upload.
#[derive(Debug, Clone)]
pub struct MeshDesc<'a> {
    pub label: &'a str,
    pub layout: VertexLayout,
    pub vertices: &'a [f32],
    pub indices: &'a [u32],
}

/// Sampling options for a texture.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct TextureOptions {
    /// Linear filtering when `true`, nearest-neighbour otherwise.
    pub smoothing: bool,
}

/// Per-draw uniform block, laid out to match the WGSL `DrawUniforms` struct.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct DrawUniforms {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl DrawUniforms {
    pub fn new(projection: Mat4, view: Mat4, model: Mat4, color: Color) -> Self {
        Self {
            projection: projection.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            color: color.to_array(),
        }
    }

    #[inline]
    pub fn model(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.model)
    }

    #[inline]
    pub fn color(&self) -> Color {
        Color::from(self.color)
    }
}

/// A fully specified draw: what to bind and how many indices to draw.
///
/// `texture` is bound to unit 0 for the duration of this call only.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DrawCall {
    pub program: ProgramHandle,
    pub mesh: MeshHandle,
    pub texture: Option<TextureHandle>,
    pub uniforms: DrawUniforms,
    pub index_count: u32,
}

/// Opaque GPU capability consumed by the renderer.
///
/// Implementations must treat each [`DrawCall`] independently.
pub trait GraphicsBackend {
    /// Compiles and links a program. Failure is a configuration error.
    fn compile_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramHandle, ShaderError>;

    /// Vertex layout of a program compiled by this backend, `None` if unknown.
    fn program_layout(&self, program: ProgramHandle) -> Option<VertexLayout>;

    fn create_mesh(&mut self, desc: &MeshDesc<'_>) -> MeshHandle;

    /// Uploads tightly packed RGBA8 pixels, first row first.
    fn create_texture(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        options: TextureOptions,
    ) -> TextureHandle;

    fn set_viewport(&mut self, width: u32, height: u32);

    /// Clears the color buffer. Draws submitted before the clear are kept.
    fn clear(&mut self, color: Color);

    fn submit(&mut self, call: &DrawCall);

    /// Reads back a region of the color buffer as RGBA8.
    fn read_pixels(&mut self, x: u32, y: u32, width: u32, height: u32)
        -> Result<PixelReadback, CaptureError>;

    /// Size of the color buffer currently drawn into, in pixels.
    fn framebuffer_size(&self) -> (u32, u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_block_matches_wgsl_size() {
        // 3 x mat4x4<f32> + vec4<f32>
        assert_eq!(std::mem::size_of::<DrawUniforms>(), 3 * 64 + 16);
    }

    #[test]
    fn uniforms_round_trip_model_and_color() {
        let model = Mat4::from_translation(glam::Vec3::new(3.0, 4.0, 0.0));
        let u = DrawUniforms::new(Mat4::IDENTITY, Mat4::IDENTITY, model, Color::WHITE);
        assert_eq!(u.model(), model);
        assert_eq!(u.color(), Color::WHITE);
    }

    #[test]
    fn layout_component_counts() {
        assert_eq!(VertexLayout::Position.components(), 2);
        assert_eq!(VertexLayout::PositionUv.components(), 4);
        assert!(VertexLayout::PositionUv.is_textured());
        assert!(!VertexLayout::Position.is_textured());
    }
}

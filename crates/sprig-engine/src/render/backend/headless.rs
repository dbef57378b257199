use crate::paint::Color;
use crate::render::capture::{BYTES_PER_PIXEL, CaptureError, PixelReadback, RowOrigin};
use crate::render::programs::{ShaderError, validate_program};

use super::{
    DrawCall, GraphicsBackend, MeshDesc, MeshHandle, ProgramDesc, ProgramHandle, TextureHandle,
    TextureOptions, VertexLayout,
};

#[derive(Debug, Clone)]
struct HeadlessProgram {
    label: String,
    layout: VertexLayout,
}

#[derive(Debug, Clone)]
struct HeadlessMesh {
    layout: VertexLayout,
    index_count: usize,
}

/// Texture metadata kept by [`HeadlessBackend`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct HeadlessTexture {
    pub width: u32,
    pub height: u32,
    pub options: TextureOptions,
}

/// GPU-less backend.
///
/// Records every submitted [`DrawCall`] instead of rasterizing it, and keeps a
/// CPU color buffer that `clear` fills and `read_pixels` returns. Rows are
/// stored bottom-up, like a GL framebuffer.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    width: u32,
    height: u32,
    framebuffer: Vec<u8>,

    programs: Vec<HeadlessProgram>,
    meshes: Vec<HeadlessMesh>,
    textures: Vec<HeadlessTexture>,

    calls: Vec<DrawCall>,
    clears: Vec<Color>,
}

impl HeadlessBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            framebuffer: vec![0; framebuffer_len(width, height)],
            ..Self::default()
        }
    }

    /// Draw calls submitted so far, in submission order.
    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    /// Returns and forgets the recorded draw calls.
    pub fn take_calls(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn clears(&self) -> &[Color] {
        &self.clears
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    pub fn program_label(&self, program: ProgramHandle) -> Option<&str> {
        self.programs.get(program.index()).map(|p| p.label.as_str())
    }

    pub fn mesh_layout(&self, mesh: MeshHandle) -> Option<VertexLayout> {
        self.meshes.get(mesh.index()).map(|m| m.layout)
    }

    pub fn mesh_index_count(&self, mesh: MeshHandle) -> Option<usize> {
        self.meshes.get(mesh.index()).map(|m| m.index_count)
    }

    pub fn texture(&self, texture: TextureHandle) -> Option<HeadlessTexture> {
        self.textures.get(texture.index()).copied()
    }

    /// Writes one RGBA value across framebuffer row `y` (0 = bottom).
    pub fn fill_row(&mut self, y: u32, rgba: [u8; 4]) {
        let stride = self.width as usize * BYTES_PER_PIXEL;
        let start = y as usize * stride;
        if let Some(row) = self.framebuffer.get_mut(start..start + stride) {
            for px in row.chunks_exact_mut(BYTES_PER_PIXEL) {
                px.copy_from_slice(&rgba);
            }
        }
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn compile_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramHandle, ShaderError> {
        validate_program(desc)?;
        self.programs.push(HeadlessProgram {
            label: desc.label.to_string(),
            layout: desc.layout,
        });
        Ok(ProgramHandle::from_index(self.programs.len() - 1))
    }

    fn program_layout(&self, program: ProgramHandle) -> Option<VertexLayout> {
        self.programs.get(program.index()).map(|p| p.layout)
    }

    fn create_mesh(&mut self, desc: &MeshDesc<'_>) -> MeshHandle {
        self.meshes.push(HeadlessMesh {
            layout: desc.layout,
            index_count: desc.indices.len(),
        });
        MeshHandle::from_index(self.meshes.len() - 1)
    }

    fn create_texture(
        &mut self,
        _pixels: &[u8],
        width: u32,
        height: u32,
        options: TextureOptions,
    ) -> TextureHandle {
        self.textures.push(HeadlessTexture { width, height, options });
        TextureHandle::from_index(self.textures.len() - 1)
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        if (width, height) != (self.width, self.height) {
            self.width = width;
            self.height = height;
            self.framebuffer = vec![0; framebuffer_len(width, height)];
        }
    }

    fn clear(&mut self, color: Color) {
        let c = color.clamped();
        let rgba = [c.r, c.g, c.b, c.a].map(|v| (v * 255.0).round() as u8);
        for px in self.framebuffer.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&rgba);
        }
        self.clears.push(color);
    }

    fn submit(&mut self, call: &DrawCall) {
        self.calls.push(*call);
    }

    fn read_pixels(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<PixelReadback, CaptureError> {
        let end_x = x.checked_add(width);
        let end_y = y.checked_add(height);
        if end_x.is_none_or(|e| e > self.width) || end_y.is_none_or(|e| e > self.height) {
            return Err(CaptureError::Readback(format!(
                "region {width}x{height}+{x}+{y} exceeds {}x{} framebuffer",
                self.width, self.height
            )));
        }

        let stride = self.width as usize * BYTES_PER_PIXEL;
        let mut bytes = Vec::with_capacity(framebuffer_len(width, height));
        for row in y..y + height {
            let start = row as usize * stride + x as usize * BYTES_PER_PIXEL;
            bytes.extend_from_slice(&self.framebuffer[start..start + width as usize * BYTES_PER_PIXEL]);
        }

        Ok(PixelReadback {
            width,
            height,
            origin: RowOrigin::Bottom,
            bytes,
        })
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn framebuffer_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

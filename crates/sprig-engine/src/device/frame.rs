/// A surface texture acquired for one frame.
///
/// Must be handed back to [`Gpu::present`](super::Gpu::present) promptly;
/// holding it blocks acquisition of the next frame.
pub struct GpuFrame {
    pub(crate) surface_texture: wgpu::SurfaceTexture,
}

impl GpuFrame {
    #[inline]
    pub fn texture(&self) -> &wgpu::Texture {
        &self.surface_texture.texture
    }
}

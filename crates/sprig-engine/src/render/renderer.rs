use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glam::{Mat4, Vec2};

use crate::device::Gpu;
use crate::paint::Color;

use super::backend::{
    DrawCall, DrawUniforms, GraphicsBackend, ProgramDesc, ProgramHandle, TextureHandle,
    TextureOptions, VertexLayout, WgpuBackend,
};
use super::capture::{self, CaptureError};
use super::mesh::{QUAD_INDEX_COUNT, QuadMeshes};
use super::programs::{self, ProgramCache, ShaderError};
use super::transform::{DrawArgs, compose_model, screen_matrix};

/// A texture uploaded through a renderer, with its intrinsic size.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Texture {
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    #[inline]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }
}

/// Renderer context: one per window.
///
/// Owns the backend, the built-in programs and the unit quad, plus the screen
/// (orthographic) and view matrices every draw is composed with. The screen
/// matrix is recomputed in place on every size change.
pub struct Renderer<B: GraphicsBackend> {
    backend: B,
    programs: ProgramCache,
    quad: QuadMeshes,

    screen_size: Vec2,
    screen_matrix: Mat4,
    view_matrix: Mat4,

    capture_request: Option<PathBuf>,
}

impl Renderer<WgpuBackend> {
    /// Creates a renderer drawing into the surface of `gpu`.
    pub fn for_gpu(gpu: &Gpu<'_>) -> Result<Self> {
        let size = gpu.size();
        let backend = WgpuBackend::new(
            gpu.device(),
            gpu.queue(),
            gpu.surface_format(),
            (size.width, size.height),
        );
        Renderer::new(backend, size.width, size.height).context("failed to build renderer programs")
    }
}

impl<B: GraphicsBackend> Renderer<B> {
    /// Builds the renderer, compiling both built-in programs up front.
    pub fn new(mut backend: B, width: u32, height: u32) -> Result<Self, ShaderError> {
        let programs = ProgramCache::new(&mut backend)?;
        let quad = QuadMeshes::new(&mut backend);
        backend.set_viewport(width, height);

        log::info!("renderer created at {width}x{height}");

        Ok(Self {
            backend,
            programs,
            quad,
            screen_size: Vec2::new(width as f32, height as f32),
            screen_matrix: screen_matrix(width as f32, height as f32),
            view_matrix: Mat4::IDENTITY,
            capture_request: None,
        })
    }

    // ── state ─────────────────────────────────────────────────────────────

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    pub fn programs(&self) -> &ProgramCache {
        &self.programs
    }

    #[inline]
    pub fn screen_size(&self) -> Vec2 {
        self.screen_size
    }

    #[inline]
    pub fn screen_matrix(&self) -> Mat4 {
        self.screen_matrix
    }

    #[inline]
    pub fn view(&self) -> Mat4 {
        self.view_matrix
    }

    pub fn set_view(&mut self, view: Mat4) {
        self.view_matrix = view;
    }

    /// Applies a new framebuffer size: updates the backend viewport and
    /// recomputes the screen matrix.
    pub fn resize(&mut self, width: u32, height: u32) {
        log::debug!("renderer resized to {width}x{height}");
        self.screen_size = Vec2::new(width as f32, height as f32);
        self.screen_matrix = screen_matrix(width as f32, height as f32);
        self.backend.set_viewport(width, height);
    }

    /// Resizes only when the size differs from the current one.
    pub fn sync_size(&mut self, width: u32, height: u32) {
        if self.screen_size != Vec2::new(width as f32, height as f32) {
            self.resize(width, height);
        }
    }

    pub fn clear(&mut self, color: Color) {
        self.backend.clear(color);
    }

    // ── resources ─────────────────────────────────────────────────────────

    /// Compiles a caller-supplied program for use through [`DrawArgs::program`].
    pub fn compile_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramHandle, ShaderError> {
        programs::compile(&mut self.backend, desc)
    }

    /// Vertex layout of `program`, if this renderer's backend compiled it.
    pub fn program_layout(&self, program: ProgramHandle) -> Option<VertexLayout> {
        self.backend.program_layout(program)
    }

    /// Uploads tightly packed RGBA8 pixels (first row is the top of the image).
    pub fn create_texture(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        options: TextureOptions,
    ) -> Texture {
        debug_assert_eq!(pixels.len(), width as usize * height as usize * 4);
        let handle = self.backend.create_texture(pixels, width, height, options);
        log::debug!("texture #{} created ({width}x{height})", handle.raw());
        Texture { handle, width, height }
    }

    /// Decodes an image file (PNG) into a texture.
    pub fn load_texture(&mut self, path: impl AsRef<Path>, options: TextureOptions) -> Result<Texture> {
        let path = path.as_ref();
        let image = image::open(path)
            .with_context(|| format!("failed to load image {}", path.display()))?
            .to_rgba8();
        let (width, height) = image.dimensions();
        Ok(self.create_texture(image.as_raw(), width, height, options))
    }

    // ── draws ─────────────────────────────────────────────────────────────

    /// Fills the `w`×`h` rectangle whose top-left corner is `(x, y)`.
    pub fn draw_rect_fill(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        let model = compose_model(Vec2::new(x, y), Vec2::new(w, h), &DrawArgs::default());

        self.backend.submit(&DrawCall {
            program: self.programs.solid(),
            mesh: self.quad.solid,
            texture: None,
            uniforms: DrawUniforms::new(self.screen_matrix, self.view_matrix, model, color),
            index_count: QUAD_INDEX_COUNT,
        });
    }

    /// Draws `texture` at its intrinsic size, adjusted by `args`.
    ///
    /// `None` behaves like `DrawArgs::default()`: top-left anchored, unscaled.
    /// Scripts written against the older runtime, where omitting the args drew
    /// the texture centered on `(x, y)`, need `DrawArgs::new().centered(true)`.
    /// The texture is not tinted.
    ///
    /// A program in `args` must come from this renderer and use
    /// [`VertexLayout::PositionUv`]; [`Bindings`](crate::bindings::Bindings)
    /// checks both before calling in.
    pub fn draw_texture(&mut self, texture: &Texture, x: f32, y: f32, args: Option<&DrawArgs>) {
        let args = args.copied().unwrap_or_default();
        let program = args.program.unwrap_or(self.programs.textured());
        let model = compose_model(Vec2::new(x, y), texture.size(), &args);

        self.backend.submit(&DrawCall {
            program,
            mesh: self.quad.textured,
            texture: Some(texture.handle),
            uniforms: DrawUniforms::new(self.screen_matrix, self.view_matrix, model, Color::WHITE),
            index_count: QUAD_INDEX_COUNT,
        });
    }

    // ── capture ───────────────────────────────────────────────────────────

    /// Reads back the current color buffer and writes it to `path` as PNG.
    pub fn capture_to_image(&mut self, path: impl AsRef<Path>) -> Result<(), CaptureError> {
        let path = path.as_ref();
        let image = capture::capture(&mut self.backend)?;
        image.save_png(path)?;
        log::info!("captured {}x{} frame to {}", image.width, image.height, path.display());
        Ok(())
    }

    /// Asks the frame loop to capture the next finished frame to `path`.
    pub fn request_capture(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        log::info!("capture requested: {}", path.display());
        self.capture_request = Some(path);
    }

    pub fn take_capture_request(&mut self) -> Option<PathBuf> {
        self.capture_request.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::{HeadlessBackend, ShaderStage, VertexLayout};
    use crate::render::programs::TEXTURED_SHADER;
    use glam::{Vec3, Vec4};

    fn renderer() -> Renderer<HeadlessBackend> {
        Renderer::new(HeadlessBackend::new(320, 240), 320, 240).unwrap()
    }

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < 1e-4
    }

    #[test]
    fn rect_fill_uses_solid_program_and_flat_color() {
        let mut r = renderer();
        let color = Color::new(0.2, 0.4, 0.6, 0.8);
        r.draw_rect_fill(10.0, 20.0, 30.0, 40.0, color);

        let calls = r.backend().calls();
        assert_eq!(calls.len(), 1);
        let call = calls[0];
        assert_eq!(call.program, r.programs().solid());
        assert_eq!(call.texture, None);
        assert_eq!(call.index_count, 6);
        assert_eq!(call.uniforms.color(), color);
        assert_eq!(r.backend().mesh_layout(call.mesh), Some(VertexLayout::Position));
        assert!(approx(call.uniforms.model().w_axis.truncate(), Vec3::new(25.0, 40.0, 0.0)));
    }

    #[test]
    fn texture_draw_binds_texture_with_white_color() {
        let mut r = renderer();
        let tex = r.create_texture(&[0; 16 * 8 * 4], 16, 8, TextureOptions::default());
        r.draw_texture(&tex, 0.0, 0.0, None);

        let call = r.backend().calls()[0];
        assert_eq!(call.program, r.programs().textured());
        assert_eq!(call.texture, Some(tex.handle));
        assert_eq!(call.uniforms.color(), Color::WHITE);
        assert_eq!(r.backend().mesh_layout(call.mesh), Some(VertexLayout::PositionUv));
        // Uncentered by default: anchor moves by half the intrinsic size.
        assert!(approx(call.uniforms.model().w_axis.truncate(), Vec3::new(8.0, 4.0, 0.0)));
    }

    #[test]
    fn texture_draw_applies_scale_and_centering() {
        let mut r = renderer();
        let tex = r.create_texture(&[0; 4 * 4 * 4], 4, 4, TextureOptions::default());
        let args = DrawArgs::new().scale(2.0, 2.0).centered(true);
        r.draw_texture(&tex, 10.0, 10.0, Some(&args));

        let model = r.backend().calls()[0].uniforms.model();
        assert!(approx(model.w_axis.truncate(), Vec3::new(20.0, 20.0, 0.0)));
        assert!((model.x_axis.x - 8.0).abs() < 1e-5);
    }

    #[test]
    fn caller_program_overrides_default() {
        let mut r = renderer();
        let custom = r
            .compile_program(&ProgramDesc {
                label: "custom",
                layout: VertexLayout::PositionUv,
                stages: vec![
                    ShaderStage::vertex(TEXTURED_SHADER, "vs_main"),
                    ShaderStage::fragment(TEXTURED_SHADER, "fs_main"),
                ],
            })
            .unwrap();
        let tex = r.create_texture(&[0; 4], 1, 1, TextureOptions::default());
        r.draw_texture(&tex, 0.0, 0.0, Some(&DrawArgs::new().program(custom)));

        let call = r.backend().calls()[0];
        assert_eq!(call.program, custom);
        assert_eq!(r.backend().program_label(custom), Some("custom"));
    }

    #[test]
    fn draws_carry_screen_and_view_matrices() {
        let mut r = renderer();
        let view = Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0));
        r.set_view(view);
        r.draw_rect_fill(0.0, 0.0, 1.0, 1.0, Color::BLACK);

        let u = r.backend().calls()[0].uniforms;
        assert_eq!(Mat4::from_cols_array_2d(&u.projection), r.screen_matrix());
        assert_eq!(Mat4::from_cols_array_2d(&u.view), view);
    }

    #[test]
    fn resize_recomputes_screen_matrix() {
        let mut r = renderer();
        let before = r.screen_matrix();
        r.resize(640, 480);
        assert_ne!(r.screen_matrix(), before);
        assert_eq!(r.screen_matrix(), screen_matrix(640.0, 480.0));
        assert_eq!(r.backend().framebuffer_size(), (640, 480));

        // Bottom-right pixel maps to NDC (1, -1).
        let p = r.screen_matrix() * Vec4::new(640.0, 480.0, 0.0, 1.0);
        assert!((p.x - 1.0).abs() < 1e-5 && (p.y + 1.0).abs() < 1e-5);
    }

    #[test]
    fn sync_size_is_a_no_op_for_same_size() {
        let mut r = renderer();
        r.backend_mut().fill_row(0, [1, 2, 3, 4]);
        r.sync_size(320, 240);
        // Headless backend reallocates its color buffer only on a real resize.
        let rb = r.backend_mut().read_pixels(0, 0, 1, 1).unwrap();
        assert_eq!(rb.bytes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn capture_to_image_writes_top_down_png() {
        let mut r = Renderer::new(HeadlessBackend::new(2, 3), 2, 3).unwrap();
        r.backend_mut().fill_row(0, [10, 20, 30, 255]);
        r.backend_mut().fill_row(2, [200, 100, 50, 255]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        r.capture_to_image(&path).unwrap();

        let png = image::open(&path).unwrap().to_rgba8();
        assert_eq!(png.dimensions(), (2, 3));
        assert_eq!(png.get_pixel(0, 0).0, [200, 100, 50, 255]);
        assert_eq!(png.get_pixel(1, 2).0, [10, 20, 30, 255]);
    }

    #[test]
    fn capture_request_is_taken_once() {
        let mut r = renderer();
        r.request_capture("out.png");
        assert_eq!(r.take_capture_request(), Some(PathBuf::from("out.png")));
        assert_eq!(r.take_capture_request(), None);
    }

    #[test]
    fn load_texture_reads_png_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tex.png");
        image::RgbaImage::from_pixel(5, 3, image::Rgba([1, 2, 3, 255]))
            .save(&path)
            .unwrap();

        let mut r = renderer();
        let tex = r
            .load_texture(&path, TextureOptions { smoothing: true })
            .unwrap();
        assert_eq!((tex.width, tex.height), (5, 3));
        let meta = r.backend().texture(tex.handle).unwrap();
        assert!(meta.options.smoothing);
    }

    #[test]
    fn missing_texture_file_is_an_error() {
        let mut r = renderer();
        assert!(r.load_texture("/definitely/not/here.png", TextureOptions::default()).is_err());
    }
}

//! Host-facing surface of the engine.
//!
//! A scripting host holds only [`Handle`]s. [`Bindings`] owns every renderer,
//! texture, program, particle source and particle system behind them,
//! validates handles and arguments, and only then calls into the core.

mod error;
mod registry;

use std::collections::HashSet;
use std::path::Path;

use crate::paint::Color;
use crate::particle::{ParticleFactor, ParticleSource, ParticleSourceConfig, ParticleSystem};
use crate::render::{
    DrawArgs, GraphicsBackend, ProgramDesc, ProgramHandle, Renderer, Texture, TextureOptions,
    VertexLayout,
};

pub use error::BindingError;
pub use registry::{Handle, Registry};

pub type RendererHandle<B> = Handle<Renderer<B>>;
pub type TextureId = Handle<BoundTexture>;
pub type ProgramId = Handle<BoundProgram>;
pub type SourceHandle = Handle<ParticleSource>;
pub type SystemHandle = Handle<ParticleSystem>;

/// Upper bound on a particle source's ring, so a host value can never reach
/// the allocator unchecked.
pub const MAX_PARTICLES_PER_SOURCE: usize = 1 << 20;

/// Renderer a resource was created through.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Owner {
    index: u32,
    generation: u32,
}

impl Owner {
    fn of<T>(handle: Handle<T>) -> Self {
        Self {
            index: handle.index(),
            generation: handle.generation(),
        }
    }

    fn is<T>(self, handle: Handle<T>) -> bool {
        self == Self::of(handle)
    }
}

/// A texture together with the renderer whose backend holds it.
pub struct BoundTexture {
    owner: Owner,
    texture: Texture,
}

impl BoundTexture {
    #[inline]
    pub fn texture(&self) -> &Texture {
        &self.texture
    }
}

/// A caller-compiled program together with the renderer that compiled it.
pub struct BoundProgram {
    owner: Owner,
    program: ProgramHandle,
}

impl BoundProgram {
    #[inline]
    pub fn program(&self) -> ProgramHandle {
        self.program
    }
}

type Result<T> = std::result::Result<T, BindingError>;

pub struct Bindings<B: GraphicsBackend> {
    renderers: Registry<Renderer<B>>,
    textures: Registry<BoundTexture>,
    programs: Registry<BoundProgram>,
    sources: Registry<ParticleSource>,
    systems: Registry<ParticleSystem>,
}

impl<B: GraphicsBackend> Default for Bindings<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: GraphicsBackend> Bindings<B> {
    pub fn new() -> Self {
        Self {
            renderers: Registry::new(),
            textures: Registry::new(),
            programs: Registry::new(),
            sources: Registry::new(),
            systems: Registry::new(),
        }
    }

    // ── renderers ─────────────────────────────────────────────────────────

    pub fn create_renderer(&mut self, backend: B, width: u32, height: u32) -> Result<RendererHandle<B>> {
        if width == 0 || height == 0 {
            return Err(BindingError::invalid(
                "create_renderer",
                format!("window size {width}x{height} is empty"),
            ));
        }

        let renderer = Renderer::new(backend, width, height).inspect_err(|e| {
            log::error!("renderer creation failed: {e}");
        })?;
        Ok(self.renderers.insert(renderer))
    }

    pub fn renderer(&self, handle: RendererHandle<B>) -> Result<&Renderer<B>> {
        self.renderers.get(handle).ok_or(stale("renderer"))
    }

    pub fn renderer_mut(&mut self, handle: RendererHandle<B>) -> Result<&mut Renderer<B>> {
        self.renderers.get_mut(handle).ok_or(stale("renderer"))
    }

    /// Drops the renderer and every texture and program created through it.
    pub fn destroy_renderer(&mut self, handle: RendererHandle<B>) -> Result<()> {
        self.renderers.remove(handle).ok_or(stale("renderer"))?;

        self.textures.retain(|tex| !tex.owner.is(handle));
        self.programs.retain(|prog| !prog.owner.is(handle));
        Ok(())
    }

    // ── programs ──────────────────────────────────────────────────────────

    /// Compiles a program on `renderer` for use in [`DrawArgs::program`].
    pub fn compile_program(&mut self, renderer: RendererHandle<B>, desc: &ProgramDesc<'_>) -> Result<ProgramId> {
        let program = self.renderer_mut(renderer)?.compile_program(desc)?;
        Ok(self.programs.insert(BoundProgram {
            owner: Owner::of(renderer),
            program,
        }))
    }

    pub fn program(&self, handle: ProgramId) -> Result<ProgramHandle> {
        self.programs.get(handle).map(BoundProgram::program).ok_or(stale("program"))
    }

    // ── textures ──────────────────────────────────────────────────────────

    /// Uploads tightly packed RGBA8 pixels through `renderer`.
    pub fn create_texture(
        &mut self,
        renderer: RendererHandle<B>,
        pixels: &[u8],
        width: u32,
        height: u32,
        options: TextureOptions,
    ) -> Result<TextureId> {
        const OP: &str = "create_texture";

        if width == 0 || height == 0 {
            return Err(BindingError::invalid(OP, format!("texture size {width}x{height} is empty")));
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(BindingError::invalid(
                OP,
                format!("expected {expected} bytes of RGBA8, got {}", pixels.len()),
            ));
        }

        let texture = self.renderer_mut(renderer)?.create_texture(pixels, width, height, options);
        Ok(self.textures.insert(BoundTexture {
            owner: Owner::of(renderer),
            texture,
        }))
    }

    pub fn texture(&self, handle: TextureId) -> Result<&Texture> {
        self.textures.get(handle).map(BoundTexture::texture).ok_or(stale("texture"))
    }

    pub fn destroy_texture(&mut self, handle: TextureId) -> Result<()> {
        self.textures.remove(handle).map(drop).ok_or(stale("texture"))
    }

    // ── draws ─────────────────────────────────────────────────────────────

    pub fn draw_rect_fill(
        &mut self,
        renderer: RendererHandle<B>,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        color: Color,
    ) -> Result<()> {
        const OP: &str = "draw_rect_fill";

        if ![x, y, w, h].iter().all(|v| v.is_finite()) {
            return Err(BindingError::invalid(OP, "rectangle must be finite"));
        }
        if !color.is_finite() {
            return Err(BindingError::invalid(OP, "color must be finite"));
        }

        self.renderer_mut(renderer)?.draw_rect_fill(x, y, w, h, color);
        Ok(())
    }

    /// Draws `texture` at `(x, y)`; `args` of `None` draws with defaults.
    pub fn draw_texture(
        &mut self,
        renderer: RendererHandle<B>,
        texture: TextureId,
        x: f32,
        y: f32,
        args: Option<&DrawArgs>,
    ) -> Result<()> {
        const OP: &str = "draw_texture";

        if !(x.is_finite() && y.is_finite()) {
            return Err(BindingError::invalid(OP, "position must be finite"));
        }
        if args.is_some_and(|a| !(a.scale_x.is_finite() && a.scale_y.is_finite() && a.rotation.is_finite())) {
            return Err(BindingError::invalid(OP, "draw args must be finite"));
        }

        let bound = self.textures.get(texture).ok_or(stale("texture"))?;
        if !bound.owner.is(renderer) {
            return Err(BindingError::invalid(OP, "texture belongs to another renderer"));
        }
        let texture = bound.texture;

        if let Some(program) = args.and_then(|a| a.program) {
            self.check_texture_program(renderer, program)?;
        }

        self.renderer_mut(renderer)?.draw_texture(&texture, x, y, args);
        Ok(())
    }

    pub fn capture_to_image(&mut self, renderer: RendererHandle<B>, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(BindingError::invalid("capture_to_image", "path is empty"));
        }

        self.renderer_mut(renderer)?.capture_to_image(path).inspect_err(|e| {
            log::warn!("capture to {} failed: {e}", path.display());
        })?;
        Ok(())
    }

    // ── particles ─────────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    pub fn make_particle_source(
        &mut self,
        capacity: usize,
        geometry: f32,
        color: Color,
        size: ParticleFactor,
        interval: ParticleFactor,
        lifetime: ParticleFactor,
        velocity_x: ParticleFactor,
        velocity_y: ParticleFactor,
    ) -> Result<SourceHandle> {
        self.make_particle_source_from(ParticleSourceConfig {
            capacity,
            geometry,
            color,
            size,
            interval,
            lifetime,
            velocity_x,
            velocity_y,
        })
    }

    pub fn make_particle_source_from(&mut self, config: ParticleSourceConfig) -> Result<SourceHandle> {
        validate_source(&config)?;
        Ok(self.sources.insert(ParticleSource::new(config)))
    }

    pub fn particle_source(&self, handle: SourceHandle) -> Result<&ParticleSource> {
        self.sources.get(handle).ok_or(stale("particle source"))
    }

    /// Drops a source that was never handed to a system.
    pub fn destroy_particle_source(&mut self, handle: SourceHandle) -> Result<()> {
        self.sources.remove(handle).map(drop).ok_or(stale("particle source"))
    }

    /// Builds a system that takes ownership of `sources`.
    ///
    /// The source handles are consumed. Nothing is consumed if any handle is
    /// stale or repeated.
    pub fn make_particle_system(&mut self, sources: &[SourceHandle]) -> Result<SystemHandle> {
        let sources = self.take_sources("make_particle_system", sources)?;
        Ok(self.systems.insert(ParticleSystem::new(sources)))
    }

    /// Like [`Bindings::make_particle_system`], with deterministic sampling.
    pub fn make_particle_system_with_seed(&mut self, sources: &[SourceHandle], seed: u64) -> Result<SystemHandle> {
        let sources = self.take_sources("make_particle_system", sources)?;
        Ok(self.systems.insert(ParticleSystem::with_seed(sources, seed)))
    }

    pub fn particle_system(&self, handle: SystemHandle) -> Result<&ParticleSystem> {
        self.systems.get(handle).ok_or(stale("particle system"))
    }

    pub fn particle_system_update(&mut self, system: SystemHandle, dt: f32) -> Result<()> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(BindingError::invalid(
                "particle_system_update",
                format!("time delta {dt} must be finite and non-negative"),
            ));
        }

        self.systems.get_mut(system).ok_or(stale("particle system"))?.update(dt);
        Ok(())
    }

    pub fn particle_system_render(&mut self, renderer: RendererHandle<B>, system: SystemHandle) -> Result<()> {
        let system = self.systems.get(system).ok_or(stale("particle system"))?;
        let renderer = self.renderers.get_mut(renderer).ok_or(stale("renderer"))?;
        system.render(renderer);
        Ok(())
    }

    pub fn particle_system_set_origin(&mut self, system: SystemHandle, x: f32, y: f32) -> Result<()> {
        if !(x.is_finite() && y.is_finite()) {
            return Err(BindingError::invalid("particle_system_set_origin", "origin must be finite"));
        }

        self.systems.get_mut(system).ok_or(stale("particle system"))?.set_origin(x, y);
        Ok(())
    }

    /// Drops the system and the sources it owns.
    pub fn destroy_particle_system(&mut self, system: SystemHandle) -> Result<()> {
        self.systems.remove(system).map(drop).ok_or(stale("particle system"))
    }

    /// A textured draw may only use a program of the same renderer that
    /// reads position and UV.
    fn check_texture_program(&self, renderer: RendererHandle<B>, program: ProgramHandle) -> Result<()> {
        const OP: &str = "draw_texture";

        let r = self.renderer(renderer)?;
        let builtin = program == r.programs().solid() || program == r.programs().textured();
        let compiled_here = self
            .programs
            .values()
            .any(|p| p.owner.is(renderer) && p.program == program);
        if !(builtin || compiled_here) {
            return Err(BindingError::invalid(OP, "program was not compiled by this renderer"));
        }

        match r.program_layout(program) {
            Some(VertexLayout::PositionUv) => Ok(()),
            Some(layout) => Err(BindingError::invalid(
                OP,
                format!("program uses {layout:?} vertices; textured draws need PositionUv"),
            )),
            None => Err(BindingError::invalid(OP, "program is unknown to the renderer")),
        }
    }

    fn take_sources(&mut self, operation: &'static str, handles: &[SourceHandle]) -> Result<Vec<ParticleSource>> {
        let mut seen = HashSet::with_capacity(handles.len());
        for &handle in handles {
            if !self.sources.contains(handle) {
                return Err(stale("particle source"));
            }
            if !seen.insert(handle) {
                return Err(BindingError::DuplicateSource { operation });
            }
        }

        Ok(handles
            .iter()
            .filter_map(|&handle| self.sources.remove(handle))
            .collect())
    }
}

fn stale(kind: &'static str) -> BindingError {
    BindingError::StaleHandle { kind }
}

fn validate_source(config: &ParticleSourceConfig) -> Result<()> {
    const OP: &str = "make_particle_source";

    if !(1..=MAX_PARTICLES_PER_SOURCE).contains(&config.capacity) {
        return Err(BindingError::invalid(
            OP,
            format!(
                "capacity {} outside 1..={MAX_PARTICLES_PER_SOURCE}",
                config.capacity
            ),
        ));
    }
    if !(config.geometry.is_finite() && config.geometry >= 0.0) {
        return Err(BindingError::invalid(OP, "geometry must be finite and non-negative"));
    }
    if !config.color.is_finite() {
        return Err(BindingError::invalid(OP, "color must be finite"));
    }

    let factors = [
        ("size", config.size),
        ("interval", config.interval),
        ("lifetime", config.lifetime),
        ("velocity_x", config.velocity_x),
        ("velocity_y", config.velocity_y),
    ];
    for (name, factor) in factors {
        if !factor.is_finite() {
            return Err(BindingError::invalid(OP, format!("{name} factor must be finite")));
        }
    }
    if config.interval.min() < 0.0 {
        return Err(BindingError::invalid(OP, "interval must be non-negative"));
    }

    Ok(())
}

use glam::Vec2;
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::render::{GraphicsBackend, Renderer};

use super::ParticleSource;

/// Origin point, simulation clock and the sources it drives.
///
/// Sources are owned exclusively and dropped with the system. Moving the
/// origin only affects particles spawned afterwards.
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    origin: Vec2,
    clock: f32,
    sources: Vec<ParticleSource>,
    rng: SmallRng,
}

impl ParticleSystem {
    /// Creates a system sampling from an OS-seeded generator.
    pub fn new(sources: impl IntoIterator<Item = ParticleSource>) -> Self {
        Self::with_rng(sources, SmallRng::from_os_rng())
    }

    /// Creates a system with deterministic sampling.
    pub fn with_seed(sources: impl IntoIterator<Item = ParticleSource>, seed: u64) -> Self {
        Self::with_rng(sources, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(sources: impl IntoIterator<Item = ParticleSource>, rng: SmallRng) -> Self {
        let sources: Vec<ParticleSource> = sources.into_iter().collect();
        log::debug!("particle system created with {} sources", sources.len());
        Self {
            origin: Vec2::ZERO,
            clock: 0.0,
            sources,
            rng,
        }
    }

    #[inline]
    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn set_origin(&mut self, x: f32, y: f32) {
        self.origin = Vec2::new(x, y);
    }

    /// Simulation time in seconds. Only ever moves forward.
    #[inline]
    pub fn clock(&self) -> f32 {
        self.clock
    }

    #[inline]
    pub fn sources(&self) -> &[ParticleSource] {
        &self.sources
    }

    /// Advances the simulation by `dt` seconds.
    ///
    /// Each source spawns at most one particle per call, then every occupied
    /// slot loses `dt` of lifetime and, if still alive, moves by
    /// `velocity * dt`. A zero, negative or non-finite `dt` leaves the system
    /// untouched.
    pub fn update(&mut self, dt: f32) {
        if !(dt > 0.0 && dt.is_finite()) {
            return;
        }

        self.clock += dt;
        for source in &mut self.sources {
            source.step(self.clock, self.origin, dt, &mut self.rng);
        }
    }

    /// Fills one square per living particle, sources in order, oldest first.
    pub fn render<B: GraphicsBackend>(&self, renderer: &mut Renderer<B>) {
        for source in &self.sources {
            for particle in source.iter().filter(|p| p.is_alive()) {
                renderer.draw_rect_fill(
                    particle.position.x,
                    particle.position.y,
                    particle.size,
                    particle.size,
                    particle.color,
                );
            }
        }
    }
}

//! Particle simulation.
//!
//! A [`ParticleSystem`] owns an origin, a clock and a list of
//! [`ParticleSource`]s. Each source spawns into a fixed-capacity ring of
//! [`Particle`]s; dead particles keep their slot until a later spawn reuses it.

mod factor;
mod pool;
mod source;
mod system;

use glam::Vec2;

use crate::paint::Color;

pub use factor::ParticleFactor;
pub use pool::ParticlePool;
pub use source::{ParticleSource, ParticleSourceConfig};
pub use system::ParticleSystem;

/// One simulated square sprite.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Particle {
    pub size: f32,
    /// Top-left corner, in pixels.
    pub position: Vec2,
    /// Pixels per second.
    pub velocity: Vec2,
    /// Seconds of life left; `<= 0` means dead.
    pub time_left: f32,
    pub color: Color,
}

impl Particle {
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.time_left > 0.0
    }
}

use glam::Vec2;
use rand::Rng;

use crate::paint::Color;

use super::{Particle, ParticleFactor, ParticlePool};

/// Fixed configuration of a particle source.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ParticleSourceConfig {
    /// Ring capacity; fixed for the lifetime of the source.
    pub capacity: usize,
    /// Spawn offsets from the system origin are drawn from `[0, geometry]`
    /// on each axis.
    pub geometry: f32,
    pub color: Color,
    pub size: ParticleFactor,
    /// Seconds between two spawns.
    pub interval: ParticleFactor,
    /// Seconds a particle stays alive.
    pub lifetime: ParticleFactor,
    pub velocity_x: ParticleFactor,
    pub velocity_y: ParticleFactor,
}

/// Spawner owning a ring of particles.
#[derive(Debug, Clone)]
pub struct ParticleSource {
    config: ParticleSourceConfig,
    next_spawn_time: f32,
    pool: ParticlePool,
}

impl ParticleSource {
    pub fn new(config: ParticleSourceConfig) -> Self {
        Self {
            pool: ParticlePool::new(config.capacity),
            next_spawn_time: 0.0,
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &ParticleSourceConfig {
        &self.config
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Occupied slots, including particles whose lifetime ran out.
    #[inline]
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Particles with remaining lifetime.
    pub fn active_count(&self) -> usize {
        self.pool.iter().filter(|p| p.is_alive()).count()
    }

    /// System time at or after which the next particle spawns.
    #[inline]
    pub fn next_spawn_time(&self) -> f32 {
        self.next_spawn_time
    }

    /// Occupied slots, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Particle> + '_ {
        self.pool.iter()
    }

    /// Spawns when due, then ages and moves every occupied slot by `dt`.
    pub(crate) fn step<R: Rng + ?Sized>(&mut self, clock: f32, origin: Vec2, dt: f32, rng: &mut R) {
        if clock >= self.next_spawn_time {
            self.spawn(clock, origin, rng);
        }

        for particle in self.pool.iter_mut() {
            particle.time_left -= dt;
            if particle.is_alive() {
                particle.position += particle.velocity * dt;
            }
        }
    }

    fn spawn<R: Rng + ?Sized>(&mut self, clock: f32, origin: Vec2, rng: &mut R) {
        let config = &self.config;
        let spread = ParticleFactor::new(0.0, config.geometry);

        if let Some(particle) = self.pool.allocate() {
            let offset = Vec2::new(spread.sample(rng), spread.sample(rng));
            let velocity = Vec2::new(config.velocity_x.sample(rng), config.velocity_y.sample(rng));

            *particle = Particle {
                position: origin + offset,
                velocity,
                size: config.size.sample(rng),
                color: config.color,
                time_left: config.lifetime.sample(rng),
            };
        }

        self.next_spawn_time = clock + config.interval.sample(rng);
    }
}

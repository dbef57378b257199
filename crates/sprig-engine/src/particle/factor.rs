use rand::Rng;

/// Closed range `[min, max]` sampled once per spawned particle.
///
/// A single value is stored as `min == max` and always samples to exactly
/// that value.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ParticleFactor {
    min: f32,
    max: f32,
}

impl ParticleFactor {
    /// Builds a range. Bounds given in reverse order are swapped.
    pub fn new(min: f32, max: f32) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    #[inline]
    pub const fn fixed(value: f32) -> Self {
        Self { min: value, max: value }
    }

    #[inline]
    pub fn min(&self) -> f32 {
        self.min
    }

    #[inline]
    pub fn max(&self) -> f32 {
        self.max
    }

    #[inline]
    pub fn is_fixed(&self) -> bool {
        self.min == self.max
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// Draws `min + (max - min) * u` with `u` uniform in `[0, 1]`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        if self.is_fixed() {
            return self.min;
        }
        let u: f32 = rng.random_range(0.0..=1.0);
        // Rounding can push the result one ulp past `max`.
        (self.min + (self.max - self.min) * u).clamp(self.min, self.max)
    }
}

impl From<f32> for ParticleFactor {
    fn from(value: f32) -> Self {
        Self::fixed(value)
    }
}

impl From<(f32, f32)> for ParticleFactor {
    fn from((min, max): (f32, f32)) -> Self {
        Self::new(min, max)
    }
}

impl From<[f32; 2]> for ParticleFactor {
    fn from([min, max]: [f32; 2]) -> Self {
        Self::new(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn fixed_factor_samples_exact_value() {
        let mut rng = SmallRng::seed_from_u64(7);
        let f = ParticleFactor::from(0.1f32);
        for _ in 0..1000 {
            assert_eq!(f.sample(&mut rng), 0.1);
        }
    }

    #[test]
    fn range_samples_stay_within_bounds() {
        let mut rng = SmallRng::seed_from_u64(11);
        let f = ParticleFactor::from((0.1f32, 0.3f32));
        for _ in 0..10_000 {
            let v = f.sample(&mut rng);
            assert!((0.1..=0.3).contains(&v), "{v} out of range");
        }
    }

    #[test]
    fn range_samples_are_not_constant() {
        let mut rng = SmallRng::seed_from_u64(3);
        let f = ParticleFactor::new(-50.0, 50.0);
        let first = f.sample(&mut rng);
        assert!((0..100).any(|_| f.sample(&mut rng) != first));
    }

    #[test]
    fn reversed_bounds_are_normalized() {
        let f = ParticleFactor::from([5.0, -5.0]);
        assert_eq!((f.min(), f.max()), (-5.0, 5.0));
    }
}

use std::time::{Duration, Instant};

/// One tick of a [`FrameClock`].
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Clamped seconds since the previous tick; feed this to simulations.
    pub dt: f32,
    /// Sum of every `dt` handed out so far, including this one.
    pub elapsed: f64,
    pub now: Instant,
    pub frame_index: u64,
}

/// Produces per-frame deltas for the render loop.
///
/// Deltas are clamped so a debugger pause or a minimized window does not
/// push a particle system seconds ahead in one step.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    elapsed: f64,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    pub const DEFAULT_MIN_DT: Duration = Duration::from_micros(100);
    pub const DEFAULT_MAX_DT: Duration = Duration::from_millis(100);

    pub fn new() -> Self {
        Self::with_clamps(Self::DEFAULT_MIN_DT, Self::DEFAULT_MAX_DT)
    }

    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        Self {
            last: Instant::now(),
            elapsed: 0.0,
            frame_index: 0,
            dt_min,
            dt_max,
        }
    }

    /// Restarts delta measurement from now, e.g. after the window was restored.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    pub fn tick(&mut self) -> FrameTime {
        self.advance_to(Instant::now())
    }

    fn advance_to(&mut self, now: Instant) -> FrameTime {
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max)
            .as_secs_f32();

        self.last = now;
        self.elapsed += dt as f64;

        let time = FrameTime {
            dt,
            elapsed: self.elapsed,
            now,
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        time
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock() -> (FrameClock, Instant) {
        let clock = FrameClock::with_clamps(Duration::from_millis(1), Duration::from_millis(50));
        let start = clock.last;
        (clock, start)
    }

    #[test]
    fn delta_is_time_since_last_tick() {
        let (mut c, start) = clock();
        let t = c.advance_to(start + Duration::from_millis(16));
        assert!((t.dt - 0.016).abs() < 1e-6);
        assert_eq!(t.frame_index, 0);
    }

    #[test]
    fn long_stall_is_clamped() {
        let (mut c, start) = clock();
        let t = c.advance_to(start + Duration::from_secs(3));
        assert!((t.dt - 0.05).abs() < 1e-6);
    }

    #[test]
    fn zero_delta_is_raised_to_minimum() {
        let (mut c, start) = clock();
        let t = c.advance_to(start);
        assert!(t.dt > 0.0);
    }

    #[test]
    fn elapsed_sums_clamped_deltas() {
        let (mut c, start) = clock();
        c.advance_to(start + Duration::from_millis(10));
        let t = c.advance_to(start + Duration::from_secs(10));
        assert!((t.elapsed - 0.06).abs() < 1e-6);
        assert_eq!(t.frame_index, 1);
    }
}

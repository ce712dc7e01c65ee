//! Delay generation for human-like pacing.
//!
//! Humans do not act on fixed intervals. Delays here are drawn from a
//! normal distribution (Box-Muller) around a configured range, so repeated
//! actions cluster around a mean with natural spread instead of landing on
//! the same millisecond every time.

use rand::Rng;
use std::f64::consts::PI;
use std::time::Duration;

/// A bounded delay range in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayRange {
    /// Minimum delay in milliseconds.
    pub min_ms: u64,
    /// Maximum delay in milliseconds.
    pub max_ms: u64,
}

impl DelayRange {
    /// Creates a new range. If `max_ms` < `min_ms` it is raised to `min_ms`.
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms,
            max_ms: max_ms.max(min_ms),
        }
    }

    /// Range used between high-level page actions.
    pub fn action() -> Self {
        Self::new(400, 1200)
    }

    /// Range used between individual keystrokes.
    pub fn keystroke() -> Self {
        Self::new(30, 200)
    }

    /// Samples a delay from this range.
    ///
    /// Values are drawn from a normal distribution centered on the range
    /// midpoint and clamped to the bounds, so most samples fall near the
    /// middle with occasional fast and slow outliers.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Duration {
        if self.min_ms == self.max_ms {
            return Duration::from_millis(self.min_ms);
        }

        let mean = (self.min_ms + self.max_ms) as f64 / 2.0;
        // ~99.7% of samples inside the range before clamping
        let std_dev = (self.max_ms - self.min_ms) as f64 / 6.0;

        let sampled = mean + gaussian(rng) * std_dev;
        let clamped = sampled.clamp(self.min_ms as f64, self.max_ms as f64);
        Duration::from_millis(clamped as u64)
    }
}

/// Standard normal sample via the Box-Muller transform.
fn gaussian<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Returns true with the given probability.
pub fn chance<R: Rng>(rng: &mut R, probability: f64) -> bool {
    rng.gen::<f64>() < probability
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sample_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let range = DelayRange::new(100, 500);
        for _ in 0..500 {
            let d = range.sample(&mut rng);
            assert!(d.as_millis() >= 100);
            assert!(d.as_millis() <= 500);
        }
    }

    #[test]
    fn test_sample_degenerate_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let range = DelayRange::new(250, 250);
        assert_eq!(range.sample(&mut rng), Duration::from_millis(250));
    }

    #[test]
    fn test_inverted_range_is_normalized() {
        let range = DelayRange::new(500, 100);
        assert_eq!(range.min_ms, 500);
        assert_eq!(range.max_ms, 500);
    }

    #[test]
    fn test_samples_vary() {
        let mut rng = StdRng::seed_from_u64(42);
        let range = DelayRange::new(30, 200);
        let first = range.sample(&mut rng);
        let mut saw_different = false;
        for _ in 0..50 {
            if range.sample(&mut rng) != first {
                saw_different = true;
                break;
            }
        }
        assert!(saw_different);
    }

    #[test]
    fn test_chance_extremes() {
        let mut rng = StdRng::seed_from_u64(9);
        assert!(!chance(&mut rng, 0.0));
        assert!(chance(&mut rng, 1.0));
    }
}

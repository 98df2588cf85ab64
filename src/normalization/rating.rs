use anyhow::{bail, Result};
use rand::Rng;

use crate::util::env::env_parse;

/// Closed display range for the placeholder star rating shown on catalog
/// cards. The value is decorative: it is drawn at random per entry and says
/// nothing about the work, so tests only ever check range and precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingRange {
    min: f32,
    max: f32,
}

impl Default for RatingRange {
    fn default() -> Self {
        Self { min: 4.2, max: 5.0 }
    }
}

impl RatingRange {
    /// Validate bounds. At least one one-decimal value must fit inside.
    pub fn new(min: f32, max: f32) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() {
            bail!("rating bounds must be finite (got {min}..={max})");
        }
        if min > max {
            bail!("rating min {min} is above max {max}");
        }
        let range = Self { min, max };
        let (lo, hi) = range.tenths();
        if lo > hi {
            bail!("rating range {min}..={max} holds no one-decimal value");
        }
        Ok(range)
    }

    /// `CATALOG_RATING_MIN` / `CATALOG_RATING_MAX` override either bound;
    /// the result is validated like `new`.
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        Self::new(
            env_parse("CATALOG_RATING_MIN", d.min),
            env_parse("CATALOG_RATING_MAX", d.max),
        )
    }

    // Bounds expressed in tenths, rounded inward so every sample stays in range.
    fn tenths(&self) -> (i32, i32) {
        let lo = (self.min * 10.0 - 1e-4).ceil() as i32;
        let hi = (self.max * 10.0 + 1e-4).floor() as i32;
        (lo, hi)
    }

    /// Draw a rating uniformly over the one-decimal values in range.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        let (lo, hi) = self.tenths();
        if lo >= hi {
            return lo as f32 / 10.0;
        }
        rng.gen_range(lo..=hi) as f32 / 10.0
    }

    #[cfg(test)]
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min - 1e-4 && value <= self.max + 1e-4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn one_decimal(value: f32) -> bool {
        ((value * 10.0).round() - value * 10.0).abs() < 1e-3
    }

    #[test]
    fn samples_stay_in_range_with_one_decimal() {
        let range = RatingRange::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let r = range.sample(&mut rng);
            assert!(range.contains(r), "{r} out of range");
            assert!(one_decimal(r), "{r} has more than one decimal");
        }
    }

    #[test]
    fn inward_rounding_respects_odd_bounds() {
        let range = RatingRange::new(4.25, 4.38).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let r = range.sample(&mut rng);
            assert!((r - 4.3).abs() < 1e-4);
        }
    }

    #[test]
    fn rejects_invalid_bounds() {
        assert!(RatingRange::new(5.0, 4.0).is_err());
        assert!(RatingRange::new(4.21, 4.29).is_err());
        assert!(RatingRange::new(f32::NAN, 5.0).is_err());
    }

    #[test]
    fn degenerate_range_is_constant() {
        let range = RatingRange::new(4.5, 4.5).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        assert!((range.sample(&mut rng) - 4.5).abs() < 1e-4);
    }

    #[test]
    fn env_bounds_are_validated() {
        std::env::set_var("CATALOG_RATING_MIN", "3.5");
        std::env::set_var("CATALOG_RATING_MAX", "4.0");
        let range = RatingRange::from_env().unwrap();
        std::env::set_var("CATALOG_RATING_MAX", "3.0");
        let inverted = RatingRange::from_env();
        std::env::remove_var("CATALOG_RATING_MIN");
        std::env::remove_var("CATALOG_RATING_MAX");

        assert_eq!(range, RatingRange::new(3.5, 4.0).unwrap());
        assert!(inverted.is_err());
    }
}

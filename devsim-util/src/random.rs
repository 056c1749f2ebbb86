//! Seedable random-draw factories.
//!
//! Each factory takes an explicit seed and returns a closure producing one
//! draw per call. Two closures built with the same seed and parameters yield
//! the same sequence, so simulations using them are reproducible.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Exp, Poisson, Uniform};

/// Draws uniformly distributed reals from the half-open range `[low, high)`.
///
/// # Panics
///
/// Panics if the range is empty.
pub fn uniform(seed: u64, low: f64, high: f64) -> impl FnMut() -> f64 {
    assert!(low < high, "the range [{}, {}) is empty", low, high);

    let mut rng = StdRng::seed_from_u64(seed);
    let dist = Uniform::new(low, high);

    move || dist.sample(&mut rng)
}

/// Draws uniformly distributed integers from the closed range `[low, high]`.
///
/// # Panics
///
/// Panics if `low > high`.
pub fn uniform_int(seed: u64, low: i64, high: i64) -> impl FnMut() -> i64 {
    assert!(low <= high, "the range [{}, {}] is empty", low, high);

    let mut rng = StdRng::seed_from_u64(seed);
    let dist = Uniform::new_inclusive(low, high);

    move || dist.sample(&mut rng)
}

/// Draws Poisson-distributed counts with the specified mean.
///
/// # Panics
///
/// Panics if the mean is not finite and positive.
pub fn poisson(seed: u64, mean: f64) -> impl FnMut() -> u64 {
    assert!(
        mean.is_finite() && mean > 0.0,
        "the Poisson mean must be finite and positive, got {}",
        mean
    );

    let mut rng = StdRng::seed_from_u64(seed);
    let dist = Poisson::new(mean).expect("the mean was checked to be finite and positive");

    move || dist.sample(&mut rng) as u64
}

/// Draws exponentially distributed delays with the specified rate.
///
/// The mean of the draws is `1 / rate`, making this the natural inter-event
/// delay of a Poisson process with `rate` events per time unit.
///
/// # Panics
///
/// Panics if the rate is not finite and positive.
pub fn exponential(seed: u64, rate: f64) -> impl FnMut() -> f64 {
    assert!(
        rate.is_finite() && rate > 0.0,
        "the exponential rate must be finite and positive, got {}",
        rate
    );

    let mut rng = StdRng::seed_from_u64(seed);
    let dist = Exp::new(rate).expect("the rate was checked to be finite and positive");

    move || dist.sample(&mut rng)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_seeds_yield_equal_sequences() {
        let mut a = uniform(42, 0.0, 1.0);
        let mut b = uniform(42, 0.0, 1.0);

        for _ in 0..100 {
            assert_eq!(a(), b());
        }
    }

    #[test]
    fn uniform_draws_stay_in_range() {
        let mut draw = uniform(7, 2.0, 3.0);

        for _ in 0..1000 {
            let x = draw();
            assert!((2.0..3.0).contains(&x));
        }
    }

    #[test]
    fn uniform_int_bounds_are_inclusive() {
        let mut draw = uniform_int(7, 0, 5);
        let mut seen = [false; 6];

        for _ in 0..1000 {
            let x = draw();
            assert!((0..=5).contains(&x));
            seen[x as usize] = true;
        }

        assert!(seen.iter().all(|&hit| hit));
    }

    #[test]
    fn exponential_mean_matches_the_rate() {
        const DRAWS: usize = 100_000;
        const RATE: f64 = 2.0;

        let mut draw = exponential(12345, RATE);
        let mean = (0..DRAWS).map(|_| draw()).sum::<f64>() / DRAWS as f64;

        // The sample mean of an Exp(2) must be close to 0.5; the tolerance is
        // ~6 standard errors of the mean.
        assert!((mean - 1.0 / RATE).abs() < 0.01, "sample mean = {}", mean);
    }

    #[test]
    fn poisson_mean_matches_the_parameter() {
        const DRAWS: usize = 100_000;
        const MEAN: f64 = 4.0;

        let mut draw = poisson(54321, MEAN);
        let mean = (0..DRAWS).map(|_| draw()).sum::<u64>() as f64 / DRAWS as f64;

        assert!((mean - MEAN).abs() < 0.05, "sample mean = {}", mean);
    }
}

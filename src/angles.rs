//! Circular-angle arithmetic used by the ground-truth extractor and the
//! metrics engine. All angles are in radians.
//!
//! The wrapping conventions here are the ones the benchmark's reference
//! tooling uses: `wrap_to_2pi` keeps exact positive full revolutions at 2π
//! instead of folding them back to 0, so a trajectory that completes a full
//! turn stays distinguishable from one that never left the origin.

use std::f64::consts::PI;

const TWO_PI: f64 = 2.0 * PI;

/// Wraps a single angle into [0, 2π).
///
/// Edge case: inputs that are exact positive multiples of 2π map to 2π,
/// not 0. Negative and zero inputs never produce 2π.
pub fn wrap_to_2pi(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TWO_PI);
    if wrapped == 0.0 && angle > 0.0 {
        TWO_PI
    } else {
        wrapped
    }
}

/// Wraps a single angle into [-π, π].
///
/// Values already in [-π, π] are returned untouched, so both boundary
/// values survive: `wrap_to_pi(PI) == PI` and `wrap_to_pi(-PI) == -PI`.
/// Out-of-range values are congruent to the input modulo 2π.
pub fn wrap_to_pi(angle: f64) -> f64 {
    if (-PI..=PI).contains(&angle) {
        angle
    } else {
        wrap_to_2pi(angle + PI) - PI
    }
}

/// Element-wise [wrap_to_2pi] over a slice.
pub fn wrap_slice_to_2pi(angles: &[f64]) -> Vec<f64> {
    angles.iter().copied().map(wrap_to_2pi).collect()
}

/// Element-wise [wrap_to_pi] over a slice.
pub fn wrap_slice_to_pi(angles: &[f64]) -> Vec<f64> {
    angles.iter().copied().map(wrap_to_pi).collect()
}

/// The shortest angular distance between two angles, measured along the
/// circle. Always in [0, π]: identical angles give 0, antipodal angles
/// give π, and a 350° vs 10° pair gives 20°, not 340°.
pub fn circular_error(estimate: f64, truth: f64) -> f64 {
    let diff = wrap_to_pi(estimate - truth).abs();
    diff.min(TWO_PI - diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::distributions::{Distribution, Uniform};

    const TOL: f64 = 1e-12;

    #[test]
    fn wrap_to_2pi_range() {
        let rng = rand::thread_rng();
        let dist = Uniform::new(-100.0, 100.0);
        for a in dist.sample_iter(rng).take(10000) {
            let w = wrap_to_2pi(a);
            assert!((0.0..=TWO_PI).contains(&w), "{} wrapped to {}", a, w);
        }
    }

    #[test]
    fn wrap_to_2pi_positive_revolutions_stay_at_2pi() {
        assert_eq!(wrap_to_2pi(TWO_PI), TWO_PI);
        assert_eq!(wrap_to_2pi(2.0 * TWO_PI), TWO_PI);
        assert_eq!(wrap_to_2pi(0.0), 0.0);
        assert_eq!(wrap_to_2pi(-TWO_PI), 0.0);
    }

    #[test]
    fn wrap_to_pi_range_and_congruence() {
        let rng = rand::thread_rng();
        let dist = Uniform::new(-100.0, 100.0);
        for a in dist.sample_iter(rng).take(10000) {
            let w = wrap_to_pi(a);
            assert!((-PI..=PI).contains(&w), "{} wrapped to {}", a, w);
            // congruent modulo 2*pi
            let delta = (a - w).rem_euclid(TWO_PI);
            assert!(
                delta < TOL || (TWO_PI - delta) < TOL,
                "{} and {} differ by a non-multiple of 2pi",
                a,
                w
            );
        }
    }

    #[test]
    fn wrap_to_pi_idempotent() {
        let rng = rand::thread_rng();
        let dist = Uniform::new(-100.0, 100.0);
        for a in dist.sample_iter(rng).take(10000) {
            let once = wrap_to_pi(a);
            assert_eq!(wrap_to_pi(once), once);
        }
    }

    #[test]
    fn wrap_to_pi_boundary_convention() {
        // pi and -pi are both in range and stay put
        assert_eq!(wrap_to_pi(PI), PI);
        assert_eq!(wrap_to_pi(-PI), -PI);
        assert_eq!(wrap_to_pi(3.0 * PI), PI);
    }

    #[test]
    fn wrap_slice_to_pi_quarter_turns() {
        let input = [0.0, PI / 2.0, PI, 3.0 * PI / 2.0, TWO_PI];
        let expected = [0.0, PI / 2.0, PI, -PI / 2.0, 0.0];
        let wrapped = wrap_slice_to_pi(&input);
        for (w, e) in wrapped.iter().zip(expected.iter()) {
            assert!((w - e).abs() < TOL, "got {:?}", wrapped);
        }
    }

    #[test]
    fn circular_error_bounds() {
        let rng = rand::thread_rng();
        let dist = Uniform::new(-20.0, 20.0);
        let angles: Vec<f64> = dist.sample_iter(rng).take(200).collect();
        for est in &angles {
            for truth in &angles {
                let e = circular_error(*est, *truth);
                assert!((0.0..=PI).contains(&e));
            }
        }
    }

    #[test]
    fn circular_error_identical_and_antipodal() {
        assert_eq!(circular_error(1.234, 1.234), 0.0);
        assert!((circular_error(0.0, PI) - PI).abs() < TOL);
        assert!((circular_error(-PI / 2.0, PI / 2.0) - PI).abs() < TOL);
    }

    #[test]
    fn circular_error_wraps_through_zero() {
        // 10 degrees vs 350 degrees is a 20 degree error, not 340
        let est = 10.0_f64.to_radians();
        let truth = 350.0_f64.to_radians();
        let expected = 20.0_f64.to_radians();
        assert!((circular_error(est, truth) - expected).abs() < TOL);
        assert!((circular_error(truth, est) - expected).abs() < TOL);
    }
}

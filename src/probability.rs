//! Probability of eventual admission from a waiting list.

use statrs::distribution::{Binomial, DiscreteCDF};
use tracing::warn;

const RATIO_EPSILON: f64 = 1e-9;

/// Probability that the registrant at position `this` of their role is
/// eventually admitted under `ratio`.
///
/// `other` is the number of accepted registrants of the complementary role and
/// `p_other` the chance that any still undecided slot goes to that role.
pub fn waiting_probability(
    max_available: u32,
    ratio: f64,
    this: u32,
    other: u32,
    p_other: f64,
) -> f64 {
    let (this, other) = (u64::from(this), u64::from(other));
    let max_available = u64::from(max_available);

    if this + other >= max_available {
        return 0.0;
    }
    if other > 0 && this as f64 / other as f64 <= ratio {
        return 1.0;
    }

    // complementary admissions still missing before `this` is ratio-compliant;
    // exact multiples of `ratio` must not round up past themselves
    let needed = (this as f64 / ratio - RATIO_EPSILON).ceil() as u64;
    let k = needed.saturating_sub(other);
    let n = max_available - this - other;

    binomial_tail(k, n, p_other)
}

/// `P(X > k)` for `X ~ Binomial(n, p)`.
pub fn binomial_tail(k: u64, n: u64, p: f64) -> f64 {
    match Binomial::new(p, n) {
        Ok(dist) => dist.sf(k),
        Err(e) => {
            warn!(p, n, reason = %e, "invalid binomial parameters");
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn tail_pins_small_values() {
        assert_close(binomial_tail(0, 1, 0.5), 0.5);
        assert_close(binomial_tail(2, 3, 0.5), 0.125);
        assert_close(binomial_tail(1, 3, 0.5), 0.5);
        assert_close(binomial_tail(2, 4, 0.25), 0.05078125);
    }

    #[test]
    fn tail_is_zero_when_k_reaches_n() {
        assert_eq!(binomial_tail(1, 1, 0.5), 0.0);
        assert_eq!(binomial_tail(7, 3, 0.5), 0.0);
    }

    #[test]
    fn tail_with_no_trials_is_zero() {
        assert_eq!(binomial_tail(0, 0, 0.5), 0.0);
    }

    #[test]
    fn invalid_probability_yields_zero() {
        assert_eq!(binomial_tail(1, 5, 1.5), 0.0);
    }

    #[test]
    fn no_places_left() {
        assert_eq!(waiting_probability(30, 1.4, 15, 15, 0.5), 0.0);
    }

    #[test]
    fn ratio_already_satisfied() {
        assert_eq!(waiting_probability(30, 1.4, 13, 10, 0.5), 1.0);
        assert_eq!(waiting_probability(30, 1.4, 15, 14, 0.5), 1.0);
        assert_eq!(waiting_probability(30, 1.4, 0, 15, 0.5), 1.0);
        assert_eq!(waiting_probability(30, 1.4, 5, 15, 0.5), 1.0);
    }

    #[test]
    fn ratio_can_never_be_reached() {
        assert_eq!(waiting_probability(30, 1.4, 20, 5, 0.5), 0.0);
    }

    #[test]
    fn almost_no_registrations() {
        assert!(1.0 - waiting_probability(30, 1.4, 0, 0, 0.5) < 1e-4);
        assert!(1.0 - waiting_probability(30, 1.4, 2, 0, 0.5) < 1e-4);
    }

    #[test]
    fn pins_exact_values() {
        // k = ceil(6 / 1.5) - 3 = 1, n = 10 - 6 - 3 = 1
        assert_eq!(waiting_probability(10, 1.5, 6, 3, 0.5), 0.0);
        // k = 2, n = 3
        assert_close(waiting_probability(10, 1.5, 5, 2, 0.5), 0.125);
        // k = 1, n = 3
        assert_close(waiting_probability(10, 2.0, 5, 2, 0.5), 0.5);
        // k = 2, n = 4
        assert_close(waiting_probability(8, 1.0, 3, 1, 0.25), 0.05078125);
    }

    #[test]
    fn exact_multiple_of_ratio_is_not_rounded_up() {
        // 21 / 1.4 is 15 plus float noise: k = 15 - 10 = 5, n = 9
        assert_close(waiting_probability(40, 1.4, 21, 10, 0.5), 130.0 / 512.0);
    }

    #[test]
    fn plausible_estimates() {
        assert!(waiting_probability(30, 1.4, 5, 1, 0.4) > 0.95);
        assert!(waiting_probability(30, 1.4, 11, 5, 0.4) < 0.95);
    }

    #[test]
    fn decreases_as_this_role_grows() {
        let mut p = waiting_probability(30, 1.4, 0, 5, 0.4);
        for this in 1..30 {
            let next = waiting_probability(30, 1.4, this, 5, 0.4);
            assert!(next <= p, "this={this}: {next} > {p}");
            p = next;
        }
    }

    #[test]
    fn increases_as_other_role_grows() {
        let mut p = waiting_probability(30, 1.4, 10, 0, 0.4);
        for other in 1..20 {
            let next = waiting_probability(30, 1.4, 10, other, 0.4);
            assert!(next >= p, "other={other}: {next} < {p}");
            p = next;
        }
    }
}

//! Starting point for a relaxation fit by scanning `T1` on a log grid.
//!
//! The model is linear in the scale, so for every fixed `T1` candidate the best
//! scale has a closed form:
//!
//! ```text
//! b_i   = S(T1, 1; TI_i, α_i)
//! scale = Σ b_i S_i / Σ b_i²
//! ```
//!
//! The candidate with the lowest squared residual (scale clamped into the
//! bounds) seeds the nonlinear fit. Starting LM from a point already in the
//! right basin keeps it away from the floor region, where `∂S/∂T1 = 0`.

use crate::domain::{FitBounds, Observation, RelaxationParameters};
use crate::models::signal;

/// Number of `T1` candidates.
pub const GUESS_GRID_STEPS: usize = 96;

/// Lower end of the grid relative to its upper end, used when the lower bound
/// is smaller (typically 0).
pub const GUESS_GRID_SPAN: f64 = 1e-4;

/// Upper end of the grid relative to the longest timing when `T1` is unbounded above.
const UNBOUNDED_REACH: f64 = 10.0;

/// `steps` log-spaced points between `min` and `max` (inclusive).
///
/// `None` unless `0 < min < max`, both finite, and `steps >= 2`.
pub fn log_space(min: f64, max: f64, steps: usize) -> Option<Vec<f64>> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > min) || steps < 2 {
        return None;
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    // Keep the endpoints exact so the grid never leaves the bounds.
    out[0] = min;
    out[steps - 1] = max;
    Some(out)
}

/// Grid-search starting point for `fit_relaxation`.
///
/// Non-finite observations are ignored. With nothing to scan (no usable
/// observation or invalid bounds) the lower bounds are returned.
pub fn estimate_initial_guess(observations: &[Observation], bounds: &FitBounds) -> RelaxationParameters {
    let fallback = RelaxationParameters::new(bounds.relaxation_time_min, bounds.scale_min);
    if !bounds.is_valid() {
        return fallback;
    }

    let usable: Vec<&Observation> = observations.iter().filter(|o| o.is_finite()).collect();
    let longest = usable.iter().map(|o| o.timing).fold(0.0, f64::max);

    let hi = if bounds.relaxation_time_max.is_finite() {
        bounds.relaxation_time_max
    } else {
        UNBOUNDED_REACH * longest
    };
    let lo = bounds.relaxation_time_min.max(hi * GUESS_GRID_SPAN);
    let candidates = log_space(lo, hi, GUESS_GRID_STEPS)
        .unwrap_or_else(|| vec![hi.max(bounds.relaxation_time_min)]);

    candidates
        .into_iter()
        .filter_map(|t1| profile_candidate(&usable, t1, bounds))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(params, _)| params)
        .unwrap_or(fallback)
}

/// Best bounded scale for a fixed `t1`, with its squared residual.
fn profile_candidate(
    observations: &[&Observation],
    t1: f64,
    bounds: &FitBounds,
) -> Option<(RelaxationParameters, f64)> {
    let (bb, bs) = observations.iter().fold((0.0, 0.0), |(bb, bs), o| {
        let b = signal(t1, 1.0, o.timing, o.flip_angle);
        (bb + b * b, bs + b * o.signal)
    });
    if !(bb > 0.0) {
        return None;
    }

    let scale = (bs / bb).clamp(bounds.scale_min, bounds.scale_max);
    let cost: f64 = observations
        .iter()
        .map(|o| {
            let r = signal(t1, scale, o.timing, o.flip_angle) - o.signal;
            r * r
        })
        .sum();
    cost.is_finite().then_some((RelaxationParameters::new(t1, scale), cost))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn exact(t1: f64, m0: f64, fa: f64) -> Vec<Observation> {
        [10.0, 40.0, 120.0, 400.0, 1200.0, 4000.0]
            .iter()
            .map(|&ti| Observation::new(signal(t1, m0, ti, fa), ti, fa))
            .collect()
    }

    #[test]
    fn log_space_includes_endpoints() {
        let v = log_space(0.5, 5000.0, 5).unwrap();
        assert_eq!(v.len(), 5);
        assert_eq!((v[0], v[4]), (0.5, 5000.0));
        assert!((v[2] - 50.0).abs() < 1e-9);
        assert!(log_space(0.0, 10.0, 5).is_none());
        assert!(log_space(1.0, 10.0, 1).is_none());
    }

    #[test]
    fn guess_lands_near_the_generating_parameters() {
        let bounds = FitBounds::default();
        for fa in [FRAC_PI_2, 0.5, PI] {
            for t1 in [50.0, 700.0, 3000.0] {
                let guess = estimate_initial_guess(&exact(t1, 2.0, fa), &bounds);
                let rel_t1 = (guess.relaxation_time - t1).abs() / t1;
                assert!(rel_t1 < 0.15, "fa={fa} t1={t1}: {guess:?}");
                assert!((guess.scale - 2.0).abs() / 2.0 < 0.1, "fa={fa} t1={t1}: {guess:?}");
            }
        }
    }

    #[test]
    fn guess_respects_bounds() {
        let bounds = FitBounds {
            relaxation_time_min: 100.0,
            relaxation_time_max: 400.0,
            scale_min: 0.0,
            scale_max: 1.5,
        };
        let guess = estimate_initial_guess(&exact(2000.0, 10.0, FRAC_PI_2), &bounds);
        assert!(bounds.contains(&guess), "{guess:?}");
        assert_eq!(guess.scale, 1.5);
    }

    #[test]
    fn unbounded_grid_reaches_past_the_longest_timing() {
        let bounds = FitBounds {
            relaxation_time_max: f64::INFINITY,
            ..FitBounds::default()
        };
        let guess = estimate_initial_guess(&exact(9000.0, 1.0, PI), &bounds);
        assert!((guess.relaxation_time - 9000.0).abs() / 9000.0 < 0.15, "{guess:?}");
    }

    #[test]
    fn nothing_usable_falls_back_to_lower_bounds() {
        let bounds = FitBounds::default();
        let guess = estimate_initial_guess(&[Observation::new(f64::NAN, 10.0, PI)], &bounds);
        assert_eq!(guess, RelaxationParameters::new(0.0, 0.0));
        assert_eq!(estimate_initial_guess(&[], &bounds), RelaxationParameters::new(0.0, 0.0));
    }
}

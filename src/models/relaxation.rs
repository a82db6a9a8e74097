//! Saturation-recovery signal model.
//!
//! ```text
//! S(T1, M0; TI, α) = M0 · (1 - (1 - cos α) · exp(-TI / T1*))
//! T1* = T1        if T1 > ε
//!     = ε         otherwise
//! ```
//!
//! `ε` is the single-precision machine epsilon. The floor only guards the
//! division; in the common branch (`T1 > ε`) derivatives flow through the
//! un-floored `T1`, and in the clamped branch `∂S/∂T1` is exactly zero because
//! `T1*` is a constant there.

use nalgebra::Vector2;

/// Floor applied to the relaxation time before dividing by it.
pub const RELAXATION_TIME_FLOOR: f64 = 1.1920929e-07;

#[inline]
fn effective_relaxation_time(relaxation_time: f64) -> Option<f64> {
    (relaxation_time > RELAXATION_TIME_FLOOR).then_some(relaxation_time)
}

/// Evaluate the forward model.
pub fn signal(relaxation_time: f64, scale: f64, timing: f64, flip_angle: f64) -> f64 {
    let t1 = effective_relaxation_time(relaxation_time).unwrap_or(RELAXATION_TIME_FLOOR);
    let k = 1.0 - flip_angle.cos();
    scale * (1.0 - k * (-timing / t1).exp())
}

/// Evaluate the model and its gradient `[∂S/∂T1, ∂S/∂M0]`.
pub fn signal_with_gradient(
    relaxation_time: f64,
    scale: f64,
    timing: f64,
    flip_angle: f64,
) -> (f64, Vector2<f64>) {
    let k = 1.0 - flip_angle.cos();
    match effective_relaxation_time(relaxation_time) {
        Some(t1) => {
            let decay = (-timing / t1).exp();
            let recovery = 1.0 - k * decay;
            // d/dT1 exp(-TI/T1) = exp(-TI/T1) · TI / T1²
            let d_t1 = -scale * k * decay * timing / (t1 * t1);
            (scale * recovery, Vector2::new(d_t1, recovery))
        }
        None => {
            let recovery = 1.0 - k * (-timing / RELAXATION_TIME_FLOOR).exp();
            (scale * recovery, Vector2::new(0.0, recovery))
        }
    }
}

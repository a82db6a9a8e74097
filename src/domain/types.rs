//! Shared domain types.
//!
//! These types are intentionally kept small, `Copy` where possible, and
//! serializable so they can be:
//!
//! - passed between the engines without ownership friction
//! - exported to JSON/CSV
//! - reloaded later by downstream tools

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of free parameters in the relaxation model (`relaxation_time`, `scale`).
pub const RELAXATION_PARAM_COUNT: usize = 2;

/// Summary of the foreground voxel intensities of one volume.
///
/// Only constructed from a non-empty foreground set, so `count > 0` always holds.
/// `variance` is the population variance (`M2 / count`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForegroundStatistics {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub variance: f64,
    pub stddev: f64,
}

/// Affine intensity map: `output = input * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearRemap {
    pub scale: f64,
    pub offset: f64,
}

impl LinearRemap {
    /// Map a single intensity.
    #[inline]
    pub fn apply(&self, value: f64) -> f64 {
        value.mul_add(self.scale, self.offset)
    }

    /// Map a single intensity and clamp it into `[low, high]`.
    #[inline]
    pub fn apply_clamped(&self, value: f64, low: f64, high: f64) -> f64 {
        self.apply(value).clamp(low, high)
    }
}

/// One measurement of a voxel: observed signal plus its acquisition covariates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Observed voxel intensity.
    pub signal: f64,
    /// Inversion/recovery time in ms.
    pub timing: f64,
    /// Flip angle in radians.
    pub flip_angle: f64,
}

impl Observation {
    pub fn new(signal: f64, timing: f64, flip_angle: f64) -> Self {
        Self {
            signal,
            timing,
            flip_angle,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.signal.is_finite() && self.timing.is_finite() && self.flip_angle.is_finite()
    }
}

/// The two unknowns of the saturation-recovery model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelaxationParameters {
    /// Relaxation time (ms).
    pub relaxation_time: f64,
    /// Signal scale factor (proton-density-like amplitude).
    pub scale: f64,
}

impl RelaxationParameters {
    pub fn new(relaxation_time: f64, scale: f64) -> Self {
        Self {
            relaxation_time,
            scale,
        }
    }
}

/// Box constraints on the free parameters.
///
/// `scale_max` may be `f64::INFINITY` (the default: unbounded above).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitBounds {
    pub relaxation_time_min: f64,
    pub relaxation_time_max: f64,
    pub scale_min: f64,
    pub scale_max: f64,
}

impl Default for FitBounds {
    fn default() -> Self {
        Self {
            relaxation_time_min: 0.0,
            relaxation_time_max: 5000.0,
            scale_min: 0.0,
            scale_max: f64::INFINITY,
        }
    }
}

impl FitBounds {
    /// Lower bounds as `[relaxation_time, scale]`.
    pub fn lower(&self) -> [f64; 2] {
        [self.relaxation_time_min, self.scale_min]
    }

    /// Upper bounds as `[relaxation_time, scale]`.
    pub fn upper(&self) -> [f64; 2] {
        [self.relaxation_time_max, self.scale_max]
    }

    /// Lower bounds must be finite and no greater than the upper bounds.
    pub fn is_valid(&self) -> bool {
        let lo = self.lower();
        let hi = self.upper();
        lo.iter().all(|v| v.is_finite())
            && hi.iter().all(|v| !v.is_nan())
            && lo[0] <= hi[0]
            && lo[1] <= hi[1]
    }

    pub fn contains(&self, params: &RelaxationParameters) -> bool {
        (self.relaxation_time_min..=self.relaxation_time_max).contains(&params.relaxation_time)
            && params.scale >= self.scale_min
            && params.scale <= self.scale_max
    }
}

/// Termination settings of the bounded least-squares solver.
///
/// Tolerances follow the usual trust-region conventions:
/// - function: relative cost decrease `|Δcost| / cost`
/// - gradient: max-norm of the projected gradient
/// - parameter: step norm relative to the parameter norm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverOptions {
    pub max_iterations: usize,
    pub function_tolerance: f64,
    pub gradient_tolerance: f64,
    pub parameter_tolerance: f64,
    /// Starting Levenberg–Marquardt damping.
    pub initial_damping: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            function_tolerance: 1e-6,
            gradient_tolerance: 1e-10,
            parameter_tolerance: 1e-8,
            initial_damping: 1e-4,
        }
    }
}

/// Why the solver stopped before the iteration cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvergenceReason {
    Function,
    Gradient,
    Parameter,
}

/// Convergence status of a fit. Hitting the cap is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStatus {
    Converged(ConvergenceReason),
    MaxIterations,
}

impl FitStatus {
    pub fn converged(self) -> bool {
        matches!(self, FitStatus::Converged(_))
    }

    /// Short label for terminal output and CSV exports.
    pub fn label(self) -> &'static str {
        match self {
            FitStatus::Converged(ConvergenceReason::Function) => "converged:function",
            FitStatus::Converged(ConvergenceReason::Gradient) => "converged:gradient",
            FitStatus::Converged(ConvergenceReason::Parameter) => "converged:parameter",
            FitStatus::MaxIterations => "max_iterations",
        }
    }
}

/// Best-effort estimate for one dataset plus solver diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelaxationFit {
    pub params: RelaxationParameters,
    pub status: FitStatus,
    pub iterations: usize,
    /// Final cost `½ Σ r_i²`.
    pub cost: f64,
}

/// Configuration for the Fit Engine.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RelaxationFitConfig {
    pub bounds: FitBounds,
    pub solver: SolverOptions,
}

/// Where the voxel class labels come from.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelSource {
    /// Run the multi-level Otsu segmenter on the volume itself.
    MultiOtsu { thresholds: usize, histogram_bins: usize },
    /// Read an externally produced label volume (label > 0 is foreground).
    File(PathBuf),
}

/// A full `vrx scale` run's configuration.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct ScaleConfig {
    pub volume_path: PathBuf,
    pub labels: LabelSource,
    pub target_low: f64,
    pub target_high: f64,
    pub parallel: bool,
    pub remap_out: Option<PathBuf>,
    pub apply_out: Option<PathBuf>,
}

/// A full `vrx fit` run's configuration.
#[derive(Debug, Clone)]
pub struct FitRunConfig {
    pub observations_path: PathBuf,
    /// Explicit starting point; `None` means estimate it per voxel.
    pub initial: Option<RelaxationParameters>,
    pub flip_angle_degrees: bool,
    pub fit: RelaxationFitConfig,
    pub export: Option<PathBuf>,
}

/// A full `vrx simulate` run's configuration.
#[derive(Debug, Clone)]
pub struct SimulateConfig {
    pub voxels: usize,
    pub seed: u64,
    pub relaxation_time_min: f64,
    pub relaxation_time_max: f64,
    pub scale_min: f64,
    pub scale_max: f64,
    pub timings: Vec<f64>,
    pub flip_angle: f64,
    pub noise_sigma: f64,
    pub out: PathBuf,
}

/// Remap artifact written by `vrx scale --remap-out`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemapFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub thresholds: Vec<f64>,
    pub statistics: ForegroundStatistics,
    pub remap: LinearRemap,
    pub target_low: f64,
    pub target_high: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bounds_match_physical_ranges() {
        let b = FitBounds::default();
        assert!(b.is_valid());
        assert_eq!(b.lower(), [0.0, 0.0]);
        assert_eq!(b.relaxation_time_max, 5000.0);
        assert!(b.scale_max.is_infinite());
    }

    #[test]
    fn inverted_bounds_are_invalid() {
        let b = FitBounds {
            relaxation_time_min: 10.0,
            relaxation_time_max: 5.0,
            ..FitBounds::default()
        };
        assert!(!b.is_valid());
    }

    #[test]
    fn remap_apply_clamps() {
        let remap = LinearRemap {
            scale: 2.0,
            offset: -1.0,
        };
        assert_eq!(remap.apply(3.0), 5.0);
        assert_eq!(remap.apply_clamped(3.0, 0.0, 4.0), 4.0);
        assert_eq!(remap.apply_clamped(-3.0, 0.0, 4.0), 0.0);
    }
}

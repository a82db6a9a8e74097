//! Affine remap from the foreground range onto a target range.

use ndarray::{Array3, ArrayView3};

use crate::domain::{ForegroundStatistics, LinearRemap};
use crate::error::ScalingError;

/// A target range must be finite and non-empty.
pub fn check_target_range(low: f64, high: f64) -> Result<(), ScalingError> {
    if !low.is_finite() || !high.is_finite() || high <= low {
        return Err(ScalingError::InvalidTargetRange { low, high });
    }
    Ok(())
}

/// Derive the map sending `[stats.min, stats.max]` onto `[target_low, target_high]`.
///
/// ```text
/// scale  = (high - low) / (max - min)
/// offset = low - min * scale
/// ```
///
/// A flat foreground (`max == min`) is a `DegenerateRange` error; the caller
/// picks the fallback.
pub fn derive_linear_remap(
    stats: &ForegroundStatistics,
    target_low: f64,
    target_high: f64,
) -> Result<LinearRemap, ScalingError> {
    check_target_range(target_low, target_high)?;

    let width = stats.max - stats.min;
    if width == 0.0 {
        return Err(ScalingError::DegenerateRange { value: stats.min });
    }

    let scale = (target_high - target_low) / width;
    let offset = target_low - stats.min * scale;
    Ok(LinearRemap { scale, offset })
}

/// Apply `remap` to every voxel, clamping into `[low, high]`.
///
/// NaN voxels stay NaN. An invalid range (for example from a hand-edited
/// remap file) is `InvalidTargetRange`.
pub fn apply_remap(
    volume: ArrayView3<'_, f32>,
    remap: &LinearRemap,
    low: f64,
    high: f64,
) -> Result<Array3<f32>, ScalingError> {
    check_target_range(low, high)?;
    Ok(volume.mapv(|v| {
        if v.is_nan() {
            return v;
        }
        remap.apply_clamped(f64::from(v), low, high) as f32
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(min: f64, max: f64) -> ForegroundStatistics {
        ForegroundStatistics {
            count: 10,
            min,
            max,
            mean: 0.5 * (min + max),
            variance: 1.0,
            stddev: 1.0,
        }
    }

    #[test]
    fn endpoints_map_onto_target_range() {
        for &(min, max, low, high) in &[
            (12.0, 1830.0, 0.0, 255.0),
            (-3.5, 7.25, 0.0, 1.0),
            (100.0, 100.5, -1.0, 1.0),
        ] {
            let s = stats(min, max);
            let remap = derive_linear_remap(&s, low, high).unwrap();
            assert!((remap.apply(min) - low).abs() < 1e-9, "{remap:?}");
            assert!((remap.apply(max) - high).abs() < 1e-9, "{remap:?}");
        }
    }

    #[test]
    fn flat_foreground_is_degenerate() {
        assert_eq!(
            derive_linear_remap(&stats(42.0, 42.0), 0.0, 255.0),
            Err(ScalingError::DegenerateRange { value: 42.0 })
        );
    }

    #[test]
    fn inverted_target_is_rejected() {
        assert!(matches!(
            derive_linear_remap(&stats(0.0, 1.0), 5.0, 5.0),
            Err(ScalingError::InvalidTargetRange { .. })
        ));
        assert!(matches!(
            derive_linear_remap(&stats(0.0, 1.0), 0.0, f64::NAN),
            Err(ScalingError::InvalidTargetRange { .. })
        ));
    }

    #[test]
    fn applied_volume_is_clamped() {
        let remap = derive_linear_remap(&stats(10.0, 20.0), 0.0, 255.0).unwrap();
        let volume = Array3::from_shape_vec((1, 1, 5), vec![0.0f32, 10.0, 15.0, 20.0, 99.0]).unwrap();
        let out = apply_remap(volume.view(), &remap, 0.0, 255.0).unwrap();
        assert_eq!(out.as_slice().unwrap(), &[0.0, 0.0, 127.5, 255.0, 255.0]);
    }

    #[test]
    fn inverted_range_on_apply_is_an_error() {
        let remap = LinearRemap {
            scale: 2.0,
            offset: 1.0,
        };
        let volume = Array3::from_elem((1, 2, 2), 3.0f32);
        assert_eq!(
            apply_remap(volume.view(), &remap, 255.0, 0.0),
            Err(ScalingError::InvalidTargetRange { low: 255.0, high: 0.0 })
        );
        assert!(apply_remap(volume.view(), &remap, 0.0, f64::INFINITY).is_err());
    }
}

//! Foreground/background classification.
//!
//! The Statistics Engine only needs a per-voxel class label where `0` is
//! background and `1..=k` are foreground classes. Anything that can produce
//! ascending class boundaries can act as a `Segmenter`; `MultiOtsu` is the
//! implementation the CLI uses when no label volume is supplied.

use ndarray::{Array3, ArrayView3};

use crate::error::ScalingError;

pub mod otsu;

pub use otsu::{MAX_HISTOGRAM_BINS, MAX_THRESHOLDS, MultiOtsu};

/// Class boundaries plus the label grid they induce.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Ascending thresholds; `k` thresholds give `k + 1` classes.
    pub thresholds: Vec<f64>,
    pub labels: Array3<u8>,
}

pub trait Segmenter {
    /// Ascending class boundaries for `volume`.
    fn thresholds(&self, volume: ArrayView3<'_, f32>) -> Vec<f64>;

    fn segment(&self, volume: ArrayView3<'_, f32>) -> Result<Segmentation, ScalingError> {
        let thresholds = self.thresholds(volume);
        let labels = label_by_thresholds(volume, &thresholds)?;
        Ok(Segmentation { thresholds, labels })
    }
}

/// Label each voxel by how many thresholds it strictly exceeds.
///
/// With a label offset of 0 the lowest class is background. Non-finite
/// voxels (NaN and both infinities) are always background.
pub fn label_by_thresholds(volume: ArrayView3<'_, f32>, thresholds: &[f64]) -> Result<Array3<u8>, ScalingError> {
    if thresholds.len() > u8::MAX as usize {
        return Err(ScalingError::TooManyClasses {
            thresholds: thresholds.len(),
        });
    }
    Ok(volume.mapv(|v| {
        if !v.is_finite() {
            return 0;
        }
        let v = f64::from(v);
        thresholds.iter().take_while(|&&t| v > t).count() as u8
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn labels_count_exceeded_thresholds() {
        let volume = Array3::from_shape_vec((1, 1, 5), vec![0.0f32, 1.0, 1.5, 2.5, f32::NAN]).unwrap();
        let labels = label_by_thresholds(volume.view(), &[1.0, 2.0]).unwrap();
        assert_eq!(labels.as_slice().unwrap(), &[0, 0, 1, 2, 0]);
    }

    #[test]
    fn infinities_are_background() {
        let volume =
            Array3::from_shape_vec((1, 1, 3), vec![f32::INFINITY, 5.0, f32::NEG_INFINITY]).unwrap();
        let labels = label_by_thresholds(volume.view(), &[1.0, 2.0]).unwrap();
        assert_eq!(labels.as_slice().unwrap(), &[0, 2, 0]);
    }

    #[test]
    fn more_thresholds_than_u8_labels_is_an_error() {
        let volume = Array3::<f32>::zeros((1, 1, 1));
        let thresholds = vec![0.0; 256];
        assert_eq!(
            label_by_thresholds(volume.view(), &thresholds),
            Err(ScalingError::TooManyClasses { thresholds: 256 })
        );
    }
}

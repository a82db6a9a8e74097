//! Multi-level Otsu thresholding.
//!
//! Builds a fixed-bin histogram over the finite voxel range and searches all
//! placements of `k` cuts for the one maximising the between-class variance.
//! With cumulative sums `W` (count) and `M` (first moment), each class
//! contributes `M_c² / W_c`, so the objective is
//!
//! ```text
//! Σ_c M_c² / W_c
//! ```
//!
//! (the constant total-mean term drops out). Each threshold is reported as the
//! upper edge of the last bin of its class.

use ndarray::ArrayView3;

use super::Segmenter;
use crate::error::ScalingError;

/// Largest accepted threshold count. The cut search visits C(bins - 1, k)
/// placements, so this together with `MAX_HISTOGRAM_BINS` bounds its cost
/// (about 1.7e8 leaves at the limits).
pub const MAX_THRESHOLDS: usize = 4;

/// Largest accepted histogram size.
pub const MAX_HISTOGRAM_BINS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiOtsu {
    thresholds: usize,
    bins: usize,
}

impl Default for MultiOtsu {
    /// Two thresholds (three classes) over 128 bins.
    fn default() -> Self {
        Self {
            thresholds: 2,
            bins: 128,
        }
    }
}

impl MultiOtsu {
    /// Requires `1 <= thresholds <= MAX_THRESHOLDS` and
    /// `thresholds < bins <= MAX_HISTOGRAM_BINS`.
    pub fn new(thresholds: usize, bins: usize) -> Result<Self, ScalingError> {
        if !(1..=MAX_THRESHOLDS).contains(&thresholds) || bins <= thresholds || bins > MAX_HISTOGRAM_BINS {
            return Err(ScalingError::InvalidSegmentation { thresholds, bins });
        }
        Ok(Self { thresholds, bins })
    }

    pub fn threshold_count(&self) -> usize {
        self.thresholds
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Thresholds for an arbitrary sample set.
    pub fn thresholds_for(&self, values: impl Iterator<Item = f64> + Clone) -> Vec<f64> {
        let (min, max) = values
            .clone()
            .filter(|v| v.is_finite())
            .fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));

        // Empty or flat input: every voxel ends up at or below the thresholds.
        if min > max || max - min <= f64::EPSILON * max.abs().max(1.0) {
            let level = if min > max { 0.0 } else { max };
            return vec![level; self.thresholds];
        }

        let width = (max - min) / self.bins as f64;
        let mut histogram = vec![0.0f64; self.bins];
        for v in values.filter(|v| v.is_finite()) {
            let bin = (((v - min) / width).floor() as usize).min(self.bins - 1);
            histogram[bin] += 1.0;
        }

        // Prefix sums over [0, i).
        let mut weight = vec![0.0f64; self.bins + 1];
        let mut moment = vec![0.0f64; self.bins + 1];
        for (i, &count) in histogram.iter().enumerate() {
            weight[i + 1] = weight[i] + count;
            moment[i + 1] = moment[i] + count * i as f64;
        }

        let search = CutSearch {
            weight: &weight,
            moment: &moment,
            bins: self.bins,
        };
        let cuts = search.best_cuts(self.thresholds);

        cuts.into_iter().map(|c| min + c as f64 * width).collect()
    }
}

impl Segmenter for MultiOtsu {
    fn thresholds(&self, volume: ArrayView3<'_, f32>) -> Vec<f64> {
        let thresholds = self.thresholds_for(volume.iter().map(|&v| f64::from(v)));
        tracing::debug!(?thresholds, bins = self.bins, "multi-level otsu thresholds");
        thresholds
    }
}

struct CutSearch<'a> {
    weight: &'a [f64],
    moment: &'a [f64],
    bins: usize,
}

impl CutSearch<'_> {
    /// Score of the class covering bins `[lo, hi)`.
    fn class_score(&self, lo: usize, hi: usize) -> f64 {
        let w = self.weight[hi] - self.weight[lo];
        if w <= 0.0 {
            return 0.0;
        }
        let m = self.moment[hi] - self.moment[lo];
        m * m / w
    }

    /// Exclusive bin boundaries of the `k` cuts with the highest score.
    fn best_cuts(&self, k: usize) -> Vec<usize> {
        let mut cuts = Vec::with_capacity(k);
        let mut best = (f64::NEG_INFINITY, Vec::new());
        self.descend(0, k, 0.0, &mut cuts, &mut best);
        best.1
    }

    fn descend(
        &self,
        lo: usize,
        remaining: usize,
        acc: f64,
        cuts: &mut Vec<usize>,
        best: &mut (f64, Vec<usize>),
    ) {
        if remaining == 0 {
            let total = acc + self.class_score(lo, self.bins);
            if total > best.0 {
                *best = (total, cuts.clone());
            }
            return;
        }
        // Leave at least one bin for every class still to be placed.
        for hi in (lo + 1)..=(self.bins - remaining) {
            cuts.push(hi);
            self.descend(hi, remaining - 1, acc + self.class_score(lo, hi), cuts, best);
            cuts.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::label_by_thresholds;
    use ndarray::Array3;

    fn trimodal() -> Vec<f64> {
        let mut data = Vec::new();
        for i in 0..200 {
            data.push(0.0 + 5.0 * (i as f64 / 200.0)); // background around 0..5
        }
        for i in 0..150 {
            data.push(100.0 + 10.0 * (i as f64 / 150.0));
        }
        for i in 0..150 {
            data.push(200.0 + 10.0 * (i as f64 / 150.0));
        }
        data
    }

    #[test]
    fn separates_three_clusters() {
        let otsu = MultiOtsu::default();
        let t = otsu.thresholds_for(trimodal().into_iter());
        assert_eq!(t.len(), 2);
        assert!(t[0] > 5.0 && t[0] < 100.0, "{t:?}");
        assert!(t[1] > 110.0 && t[1] < 200.0, "{t:?}");
    }

    #[test]
    fn single_threshold_splits_bimodal_data() {
        let mut data = Vec::new();
        for i in 0..100 {
            data.push(0.1 + 0.2 * (i as f64 / 100.0));
        }
        for i in 0..100 {
            data.push(0.7 + 0.2 * (i as f64 / 100.0));
        }
        let t = MultiOtsu::new(1, 256).unwrap().thresholds_for(data.into_iter());
        assert!(t[0] > 0.25 && t[0] < 0.7, "{t:?}");
    }

    #[test]
    fn flat_volume_has_no_foreground() {
        let volume = Array3::from_elem((2, 2, 2), 7.0f32);
        let seg = MultiOtsu::default().segment(volume.view()).unwrap();
        assert!(seg.labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn labels_follow_clusters() {
        let data: Vec<f32> = trimodal().into_iter().map(|v| v as f32).collect();
        let volume = Array3::from_shape_vec((5, 10, 10), data).unwrap();
        let seg = MultiOtsu::default().segment(volume.view()).unwrap();
        let labels = label_by_thresholds(volume.view(), &seg.thresholds).unwrap();
        assert_eq!(labels, seg.labels);
        assert_eq!(seg.labels.iter().filter(|&&l| l == 0).count(), 200);
        assert_eq!(seg.labels.iter().filter(|&&l| l == 2).count(), 150);
    }

    #[test]
    fn infinite_voxel_stays_background() {
        let mut volume = Array3::from_elem((4, 4, 4), 1.0f32);
        for (i, v) in volume.iter_mut().enumerate() {
            if i % 2 == 0 {
                *v = 100.0;
            }
        }
        volume[(0, 0, 1)] = f32::INFINITY;
        let seg = MultiOtsu::default().segment(volume.view()).unwrap();
        assert!(seg.thresholds.iter().all(|t| t.is_finite()));
        assert_eq!(seg.labels[(0, 0, 1)], 0);
        assert_eq!(seg.labels[(0, 0, 0)], 2);
    }

    #[test]
    fn out_of_range_configurations_are_rejected() {
        assert!(MultiOtsu::new(MAX_THRESHOLDS, 128).is_ok());
        for (k, bins) in [(0, 128), (MAX_THRESHOLDS + 1, 128), (256, 128), (3, 3), (2, MAX_HISTOGRAM_BINS + 1)] {
            assert_eq!(
                MultiOtsu::new(k, bins),
                Err(ScalingError::InvalidSegmentation { thresholds: k, bins })
            );
        }
    }
}

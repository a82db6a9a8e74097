//! Online mean/variance accumulation (Welford).
//!
//! We stream over potentially hundreds of millions of voxels, so the naive
//! `Σx² / n - mean²` form is off the table: it cancels catastrophically when the
//! mean is large relative to the spread. Instead we keep:
//!
//! ```text
//! count, mean, M2 = Σ (x_i - mean)²
//! ```
//!
//! and update them per sample. Partial accumulators over disjoint partitions are
//! combined with the parallel merge (Chan et al.):
//!
//! ```text
//! δ     = B.mean - A.mean
//! n     = A.n + B.n
//! mean  = A.mean + δ * B.n / n
//! M2    = A.M2 + B.M2 + δ² * A.n * B.n / n
//! ```

use crate::domain::ForegroundStatistics;
use crate::error::ScalingError;

/// Running `(count, mean, M2, min, max)` aggregate.
///
/// `non_finite` counts samples rejected by `push_finite`; they never touch the
/// moments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
    non_finite: u64,
}

impl Default for RunningStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunningStats {
    pub fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::MAX,
            max: f64::MIN,
            non_finite: 0,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Samples skipped by `push_finite`.
    pub fn non_finite(&self) -> u64 {
        self.non_finite
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Add one sample.
    #[inline]
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        if x < self.min {
            self.min = x;
        }
        if x > self.max {
            self.max = x;
        }
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }

    /// Add one sample if it is finite; otherwise only count it.
    #[inline]
    pub fn push_finite(&mut self, x: f64) {
        if x.is_finite() {
            self.push(x);
        } else {
            self.non_finite += 1;
        }
    }

    /// Combine two disjoint partial aggregates.
    pub fn merge(self, other: Self) -> Self {
        let non_finite = self.non_finite + other.non_finite;
        if self.count == 0 {
            return Self { non_finite, ..other };
        }
        if other.count == 0 {
            return Self { non_finite, ..self };
        }

        let count = self.count + other.count;
        let n_a = self.count as f64;
        let n_b = other.count as f64;
        let n = count as f64;
        let delta = other.mean - self.mean;

        Self {
            count,
            mean: self.mean + delta * n_b / n,
            m2: self.m2 + other.m2 + delta * delta * n_a * n_b / n,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            non_finite,
        }
    }

    /// Population variance `M2 / count`. `None` when empty.
    pub fn variance(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        // M2 is a sum of non-negative terms in exact arithmetic; clamp finite
        // rounding noise only, so a NaN stays visible.
        let variance = self.m2 / self.count as f64;
        Some(if variance < 0.0 { 0.0 } else { variance })
    }

    /// Freeze into `ForegroundStatistics`.
    pub fn finish(&self) -> Result<ForegroundStatistics, ScalingError> {
        let Some(variance) = self.variance() else {
            return Err(ScalingError::EmptyForeground);
        };
        Ok(ForegroundStatistics {
            count: self.count,
            min: self.min,
            max: self.max,
            mean: self.mean,
            variance,
            stddev: variance.sqrt(),
        })
    }
}

impl Extend<f64> for RunningStats {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for x in iter {
            self.push(x);
        }
    }
}

impl FromIterator<f64> for RunningStats {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut acc = RunningStats::new();
        acc.extend(iter);
        acc
    }
}

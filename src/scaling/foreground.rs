//! Foreground statistics over a labelled volume.
//!
//! One linear pass in the grid's logical (row-major) order; every voxel with
//! `label > 0` feeds a `RunningStats`. The partitioned variant walks the
//! outermost axis in parallel, one slab per task, then merges the per-slab
//! aggregates in slab order so the result does not depend on scheduling.
//!
//! Non-finite foreground voxels are skipped and counted; the count is logged.

use ndarray::{ArrayView, ArrayView3, Axis, Dimension, Zip};
use rayon::prelude::*;

use crate::domain::ForegroundStatistics;
use crate::error::ScalingError;
use crate::math::RunningStats;

fn check_shapes(volume: &ArrayView3<'_, f32>, labels: &ArrayView3<'_, u8>) -> Result<(), ScalingError> {
    if volume.shape() != labels.shape() {
        let dims = |s: &[usize]| [s[0], s[1], s[2]];
        return Err(ScalingError::ShapeMismatch {
            volume: dims(volume.shape()),
            labels: dims(labels.shape()),
        });
    }
    Ok(())
}

/// Accumulate foreground voxels of one (sub)volume. Shapes must already match.
fn accumulate<D: Dimension>(volume: ArrayView<'_, f32, D>, labels: ArrayView<'_, u8, D>) -> RunningStats {
    let mut acc = RunningStats::new();
    Zip::from(&volume).and(&labels).for_each(|&v, &label| {
        if label > 0 {
            acc.push_finite(f64::from(v));
        }
    });
    acc
}

fn finish_logged(acc: RunningStats) -> Result<ForegroundStatistics, ScalingError> {
    if acc.non_finite() > 0 {
        tracing::warn!(
            skipped = acc.non_finite(),
            "skipped non-finite foreground voxels"
        );
    }
    acc.finish()
}

/// Single-pass foreground statistics.
///
/// Fails with `ScalingError::EmptyForeground` when no voxel has `label > 0`.
pub fn compute_foreground_statistics(
    volume: ArrayView3<'_, f32>,
    labels: ArrayView3<'_, u8>,
) -> Result<ForegroundStatistics, ScalingError> {
    check_shapes(&volume, &labels)?;
    let stats = finish_logged(accumulate(volume, labels))?;
    tracing::debug!(count = stats.count, mean = stats.mean, "foreground statistics");
    Ok(stats)
}

/// Per-slab partial aggregates along the outermost axis, in slab order.
pub fn foreground_partials(
    volume: ArrayView3<'_, f32>,
    labels: ArrayView3<'_, u8>,
) -> Result<Vec<RunningStats>, ScalingError> {
    check_shapes(&volume, &labels)?;
    let slabs = volume.len_of(Axis(0));
    Ok((0..slabs)
        .into_par_iter()
        .map(|z| accumulate(volume.index_axis(Axis(0), z), labels.index_axis(Axis(0), z)))
        .collect())
}

/// Parallel foreground statistics: per-slab accumulation, ordered Welford merge.
///
/// Agrees with `compute_foreground_statistics` up to floating-point rounding.
pub fn compute_foreground_statistics_par(
    volume: ArrayView3<'_, f32>,
    labels: ArrayView3<'_, u8>,
) -> Result<ForegroundStatistics, ScalingError> {
    let partials = foreground_partials(volume, labels)?;
    let merged = partials
        .into_iter()
        .fold(RunningStats::new(), RunningStats::merge);
    finish_logged(merged)
}

//! Shared pipelines behind the CLI subcommands.
//!
//! Pipeline 1: volume -> labels -> foreground statistics -> remap
//! Pipeline 2: observations -> per-voxel bounded fits
//!
//! Each function returns all computed outputs; printing and exports stay in
//! `app`.

use crate::data::{SyntheticData, generate_synthetic};
use crate::domain::{
    FitRunConfig, ForegroundStatistics, LabelSource, LinearRemap, RelaxationFit, ScaleConfig,
    SimulateConfig,
};
use crate::error::{AppError, FitError};
use crate::fit::{BatchSummary, InitialGuess, fit_relaxation_batch};
use crate::io::{LoadedObservations, Volume, load_observations, read_labels, read_volume};
use crate::scaling::{
    compute_foreground_statistics, compute_foreground_statistics_par, derive_linear_remap,
};
use crate::segment::{MultiOtsu, Segmenter};

/// All computed outputs of a single `vrx scale` run.
#[derive(Debug, Clone)]
pub struct ScaleRun {
    pub volume: Volume,
    /// Otsu thresholds; empty when labels came from a file.
    pub thresholds: Vec<f64>,
    pub statistics: ForegroundStatistics,
    pub remap: LinearRemap,
}

/// All computed outputs of a single `vrx fit` run.
#[derive(Debug, Clone)]
pub struct FitRun {
    pub loaded: LoadedObservations,
    pub results: Vec<Result<RelaxationFit, FitError>>,
    pub summary: BatchSummary,
}

pub fn run_scale(config: &ScaleConfig) -> Result<ScaleRun, AppError> {
    let volume = read_volume(&config.volume_path)?;

    let (thresholds, labels) = match &config.labels {
        LabelSource::MultiOtsu {
            thresholds,
            histogram_bins,
        } => {
            let seg = MultiOtsu::new(*thresholds, *histogram_bins)?.segment(volume.data.view())?;
            (seg.thresholds, seg.labels)
        }
        LabelSource::File(path) => (Vec::new(), read_labels(path)?),
    };

    let statistics = if config.parallel {
        compute_foreground_statistics_par(volume.data.view(), labels.view())?
    } else {
        compute_foreground_statistics(volume.data.view(), labels.view())?
    };
    tracing::info!(
        foreground = statistics.count,
        min = statistics.min,
        max = statistics.max,
        "foreground statistics computed"
    );

    let remap = derive_linear_remap(&statistics, config.target_low, config.target_high)?;

    Ok(ScaleRun {
        volume,
        thresholds,
        statistics,
        remap,
    })
}

pub fn run_fit(config: &FitRunConfig) -> Result<FitRun, AppError> {
    let loaded = load_observations(&config.observations_path, config.flip_angle_degrees)?;

    let initial = match config.initial {
        Some(p) => InitialGuess::Fixed(p),
        None => InitialGuess::Estimated,
    };
    let results = fit_relaxation_batch(&loaded.datasets, initial, &config.fit);
    let summary = BatchSummary::from_results(&results);

    if summary.failed == summary.total {
        // Every voxel failed: surface the first error with its exit code.
        if let Some(Err(err)) = results.first() {
            return Err(AppError::from(err.clone()));
        }
    }

    Ok(FitRun {
        loaded,
        results,
        summary,
    })
}

pub fn run_simulate(config: &SimulateConfig) -> Result<SyntheticData, AppError> {
    let data = generate_synthetic(config)?;
    crate::io::write_observations_csv(&config.out, &data.datasets)?;
    tracing::info!(voxels = data.datasets.len(), out = %config.out.display(), "wrote synthetic observations");
    Ok(data)
}

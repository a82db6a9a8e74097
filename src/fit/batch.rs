//! Batch fitting of many independent datasets.
//!
//! Each voxel's fit is its own small optimization problem with no shared
//! mutable state, so the batch is an embarrassingly parallel map. Results keep
//! input order, and one failed dataset never aborts the others.

use rayon::prelude::*;

use crate::domain::{Observation, RelaxationFit, RelaxationFitConfig, RelaxationParameters};
use crate::error::FitError;
use crate::fit::grid::estimate_initial_guess;
use crate::fit::relaxation::fit_relaxation;

/// How each dataset in a batch gets its starting point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitialGuess {
    /// Same starting point for every dataset.
    Fixed(RelaxationParameters),
    /// Per-dataset log-grid scan (`estimate_initial_guess`).
    Estimated,
}

/// Fit every dataset in parallel. Output index `i` belongs to `datasets[i]`.
pub fn fit_relaxation_batch<D>(
    datasets: &[D],
    initial: InitialGuess,
    config: &RelaxationFitConfig,
) -> Vec<Result<RelaxationFit, FitError>>
where
    D: AsRef<[Observation]> + Sync,
{
    let results: Vec<Result<RelaxationFit, FitError>> = datasets
        .par_iter()
        .map(|dataset| {
            let observations = dataset.as_ref();
            let start = match initial {
                InitialGuess::Fixed(p) => p,
                InitialGuess::Estimated => estimate_initial_guess(observations, &config.bounds),
            };
            fit_relaxation(observations, start, config)
        })
        .collect();

    let failed = results.iter().filter(|r| r.is_err()).count();
    let capped = results
        .iter()
        .filter(|r| matches!(r, Ok(fit) if !fit.status.converged()))
        .count();
    if capped > 0 {
        tracing::warn!(capped, "some fits stopped at the iteration cap");
    }
    tracing::info!(
        datasets = datasets.len(),
        failed,
        capped,
        "relaxation batch finished"
    );

    results
}

/// Counts over a finished batch, for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub converged: usize,
    pub capped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[Result<RelaxationFit, FitError>]) -> Self {
        let mut summary = BatchSummary {
            total: results.len(),
            ..BatchSummary::default()
        };
        for r in results {
            match r {
                Ok(fit) if fit.status.converged() => summary.converged += 1,
                Ok(_) => summary.capped += 1,
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }
}

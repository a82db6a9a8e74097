//! Reporting utilities: batch overviews and formatted terminal output.

use crate::domain::RelaxationFit;
use crate::error::FitError;
use crate::fit::BatchSummary;

pub mod format;

pub use format::*;

/// `min / median / max` of one fitted parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSpread {
    pub min: f64,
    pub median: f64,
    pub max: f64,
}

impl ParameterSpread {
    fn from_values(mut values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let n = values.len();
        let median = if n % 2 == 1 {
            values[n / 2]
        } else {
            0.5 * (values[n / 2 - 1] + values[n / 2])
        };
        Some(Self {
            min: values[0],
            median,
            max: values[n - 1],
        })
    }
}

/// Batch counts plus parameter spreads over every successful fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOverview {
    pub summary: BatchSummary,
    pub relaxation_time: Option<ParameterSpread>,
    pub scale: Option<ParameterSpread>,
    pub mean_iterations: Option<f64>,
}

pub fn compute_fit_overview(results: &[Result<RelaxationFit, FitError>]) -> FitOverview {
    let fits: Vec<&RelaxationFit> = results.iter().filter_map(|r| r.as_ref().ok()).collect();

    let mean_iterations = if fits.is_empty() {
        None
    } else {
        Some(fits.iter().map(|f| f.iterations as f64).sum::<f64>() / fits.len() as f64)
    };

    FitOverview {
        summary: BatchSummary::from_results(results),
        relaxation_time: ParameterSpread::from_values(fits.iter().map(|f| f.params.relaxation_time).collect()),
        scale: ParameterSpread::from_values(fits.iter().map(|f| f.params.scale).collect()),
        mean_iterations,
    }
}

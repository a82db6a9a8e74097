//! Per-dataset relaxation fitting.
//!
//! Given the observations of one voxel `(S_i, TI_i, α_i)` we build one residual
//! per observation,
//!
//! ```text
//! r_i = S(T1, M0; TI_i, α_i) - S_i
//! ```
//!
//! attach box constraints on `(T1, M0)`, and hand the problem to the bounded LM
//! solver. Non-convergence within the iteration cap is reported through
//! `FitStatus`, not as an error.

use nalgebra::Vector2;

use crate::domain::{
    Observation, RELAXATION_PARAM_COUNT, RelaxationFit, RelaxationFitConfig, RelaxationParameters,
};
use crate::error::FitError;
use crate::math::{ResidualBlock, solve_bounded};
use crate::models::signal_with_gradient;

/// Residual block for one observation.
#[derive(Debug, Clone, Copy)]
struct RelaxationResidual {
    obs: Observation,
}

impl ResidualBlock for RelaxationResidual {
    fn evaluate(&self, params: &Vector2<f64>) -> (f64, Vector2<f64>) {
        let (predicted, gradient) =
            signal_with_gradient(params[0], params[1], self.obs.timing, self.obs.flip_angle);
        (predicted - self.obs.signal, gradient)
    }
}

/// Check that a dataset can be fit at all.
pub fn validate_observations(observations: &[Observation]) -> Result<(), FitError> {
    if observations.len() < RELAXATION_PARAM_COUNT {
        return Err(FitError::Underdetermined {
            observations: observations.len(),
            parameters: RELAXATION_PARAM_COUNT,
        });
    }
    if let Some(index) = observations.iter().position(|o| !o.is_finite()) {
        return Err(FitError::InvalidObservation { index });
    }
    Ok(())
}

/// Fit `(relaxation_time, scale)` to one dataset.
///
/// The returned parameters always lie inside `config.bounds`, whatever the
/// initial guess.
pub fn fit_relaxation(
    observations: &[Observation],
    initial: RelaxationParameters,
    config: &RelaxationFitConfig,
) -> Result<RelaxationFit, FitError> {
    validate_observations(observations)?;
    if !config.bounds.is_valid() {
        return Err(FitError::InvalidBounds);
    }

    let blocks: Vec<RelaxationResidual> = observations
        .iter()
        .map(|&obs| RelaxationResidual { obs })
        .collect();

    let summary = solve_bounded(
        &blocks,
        [initial.relaxation_time, initial.scale],
        config.bounds.lower(),
        config.bounds.upper(),
        &config.solver,
    );

    if !summary.status.converged() {
        tracing::debug!(
            iterations = summary.iterations,
            cost = summary.cost,
            "relaxation fit stopped at the iteration cap"
        );
    }

    Ok(RelaxationFit {
        params: RelaxationParameters::new(summary.params[0], summary.params[1]),
        status: summary.status,
        iterations: summary.iterations,
        cost: summary.cost,
    })
}

//! Bounded Levenberg–Marquardt for two-parameter problems.
//!
//! The problem is a sum of scalar residual blocks:
//!
//! ```text
//! minimize ½ Σ r_i(x)²   subject to   lower ≤ x ≤ upper
//! ```
//!
//! With only two unknowns we form the normal equations `JᵀJ` / `Jᵀr` directly as
//! a `Matrix2` / `Vector2` and solve the damped system with an LU solve. Bounds
//! are handled with a small active set plus projection: a component sitting on
//! a bound whose gradient points out of the box is frozen for the step, every
//! trial point is clamped into the box, and convergence on the gradient uses the
//! projected gradient `x - P(x - g)`.
//!
//! Damping is Marquardt-scaled (`λ · diag(JᵀJ)`), which matters here because the
//! parameters live on very different scales (milliseconds vs unit amplitudes).

use nalgebra::{Matrix2, Vector2};

use crate::domain::{ConvergenceReason, FitStatus, SolverOptions};

/// Floor on the `JᵀJ` diagonal used for damping, so a flat direction still gets damped.
const MIN_DIAGONAL: f64 = 1e-6;
const MIN_DAMPING: f64 = 1e-12;
const MAX_DAMPING: f64 = 1e32;

/// One scalar residual of a two-parameter problem.
pub trait ResidualBlock {
    /// Residual value and its gradient with respect to the two parameters.
    fn evaluate(&self, params: &Vector2<f64>) -> (f64, Vector2<f64>);
}

/// Solver outcome. Always carries the best point found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmSummary {
    pub params: Vector2<f64>,
    pub cost: f64,
    pub iterations: usize,
    pub status: FitStatus,
}

#[derive(Debug, Clone, Copy)]
struct Linearization {
    cost: f64,
    gradient: Vector2<f64>,
    hessian: Matrix2<f64>,
}

fn linearize<B: ResidualBlock>(blocks: &[B], x: &Vector2<f64>) -> Linearization {
    let mut cost = 0.0;
    let mut gradient = Vector2::zeros();
    let mut hessian = Matrix2::zeros();
    for block in blocks {
        let (r, j) = block.evaluate(x);
        cost += 0.5 * r * r;
        gradient += j * r;
        hessian += j * j.transpose();
    }
    Linearization {
        cost,
        gradient,
        hessian,
    }
}

fn project(x: Vector2<f64>, lower: &[f64; 2], upper: &[f64; 2]) -> Vector2<f64> {
    Vector2::new(
        x[0].max(lower[0]).min(upper[0]),
        x[1].max(lower[1]).min(upper[1]),
    )
}

/// Minimize `½ Σ r_i²` over the box `[lower, upper]` starting from `x0`.
///
/// `lower` must be finite and `lower <= upper` componentwise; `upper` may be
/// infinite. Non-finite components of `x0` are replaced by the lower bound.
/// Each attempted step (accepted or rejected) counts as one iteration.
pub fn solve_bounded<B: ResidualBlock>(
    blocks: &[B],
    x0: [f64; 2],
    lower: [f64; 2],
    upper: [f64; 2],
    options: &SolverOptions,
) -> LmSummary {
    let start = Vector2::new(
        if x0[0].is_finite() { x0[0] } else { lower[0] },
        if x0[1].is_finite() { x0[1] } else { lower[1] },
    );
    let mut x = project(start, &lower, &upper);
    let mut lin = linearize(blocks, &x);
    let mut damping = options.initial_damping.max(MIN_DAMPING);
    let mut iterations = 0usize;
    let mut status = FitStatus::MaxIterations;

    while iterations < options.max_iterations {
        let projected_gradient = x - project(x - lin.gradient, &lower, &upper);
        if projected_gradient.amax() <= options.gradient_tolerance {
            status = FitStatus::Converged(ConvergenceReason::Gradient);
            break;
        }

        iterations += 1;

        let mut lhs = lin.hessian;
        let mut rhs = -lin.gradient;
        for i in 0..2 {
            lhs[(i, i)] += damping * lin.hessian[(i, i)].max(MIN_DIAGONAL);
        }
        // Freeze components pinned at a bound with the gradient pushing outward.
        for i in 0..2 {
            let pinned = (x[i] <= lower[i] && lin.gradient[i] > 0.0)
                || (x[i] >= upper[i] && lin.gradient[i] < 0.0);
            if pinned {
                let j = 1 - i;
                lhs[(i, j)] = 0.0;
                lhs[(j, i)] = 0.0;
                lhs[(i, i)] = 1.0;
                rhs[i] = 0.0;
            }
        }

        let step = match lhs.lu().solve(&rhs) {
            Some(step) if step.iter().all(|v| v.is_finite()) => step,
            _ => {
                damping = (damping * 10.0).min(MAX_DAMPING);
                continue;
            }
        };

        let step_tolerance = options.parameter_tolerance * (x.norm() + options.parameter_tolerance);
        let candidate = project(x + step, &lower, &upper);
        if (candidate - x).norm() <= step_tolerance {
            if step.norm() <= step_tolerance {
                status = FitStatus::Converged(ConvergenceReason::Parameter);
                break;
            }
            // The step points out of the box; damp towards the projected gradient.
            damping = (damping * 10.0).min(MAX_DAMPING);
            continue;
        }

        let trial = linearize(blocks, &candidate);
        if trial.cost.is_finite() && trial.cost < lin.cost {
            let decrease = lin.cost - trial.cost;
            let previous = lin.cost;
            x = candidate;
            lin = trial;
            damping = (damping / 10.0).max(MIN_DAMPING);
            if decrease <= options.function_tolerance * previous {
                status = FitStatus::Converged(ConvergenceReason::Function);
                break;
            }
        } else {
            damping = (damping * 10.0).min(MAX_DAMPING);
        }
    }

    LmSummary {
        params: x,
        cost: lin.cost,
        iterations,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// r = a·x0 + b·x1 - y
    struct LinearBlock {
        a: f64,
        b: f64,
        y: f64,
    }

    impl ResidualBlock for LinearBlock {
        fn evaluate(&self, p: &Vector2<f64>) -> (f64, Vector2<f64>) {
            (self.a * p[0] + self.b * p[1] - self.y, Vector2::new(self.a, self.b))
        }
    }

    /// Samples of y = 3 + 2t.
    fn line_blocks() -> Vec<LinearBlock> {
        (0..5)
            .map(|i| {
                let t = i as f64;
                LinearBlock {
                    a: 1.0,
                    b: t,
                    y: 3.0 + 2.0 * t,
                }
            })
            .collect()
    }

    #[test]
    fn solves_unconstrained_linear_problem() {
        let blocks = line_blocks();
        let out = solve_bounded(
            &blocks,
            [0.0, 0.0],
            [-100.0, -100.0],
            [100.0, 100.0],
            &SolverOptions::default(),
        );
        assert!(out.status.converged());
        assert!((out.params[0] - 3.0).abs() < 1e-6, "{:?}", out.params);
        assert!((out.params[1] - 2.0).abs() < 1e-6, "{:?}", out.params);
        assert!(out.cost < 1e-10);
    }

    #[test]
    fn active_bound_is_respected() {
        // Unconstrained optimum has x0 = 3; cap it at 1.
        let blocks = line_blocks();
        let out = solve_bounded(
            &blocks,
            [0.5, 0.0],
            [-100.0, -100.0],
            [1.0, f64::INFINITY],
            &SolverOptions::default(),
        );
        assert!(out.params[0] <= 1.0);
        assert!((out.params[0] - 1.0).abs() < 1e-6, "{:?}", out.params);
        assert!(out.params[1] > 2.0);
    }

    #[test]
    fn infeasible_start_is_projected() {
        let blocks = line_blocks();
        let out = solve_bounded(
            &blocks,
            [f64::NAN, -1e9],
            [0.0, 0.0],
            [10.0, 10.0],
            &SolverOptions::default(),
        );
        assert!(out.params.iter().all(|v| v.is_finite()));
        assert!(out.params[0] >= 0.0 && out.params[1] >= 0.0);
    }

    #[test]
    fn iteration_cap_is_honoured() {
        let blocks = line_blocks();
        let options = SolverOptions {
            max_iterations: 1,
            ..SolverOptions::default()
        };
        let out = solve_bounded(&blocks, [50.0, -50.0], [-100.0; 2], [100.0; 2], &options);
        assert_eq!(out.iterations, 1);
        assert_eq!(out.status, FitStatus::MaxIterations);
        assert!(out.cost < 0.5 * 5.0 * 60.0f64.powi(2));
    }
}

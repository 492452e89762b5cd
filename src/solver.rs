// Copyright 2017 Matthew Plant. This file is part of iris-collision.
//
// iris-collision is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// iris-collision is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with iris-collision. If not, see <http://www.gnu.org/licenses/>.

//! Nonlinear programming backends.
//!
//! `AugmentedLagrangianSolver` handles every program `MathematicalProgram`
//! can express. Constraints are moved into the objective with a
//! Powell-Hestenes-Rockafellar penalty and the resulting smooth problem is
//! minimized with BFGS and an Armijo backtracking line search.

use std::time::{Duration, Instant};

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ProgramError, SolverError, SolverResult};
use crate::program::MathematicalProgram;

/// Constraint violation below which a point counts as feasible.
pub const DEFAULT_FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// Tuning knobs shared by all backends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub feasibility_tolerance: f64,
    pub optimality_tolerance: f64,
    pub max_outer_iterations: usize,
    pub max_inner_iterations: usize,
    pub initial_penalty: f64,
    /// Factor applied to the penalty when the violation stops shrinking.
    pub penalty_growth: f64,
    pub max_penalty: f64,
    pub time_limit: Option<Duration>,
    /// Log every outer iteration at info level instead of debug.
    pub verbose: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            feasibility_tolerance: DEFAULT_FEASIBILITY_TOLERANCE,
            optimality_tolerance: 1e-8,
            max_outer_iterations: 60,
            max_inner_iterations: 200,
            initial_penalty: 10.0,
            penalty_growth: 10.0,
            max_penalty: 1e8,
            time_limit: None,
            verbose: false,
        }
    }
}

impl SolverOptions {
    pub fn validate(&self) -> SolverResult<()> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(SolverError::InvalidOption(format!(
                    "{} must be finite and positive, got {}",
                    name, v
                )))
            }
        };
        positive("feasibility_tolerance", self.feasibility_tolerance)?;
        positive("optimality_tolerance", self.optimality_tolerance)?;
        positive("initial_penalty", self.initial_penalty)?;
        positive("max_penalty", self.max_penalty)?;
        if !(self.penalty_growth > 1.0) {
            return Err(SolverError::InvalidOption(format!(
                "penalty_growth must exceed 1, got {}",
                self.penalty_growth
            )));
        }
        if self.max_penalty < self.initial_penalty {
            return Err(SolverError::InvalidOption(
                "max_penalty must not be below initial_penalty".to_string(),
            ));
        }
        if self.max_outer_iterations == 0 || self.max_inner_iterations == 0 {
            return Err(SolverError::InvalidOption("iteration limits must be positive".to_string()));
        }
        Ok(())
    }
}

/// How a solve ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolutionStatus {
    Solved,
    /// No point satisfies the constraints.
    InfeasibleConstraints,
    IterationLimit,
    TimeLimit,
    NumericalFailure,
}

impl SolutionStatus {
    pub fn is_success(self) -> bool {
        self == SolutionStatus::Solved
    }
}

#[derive(Clone, Debug)]
pub struct MathematicalProgramResult {
    pub solver_name: &'static str,
    pub status: SolutionStatus,
    /// The final iterate, one entry per decision variable.
    pub x: DVector<f64>,
    pub cost: f64,
    pub constraint_violation: f64,
    pub iterations: usize,
}

impl MathematicalProgramResult {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// A backend capable of solving a `MathematicalProgram`.
pub trait SolverInterface {
    fn name(&self) -> &'static str;

    /// Solves `prog` starting from `initial_guess`, or from the program's own
    /// initial guess when none is given. An `Err` means no determinate
    /// answer was reached; an infeasible program is an `Ok` result with
    /// status `InfeasibleConstraints`.
    fn solve(
        &self,
        prog: &mut MathematicalProgram,
        initial_guess: Option<&DVector<f64>>,
        options: Option<&SolverOptions>,
    ) -> SolverResult<MathematicalProgramResult>;
}

/// Armijo backtracking: shrink the step until the sufficient decrease
/// condition holds.
#[derive(Clone, Copy, Debug)]
pub struct ArmijoBacktracking {
    pub beta: f64,
    pub max_steps: usize,
    pub c_armijo: f64,
}

impl Default for ArmijoBacktracking {
    fn default() -> Self {
        ArmijoBacktracking {
            beta: 0.5,
            max_steps: 50,
            c_armijo: 1e-4,
        }
    }
}

impl ArmijoBacktracking {
    /// Returns the accepted step size, or None if no trial was accepted.
    /// `eval_cost(alpha)` returns the trial cost at step size `alpha`.
    pub fn search<F>(&self, cost0: f64, dphi0: f64, mut eval_cost: F) -> SolverResult<Option<f64>>
    where
        F: FnMut(f64) -> SolverResult<f64>,
    {
        let mut alpha = 1.0;
        for _ in 0..self.max_steps {
            let cost_trial = eval_cost(alpha)?;
            let rhs = cost0 + self.c_armijo * alpha * dphi0;
            if cost_trial.is_finite() && rhs.is_finite() && cost_trial <= rhs {
                return Ok(Some(alpha));
            }
            alpha *= self.beta;
        }
        Ok(None)
    }
}

#[derive(Clone, Debug)]
struct Multipliers {
    equality: DVector<f64>,
    upper: DVector<f64>,
    lower: DVector<f64>,
}

impl Multipliers {
    fn zeros(rows: usize) -> Self {
        Multipliers {
            equality: DVector::zeros(rows),
            upper: DVector::zeros(rows),
            lower: DVector::zeros(rows),
        }
    }
}

/// Augmented Lagrangian method with a BFGS inner solver.
#[derive(Clone, Debug, Default)]
pub struct AugmentedLagrangianSolver {
    line_search: ArmijoBacktracking,
}

impl AugmentedLagrangianSolver {
    pub const NAME: &'static str = "AugmentedLagrangian";

    pub fn new() -> Self {
        AugmentedLagrangianSolver::default()
    }

    pub fn with_line_search(line_search: ArmijoBacktracking) -> Self {
        AugmentedLagrangianSolver { line_search }
    }

    /// Value and, if requested, gradient of the augmented Lagrangian.
    fn lagrangian(
        prog: &mut MathematicalProgram,
        x: &DVector<f64>,
        mult: &Multipliers,
        rho: f64,
        with_gradient: bool,
    ) -> SolverResult<(f64, DVector<f64>)> {
        let c = prog.eval_constraints(x, with_gradient)?;
        let mut value = prog.eval_cost(x);
        let mut grad = if with_gradient {
            prog.eval_cost_gradient(x)
        } else {
            DVector::zeros(0)
        };
        for i in 0..c.values.len() {
            let (y, lo, up) = (c.values[i], c.lower[i], c.upper[i]);
            // dL/dy_i
            let mut coeff = 0.0;
            if lo == up {
                let h = y - lo;
                value += mult.equality[i] * h + 0.5 * rho * h * h;
                coeff += mult.equality[i] + rho * h;
            } else {
                if up.is_finite() {
                    let s = (y - up + mult.upper[i] / rho).max(0.0);
                    value += 0.5 * rho * s * s - mult.upper[i] * mult.upper[i] / (2.0 * rho);
                    coeff += rho * s;
                }
                if lo.is_finite() {
                    let s = (lo - y + mult.lower[i] / rho).max(0.0);
                    value += 0.5 * rho * s * s - mult.lower[i] * mult.lower[i] / (2.0 * rho);
                    coeff -= rho * s;
                }
            }
            if coeff != 0.0 {
                if let Some(jac) = c.jacobian.as_ref() {
                    grad.axpy(coeff, &jac.row(i).transpose(), 1.0);
                }
            }
        }
        Ok((value, grad))
    }

    /// Minimizes the augmented Lagrangian for fixed multipliers and penalty.
    /// Returns the number of BFGS steps taken.
    fn minimize_inner(
        &self,
        prog: &mut MathematicalProgram,
        x: &mut DVector<f64>,
        mult: &Multipliers,
        rho: f64,
        options: &SolverOptions,
    ) -> SolverResult<usize> {
        let n = x.len();
        let (mut value, mut grad) = Self::lagrangian(prog, x, mult, rho, true)?;
        let mut h_inv = DMatrix::<f64>::identity(n, n);
        for k in 0..options.max_inner_iterations {
            if !value.is_finite() || grad.iter().any(|g| !g.is_finite()) {
                return Ok(k);
            }
            if grad.norm() <= options.optimality_tolerance {
                return Ok(k);
            }
            let mut direction = -(&h_inv * &grad);
            let mut dphi0 = grad.dot(&direction);
            if !(dphi0 < 0.0) {
                h_inv = DMatrix::identity(n, n);
                direction = -grad.clone();
                dphi0 = -grad.norm_squared();
            }

            let base = x.clone();
            let alpha = self.line_search.search(value, dphi0, |alpha| {
                let trial = &base + &direction * alpha;
                Ok(Self::lagrangian(prog, &trial, mult, rho, false)?.0)
            })?;
            let alpha = match alpha {
                Some(alpha) => alpha,
                None => return Ok(k),
            };

            let s = &direction * alpha;
            *x = &base + &s;
            let (new_value, new_grad) = Self::lagrangian(prog, x, mult, rho, true)?;
            let y = &new_grad - &grad;
            let sy = s.dot(&y);
            if sy > 1e-12 {
                let r = 1.0 / sy;
                let eye = DMatrix::<f64>::identity(n, n);
                let left = &eye - (&s * y.transpose()) * r;
                let right = &eye - (&y * s.transpose()) * r;
                h_inv = left * h_inv * right + (&s * s.transpose()) * r;
            }
            value = new_value;
            grad = new_grad;
            if s.amax() <= options.optimality_tolerance * (1.0 + x.amax()) {
                return Ok(k + 1);
            }
        }
        Ok(options.max_inner_iterations)
    }

    /// Levenberg-Marquardt on the constraint violations alone, starting
    /// from `x`. The cost is ignored.
    fn restore_feasibility(
        prog: &mut MathematicalProgram,
        x: &DVector<f64>,
        options: &SolverOptions,
    ) -> SolverResult<Restoration> {
        let mut x = x.clone();
        let (mut v, mut jac) = violation_residual(prog, &x)?;
        let mut cost = 0.5 * v.norm_squared();
        let mut lambda = 1e-6;
        let target = 0.5 * options.feasibility_tolerance;
        let dx_tol = f64::EPSILON * (1.0 + x.amax());

        for _ in 0..options.max_inner_iterations {
            if v.amax() <= target {
                break;
            }
            let m = v.len();
            // dx = -Jᵀ (J Jᵀ + λI)⁻¹ v
            let a = &jac * jac.transpose() + DMatrix::<f64>::identity(m, m) * lambda;
            let y = match a.cholesky() {
                Some(chol) => chol.solve(&v),
                None => {
                    lambda *= 10.0;
                    continue;
                }
            };
            let dx = -(jac.transpose() * y);
            if dx.amax() <= dx_tol {
                break;
            }
            let trial = &x + &dx;
            let (v_trial, jac_trial) = violation_residual(prog, &trial)?;
            let cost_trial = 0.5 * v_trial.norm_squared();
            if cost_trial.is_finite() && cost_trial < cost {
                x = trial;
                v = v_trial;
                jac = jac_trial;
                cost = cost_trial;
                lambda = (lambda * 0.5).max(1e-12);
            } else {
                lambda *= 10.0;
                if lambda > 1e16 {
                    break;
                }
            }
        }

        let gradient = jac.transpose() * &v;
        let violation = prog.eval_constraints(&x, false)?.max_violation();
        Ok(Restoration {
            stationary: gradient.amax() <= options.optimality_tolerance.sqrt() * (1.0 + v.amax()),
            x,
            violation,
        })
    }
}

/// Where the restoration phase ended.
struct Restoration {
    x: DVector<f64>,
    violation: f64,
    /// No step reduces the violation any further.
    stationary: bool,
}

/// Signed bound violation of every constraint row and its Jacobian. Rows
/// within their bounds contribute nothing.
fn violation_residual(
    prog: &mut MathematicalProgram,
    x: &DVector<f64>,
) -> SolverResult<(DVector<f64>, DMatrix<f64>)> {
    let c = prog.eval_constraints(x, true)?;
    let rows = c.values.len();
    let mut jac = c.jacobian.unwrap_or_else(|| DMatrix::zeros(rows, x.len()));
    let mut v = DVector::zeros(rows);
    for i in 0..rows {
        let (y, lo, up) = (c.values[i], c.lower[i], c.upper[i]);
        v[i] = if y > up {
            y - up
        } else if y < lo {
            y - lo
        } else {
            0.0
        };
        if v[i] == 0.0 {
            jac.row_mut(i).fill(0.0);
        }
    }
    Ok((v, jac))
}

impl SolverInterface for AugmentedLagrangianSolver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn solve(
        &self,
        prog: &mut MathematicalProgram,
        initial_guess: Option<&DVector<f64>>,
        options: Option<&SolverOptions>,
    ) -> SolverResult<MathematicalProgramResult> {
        let default_options = SolverOptions::default();
        let options = options.unwrap_or(&default_options);
        options.validate()?;

        let n = prog.num_vars();
        let mut x = match initial_guess {
            Some(guess) => {
                if guess.len() != n {
                    return Err(ProgramError::DimensionMismatch {
                        what: "initial guess length",
                        expected: n,
                        actual: guess.len(),
                    }
                    .into());
                }
                guess.clone()
            }
            None => prog.initial_guess().clone(),
        };
        // Unset entries start at zero.
        for v in x.iter_mut() {
            if v.is_nan() {
                *v = 0.0;
            }
        }

        let start = Instant::now();
        let rows = prog.eval_constraints(&x, false)?.values.len();
        let mut mult = Multipliers::zeros(rows);
        let mut rho = options.initial_penalty;
        let mut prev_violation = f64::INFINITY;
        let mut stalled_at_cap = 0;
        let mut feasibility_shown = false;
        let mut status = SolutionStatus::IterationLimit;
        let mut iterations = 0;

        for outer in 0..options.max_outer_iterations {
            if let Some(limit) = options.time_limit {
                if start.elapsed() > limit {
                    status = SolutionStatus::TimeLimit;
                    break;
                }
            }
            iterations = outer + 1;
            let x_prev = x.clone();
            let inner = self.minimize_inner(prog, &mut x, &mult, rho, options)?;

            let c = prog.eval_constraints(&x, false)?;
            let violation = c.max_violation();
            let cost = prog.eval_cost(&x);
            if !violation.is_finite() || !cost.is_finite() || x.iter().any(|v| !v.is_finite()) {
                status = SolutionStatus::NumericalFailure;
                break;
            }
            if options.verbose {
                info!(outer, inner, rho, violation, cost, "augmented lagrangian iteration");
            } else {
                debug!(outer, inner, rho, violation, cost, "augmented lagrangian iteration");
            }

            let step = (&x - &x_prev).amax();
            if violation <= options.feasibility_tolerance
                && step <= options.optimality_tolerance.sqrt() * (1.0 + x.amax())
            {
                status = SolutionStatus::Solved;
                break;
            }

            for i in 0..c.values.len() {
                let (y, lo, up) = (c.values[i], c.lower[i], c.upper[i]);
                if lo == up {
                    mult.equality[i] += rho * (y - lo);
                } else {
                    if up.is_finite() {
                        mult.upper[i] = (mult.upper[i] + rho * (y - up)).max(0.0);
                    }
                    if lo.is_finite() {
                        mult.lower[i] = (mult.lower[i] + rho * (lo - y)).max(0.0);
                    }
                }
            }

            if violation > options.feasibility_tolerance {
                if rho >= options.max_penalty {
                    if violation > 0.9 * prev_violation {
                        stalled_at_cap += 1;
                    } else {
                        stalled_at_cap = 0;
                    }
                } else if violation > 0.25 * prev_violation {
                    rho = (rho * options.penalty_growth).min(options.max_penalty);
                }
            }
            prev_violation = violation;

            // The penalty cannot grow any further. Decide feasibility from the
            // violation alone before giving a verdict.
            if stalled_at_cap >= 3 && !feasibility_shown {
                stalled_at_cap = 0;
                let restored = Self::restore_feasibility(prog, &x, options)?;
                debug!(
                    violation = restored.violation,
                    stationary = restored.stationary,
                    "feasibility restoration"
                );
                if restored.violation <= options.feasibility_tolerance {
                    let moved = (&restored.x - &x).amax();
                    if moved <= options.optimality_tolerance.sqrt() * (1.0 + x.amax()) {
                        x = restored.x;
                        status = SolutionStatus::Solved;
                        break;
                    }
                    feasibility_shown = true;
                } else if restored.stationary {
                    // A stalled violation this close to zero is rounding, not
                    // evidence that the constraints cannot be met.
                    let floor = f64::EPSILON.sqrt() * (1.0 + restored.x.amax());
                    status = if restored.violation > floor {
                        SolutionStatus::InfeasibleConstraints
                    } else {
                        SolutionStatus::NumericalFailure
                    };
                    break;
                }
            }
        }

        let violation = prog.eval_constraints(&x, false)?.max_violation();
        let cost = prog.eval_cost(&x);
        debug!(?status, iterations, violation, cost, "augmented lagrangian finished");
        Ok(MathematicalProgramResult {
            solver_name: Self::NAME,
            status,
            x,
            cost,
            constraint_violation: violation,
            iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    mod augmented_lagrangian {
        use approx::assert_abs_diff_eq;
        use nalgebra::{DMatrix, DVector};

        use crate::error::SolverError;
        use crate::program::MathematicalProgram;
        use crate::solver::*;
        use crate::symbolic::Variable;

        fn unit_cost(prog: &mut MathematicalProgram, vars: &[Variable], target: &[f64]) {
            let n = vars.len();
            let target = DVector::from_row_slice(target);
            prog.add_quadratic_error_cost(&DMatrix::identity(n, n), &target, vars)
                .unwrap();
        }

        #[test]
        fn test_unconstrained() {
            let mut prog = MathematicalProgram::new();
            let x = prog.new_continuous_variables(3, "x");
            unit_cost(&mut prog, &x, &[1.0, -2.0, 0.5]);
            let result = AugmentedLagrangianSolver::new().solve(&mut prog, None, None).unwrap();
            assert_eq!(result.status, SolutionStatus::Solved);
            assert_abs_diff_eq!(result.x[1], -2.0, epsilon = 1e-6);
            assert_abs_diff_eq!(result.cost, 0.0, epsilon = 1e-9);
        }

        #[test]
        fn test_equality_constraint() {
            let mut prog = MathematicalProgram::new();
            let x = prog.new_continuous_variables(2, "x");
            unit_cost(&mut prog, &x, &[2.0, 2.0]);
            prog.add_linear_equality_constraint(
                DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
                DVector::from_element(1, 1.0),
                &x,
            )
            .unwrap();
            let result = AugmentedLagrangianSolver::new().solve(&mut prog, None, None).unwrap();
            assert!(result.is_success());
            assert_abs_diff_eq!(result.x[0], 0.5, epsilon = 1e-4);
            assert_abs_diff_eq!(result.x[1], 0.5, epsilon = 1e-4);
            assert!(result.constraint_violation <= DEFAULT_FEASIBILITY_TOLERANCE);
        }

        #[test]
        fn test_active_quadratic_constraint() {
            let mut prog = MathematicalProgram::new();
            let x = prog.new_continuous_variables(2, "x");
            unit_cost(&mut prog, &x, &[2.0, 0.0]);
            prog.add_quadratic_constraint(DMatrix::identity(2, 2), DVector::zeros(2),
                                          f64::NEG_INFINITY, 1.0, &x)
                .unwrap();
            let guess = DVector::from_vec(vec![0.0, 0.5]);
            let result = AugmentedLagrangianSolver::new()
                .solve(&mut prog, Some(&guess), None)
                .unwrap();
            assert_eq!(result.status, SolutionStatus::Solved);
            assert_abs_diff_eq!(result.x[0], 1.0, epsilon = 1e-3);
            assert_abs_diff_eq!(result.x[1], 0.0, epsilon = 1e-3);
        }

        #[test]
        fn test_infeasible_bounds() {
            let mut prog = MathematicalProgram::new();
            let x = prog.new_continuous_variables(1, "x");
            prog.add_bounding_box_constraint(DVector::from_element(1, f64::NEG_INFINITY),
                                             DVector::from_element(1, 0.0), &x)
                .unwrap();
            prog.add_bounding_box_constraint(DVector::from_element(1, 1.0),
                                             DVector::from_element(1, f64::INFINITY), &x)
                .unwrap();
            let result = AugmentedLagrangianSolver::new().solve(&mut prog, None, None).unwrap();
            assert_eq!(result.status, SolutionStatus::InfeasibleConstraints);
            assert!(!result.is_success());
            assert!(result.constraint_violation > 0.1);
        }

        #[test]
        fn test_iteration_limit() {
            let mut prog = MathematicalProgram::new();
            let x = prog.new_continuous_variables(1, "x");
            prog.add_bounding_box_constraint(DVector::from_element(1, 1.0),
                                             DVector::from_element(1, 1.0), &x)
                .unwrap();
            let options = SolverOptions {
                max_outer_iterations: 1,
                max_inner_iterations: 1,
                ..SolverOptions::default()
            };
            let result = AugmentedLagrangianSolver::new()
                .solve(&mut prog, None, Some(&options))
                .unwrap();
            assert_eq!(result.status, SolutionStatus::IterationLimit);
        }

        #[test]
        fn test_degenerate_feasible_set() {
            // x² <= 0 admits only x = 0, where the constraint gradient vanishes.
            for tol in [1e-6, 1e-9, 1e-12] {
                let mut prog = MathematicalProgram::new();
                let x = prog.new_continuous_variables(1, "x");
                unit_cost(&mut prog, &x, &[2.0]);
                prog.add_quadratic_constraint(DMatrix::identity(1, 1), DVector::zeros(1),
                                              f64::NEG_INFINITY, 0.0, &x)
                    .unwrap();
                let options = SolverOptions {
                    feasibility_tolerance: tol,
                    ..SolverOptions::default()
                };
                let result = AugmentedLagrangianSolver::new()
                    .solve(&mut prog, None, Some(&options))
                    .unwrap();
                assert_ne!(result.status, SolutionStatus::InfeasibleConstraints, "tol {}", tol);
                if result.is_success() {
                    assert!(result.constraint_violation <= tol);
                }
            }
        }

        #[test]
        fn test_bad_input() {
            let mut prog = MathematicalProgram::new();
            prog.new_continuous_variables(2, "x");
            let options = SolverOptions {
                penalty_growth: 1.0,
                ..SolverOptions::default()
            };
            let solver = AugmentedLagrangianSolver::new();
            assert!(matches!(
                solver.solve(&mut prog, None, Some(&options)),
                Err(SolverError::InvalidOption(_))
            ));
            let guess = DVector::zeros(3);
            assert!(matches!(
                solver.solve(&mut prog, Some(&guess), None),
                Err(SolverError::Program(_))
            ));
        }

        #[test]
        fn test_options_deserialize_with_defaults() {
            let json = r#"{"feasibility_tolerance": 1e-4, "verbose": true}"#;
            let options: SolverOptions = serde_json::from_str(json).unwrap();
            assert_eq!(options.feasibility_tolerance, 1e-4);
            assert!(options.verbose);
            assert_eq!(options.max_penalty, SolverOptions::default().max_penalty);
        }
    }
}

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

//! Mathematical programs: decision variables, costs and constraints bound to
//! subsets of the variables.
//!
//! A program is built once and then solved many times. Linear constraints are
//! addressed by the handle returned when they were added, so their
//! coefficients can be replaced in place without touching anything else.

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};
use smallvec::SmallVec;
use tracing::trace;

use crate::autodiff::{self, AutoDiff};
use crate::error::{ConstraintError, ConstraintResult, ProgramError, ProgramResult};
use crate::symbolic::{Expression, Variable};

/// Lower and upper bounds of a vector-valued constraint.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintBounds {
    lower: DVector<f64>,
    upper: DVector<f64>,
}

impl ConstraintBounds {
    pub fn new(lower: DVector<f64>, upper: DVector<f64>) -> ProgramResult<Self> {
        check_bounds(&lower, &upper)?;
        Ok(ConstraintBounds { lower, upper })
    }

    /// `value <= y <= value` for every output.
    pub fn equality(value: DVector<f64>) -> Self {
        ConstraintBounds {
            lower: value.clone(),
            upper: value,
        }
    }

    pub fn lower(&self) -> &DVector<f64> {
        &self.lower
    }

    pub fn upper(&self) -> &DVector<f64> {
        &self.upper
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn set_upper(&mut self, upper: DVector<f64>) -> ConstraintResult<()> {
        if upper.len() != self.lower.len() {
            return Err(ConstraintError::BoundSizeMismatch {
                expected: self.lower.len(),
                actual: upper.len(),
            });
        }
        self.upper = upper;
        Ok(())
    }

    /// The largest amount by which `y` leaves the bounds.
    pub fn violation(&self, y: &DVector<f64>) -> f64 {
        let mut worst: f64 = 0.0;
        for i in 0..y.len() {
            worst = worst
                .max(self.lower[i] - y[i])
                .max(y[i] - self.upper[i]);
        }
        if y.iter().any(|v| v.is_nan()) {
            f64::INFINITY
        } else {
            worst
        }
    }
}

fn check_bounds(lower: &DVector<f64>, upper: &DVector<f64>) -> ProgramResult<()> {
    if lower.len() != upper.len() {
        return Err(ProgramError::DimensionMismatch {
            what: "upper bound length",
            expected: lower.len(),
            actual: upper.len(),
        });
    }
    for row in 0..lower.len() {
        if lower[row] > upper[row] {
            return Err(ProgramError::InvertedBounds {
                row,
                lower: lower[row],
                upper: upper[row],
            });
        }
    }
    Ok(())
}

/// A vector-valued function `y = g(x)` together with bounds `lb <= y <= ub`.
///
/// Every constraint can be evaluated on plain values, on autodiff numbers to
/// obtain derivatives, and on symbolic variables. Evaluation takes `&mut self`
/// because implementations may own a scratch evaluation context.
pub trait Constraint: Send {
    fn num_outputs(&self) -> usize;

    fn num_vars(&self) -> usize;

    fn bounds(&self) -> &ConstraintBounds;

    fn lower_bound(&self) -> &DVector<f64> {
        self.bounds().lower()
    }

    fn upper_bound(&self) -> &DVector<f64> {
        self.bounds().upper()
    }

    fn eval(&mut self, x: &DVector<f64>) -> ConstraintResult<DVector<f64>>;

    fn eval_autodiff(&mut self, x: &[AutoDiff]) -> ConstraintResult<Vec<AutoDiff>>;

    fn eval_symbolic(&mut self, x: &[Variable]) -> ConstraintResult<Vec<Expression>>;

    /// Replaces the upper bound, leaving the function itself untouched.
    fn update_upper_bound(&mut self, upper: DVector<f64>) -> ConstraintResult<()>;

    /// The value and the `num_outputs x num_vars` Jacobian at `x`.
    fn eval_with_jacobian(
        &mut self,
        x: &DVector<f64>,
    ) -> ConstraintResult<(DVector<f64>, DMatrix<f64>)> {
        let y = self.eval_autodiff(&autodiff::initialize(x))?;
        Ok((autodiff::values(&y), autodiff::jacobian(&y, x.len())))
    }

    fn check_satisfied(&mut self, x: &DVector<f64>, tol: f64) -> ConstraintResult<bool> {
        let y = self.eval(x)?;
        Ok(self.bounds().violation(&y) <= tol)
    }
}

fn check_input_size(expected: usize, actual: usize) -> ConstraintResult<()> {
    if expected != actual {
        Err(ConstraintError::InputSizeMismatch { expected, actual })
    } else {
        Ok(())
    }
}

/// `lb <= A x <= ub`.
#[derive(Clone, Debug)]
pub struct LinearConstraint {
    a: DMatrix<f64>,
    bounds: ConstraintBounds,
}

impl LinearConstraint {
    pub fn new(a: DMatrix<f64>, lower: DVector<f64>, upper: DVector<f64>) -> ProgramResult<Self> {
        if lower.len() != a.nrows() {
            return Err(ProgramError::DimensionMismatch {
                what: "linear constraint bound length",
                expected: a.nrows(),
                actual: lower.len(),
            });
        }
        Ok(LinearConstraint {
            a,
            bounds: ConstraintBounds::new(lower, upper)?,
        })
    }

    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    /// Replaces the coefficients and bounds. The number of rows may change,
    /// the number of variables may not.
    pub fn update_coefficients(
        &mut self,
        a: DMatrix<f64>,
        lower: DVector<f64>,
        upper: DVector<f64>,
    ) -> ProgramResult<()> {
        if a.ncols() != self.a.ncols() {
            return Err(ProgramError::DimensionMismatch {
                what: "linear constraint columns",
                expected: self.a.ncols(),
                actual: a.ncols(),
            });
        }
        *self = LinearConstraint::new(a, lower, upper)?;
        Ok(())
    }
}

impl Constraint for LinearConstraint {
    fn num_outputs(&self) -> usize {
        self.a.nrows()
    }

    fn num_vars(&self) -> usize {
        self.a.ncols()
    }

    fn bounds(&self) -> &ConstraintBounds {
        &self.bounds
    }

    fn eval(&mut self, x: &DVector<f64>) -> ConstraintResult<DVector<f64>> {
        check_input_size(self.a.ncols(), x.len())?;
        Ok(&self.a * x)
    }

    fn eval_autodiff(&mut self, x: &[AutoDiff]) -> ConstraintResult<Vec<AutoDiff>> {
        check_input_size(self.a.ncols(), x.len())?;
        Ok((0..self.a.nrows())
            .map(|i| {
                self.a
                    .row(i)
                    .iter()
                    .zip(x.iter())
                    .fold(AutoDiff::constant(0.0), |acc, (a, xj)| {
                        acc + AutoDiff::constant(*a) * xj.clone()
                    })
            })
            .collect())
    }

    fn eval_symbolic(&mut self, x: &[Variable]) -> ConstraintResult<Vec<Expression>> {
        check_input_size(self.a.ncols(), x.len())?;
        Ok((0..self.a.nrows())
            .map(|i| {
                self.a
                    .row(i)
                    .iter()
                    .zip(x.iter())
                    .fold(Expression::from(0.0), |acc, (a, xj)| {
                        acc + Expression::from(*a) * Expression::from(xj)
                    })
            })
            .collect())
    }

    fn update_upper_bound(&mut self, upper: DVector<f64>) -> ConstraintResult<()> {
        self.bounds.set_upper(upper)
    }

    fn eval_with_jacobian(
        &mut self,
        x: &DVector<f64>,
    ) -> ConstraintResult<(DVector<f64>, DMatrix<f64>)> {
        Ok((self.eval(x)?, self.a.clone()))
    }
}

/// `lb <= xᵀ Q x + bᵀ x <= ub`, a single output.
#[derive(Clone, Debug)]
pub struct QuadraticConstraint {
    q: DMatrix<f64>,
    b: DVector<f64>,
    bounds: ConstraintBounds,
}

impl QuadraticConstraint {
    pub fn new(q: DMatrix<f64>, b: DVector<f64>, lower: f64, upper: f64) -> ProgramResult<Self> {
        if !q.is_square() || q.nrows() != b.len() {
            return Err(ProgramError::DimensionMismatch {
                what: "quadratic constraint size",
                expected: b.len(),
                actual: q.nrows(),
            });
        }
        Ok(QuadraticConstraint {
            q,
            b,
            bounds: ConstraintBounds::new(
                DVector::from_element(1, lower),
                DVector::from_element(1, upper),
            )?,
        })
    }
}

impl Constraint for QuadraticConstraint {
    fn num_outputs(&self) -> usize {
        1
    }

    fn num_vars(&self) -> usize {
        self.b.len()
    }

    fn bounds(&self) -> &ConstraintBounds {
        &self.bounds
    }

    fn eval(&mut self, x: &DVector<f64>) -> ConstraintResult<DVector<f64>> {
        check_input_size(self.b.len(), x.len())?;
        Ok(DVector::from_element(1, x.dot(&(&self.q * x)) + self.b.dot(x)))
    }

    fn eval_autodiff(&mut self, x: &[AutoDiff]) -> ConstraintResult<Vec<AutoDiff>> {
        check_input_size(self.b.len(), x.len())?;
        let n = x.len();
        let mut y = AutoDiff::constant(0.0);
        for i in 0..n {
            y = y + AutoDiff::constant(self.b[i]) * x[i].clone();
            for j in 0..n {
                if self.q[(i, j)] != 0.0 {
                    y = y + AutoDiff::constant(self.q[(i, j)]) * x[i].clone() * x[j].clone();
                }
            }
        }
        Ok(vec![y])
    }

    fn eval_symbolic(&mut self, x: &[Variable]) -> ConstraintResult<Vec<Expression>> {
        check_input_size(self.b.len(), x.len())?;
        let n = x.len();
        let mut y = Expression::from(0.0);
        for i in 0..n {
            y = y + Expression::from(self.b[i]) * Expression::from(&x[i]);
            for j in 0..n {
                if self.q[(i, j)] != 0.0 {
                    y = y + Expression::from(self.q[(i, j)])
                        * Expression::from(&x[i])
                        * Expression::from(&x[j]);
                }
            }
        }
        Ok(vec![y])
    }

    fn update_upper_bound(&mut self, upper: DVector<f64>) -> ConstraintResult<()> {
        self.bounds.set_upper(upper)
    }

    fn eval_with_jacobian(
        &mut self,
        x: &DVector<f64>,
    ) -> ConstraintResult<(DVector<f64>, DMatrix<f64>)> {
        let y = self.eval(x)?;
        let grad = (&self.q + self.q.transpose()) * x + &self.b;
        Ok((y, DMatrix::from_row_slice(1, grad.len(), grad.as_slice())))
    }
}

/// `0.5 xᵀ Q x + bᵀ x + c`.
#[derive(Clone, Debug)]
pub struct QuadraticCost {
    q: DMatrix<f64>,
    b: DVector<f64>,
    c: f64,
}

impl QuadraticCost {
    pub fn new(q: DMatrix<f64>, b: DVector<f64>, c: f64) -> ProgramResult<Self> {
        if !q.is_square() || q.nrows() != b.len() {
            return Err(ProgramError::DimensionMismatch {
                what: "quadratic cost size",
                expected: b.len(),
                actual: q.nrows(),
            });
        }
        Ok(QuadraticCost { q, b, c })
    }

    pub fn eval(&self, x: &DVector<f64>) -> f64 {
        0.5 * x.dot(&(&self.q * x)) + self.b.dot(x) + self.c
    }

    pub fn gradient(&self, x: &DVector<f64>) -> DVector<f64> {
        (&self.q + self.q.transpose()) * x * 0.5 + &self.b
    }
}

/// An evaluator together with the decision variables it reads.
#[derive(Clone, Debug)]
pub struct Binding<C> {
    evaluator: C,
    variables: Vec<Variable>,
    indices: SmallVec<[usize; 16]>,
}

impl<C> Binding<C> {
    pub fn evaluator(&self) -> &C {
        &self.evaluator
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }
}

/// Refers to a linear constraint of the program it was returned by.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LinearConstraintHandle(usize);

/// Refers to a generic constraint of the program it was returned by.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConstraintHandle(usize);

/// All constraint outputs of a program stacked into one vector.
#[derive(Clone, Debug)]
pub struct EvaluatedConstraints {
    pub values: DVector<f64>,
    pub lower: DVector<f64>,
    pub upper: DVector<f64>,
    /// `values.len() x num_vars`; present when requested.
    pub jacobian: Option<DMatrix<f64>>,
}

impl EvaluatedConstraints {
    /// The largest bound violation over all rows.
    pub fn max_violation(&self) -> f64 {
        let mut worst: f64 = 0.0;
        for i in 0..self.values.len() {
            let v = self.values[i];
            if !v.is_finite() {
                return f64::INFINITY;
            }
            worst = worst.max(self.lower[i] - v).max(v - self.upper[i]);
        }
        worst
    }
}

/// A nonlinear program over continuous decision variables.
pub struct MathematicalProgram {
    decision_variables: Vec<Variable>,
    variable_index: HashMap<usize, usize>,
    initial_guess: DVector<f64>,
    quadratic_costs: Vec<Binding<QuadraticCost>>,
    linear_constraints: Vec<Binding<LinearConstraint>>,
    generic_constraints: Vec<Binding<Box<dyn Constraint>>>,
}

impl MathematicalProgram {
    pub fn new() -> Self {
        MathematicalProgram {
            decision_variables: Vec::new(),
            variable_index: HashMap::new(),
            initial_guess: DVector::zeros(0),
            quadratic_costs: Vec::new(),
            linear_constraints: Vec::new(),
            generic_constraints: Vec::new(),
        }
    }

    /// Creates `n` variables named `name(0)`, `name(1)`, ...
    pub fn new_continuous_variables(&mut self, n: usize, name: &str) -> Vec<Variable> {
        let vars: Vec<Variable> = (0..n)
            .map(|i| Variable::new(&format!("{}({})", name, i)))
            .collect();
        for v in vars.iter() {
            self.variable_index.insert(v.id(), self.decision_variables.len());
            self.decision_variables.push(v.clone());
        }
        let old = self.initial_guess.len();
        self.initial_guess = self.initial_guess.clone().resize_vertically(old + n, f64::NAN);
        vars
    }

    pub fn num_vars(&self) -> usize {
        self.decision_variables.len()
    }

    pub fn decision_variables(&self) -> &[Variable] {
        &self.decision_variables
    }

    pub fn find_variable_index(&self, var: &Variable) -> ProgramResult<usize> {
        self.variable_index
            .get(&var.id())
            .cloned()
            .ok_or_else(|| ProgramError::UnknownVariable(var.name().to_string()))
    }

    fn indices(&self, vars: &[Variable]) -> ProgramResult<SmallVec<[usize; 16]>> {
        vars.iter().map(|v| self.find_variable_index(v)).collect()
    }

    fn bind<C>(&self, evaluator: C, vars: &[Variable]) -> ProgramResult<Binding<C>> {
        Ok(Binding {
            evaluator,
            variables: vars.to_vec(),
            indices: self.indices(vars)?,
        })
    }

    /// Adds `0.5 xᵀ Q x + bᵀ x + c` over `vars`.
    pub fn add_quadratic_cost(
        &mut self,
        q: DMatrix<f64>,
        b: DVector<f64>,
        c: f64,
        vars: &[Variable],
    ) -> ProgramResult<()> {
        let cost = QuadraticCost::new(q, b, c)?;
        check_var_count("quadratic cost variables", cost.b.len(), vars.len())?;
        let binding = self.bind(cost, vars)?;
        self.quadratic_costs.push(binding);
        Ok(())
    }

    /// Adds `(x - x_desired)ᵀ Q (x - x_desired)` over `vars`.
    pub fn add_quadratic_error_cost(
        &mut self,
        q: &DMatrix<f64>,
        x_desired: &DVector<f64>,
        vars: &[Variable],
    ) -> ProgramResult<()> {
        if q.nrows() != x_desired.len() {
            return Err(ProgramError::DimensionMismatch {
                what: "quadratic error cost size",
                expected: x_desired.len(),
                actual: q.nrows(),
            });
        }
        let q_sym = q + q.transpose();
        let b = -(&q_sym * x_desired);
        let c = x_desired.dot(&(q * x_desired));
        self.add_quadratic_cost(q_sym, b, c, vars)
    }

    /// Adds `lb <= A x <= ub` over `vars`.
    pub fn add_linear_constraint(
        &mut self,
        a: DMatrix<f64>,
        lower: DVector<f64>,
        upper: DVector<f64>,
        vars: &[Variable],
    ) -> ProgramResult<LinearConstraintHandle> {
        check_var_count("linear constraint columns", a.ncols(), vars.len())?;
        let binding = self.bind(LinearConstraint::new(a, lower, upper)?, vars)?;
        self.linear_constraints.push(binding);
        Ok(LinearConstraintHandle(self.linear_constraints.len() - 1))
    }

    /// Adds `A x = b` over `vars`.
    pub fn add_linear_equality_constraint(
        &mut self,
        a: DMatrix<f64>,
        b: DVector<f64>,
        vars: &[Variable],
    ) -> ProgramResult<LinearConstraintHandle> {
        self.add_linear_constraint(a, b.clone(), b, vars)
    }

    /// Adds `lb <= x <= ub` over `vars`.
    pub fn add_bounding_box_constraint(
        &mut self,
        lower: DVector<f64>,
        upper: DVector<f64>,
        vars: &[Variable],
    ) -> ProgramResult<LinearConstraintHandle> {
        let n = vars.len();
        self.add_linear_constraint(DMatrix::identity(n, n), lower, upper, vars)
    }

    /// Adds `lb <= xᵀ Q x + bᵀ x <= ub` over `vars`.
    pub fn add_quadratic_constraint(
        &mut self,
        q: DMatrix<f64>,
        b: DVector<f64>,
        lower: f64,
        upper: f64,
        vars: &[Variable],
    ) -> ProgramResult<ConstraintHandle> {
        let constraint = QuadraticConstraint::new(q, b, lower, upper)?;
        self.add_constraint(Box::new(constraint), vars)
    }

    /// Adds an arbitrary constraint over `vars`.
    pub fn add_constraint(
        &mut self,
        constraint: Box<dyn Constraint>,
        vars: &[Variable],
    ) -> ProgramResult<ConstraintHandle> {
        check_var_count("constraint variables", constraint.num_vars(), vars.len())?;
        let binding = self.bind(constraint, vars)?;
        self.generic_constraints.push(binding);
        Ok(ConstraintHandle(self.generic_constraints.len() - 1))
    }

    pub fn linear_constraint(
        &self,
        handle: LinearConstraintHandle,
    ) -> ProgramResult<&Binding<LinearConstraint>> {
        self.linear_constraints
            .get(handle.0)
            .ok_or(ProgramError::InvalidHandle(handle.0))
    }

    /// Replaces the coefficients of a linear constraint in place. Costs,
    /// variables and every other constraint are untouched.
    pub fn update_linear_constraint(
        &mut self,
        handle: LinearConstraintHandle,
        a: DMatrix<f64>,
        lower: DVector<f64>,
        upper: DVector<f64>,
    ) -> ProgramResult<()> {
        let binding = self
            .linear_constraints
            .get_mut(handle.0)
            .ok_or(ProgramError::InvalidHandle(handle.0))?;
        binding.evaluator.update_coefficients(a, lower, upper)?;
        trace!(rows = binding.evaluator.num_outputs(), "updated linear constraint");
        Ok(())
    }

    pub fn constraint_mut(
        &mut self,
        handle: ConstraintHandle,
    ) -> ProgramResult<&mut dyn Constraint> {
        match self.generic_constraints.get_mut(handle.0) {
            Some(binding) => Ok(binding.evaluator.as_mut()),
            None => Err(ProgramError::InvalidHandle(handle.0)),
        }
    }

    pub fn initial_guess(&self) -> &DVector<f64> {
        &self.initial_guess
    }

    pub fn set_initial_guess(
        &mut self,
        vars: &[Variable],
        values: &DVector<f64>,
    ) -> ProgramResult<()> {
        check_var_count("initial guess length", vars.len(), values.len())?;
        let indices = self.indices(vars)?;
        for (k, &i) in indices.iter().enumerate() {
            self.initial_guess[i] = values[k];
        }
        Ok(())
    }

    /// Total cost at `x`.
    pub fn eval_cost(&self, x: &DVector<f64>) -> f64 {
        self.quadratic_costs
            .iter()
            .map(|b| b.evaluator.eval(&gather(&b.indices, x)))
            .sum()
    }

    /// Gradient of the total cost at `x`.
    pub fn eval_cost_gradient(&self, x: &DVector<f64>) -> DVector<f64> {
        let mut grad = DVector::zeros(self.num_vars());
        for b in self.quadratic_costs.iter() {
            let local = b.evaluator.gradient(&gather(&b.indices, x));
            for (c, &k) in b.indices.iter().enumerate() {
                grad[k] += local[c];
            }
        }
        grad
    }

    /// Evaluates every constraint at `x` and stacks the results, linear
    /// constraints first.
    pub fn eval_constraints(
        &mut self,
        x: &DVector<f64>,
        with_jacobian: bool,
    ) -> ConstraintResult<EvaluatedConstraints> {
        let rows: usize = self
            .linear_constraints
            .iter()
            .map(|b| b.evaluator.num_outputs())
            .chain(self.generic_constraints.iter().map(|b| b.evaluator.num_outputs()))
            .sum();
        let mut out = EvaluatedConstraints {
            values: DVector::zeros(rows),
            lower: DVector::zeros(rows),
            upper: DVector::zeros(rows),
            jacobian: if with_jacobian {
                Some(DMatrix::zeros(rows, self.num_vars()))
            } else {
                None
            },
        };
        let mut row = 0;
        for b in self.linear_constraints.iter_mut() {
            row = stack_rows(&mut b.evaluator, &b.indices, x, &mut out, row)?;
        }
        for b in self.generic_constraints.iter_mut() {
            row = stack_rows(b.evaluator.as_mut(), &b.indices, x, &mut out, row)?;
        }
        Ok(out)
    }

    /// True if every constraint holds at `x` within `tol`.
    pub fn check_satisfied(&mut self, x: &DVector<f64>, tol: f64) -> ConstraintResult<bool> {
        Ok(self.eval_constraints(x, false)?.max_violation() <= tol)
    }
}

impl Default for MathematicalProgram {
    fn default() -> Self {
        MathematicalProgram::new()
    }
}

fn gather(indices: &[usize], x: &DVector<f64>) -> DVector<f64> {
    DVector::from_iterator(indices.len(), indices.iter().map(|&i| x[i]))
}

/// Evaluates one bound constraint and writes its rows into `out` starting at
/// `row`. Returns the next free row.
fn stack_rows(
    constraint: &mut dyn Constraint,
    indices: &[usize],
    x: &DVector<f64>,
    out: &mut EvaluatedConstraints,
    row: usize,
) -> ConstraintResult<usize> {
    let xb = gather(indices, x);
    let y = match out.jacobian.as_mut() {
        Some(full) => {
            let (y, local) = constraint.eval_with_jacobian(&xb)?;
            for r in 0..local.nrows() {
                for (c, &k) in indices.iter().enumerate() {
                    full[(row + r, k)] += local[(r, c)];
                }
            }
            y
        }
        None => constraint.eval(&xb)?,
    };
    let m = y.len();
    out.values.rows_mut(row, m).copy_from(&y);
    out.lower.rows_mut(row, m).copy_from(constraint.lower_bound());
    out.upper.rows_mut(row, m).copy_from(constraint.upper_bound());
    Ok(row + m)
}

fn check_var_count(what: &'static str, expected: usize, actual: usize) -> ProgramResult<()> {
    if expected != actual {
        Err(ProgramError::DimensionMismatch {
            what,
            expected,
            actual,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    mod program {
        use approx::assert_abs_diff_eq;
        use nalgebra::{DMatrix, DVector};

        use crate::autodiff;
        use crate::error::ProgramError;
        use crate::program::*;
        use crate::symbolic::{Environment, Variable};

        #[test]
        fn test_quadratic_error_cost() {
            let mut prog = MathematicalProgram::new();
            let x = prog.new_continuous_variables(2, "x");
            let q = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 4.0]));
            let xd = DVector::from_vec(vec![1.0, -1.0]);
            prog.add_quadratic_error_cost(&q, &xd, &x).unwrap();

            assert_abs_diff_eq!(prog.eval_cost(&xd), 0.0, epsilon = 1e-12);
            let p = DVector::from_vec(vec![2.0, 0.0]);
            assert_abs_diff_eq!(prog.eval_cost(&p), 1.0 + 4.0, epsilon = 1e-12);
            let g = prog.eval_cost_gradient(&p);
            assert_abs_diff_eq!(g[0], 2.0, epsilon = 1e-12);
            assert_abs_diff_eq!(g[1], 8.0, epsilon = 1e-12);
        }

        #[test]
        fn test_update_linear_constraint() {
            let mut prog = MathematicalProgram::new();
            let x = prog.new_continuous_variables(2, "x");
            let a = DMatrix::from_row_slice(1, 2, &[1.0, 1.0]);
            let handle = prog
                .add_linear_constraint(a, DVector::from_element(1, f64::NEG_INFINITY),
                                       DVector::from_element(1, 1.0), &x)
                .unwrap();
            let p = DVector::from_vec(vec![0.75, 0.75]);
            assert!(!prog.check_satisfied(&p, 1e-9).unwrap());

            let a = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
            prog.update_linear_constraint(
                handle,
                a,
                DVector::from_element(2, f64::NEG_INFINITY),
                DVector::from_element(2, 1.0),
            )
            .unwrap();
            assert!(prog.check_satisfied(&p, 1e-9).unwrap());
            assert_eq!(prog.linear_constraint(handle).unwrap().evaluator().num_outputs(), 2);

            let wrong = DMatrix::from_row_slice(1, 3, &[1.0, 0.0, 0.0]);
            assert!(matches!(
                prog.update_linear_constraint(handle, wrong, DVector::from_element(1, 0.0),
                                              DVector::from_element(1, 0.0)),
                Err(ProgramError::DimensionMismatch { .. })
            ));
        }

        #[test]
        fn test_unknown_variable_and_inverted_bounds() {
            let mut prog = MathematicalProgram::new();
            let x = prog.new_continuous_variables(1, "x");
            let stranger = Variable::new("y");
            assert_eq!(
                prog.add_bounding_box_constraint(DVector::from_element(1, 0.0),
                                                 DVector::from_element(1, 1.0), &[stranger]),
                Err(ProgramError::UnknownVariable("y".to_string()))
            );
            assert!(matches!(
                prog.add_bounding_box_constraint(DVector::from_element(1, 2.0),
                                                 DVector::from_element(1, 1.0), &x),
                Err(ProgramError::InvertedBounds { row: 0, .. })
            ));
        }

        #[test]
        fn test_stacked_jacobian() {
            let mut prog = MathematicalProgram::new();
            let x = prog.new_continuous_variables(3, "x");
            prog.add_linear_equality_constraint(
                DMatrix::from_row_slice(1, 2, &[2.0, -1.0]),
                DVector::from_element(1, 0.0),
                &[x[2].clone(), x[0].clone()],
            )
            .unwrap();
            prog.add_quadratic_constraint(
                DMatrix::identity(2, 2),
                DVector::zeros(2),
                f64::NEG_INFINITY,
                1.0,
                &x[..2],
            )
            .unwrap();
            let p = DVector::from_vec(vec![1.0, 2.0, 3.0]);
            let out = prog.eval_constraints(&p, true).unwrap();
            assert_abs_diff_eq!(out.values[0], 6.0 - 1.0);
            assert_abs_diff_eq!(out.values[1], 5.0);
            let j = out.jacobian.as_ref().unwrap();
            assert_abs_diff_eq!(j[(0, 0)], -1.0);
            assert_abs_diff_eq!(j[(0, 2)], 2.0);
            assert_abs_diff_eq!(j[(1, 0)], 2.0);
            assert_abs_diff_eq!(j[(1, 1)], 4.0);
            assert_abs_diff_eq!(out.max_violation(), 5.0, epsilon = 1e-12);
        }

        #[test]
        fn test_quadratic_constraint_modes_agree() {
            let q = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 2.0]);
            let b = DVector::from_vec(vec![1.0, -1.0]);
            let mut c = QuadraticConstraint::new(q, b, 0.0, 1.0).unwrap();
            let x = DVector::from_vec(vec![0.3, -0.7]);
            let (y, jac) = c.eval_with_jacobian(&x).unwrap();
            assert_eq!(jac.shape(), (1, 2));
            let ad = c.eval_autodiff(&autodiff::initialize(&x)).unwrap();
            assert_abs_diff_eq!(ad[0].value, y[0], epsilon = 1e-12);
            assert_abs_diff_eq!(ad[0].derivatives[0], jac[(0, 0)], epsilon = 1e-12);
            assert_abs_diff_eq!(ad[0].derivatives[1], jac[(0, 1)], epsilon = 1e-12);

            let vars = vec![Variable::new("a"), Variable::new("b")];
            let e = c.eval_symbolic(&vars).unwrap();
            let env: Environment = vars.iter().cloned().zip(x.iter().cloned()).collect();
            assert_abs_diff_eq!(e[0].evaluate(&env).unwrap(), y[0], epsilon = 1e-12);
        }
    }
}

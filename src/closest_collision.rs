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

//! The closest-collision search: find the configuration nearest to an
//! ellipsoid center, inside a polytope, at which two obstacle sets touch.
//!
//! Decision variables are `q`, a point `p_AA` of obstacle A (in frame A) and
//! a point `p_BB` of obstacle B (in frame B). The program is
//!
//! ```text
//! min   (q - d)ᵀ CᵀC (q - d) / sqrt(λmax λmin)
//! s.t.  A q <= b
//!       p_AA in set A,  p_BB in set B
//!       collision constraint on [q, p_AA, p_BB]
//! ```
//!
//! where `λmax`, `λmin` are the extreme eigenvalues of `CᵀC`. The polytope
//! is the only part that changes between solves.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, info, warn};

use crate::convex_set::{ConvexSet, Hyperellipsoid};
use crate::error::{CollisionSearchError, CollisionSearchResult, ConstraintError};
use crate::ids::FrameId;
use crate::kinematics::Kinematics;
use crate::program::{ConstraintHandle, LinearConstraintHandle, MathematicalProgram};
use crate::same_point::CollisionConstraint;
use crate::solver::{SolutionStatus, SolverInterface, SolverOptions};
use crate::symbolic::Variable;

/// Eigenvalue ratio below which the ellipsoid is treated as singular.
const SINGULAR_RATIO: f64 = 1e-12;

pub struct ClosestCollisionProgram {
    prog: MathematicalProgram,
    q: Vec<Variable>,
    p_aa: Vec<Variable>,
    p_bb: Vec<Variable>,
    polytope: LinearConstraintHandle,
    collision: ConstraintHandle,
    bounded_distance: bool,
    last_solution: Option<DVector<f64>>,
}

impl ClosestCollisionProgram {
    /// Builds the program. `set_a` must be expressed in `frame_a` and `set_b`
    /// in `frame_b`; the polytope is `{q | a q <= b}`.
    #[allow(clippy::too_many_arguments)]
    pub fn new<K: Kinematics + 'static>(
        mut constraint: CollisionConstraint<K>,
        frame_a: FrameId,
        frame_b: FrameId,
        set_a: &ConvexSet,
        set_b: &ConvexSet,
        ellipsoid: &Hyperellipsoid,
        a: DMatrix<f64>,
        b: DVector<f64>,
    ) -> CollisionSearchResult<Self> {
        let n = constraint.num_positions();
        check_dim("ellipsoid dimension", n, ellipsoid.center().len())?;
        check_dim("ellipsoid rows", n, ellipsoid.a().nrows())?;
        check_dim("polytope columns", n, a.ncols())?;
        check_dim("obstacle A dimension", 3, set_a.ambient_dimension())?;
        check_dim("obstacle B dimension", 3, set_b.ambient_dimension())?;

        let ata = ellipsoid.a().transpose() * ellipsoid.a();
        let eigenvalues = ata.symmetric_eigenvalues();
        let (lambda_min, lambda_max) = (eigenvalues.min(), eigenvalues.max());
        if !(lambda_min.is_finite() && lambda_max.is_finite())
            || lambda_min <= SINGULAR_RATIO * lambda_max
        {
            return Err(CollisionSearchError::SingularEllipsoid);
        }

        let mut prog = MathematicalProgram::new();
        let q = prog.new_continuous_variables(n, "q");
        let weight = ata / (lambda_max * lambda_min).sqrt();
        prog.add_quadratic_error_cost(&weight, ellipsoid.center(), &q)?;
        let polytope = prog.add_linear_constraint(
            a,
            DVector::from_element(b.len(), f64::NEG_INFINITY),
            b,
            &q,
        )?;
        prog.set_initial_guess(&q, ellipsoid.center())?;

        let p_aa = prog.new_continuous_variables(3, "p_AA");
        let p_bb = prog.new_continuous_variables(3, "p_BB");
        set_a.add_point_in_set_constraints(&mut prog, &p_aa)?;
        set_b.add_point_in_set_constraints(&mut prog, &p_bb)?;
        if let Some(p) = set_a.maybe_get_point()? {
            prog.set_initial_guess(&p_aa, &p)?;
        }
        if let Some(p) = set_b.maybe_get_point()? {
            prog.set_initial_guess(&p_bb, &p)?;
        }

        constraint.set_frame_a(frame_a);
        constraint.set_frame_b(frame_b);
        let bounded_distance = matches!(constraint, CollisionConstraint::BoundedDistance(_));
        let vars: Vec<Variable> = q.iter().chain(p_aa.iter()).chain(p_bb.iter()).cloned().collect();
        let collision = prog.add_constraint(constraint.into_boxed(), &vars)?;
        debug!(positions = n, variables = prog.num_vars(), "built closest-collision program");

        Ok(ClosestCollisionProgram {
            prog,
            q,
            p_aa,
            p_bb,
            polytope,
            collision,
            bounded_distance,
            last_solution: None,
        })
    }

    pub fn program(&self) -> &MathematicalProgram {
        &self.prog
    }

    pub fn num_positions(&self) -> usize {
        self.q.len()
    }

    /// Replaces the polytope with `{q | a q <= b}`. Nothing else is rebuilt.
    pub fn update_polytope(
        &mut self,
        a: DMatrix<f64>,
        b: DVector<f64>,
    ) -> CollisionSearchResult<()> {
        let rows = b.len();
        let lower = DVector::from_element(rows, f64::NEG_INFINITY);
        self.prog.update_linear_constraint(self.polytope, a, lower, b)?;
        debug!(rows, "updated polytope");
        Ok(())
    }

    /// Changes the margin of a bounded-distance program.
    pub fn set_max_distance(&mut self, max_distance: f64) -> CollisionSearchResult<()> {
        if !self.bounded_distance {
            return Err(CollisionSearchError::NotBoundedDistance);
        }
        if !(max_distance.is_finite() && max_distance >= 0.0) {
            return Err(ConstraintError::InvalidMaxDistance(max_distance).into());
        }
        self.prog
            .constraint_mut(self.collision)?
            .update_upper_bound(DVector::from_element(1, max_distance * max_distance))?;
        Ok(())
    }

    /// Searches for a colliding configuration inside the polytope.
    ///
    /// Returns `Ok(Some(q))` if one was found and `Ok(None)` if the program
    /// is infeasible. Any other solver outcome is an error.
    pub fn solve(
        &mut self,
        solver: &dyn SolverInterface,
        q_guess: Option<&DVector<f64>>,
        options: Option<&SolverOptions>,
    ) -> CollisionSearchResult<Option<DVector<f64>>> {
        let mut x0 = self.prog.initial_guess().clone();
        if let Some(guess) = q_guess {
            check_dim("configuration guess", self.q.len(), guess.len())?;
            for (var, value) in self.q.iter().zip(guess.iter()) {
                x0[self.prog.find_variable_index(var)?] = *value;
            }
        }

        self.last_solution = None;
        let result = solver.solve(&mut self.prog, Some(&x0), options)?;
        match result.status {
            SolutionStatus::Solved => {
                let q = self.gather(&result.x, &self.q)?;
                info!(cost = result.cost, iterations = result.iterations, "found a collision");
                self.last_solution = Some(result.x);
                Ok(Some(q))
            }
            SolutionStatus::InfeasibleConstraints => {
                info!(iterations = result.iterations, "no collision in the region");
                Ok(None)
            }
            status => {
                warn!(solver = result.solver_name, ?status, "closest-collision solve failed");
                Err(CollisionSearchError::SolverFailure {
                    solver: result.solver_name,
                    status,
                })
            }
        }
    }

    /// `(p_AA, p_BB)` from the last successful solve.
    pub fn last_witness_points(&self) -> Option<(DVector<f64>, DVector<f64>)> {
        let x = self.last_solution.as_ref()?;
        let p_aa = self.gather(x, &self.p_aa).ok()?;
        let p_bb = self.gather(x, &self.p_bb).ok()?;
        Some((p_aa, p_bb))
    }

    fn gather(&self, x: &DVector<f64>, vars: &[Variable]) -> CollisionSearchResult<DVector<f64>> {
        let mut out = DVector::zeros(vars.len());
        for (i, var) in vars.iter().enumerate() {
            out[i] = x[self.prog.find_variable_index(var)?];
        }
        Ok(out)
    }
}

fn check_dim(what: &'static str, expected: usize, actual: usize) -> CollisionSearchResult<()> {
    if expected != actual {
        Err(CollisionSearchError::DimensionMismatch {
            what,
            expected,
            actual,
        })
    } else {
        Ok(())
    }
}

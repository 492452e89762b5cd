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

//! Convex sets in n-dimensional space and their membership constraints.
//!
//! A set can be queried for membership directly and can add "x is in me"
//! constraints to a `MathematicalProgram`. Some representations need
//! auxiliary decision variables to do so; those are returned to the caller.

use nalgebra::{DMatrix, DVector};

use crate::error::{ConvexSetError, ConvexSetResult};
use crate::program::MathematicalProgram;
use crate::solver::{AugmentedLagrangianSolver, SolutionStatus, SolverInterface, SolverOptions};
use crate::symbolic::Variable;

/// `{x | A x <= b}`.
#[derive(Clone, Debug, PartialEq)]
pub struct HPolyhedron {
    a: DMatrix<f64>,
    b: DVector<f64>,
}

impl HPolyhedron {
    pub fn new(a: DMatrix<f64>, b: DVector<f64>) -> ConvexSetResult<Self> {
        check_dim("H-polyhedron rows", a.nrows(), b.len())?;
        Ok(HPolyhedron { a, b })
    }

    /// The axis aligned box `lb <= x <= ub`.
    pub fn make_box(lb: &DVector<f64>, ub: &DVector<f64>) -> ConvexSetResult<Self> {
        check_dim("box bounds", lb.len(), ub.len())?;
        let n = lb.len();
        let eye = DMatrix::<f64>::identity(n, n);
        let mut a = DMatrix::zeros(2 * n, n);
        a.rows_mut(0, n).copy_from(&eye);
        a.rows_mut(n, n).copy_from(&(-eye));
        let mut b = DVector::zeros(2 * n);
        b.rows_mut(0, n).copy_from(ub);
        b.rows_mut(n, n).copy_from(&(-lb));
        HPolyhedron::new(a, b)
    }

    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn b(&self) -> &DVector<f64> {
        &self.b
    }
}

/// `{x | |A (x - center)| <= 1}`.
#[derive(Clone, Debug, PartialEq)]
pub struct Hyperellipsoid {
    a: DMatrix<f64>,
    center: DVector<f64>,
}

impl Hyperellipsoid {
    /// `a` must be square with finite entries.
    pub fn new(a: DMatrix<f64>, center: DVector<f64>) -> ConvexSetResult<Self> {
        check_dim("hyperellipsoid columns", center.len(), a.ncols())?;
        check_dim("hyperellipsoid rows", a.ncols(), a.nrows())?;
        if a.iter().chain(center.iter()).any(|v| !v.is_finite()) {
            return Err(ConvexSetError::MalformedShape {
                kind: "Hyperellipsoid",
                reason: "entries must be finite".to_string(),
            });
        }
        Ok(Hyperellipsoid { a, center })
    }

    pub fn make_hypersphere(radius: f64, center: DVector<f64>) -> ConvexSetResult<Self> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(ConvexSetError::MalformedShape {
                kind: "Hypersphere",
                reason: format!("radius must be positive and finite, got {}", radius),
            });
        }
        let n = center.len();
        Hyperellipsoid::new(DMatrix::identity(n, n) / radius, center)
    }

    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn center(&self) -> &DVector<f64> {
        &self.center
    }
}

/// The convex hull of the columns of a matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct VPolytope {
    vertices: DMatrix<f64>,
}

impl VPolytope {
    /// Duplicate columns are dropped.
    pub fn new(vertices: DMatrix<f64>) -> ConvexSetResult<Self> {
        if vertices.ncols() == 0 {
            return Err(ConvexSetError::DimensionMismatch {
                what: "V-polytope vertex count",
                expected: 1,
                actual: 0,
            });
        }
        let mut unique: Vec<DVector<f64>> = Vec::with_capacity(vertices.ncols());
        for col in vertices.column_iter() {
            let v = col.into_owned();
            if !unique.iter().any(|u| (u - &v).amax() <= 1e-12) {
                unique.push(v);
            }
        }
        Ok(VPolytope {
            vertices: DMatrix::from_columns(&unique),
        })
    }

    pub fn vertices(&self) -> &DMatrix<f64> {
        &self.vertices
    }
}

/// `{x_1 + x_2 + ... | x_k in S_k}`.
#[derive(Clone, Debug, PartialEq)]
pub struct MinkowskiSum {
    sets: Vec<ConvexSet>,
}

impl MinkowskiSum {
    pub fn new(sets: Vec<ConvexSet>) -> ConvexSetResult<Self> {
        let n = match sets.first() {
            Some(s) => s.ambient_dimension(),
            None => {
                return Err(ConvexSetError::DimensionMismatch {
                    what: "Minkowski sum operand count",
                    expected: 1,
                    actual: 0,
                })
            }
        };
        for s in sets.iter() {
            check_dim("Minkowski sum operand dimension", n, s.ambient_dimension())?;
        }
        Ok(MinkowskiSum { sets })
    }

    pub fn sets(&self) -> &[ConvexSet] {
        &self.sets
    }
}

/// `{x | A x + b in S_1 x S_2 x ...}`.
#[derive(Clone, Debug, PartialEq)]
pub struct CartesianProduct {
    sets: Vec<ConvexSet>,
    a: DMatrix<f64>,
    b: DVector<f64>,
}

impl CartesianProduct {
    pub fn new(sets: Vec<ConvexSet>, a: DMatrix<f64>, b: DVector<f64>) -> ConvexSetResult<Self> {
        let total: usize = sets.iter().map(|s| s.ambient_dimension()).sum();
        check_dim("Cartesian product rows", total, a.nrows())?;
        check_dim("Cartesian product offset", total, b.len())?;
        Ok(CartesianProduct { sets, a, b })
    }

    pub fn sets(&self) -> &[ConvexSet] {
        &self.sets
    }

    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn b(&self) -> &DVector<f64> {
        &self.b
    }
}

/// The convex set representations an obstacle can be converted into.
#[derive(Clone, Debug, PartialEq)]
pub enum ConvexSet {
    HPolyhedron(HPolyhedron),
    Hyperellipsoid(Hyperellipsoid),
    VPolytope(VPolytope),
    MinkowskiSum(MinkowskiSum),
    CartesianProduct(CartesianProduct),
}

impl ConvexSet {
    pub fn ambient_dimension(&self) -> usize {
        match self {
            ConvexSet::HPolyhedron(s) => s.a.ncols(),
            ConvexSet::Hyperellipsoid(s) => s.center.len(),
            ConvexSet::VPolytope(s) => s.vertices.nrows(),
            ConvexSet::MinkowskiSum(s) => s.sets[0].ambient_dimension(),
            ConvexSet::CartesianProduct(s) => s.a.ncols(),
        }
    }

    /// Constrains `vars` to lie in this set. Returns the auxiliary variables
    /// that were created along the way.
    pub fn add_point_in_set_constraints(
        &self,
        prog: &mut MathematicalProgram,
        vars: &[Variable],
    ) -> ConvexSetResult<Vec<Variable>> {
        let n = self.ambient_dimension();
        check_dim("point-in-set variables", n, vars.len())?;
        match self {
            ConvexSet::HPolyhedron(s) => {
                let lower = DVector::from_element(s.b.len(), f64::NEG_INFINITY);
                prog.add_linear_constraint(s.a.clone(), lower, s.b.clone(), vars)?;
                Ok(Vec::new())
            }
            ConvexSet::Hyperellipsoid(s) => {
                // (x - c)ᵀ AᵀA (x - c) <= 1
                let q = s.a.transpose() * &s.a;
                let qc = &q * &s.center;
                let upper = 1.0 - s.center.dot(&qc);
                prog.add_quadratic_constraint(q, -qc * 2.0, f64::NEG_INFINITY, upper, vars)?;
                Ok(Vec::new())
            }
            ConvexSet::VPolytope(s) => {
                // x = V λ, λ >= 0, Σλ = 1
                let m = s.vertices.ncols();
                let lambda = prog.new_continuous_variables(m, "lambda");
                let mut a = DMatrix::zeros(n, n + m);
                a.columns_mut(0, n).copy_from(&DMatrix::identity(n, n));
                a.columns_mut(n, m).copy_from(&(-&s.vertices));
                let all: Vec<Variable> = vars.iter().chain(lambda.iter()).cloned().collect();
                prog.add_linear_equality_constraint(a, DVector::zeros(n), &all)?;
                prog.add_linear_equality_constraint(
                    DMatrix::from_element(1, m, 1.0),
                    DVector::from_element(1, 1.0),
                    &lambda,
                )?;
                prog.add_bounding_box_constraint(
                    DVector::zeros(m),
                    DVector::from_element(m, f64::INFINITY),
                    &lambda,
                )?;
                Ok(lambda)
            }
            ConvexSet::MinkowskiSum(s) => {
                // x = Σ y_k, y_k in S_k
                let mut aux = Vec::new();
                let mut all: Vec<Variable> = vars.to_vec();
                for (k, set) in s.sets.iter().enumerate() {
                    let y = prog.new_continuous_variables(n, &format!("y{}", k));
                    aux.extend(set.add_point_in_set_constraints(prog, &y)?);
                    all.extend(y.iter().cloned());
                    aux.extend(y);
                }
                let mut a = DMatrix::zeros(n, n * (s.sets.len() + 1));
                a.columns_mut(0, n).copy_from(&DMatrix::identity(n, n));
                for k in 0..s.sets.len() {
                    a.columns_mut(n * (k + 1), n).copy_from(&(-DMatrix::<f64>::identity(n, n)));
                }
                prog.add_linear_equality_constraint(a, DVector::zeros(n), &all)?;
                Ok(aux)
            }
            ConvexSet::CartesianProduct(s) => {
                // y = A x + b, y_k in S_k
                let total = s.b.len();
                let y = prog.new_continuous_variables(total, "y");
                let mut a = DMatrix::zeros(total, n + total);
                a.columns_mut(0, n).copy_from(&(-&s.a));
                a.columns_mut(n, total).copy_from(&DMatrix::identity(total, total));
                let all: Vec<Variable> = vars.iter().chain(y.iter()).cloned().collect();
                prog.add_linear_equality_constraint(a, s.b.clone(), &all)?;
                let mut aux = Vec::new();
                let mut offset = 0;
                for set in s.sets.iter() {
                    let d = set.ambient_dimension();
                    aux.extend(set.add_point_in_set_constraints(prog, &y[offset..offset + d])?);
                    offset += d;
                }
                aux.extend(y);
                Ok(aux)
            }
        }
    }

    /// True if `x` is in the set, allowing a violation of `tol`.
    pub fn point_in_set(&self, x: &DVector<f64>, tol: f64) -> ConvexSetResult<bool> {
        check_dim("point dimension", self.ambient_dimension(), x.len())?;
        match self {
            ConvexSet::HPolyhedron(s) => Ok((&s.a * x - &s.b).iter().all(|v| *v <= tol)),
            ConvexSet::Hyperellipsoid(s) => Ok((&s.a * (x - &s.center)).norm() <= 1.0 + tol),
            ConvexSet::CartesianProduct(s) => {
                let y = &s.a * x + &s.b;
                let mut offset = 0;
                for set in s.sets.iter() {
                    let d = set.ambient_dimension();
                    if !set.point_in_set(&y.rows(offset, d).into_owned(), tol)? {
                        return Ok(false);
                    }
                    offset += d;
                }
                Ok(true)
            }
            ConvexSet::VPolytope(s) => {
                let floor = MEMBERSHIP_FLOOR * (1.0 + s.vertices.amax().max(x.amax()));
                Ok(hull_distance(&s.vertices, x) <= tol.max(floor))
            }
            ConvexSet::MinkowskiSum(_) => {
                let mut prog = MathematicalProgram::new();
                let vars = prog.new_continuous_variables(x.len(), "x");
                prog.add_bounding_box_constraint(x.clone(), x.clone(), &vars)?;
                self.add_point_in_set_constraints(&mut prog, &vars)?;
                let floor = MEMBERSHIP_FLOOR * (1.0 + x.amax());
                let options = SolverOptions {
                    feasibility_tolerance: tol.max(floor),
                    ..SolverOptions::default()
                };
                let result = AugmentedLagrangianSolver::new()
                    .solve(&mut prog, None, Some(&options))?;
                match result.status {
                    SolutionStatus::Solved => Ok(true),
                    SolutionStatus::InfeasibleConstraints => Ok(false),
                    status => Err(ConvexSetError::MembershipUndetermined(status)),
                }
            }
        }
    }

    /// Some point of the set, or None if none could be found.
    pub fn maybe_get_point(&self) -> ConvexSetResult<Option<DVector<f64>>> {
        match self {
            ConvexSet::Hyperellipsoid(s) => Ok(Some(s.center.clone())),
            ConvexSet::VPolytope(s) => {
                let m = s.vertices.ncols() as f64;
                Ok(Some(s.vertices.column_sum() / m))
            }
            ConvexSet::MinkowskiSum(s) => {
                let mut sum = DVector::zeros(self.ambient_dimension());
                for set in s.sets.iter() {
                    match set.maybe_get_point()? {
                        Some(p) => sum += p,
                        None => return Ok(None),
                    }
                }
                Ok(Some(sum))
            }
            ConvexSet::HPolyhedron(_) | ConvexSet::CartesianProduct(_) => {
                let n = self.ambient_dimension();
                let mut prog = MathematicalProgram::new();
                let vars = prog.new_continuous_variables(n, "x");
                self.add_point_in_set_constraints(&mut prog, &vars)?;
                let q = DMatrix::identity(n, n) * 1e-6;
                prog.add_quadratic_cost(q, DVector::zeros(n), 0.0, &vars)?;
                let result = AugmentedLagrangianSolver::new().solve(&mut prog, None, None)?;
                if result.is_success() {
                    Ok(Some(result.x.rows(0, n).into_owned()))
                } else {
                    Ok(None)
                }
            }
        }
    }
}

/// Smallest membership tolerance, relative to the magnitude of the data.
const MEMBERSHIP_FLOOR: f64 = 1e-10;

/// Distance from `x` to the convex hull of the columns of `vertices`.
///
/// Wolfe's nearest point algorithm on the shifted points `v_j - x`: keep a
/// corral of points whose hull holds the current nearest point, add the point
/// most opposed to it, then drop points until the affine minimizer has
/// positive weights.
fn hull_distance(vertices: &DMatrix<f64>, x: &DVector<f64>) -> f64 {
    let points: Vec<DVector<f64>> = vertices.column_iter().map(|c| c - x).collect();
    let eps = 1e-12 * points.iter().map(|p| p.norm_squared()).fold(1.0, f64::max);

    let mut start = 0;
    for (j, p) in points.iter().enumerate() {
        if p.norm_squared() < points[start].norm_squared() {
            start = j;
        }
    }
    let mut corral = vec![start];
    let mut weights = vec![1.0];
    let mut nearest = points[start].clone();

    for _ in 0..10 * (points.len() + x.len()) {
        let mut j = 0;
        let mut lowest = f64::INFINITY;
        for (k, p) in points.iter().enumerate() {
            let d = nearest.dot(p);
            if d < lowest {
                j = k;
                lowest = d;
            }
        }
        if nearest.norm_squared() - lowest <= eps || corral.contains(&j) {
            break;
        }
        corral.push(j);
        weights.push(0.0);

        loop {
            let alpha = match affine_minimizer(&points, &corral) {
                Some(alpha) => alpha,
                None => return nearest.norm(),
            };
            if alpha.iter().all(|a| *a > 0.0) {
                weights = alpha;
                break;
            }
            // Walk towards alpha until the first weight reaches zero.
            let mut theta = 1.0;
            let mut drop = 0;
            for (k, (w, a)) in weights.iter().zip(alpha.iter()).enumerate() {
                if *a <= 0.0 {
                    let t = if w - a > 0.0 { w / (w - a) } else { 0.0 };
                    if t < theta {
                        theta = t;
                        drop = k;
                    }
                }
            }
            for (w, a) in weights.iter_mut().zip(alpha.iter()) {
                *w = theta * a + (1.0 - theta) * *w;
            }
            weights[drop] = 0.0;
            let mut k = 0;
            while k < corral.len() {
                if weights[k] <= 0.0 {
                    corral.remove(k);
                    weights.remove(k);
                } else {
                    k += 1;
                }
            }
            let total: f64 = weights.iter().sum();
            weights.iter_mut().for_each(|w| *w /= total);
        }

        nearest = DVector::zeros(x.len());
        for (&k, w) in corral.iter().zip(weights.iter()) {
            nearest.axpy(*w, &points[k], 1.0);
        }
    }
    nearest.norm()
}

/// Weights on `corral` of the point of smallest norm in its affine hull:
/// `[G 1; 1ᵀ 0] [α; μ] = [0; 1]` with `G` the Gram matrix.
fn affine_minimizer(points: &[DVector<f64>], corral: &[usize]) -> Option<Vec<f64>> {
    let k = corral.len();
    let mut kkt = DMatrix::zeros(k + 1, k + 1);
    for (r, &i) in corral.iter().enumerate() {
        for (c, &j) in corral.iter().enumerate() {
            kkt[(r, c)] = points[i].dot(&points[j]);
        }
        kkt[(r, k)] = 1.0;
        kkt[(k, r)] = 1.0;
    }
    let mut rhs = DVector::zeros(k + 1);
    rhs[k] = 1.0;
    let solution = kkt.lu().solve(&rhs)?;
    if solution.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(solution.rows(0, k).iter().cloned().collect())
}

fn check_dim(what: &'static str, expected: usize, actual: usize) -> ConvexSetResult<()> {
    if expected != actual {
        Err(ConvexSetError::DimensionMismatch {
            what,
            expected,
            actual,
        })
    } else {
        Ok(())
    }
}

impl From<HPolyhedron> for ConvexSet {
    fn from(s: HPolyhedron) -> Self {
        ConvexSet::HPolyhedron(s)
    }
}

impl From<Hyperellipsoid> for ConvexSet {
    fn from(s: Hyperellipsoid) -> Self {
        ConvexSet::Hyperellipsoid(s)
    }
}

impl From<VPolytope> for ConvexSet {
    fn from(s: VPolytope) -> Self {
        ConvexSet::VPolytope(s)
    }
}

impl From<MinkowskiSum> for ConvexSet {
    fn from(s: MinkowskiSum) -> Self {
        ConvexSet::MinkowskiSum(s)
    }
}

impl From<CartesianProduct> for ConvexSet {
    fn from(s: CartesianProduct) -> Self {
        ConvexSet::CartesianProduct(s)
    }
}

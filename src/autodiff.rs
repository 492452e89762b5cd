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

//! Forward-mode automatic differentiation.
//!
//! An `AutoDiff` carries a value together with its partial derivatives with
//! respect to some set of seeded inputs. An empty derivative vector stands
//! for a constant, so constants never need to know how many inputs exist.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use nalgebra::{DMatrix, DVector};

use crate::scalar::{Numeric, Scalar};

/// A value and its gradient with respect to the seeded inputs.
#[derive(Clone, PartialEq)]
pub struct AutoDiff {
    pub value: f64,
    pub derivatives: DVector<f64>,
}

impl AutoDiff {
    /// A constant: zero derivatives with respect to everything.
    pub fn constant(value: f64) -> Self {
        AutoDiff {
            value,
            derivatives: DVector::zeros(0),
        }
    }

    /// Input `index` out of `count` seeded inputs.
    pub fn variable(value: f64, index: usize, count: usize) -> Self {
        let mut derivatives = DVector::zeros(count);
        derivatives[index] = 1.0;
        AutoDiff { value, derivatives }
    }

    pub fn is_constant(&self) -> bool {
        self.derivatives.iter().all(|d| *d == 0.0)
    }

    /// Applies a scalar function with known derivative `slope` at the value.
    fn chain(&self, value: f64, slope: f64) -> Self {
        AutoDiff {
            value,
            derivatives: &self.derivatives * slope,
        }
    }
}

fn combine(a: &DVector<f64>, wa: f64, b: &DVector<f64>, wb: f64) -> DVector<f64> {
    match (a.len(), b.len()) {
        (0, 0) => DVector::zeros(0),
        (0, _) => b * wb,
        (_, 0) => a * wa,
        (na, nb) => {
            assert_eq!(na, nb, "mismatched derivative sizes {} and {}", na, nb);
            a * wa + b * wb
        }
    }
}

impl fmt::Debug for AutoDiff {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "AutoDiff {{ value: {}, derivatives: {:?} }}",
            self.value,
            self.derivatives.as_slice()
        )
    }
}

impl Add for AutoDiff {
    type Output = AutoDiff;

    fn add(self, rhs: AutoDiff) -> AutoDiff {
        AutoDiff {
            value: self.value + rhs.value,
            derivatives: combine(&self.derivatives, 1.0, &rhs.derivatives, 1.0),
        }
    }
}

impl Sub for AutoDiff {
    type Output = AutoDiff;

    fn sub(self, rhs: AutoDiff) -> AutoDiff {
        AutoDiff {
            value: self.value - rhs.value,
            derivatives: combine(&self.derivatives, 1.0, &rhs.derivatives, -1.0),
        }
    }
}

impl Mul for AutoDiff {
    type Output = AutoDiff;

    fn mul(self, rhs: AutoDiff) -> AutoDiff {
        // d(ab) = b da + a db
        AutoDiff {
            value: self.value * rhs.value,
            derivatives: combine(&self.derivatives, rhs.value, &rhs.derivatives, self.value),
        }
    }
}

impl Neg for AutoDiff {
    type Output = AutoDiff;

    fn neg(self) -> AutoDiff {
        AutoDiff {
            value: -self.value,
            derivatives: -self.derivatives,
        }
    }
}

impl Scalar for AutoDiff {
    fn from_f64(value: f64) -> Self {
        AutoDiff::constant(value)
    }

    fn sin(&self) -> Self {
        self.chain(self.value.sin(), self.value.cos())
    }

    fn cos(&self) -> Self {
        self.chain(self.value.cos(), -self.value.sin())
    }
}

impl Numeric for AutoDiff {
    fn value(&self) -> f64 {
        self.value
    }
}

/// Seeds every entry of `x` as an independent input.
pub fn initialize(x: &DVector<f64>) -> Vec<AutoDiff> {
    let n = x.len();
    x.iter()
        .enumerate()
        .map(|(i, v)| AutoDiff::variable(*v, i, n))
        .collect()
}

/// Extracts the values of an autodiff vector.
pub fn values(y: &[AutoDiff]) -> DVector<f64> {
    DVector::from_iterator(y.len(), y.iter().map(|v| v.value))
}

/// Stacks the gradients of `y` into a `y.len() x num_inputs` Jacobian.
/// Constant entries produce zero rows.
pub fn jacobian(y: &[AutoDiff], num_inputs: usize) -> DMatrix<f64> {
    let mut jac = DMatrix::zeros(y.len(), num_inputs);
    for (i, yi) in y.iter().enumerate() {
        if yi.derivatives.len() == num_inputs {
            jac.row_mut(i).copy_from(&yi.derivatives.transpose());
        } else {
            assert!(
                yi.derivatives.is_empty(),
                "derivative size {} does not match {} inputs",
                yi.derivatives.len(),
                num_inputs
            );
        }
    }
    jac
}

#[cfg(test)]
mod tests {
    mod autodiff {
        use approx::assert_abs_diff_eq;
        use nalgebra::DVector;

        use crate::autodiff::*;
        use crate::scalar::Scalar;

        #[test]
        fn test_product_rule() {
            let x = initialize(&DVector::from_vec(vec![2.0, 3.0]));
            let y = x[0].clone() * x[1].clone() + AutoDiff::constant(1.0);
            assert_abs_diff_eq!(y.value, 7.0);
            assert_abs_diff_eq!(y.derivatives[0], 3.0);
            assert_abs_diff_eq!(y.derivatives[1], 2.0);
        }

        #[test]
        fn test_trig_against_finite_difference() {
            let f = |t: f64| t.sin() * t.cos() - t;
            let t0 = 0.7;
            let x = initialize(&DVector::from_vec(vec![t0]));
            let y = x[0].sin() * x[0].cos() - x[0].clone();
            let h = 1e-6;
            let fd = (f(t0 + h) - f(t0 - h)) / (2.0 * h);
            assert_abs_diff_eq!(y.value, f(t0), epsilon = 1e-12);
            assert_abs_diff_eq!(y.derivatives[0], fd, epsilon = 1e-8);
        }

        #[test]
        fn test_jacobian_with_constant_rows() {
            let x = initialize(&DVector::from_vec(vec![1.0, -1.0]));
            let y = vec![x[0].clone() - x[1].clone(), AutoDiff::constant(4.0)];
            let jac = jacobian(&y, 2);
            assert_abs_diff_eq!(jac[(0, 0)], 1.0);
            assert_abs_diff_eq!(jac[(0, 1)], -1.0);
            assert_abs_diff_eq!(jac[(1, 0)], 0.0);
            assert_abs_diff_eq!(values(&y)[1], 4.0);
        }
    }
}

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

//! Scalar types that the kinematics and constraints can be evaluated with.
//!
//! The same kinematic code runs on plain `f64` values, on forward-mode
//! `AutoDiff` numbers and on symbolic `Expression`s. Only the operations
//! the forward kinematics actually needs are required.

use std::fmt::Debug;
use std::ops::{Add, Mul, Neg, Sub};

/// A scalar that supports the arithmetic used by rigid body kinematics.
pub trait Scalar:
    Clone
    + Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Neg<Output = Self>
{
    /// Lifts a constant into this scalar type.
    fn from_f64(value: f64) -> Self;

    fn sin(&self) -> Self;

    fn cos(&self) -> Self;

    fn zero() -> Self {
        Self::from_f64(0.0)
    }

    fn one() -> Self {
        Self::from_f64(1.0)
    }
}

/// A scalar with a concrete numeric value, i.e. value or derivative mode.
pub trait Numeric: Scalar {
    fn value(&self) -> f64;
}

impl Scalar for f64 {
    #[inline(always)]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline(always)]
    fn sin(&self) -> Self {
        f64::sin(*self)
    }

    #[inline(always)]
    fn cos(&self) -> Self {
        f64::cos(*self)
    }
}

impl Numeric for f64 {
    #[inline(always)]
    fn value(&self) -> f64 {
        *self
    }
}

/// A 3-vector over any scalar.
pub type Vec3<S> = [S; 3];

/// A row-major 3x3 matrix over any scalar.
pub type Mat3<S> = [[S; 3]; 3];

pub fn lift3<S: Scalar>(v: &[f64; 3]) -> Vec3<S> {
    [S::from_f64(v[0]), S::from_f64(v[1]), S::from_f64(v[2])]
}

pub fn add3<S: Scalar>(a: &Vec3<S>, b: &Vec3<S>) -> Vec3<S> {
    [
        a[0].clone() + b[0].clone(),
        a[1].clone() + b[1].clone(),
        a[2].clone() + b[2].clone(),
    ]
}

pub fn sub3<S: Scalar>(a: &Vec3<S>, b: &Vec3<S>) -> Vec3<S> {
    [
        a[0].clone() - b[0].clone(),
        a[1].clone() - b[1].clone(),
        a[2].clone() - b[2].clone(),
    ]
}

pub fn scale3<S: Scalar>(a: &Vec3<S>, s: &S) -> Vec3<S> {
    [
        a[0].clone() * s.clone(),
        a[1].clone() * s.clone(),
        a[2].clone() * s.clone(),
    ]
}

pub fn dot3<S: Scalar>(a: &Vec3<S>, b: &Vec3<S>) -> S {
    a[0].clone() * b[0].clone() + a[1].clone() * b[1].clone() + a[2].clone() * b[2].clone()
}

pub fn identity3<S: Scalar>() -> Mat3<S> {
    [
        [S::one(), S::zero(), S::zero()],
        [S::zero(), S::one(), S::zero()],
        [S::zero(), S::zero(), S::one()],
    ]
}

pub fn mat3_mul_vec<S: Scalar>(m: &Mat3<S>, v: &Vec3<S>) -> Vec3<S> {
    [dot3(&m[0], v), dot3(&m[1], v), dot3(&m[2], v)]
}

pub fn mat3_mul<S: Scalar>(a: &Mat3<S>, b: &Mat3<S>) -> Mat3<S> {
    let col = |j: usize| [b[0][j].clone(), b[1][j].clone(), b[2][j].clone()];
    let cols = [col(0), col(1), col(2)];
    let row = |i: usize| {
        [
            dot3(&a[i], &cols[0]),
            dot3(&a[i], &cols[1]),
            dot3(&a[i], &cols[2]),
        ]
    };
    [row(0), row(1), row(2)]
}

/// Rotation by `angle` about the unit vector `axis` (Rodrigues' formula).
pub fn axis_angle<S: Scalar>(axis: &[f64; 3], angle: &S) -> Mat3<S> {
    let (s, c) = (angle.sin(), angle.cos());
    let t = S::one() - c.clone();
    let [x, y, z] = *axis;
    let k = |v: f64| S::from_f64(v);
    [
        [
            c.clone() + t.clone() * k(x * x),
            t.clone() * k(x * y) - s.clone() * k(z),
            t.clone() * k(x * z) + s.clone() * k(y),
        ],
        [
            t.clone() * k(x * y) + s.clone() * k(z),
            c.clone() + t.clone() * k(y * y),
            t.clone() * k(y * z) - s.clone() * k(x),
        ],
        [
            t.clone() * k(x * z) - s.clone() * k(y),
            t.clone() * k(y * z) + s * k(x),
            c + t * k(z * z),
        ],
    ]
}

#[cfg(test)]
mod tests {
    mod scalar {
        use approx::assert_abs_diff_eq;
        use std::f64::consts::FRAC_PI_2;

        use crate::scalar::*;

        #[test]
        fn test_axis_angle_quarter_turn() {
            let r = axis_angle(&[0.0, 0.0, 1.0], &FRAC_PI_2);
            let p = mat3_mul_vec(&r, &[1.0, 0.0, 0.0]);
            assert_abs_diff_eq!(p[0], 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(p[1], 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(p[2], 0.0, epsilon = 1e-12);
        }

        #[test]
        fn test_mat3_mul_composes_rotations() {
            let r = axis_angle(&[1.0, 0.0, 0.0], &0.3);
            let rr = mat3_mul(&r, &r);
            let expected = axis_angle(&[1.0, 0.0, 0.0], &0.6);
            for i in 0..3 {
                for j in 0..3 {
                    assert_abs_diff_eq!(rr[i][j], expected[i][j], epsilon = 1e-12);
                }
            }
        }
    }
}

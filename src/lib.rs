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

//! The inner engine of IRIS-style region growing in configuration space.
//!
//! Growing a collision-free region needs one question answered over and
//! over: inside the current polytope of configurations, what is the
//! configuration closest to the region's ellipsoid at which two obstacles
//! touch (or come within a margin of each other)? This crate provides the
//! pieces of that search:
//!
//! - `SamePointConstraint` and `PointsBoundedDistanceConstraint`: the
//!   residual between a point on body A and a point on body B, evaluated
//!   through forward kinematics in value, derivative or symbolic mode.
//! - `ClosestCollisionProgram`: the optimization program built once per
//!   obstacle pair and re-solved after every polytope update.
//! - `ConvexSetMaker`: turns scene geometry into the `ConvexSet` whose
//!   membership constraints bind the witness points.
//! - `GeometryPairWithDistance` and `PairQueue`: rank obstacle pairs by
//!   separation so the closest pairs are explored first.
//!
//! # Evaluation modes
//!
//! Kinematics and constraints are written once over the `Scalar` trait and
//! run on `f64`, on forward-mode `AutoDiff` numbers (for Jacobians), and on
//! symbolic `Expression`s. Symbolic evaluation must be enabled explicitly
//! since it builds a symbolic copy of the kinematic model.
//!
//! # Solving
//!
//! Programs are solved through the `SolverInterface` trait.
//! `AugmentedLagrangianSolver` is the built-in backend. An infeasible program
//! is an expected outcome and is reported as `Ok(None)` by
//! `ClosestCollisionProgram::solve`; every other failure is an error.

pub use cgmath;
pub use nalgebra;

pub mod autodiff;
pub use autodiff::AutoDiff;

mod closest_collision;
pub use closest_collision::*;

mod convex_set;
pub use convex_set::*;

mod convex_set_maker;
pub use convex_set_maker::*;

mod error;
pub use error::*;

mod geom;
pub use geom::*;

mod ids;
pub use ids::*;

mod kinematics;
pub use kinematics::*;

mod mesh;
pub use mesh::*;

mod pairs;
pub use pairs::*;

mod program;
pub use program::*;

mod same_point;
pub use same_point::*;

pub mod scalar;
pub use scalar::{Numeric, Scalar};

mod scene;
pub use scene::*;

mod solver;
pub use solver::*;

pub mod symbolic;
pub use symbolic::{Environment, Expression, Variable};

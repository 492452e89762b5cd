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

//! Error types for every fallible operation in the crate.
//!
//! Precondition violations have their own variants so that callers never
//! confuse them with the expected "no collision found" outcome, which is not
//! an error at all.

use thiserror::Error;

use crate::ids::{FrameId, GeometryId};
use crate::solver::SolutionStatus;

/// Result type alias for kinematics evaluation.
pub type KinematicsResult<T> = Result<T, KinematicsError>;

/// Result type alias for symbolic evaluation.
pub type ExpressionResult<T> = Result<T, ExpressionError>;

/// Result type alias for constraint evaluation.
pub type ConstraintResult<T> = Result<T, ConstraintError>;

/// Result type alias for building mathematical programs.
pub type ProgramResult<T> = Result<T, ProgramError>;

/// Result type alias for solver invocations.
pub type SolverResult<T> = Result<T, SolverError>;

/// Result type alias for convex set construction.
pub type ConvexSetResult<T> = Result<T, ConvexSetError>;

/// Result type alias for closest-collision searches.
pub type CollisionSearchResult<T> = Result<T, CollisionSearchError>;

/// Errors raised by a forward kinematics model.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum KinematicsError {
    /// The frame is not part of the model.
    #[error("unknown frame {0}")]
    UnknownFrame(FrameId),

    /// A configuration of the wrong size was supplied.
    #[error("expected {expected} positions, got {actual}")]
    PositionCountMismatch { expected: usize, actual: usize },

    /// A joint axis of zero length was supplied.
    #[error("joint axis must be non-zero")]
    DegenerateAxis,

    /// A parent frame was given that is not in the model yet.
    #[error("parent frame {0} is not part of the model")]
    UnknownParent(FrameId),
}

/// Errors raised when evaluating a symbolic expression.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExpressionError {
    /// A variable in the expression has no value in the environment.
    #[error("variable {0} is not bound in the environment")]
    UnboundVariable(String),
}

/// Errors raised while evaluating a constraint.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConstraintError {
    /// A frame reference was never set on the constraint.
    #[error("frame {0} must be set before the constraint is evaluated")]
    FrameNotSet(&'static str),

    /// Symbolic evaluation was requested before it was enabled.
    #[error("symbolic evaluation requires enable_symbolic() to be called first")]
    SymbolicNotEnabled,

    /// The input vector has the wrong size.
    #[error("constraint expects {expected} variables, got {actual}")]
    InputSizeMismatch { expected: usize, actual: usize },

    /// A negative or non-finite margin was supplied.
    #[error("maximum distance must be finite and non-negative, got {0}")]
    InvalidMaxDistance(f64),

    /// A bound vector has the wrong size.
    #[error("bound must have {expected} entries, got {actual}")]
    BoundSizeMismatch { expected: usize, actual: usize },

    /// The forward kinematics oracle failed.
    #[error("kinematics evaluation failed: {0}")]
    Kinematics(#[from] KinematicsError),
}

/// Errors raised while building or updating a mathematical program.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProgramError {
    /// Mismatched matrix or vector dimensions.
    #[error("{what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A variable that was not created by this program.
    #[error("variable {0} is not a decision variable of this program")]
    UnknownVariable(String),

    /// A handle that does not refer to a constraint of this program.
    #[error("handle {0} does not refer to a constraint of this program")]
    InvalidHandle(usize),

    /// A lower bound above its upper bound.
    #[error("lower bound {lower} exceeds upper bound {upper} in row {row}")]
    InvertedBounds { row: usize, lower: f64, upper: f64 },
}

/// Errors raised by a solver backend that prevent a determinate result.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    /// A constraint could not be evaluated.
    #[error("constraint evaluation failed: {0}")]
    Evaluation(#[from] ConstraintError),

    /// The program is malformed.
    #[error("malformed program: {0}")]
    Program(#[from] ProgramError),

    /// A solver option is out of range.
    #[error("invalid solver option: {0}")]
    InvalidOption(String),
}

/// Errors raised while producing convex sets.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConvexSetError {
    /// The reference frame identity is not valid.
    #[error("reference frame {0} is not a valid frame identity")]
    InvalidReferenceFrame(FrameId),

    /// No geometry identity was set before conversion.
    #[error("a geometry id must be set before a shape is converted")]
    GeometryNotSet,

    /// The geometry is unknown to the scene.
    #[error("unknown geometry {0}")]
    UnknownGeometry(GeometryId),

    /// The frame is unknown to the scene.
    #[error("unknown frame {0}")]
    UnknownFrame(FrameId),

    /// The shape kind has no convex set representation.
    #[error("shape kind {0} is not supported")]
    UnsupportedShape(&'static str),

    /// The shape parameters do not describe a valid shape.
    #[error("malformed {kind}: {reason}")]
    MalformedShape { kind: &'static str, reason: String },

    /// Mismatched matrix or vector dimensions.
    #[error("{what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Building the membership program failed.
    #[error("membership program: {0}")]
    Program(#[from] ProgramError),

    /// Solving the membership program failed.
    #[error("membership solve: {0}")]
    Solver(#[from] SolverError),

    /// The membership program ended without a verdict.
    #[error("membership undetermined, solver status {0:?}")]
    MembershipUndetermined(SolutionStatus),
}

/// Errors raised by the closest-collision program.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CollisionSearchError {
    /// The ellipsoid shape matrix is singular.
    #[error("ellipsoid shape matrix is singular")]
    SingularEllipsoid,

    /// Mismatched matrix or vector dimensions.
    #[error("{what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The margin was changed on a program that tests for exact contact.
    #[error("the program tests for contact; it has no maximum distance")]
    NotBoundedDistance,

    /// The solver ended without a determinate verdict.
    #[error("solver {solver} failed with status {status:?}")]
    SolverFailure {
        solver: &'static str,
        status: SolutionStatus,
    },

    /// The solver could not run, e.g. because a constraint evaluation failed.
    #[error("solver error: {0}")]
    Solver(#[from] SolverError),

    /// A constraint rejected its configuration.
    #[error("constraint error: {0}")]
    Constraint(#[from] ConstraintError),

    /// Building the program failed.
    #[error("program error: {0}")]
    Program(#[from] ProgramError),

    /// An obstacle set could not be added to the program.
    #[error("convex set error: {0}")]
    ConvexSet(#[from] ConvexSetError),
}

#[cfg(test)]
mod tests {
    mod display {
        use crate::error::*;
        use crate::ids::FrameId;
        use crate::solver::SolutionStatus;

        #[test]
        fn test_error_display() {
            let err = ConstraintError::FrameNotSet("A");
            assert!(format!("{err}").contains("frame A"));

            let err = ConvexSetError::InvalidReferenceFrame(FrameId::default());
            assert!(format!("{err}").contains("invalid"));

            let err = CollisionSearchError::SolverFailure {
                solver: "augmented-lagrangian",
                status: SolutionStatus::IterationLimit,
            };
            assert!(format!("{err}").contains("IterationLimit"));
        }

        #[test]
        fn test_evaluation_errors_become_solver_errors() {
            let err: SolverError = ConstraintError::SymbolicNotEnabled.into();
            let err: CollisionSearchError = err.into();
            assert!(matches!(
                err,
                CollisionSearchError::Solver(SolverError::Evaluation(_))
            ));
        }
    }
}

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

//! Constraints tying a point on body A to a point on body B.
//!
//! Both constraints take the decision vector `x = [q, p_AA, p_BB]`, where `q`
//! is the configuration, `p_AA` a point in frame A and `p_BB` a point in
//! frame B. The residual `r = p_WA - p_WB` is the difference of the two
//! points once both are mapped to the world frame at `q`.
//!
//! - `SamePointConstraint`: `r = 0`, the points coincide.
//! - `PointsBoundedDistanceConstraint`: `|r|² <= m²`, the points are within
//!   the margin `m` of each other. With a zero margin the constraint is
//!   `r = 0` and has three outputs.

use std::sync::Arc;

use nalgebra::DVector;
use tracing::debug;

use crate::autodiff::AutoDiff;
use crate::error::{ConstraintError, ConstraintResult};
use crate::ids::FrameId;
use crate::kinematics::{Kinematics, KinematicsContext, SymbolicKinematics};
use crate::program::{Constraint, ConstraintBounds};
use crate::scalar::{dot3, sub3, Numeric, Scalar, Vec3};
use crate::symbolic::{Expression, Variable};

/// Evaluates `r = p_WA - p_WB`.
pub struct SamePointConstraint<K: Kinematics> {
    kinematics: Arc<K>,
    frame_a: Option<FrameId>,
    frame_b: Option<FrameId>,
    bounds: ConstraintBounds,
    value_context: KinematicsContext<f64>,
    autodiff_context: KinematicsContext<AutoDiff>,
    symbolic: Option<(K::Symbolic, KinematicsContext<Expression>)>,
}

impl<K: Kinematics> SamePointConstraint<K> {
    /// Frames start unset; both must be set before the first evaluation.
    pub fn new(kinematics: Arc<K>) -> Self {
        let value_context = kinematics.create_context();
        let autodiff_context = kinematics.create_context();
        SamePointConstraint {
            kinematics,
            frame_a: None,
            frame_b: None,
            bounds: ConstraintBounds::equality(DVector::zeros(3)),
            value_context,
            autodiff_context,
            symbolic: None,
        }
    }

    pub fn kinematics(&self) -> &Arc<K> {
        &self.kinematics
    }

    pub fn frame_a(&self) -> Option<FrameId> {
        self.frame_a
    }

    pub fn frame_b(&self) -> Option<FrameId> {
        self.frame_b
    }

    pub fn set_frame_a(&mut self, frame: FrameId) {
        self.frame_a = Some(frame);
    }

    pub fn set_frame_b(&mut self, frame: FrameId) {
        self.frame_b = Some(frame);
    }

    /// Builds the symbolic copy of the kinematic model. Calling this again
    /// does nothing.
    pub fn enable_symbolic(&mut self) {
        if self.symbolic.is_some() {
            return;
        }
        debug!(
            positions = self.kinematics.num_positions(),
            "enabling symbolic evaluation"
        );
        let context = KinematicsContext::new(self.kinematics.num_positions());
        self.symbolic = Some((self.kinematics.to_symbolic(), context));
    }

    pub fn is_symbolic_enabled(&self) -> bool {
        self.symbolic.is_some()
    }

    fn frames(&self) -> ConstraintResult<(FrameId, FrameId)> {
        let a = self.frame_a.ok_or(ConstraintError::FrameNotSet("A"))?;
        let b = self.frame_b.ok_or(ConstraintError::FrameNotSet("B"))?;
        Ok((a, b))
    }

    fn check_len(&self, len: usize) -> ConstraintResult<()> {
        let expected = self.kinematics.num_positions() + 6;
        if len != expected {
            return Err(ConstraintError::InputSizeMismatch {
                expected,
                actual: len,
            });
        }
        Ok(())
    }

    /// The residual in value or derivative mode.
    fn residual<S: Numeric>(
        kinematics: &K,
        ctx: &mut KinematicsContext<S>,
        (frame_a, frame_b): (FrameId, FrameId),
        x: &[S],
    ) -> ConstraintResult<Vec3<S>> {
        let n = kinematics.num_positions();
        let (q, p_aa, p_bb) = split(x, n);
        ctx.set_positions(q);
        let p_wa = kinematics.calc_point_in_world(ctx, frame_a, &p_aa)?;
        let p_wb = kinematics.calc_point_in_world(ctx, frame_b, &p_bb)?;
        Ok(sub3(&p_wa, &p_wb))
    }

    fn eval_residual_f64(&mut self, x: &[f64]) -> ConstraintResult<Vec3<f64>> {
        self.check_len(x.len())?;
        let frames = self.frames()?;
        Self::residual(&*self.kinematics, &mut self.value_context, frames, x)
    }

    fn eval_residual_autodiff(&mut self, x: &[AutoDiff]) -> ConstraintResult<Vec3<AutoDiff>> {
        self.check_len(x.len())?;
        let frames = self.frames()?;
        Self::residual(&*self.kinematics, &mut self.autodiff_context, frames, x)
    }

    fn eval_residual_symbolic(&mut self, x: &[Variable]) -> ConstraintResult<Vec3<Expression>> {
        self.check_len(x.len())?;
        let (frame_a, frame_b) = self.frames()?;
        let n = self.kinematics.num_positions();
        let (symbolic, ctx) = self
            .symbolic
            .as_mut()
            .ok_or(ConstraintError::SymbolicNotEnabled)?;
        let x: Vec<Expression> = x.iter().map(Expression::from).collect();
        let (q, p_aa, p_bb) = split(&x, n);
        ctx.set_positions(q);
        let p_wa = symbolic.calc_point_in_world(ctx, frame_a, &p_aa)?;
        let p_wb = symbolic.calc_point_in_world(ctx, frame_b, &p_bb)?;
        Ok(sub3(&p_wa, &p_wb))
    }
}

fn split<S: Scalar>(x: &[S], n: usize) -> (Vec<S>, Vec3<S>, Vec3<S>) {
    (
        x[..n].to_vec(),
        [x[n].clone(), x[n + 1].clone(), x[n + 2].clone()],
        [x[n + 3].clone(), x[n + 4].clone(), x[n + 5].clone()],
    )
}

impl<K: Kinematics> Constraint for SamePointConstraint<K> {
    fn num_outputs(&self) -> usize {
        3
    }

    fn num_vars(&self) -> usize {
        self.kinematics.num_positions() + 6
    }

    fn bounds(&self) -> &ConstraintBounds {
        &self.bounds
    }

    fn eval(&mut self, x: &DVector<f64>) -> ConstraintResult<DVector<f64>> {
        let r = self.eval_residual_f64(x.as_slice())?;
        Ok(DVector::from_column_slice(&r))
    }

    fn eval_autodiff(&mut self, x: &[AutoDiff]) -> ConstraintResult<Vec<AutoDiff>> {
        Ok(self.eval_residual_autodiff(x)?.to_vec())
    }

    fn eval_symbolic(&mut self, x: &[Variable]) -> ConstraintResult<Vec<Expression>> {
        Ok(self.eval_residual_symbolic(x)?.to_vec())
    }

    fn update_upper_bound(&mut self, upper: DVector<f64>) -> ConstraintResult<()> {
        self.bounds.set_upper(upper)
    }
}

/// Evaluates `|p_WA - p_WB|²` with bounds `[0, m²]`, or the residual itself
/// with bounds `[0, 0]` when `m = 0`.
pub struct PointsBoundedDistanceConstraint<K: Kinematics> {
    same_point: SamePointConstraint<K>,
    max_distance: f64,
    bounds: ConstraintBounds,
}

impl<K: Kinematics> PointsBoundedDistanceConstraint<K> {
    pub fn new(kinematics: Arc<K>, max_distance: f64) -> ConstraintResult<Self> {
        check_max_distance(max_distance)?;
        Ok(PointsBoundedDistanceConstraint {
            same_point: SamePointConstraint::new(kinematics),
            max_distance,
            bounds: margin_bounds(max_distance)?,
        })
    }

    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }

    /// Changes the margin. Takes effect on the next evaluation.
    pub fn set_max_distance(&mut self, max_distance: f64) -> ConstraintResult<()> {
        check_max_distance(max_distance)?;
        self.bounds = margin_bounds(max_distance)?;
        self.max_distance = max_distance;
        Ok(())
    }

    /// True when the margin is zero and the residual is evaluated directly.
    pub fn is_exact(&self) -> bool {
        self.max_distance == 0.0
    }

    pub fn frame_a(&self) -> Option<FrameId> {
        self.same_point.frame_a()
    }

    pub fn frame_b(&self) -> Option<FrameId> {
        self.same_point.frame_b()
    }

    pub fn set_frame_a(&mut self, frame: FrameId) {
        self.same_point.set_frame_a(frame);
    }

    pub fn set_frame_b(&mut self, frame: FrameId) {
        self.same_point.set_frame_b(frame);
    }

    pub fn enable_symbolic(&mut self) {
        self.same_point.enable_symbolic();
    }

    pub fn is_symbolic_enabled(&self) -> bool {
        self.same_point.is_symbolic_enabled()
    }
}

// |r|² <= 0 has a vanishing gradient at every feasible point, so a zero
// margin is expressed as r = 0 instead.
fn margin_bounds(max_distance: f64) -> ConstraintResult<ConstraintBounds> {
    if max_distance == 0.0 {
        return Ok(ConstraintBounds::equality(DVector::zeros(3)));
    }
    let mut bounds = ConstraintBounds::equality(DVector::zeros(1));
    bounds.set_upper(DVector::from_element(1, max_distance * max_distance))?;
    Ok(bounds)
}

fn check_max_distance(max_distance: f64) -> ConstraintResult<()> {
    if max_distance.is_finite() && max_distance >= 0.0 {
        Ok(())
    } else {
        Err(ConstraintError::InvalidMaxDistance(max_distance))
    }
}

impl<K: Kinematics> Constraint for PointsBoundedDistanceConstraint<K> {
    fn num_outputs(&self) -> usize {
        if self.is_exact() {
            3
        } else {
            1
        }
    }

    fn num_vars(&self) -> usize {
        self.same_point.num_vars()
    }

    fn bounds(&self) -> &ConstraintBounds {
        &self.bounds
    }

    fn eval(&mut self, x: &DVector<f64>) -> ConstraintResult<DVector<f64>> {
        let r = self.same_point.eval_residual_f64(x.as_slice())?;
        if self.is_exact() {
            return Ok(DVector::from_column_slice(&r));
        }
        Ok(DVector::from_element(1, dot3(&r, &r)))
    }

    fn eval_autodiff(&mut self, x: &[AutoDiff]) -> ConstraintResult<Vec<AutoDiff>> {
        let r = self.same_point.eval_residual_autodiff(x)?;
        Ok(squared_norm_or_residual(r, self.is_exact()))
    }

    fn eval_symbolic(&mut self, x: &[Variable]) -> ConstraintResult<Vec<Expression>> {
        let r = self.same_point.eval_residual_symbolic(x)?;
        Ok(squared_norm_or_residual(r, self.is_exact()))
    }

    /// Sets `m²` directly. The upper bound must stay non-negative. Always
    /// takes a single value, whatever the current number of outputs.
    fn update_upper_bound(&mut self, upper: DVector<f64>) -> ConstraintResult<()> {
        if upper.len() != 1 {
            return Err(ConstraintError::BoundSizeMismatch {
                expected: 1,
                actual: upper.len(),
            });
        }
        self.set_max_distance(upper[0].sqrt())
    }
}

fn squared_norm_or_residual<S: Scalar>(r: Vec3<S>, exact: bool) -> Vec<S> {
    if exact {
        r.to_vec()
    } else {
        vec![dot3(&r, &r)]
    }
}

/// The collision test a closest-collision program uses: exact contact or
/// contact up to a margin.
pub enum CollisionConstraint<K: Kinematics> {
    SamePoint(SamePointConstraint<K>),
    BoundedDistance(PointsBoundedDistanceConstraint<K>),
}

impl<K: Kinematics> CollisionConstraint<K> {
    pub fn set_frame_a(&mut self, frame: FrameId) {
        match self {
            CollisionConstraint::SamePoint(c) => c.set_frame_a(frame),
            CollisionConstraint::BoundedDistance(c) => c.set_frame_a(frame),
        }
    }

    pub fn set_frame_b(&mut self, frame: FrameId) {
        match self {
            CollisionConstraint::SamePoint(c) => c.set_frame_b(frame),
            CollisionConstraint::BoundedDistance(c) => c.set_frame_b(frame),
        }
    }

    pub fn num_positions(&self) -> usize {
        match self {
            CollisionConstraint::SamePoint(c) => c.kinematics.num_positions(),
            CollisionConstraint::BoundedDistance(c) => c.same_point.kinematics.num_positions(),
        }
    }

    pub fn into_boxed(self) -> Box<dyn Constraint>
    where
        K: 'static,
    {
        match self {
            CollisionConstraint::SamePoint(c) => Box::new(c),
            CollisionConstraint::BoundedDistance(c) => Box::new(c),
        }
    }
}

impl<K: Kinematics> From<SamePointConstraint<K>> for CollisionConstraint<K> {
    fn from(c: SamePointConstraint<K>) -> Self {
        CollisionConstraint::SamePoint(c)
    }
}

impl<K: Kinematics> From<PointsBoundedDistanceConstraint<K>> for CollisionConstraint<K> {
    fn from(c: PointsBoundedDistanceConstraint<K>) -> Self {
        CollisionConstraint::BoundedDistance(c)
    }
}

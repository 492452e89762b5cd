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

//! Forward kinematics: where does a point fixed to a body end up in the world
//! for a given configuration?
//!
//! The engine only consumes kinematics through the `Kinematics` and
//! `SymbolicKinematics` traits. `KinematicTree` is a complete model of a tree
//! of rigid bodies connected by fixed, revolute and prismatic joints that
//! implements both.

use cgmath::{InnerSpace, Matrix3, Quaternion, Vector3};
use tracing::trace;

use crate::error::{KinematicsError, KinematicsResult};
use crate::geom::{rigid_transform, RigidTransform};
use crate::ids::FrameId;
use crate::scalar::*;
use crate::symbolic::Expression;

/// A rigid transform over any scalar: `p -> rotation * p + translation`.
#[derive(Clone, Debug)]
pub struct Pose<S: Scalar> {
    pub rotation: Mat3<S>,
    pub translation: Vec3<S>,
}

impl<S: Scalar> Pose<S> {
    pub fn identity() -> Self {
        Pose {
            rotation: identity3(),
            translation: [S::zero(), S::zero(), S::zero()],
        }
    }

    /// Returns `self * child`.
    pub fn compose(&self, child: &Pose<S>) -> Pose<S> {
        Pose {
            rotation: mat3_mul(&self.rotation, &child.rotation),
            translation: add3(
                &mat3_mul_vec(&self.rotation, &child.translation),
                &self.translation,
            ),
        }
    }

    pub fn transform_point(&self, p: &Vec3<S>) -> Vec3<S> {
        add3(&mat3_mul_vec(&self.rotation, p), &self.translation)
    }
}

impl Pose<f64> {
    pub fn from_transform(x: &RigidTransform) -> Self {
        // cgmath matrices are column major.
        let m = Matrix3::from(x.rot);
        Pose {
            rotation: [
                [m.x.x, m.y.x, m.z.x],
                [m.x.y, m.y.y, m.z.y],
                [m.x.z, m.y.z, m.z.z],
            ],
            translation: [x.disp.x, x.disp.y, x.disp.z],
        }
    }

    pub fn to_transform(&self) -> RigidTransform {
        let r = &self.rotation;
        let m = Matrix3::new(
            r[0][0], r[1][0], r[2][0],
            r[0][1], r[1][1], r[2][1],
            r[0][2], r[1][2], r[2][2],
        );
        let t = &self.translation;
        rigid_transform(Quaternion::from(m), Vector3::new(t[0], t[1], t[2]))
    }

    /// Lifts every entry into scalar type `S`.
    pub fn lift<S: Scalar>(&self) -> Pose<S> {
        let row = |i: usize| lift3(&self.rotation[i]);
        Pose {
            rotation: [row(0), row(1), row(2)],
            translation: lift3(&self.translation),
        }
    }
}

/// The configuration a model is evaluated at, together with the body poses
/// it implies. Setting new positions invalidates the cached poses; they are
/// recomputed on the next query.
#[derive(Clone, Debug)]
pub struct KinematicsContext<S: Scalar> {
    positions: Vec<S>,
    poses: Vec<Pose<S>>,
    valid: bool,
}

impl<S: Scalar> KinematicsContext<S> {
    pub fn new(num_positions: usize) -> Self {
        KinematicsContext {
            positions: vec![S::zero(); num_positions],
            poses: Vec::new(),
            valid: false,
        }
    }

    pub fn positions(&self) -> &[S] {
        &self.positions
    }

    pub fn set_positions(&mut self, q: Vec<S>) {
        self.positions = q;
        self.valid = false;
    }
}

/// A forward kinematics oracle usable in value and derivative mode.
///
/// Implementations must be safe to share between threads as long as every
/// thread evaluates with its own context.
pub trait Kinematics: Send + Sync {
    /// The symbolic copy of the model produced by `to_symbolic`.
    type Symbolic: SymbolicKinematics;

    fn num_positions(&self) -> usize;

    fn has_frame(&self, frame: FrameId) -> bool;

    fn create_context<S: Numeric>(&self) -> KinematicsContext<S> {
        KinematicsContext::new(self.num_positions())
    }

    /// Maps `p_local`, expressed in `frame`, to the world frame at the
    /// configuration stored in `ctx`.
    fn calc_point_in_world<S: Numeric>(
        &self,
        ctx: &mut KinematicsContext<S>,
        frame: FrameId,
        p_local: &Vec3<S>,
    ) -> KinematicsResult<Vec3<S>>;

    /// The world pose of `frame` at configuration `q`.
    fn calc_frame_pose_in_world(&self, q: &[f64], frame: FrameId)
        -> KinematicsResult<RigidTransform>;

    /// Builds a copy of the model that evaluates over symbolic expressions.
    /// This can be expensive and is only done on request.
    fn to_symbolic(&self) -> Self::Symbolic;
}

/// A forward kinematics oracle over symbolic expressions.
pub trait SymbolicKinematics: Send + Sync {
    fn calc_point_in_world(
        &self,
        ctx: &mut KinematicsContext<Expression>,
        frame: FrameId,
        p_local: &Vec3<Expression>,
    ) -> KinematicsResult<Vec3<Expression>>;
}

/// How a body moves relative to its parent.
#[derive(Copy, Clone, Debug)]
pub enum Joint {
    Fixed,
    /// Rotation about a unit axis, expressed in the joint frame.
    Revolute { axis: Vector3<f64> },
    /// Translation along a unit axis, expressed in the joint frame.
    Prismatic { axis: Vector3<f64> },
}

#[derive(Clone, Debug)]
struct Body {
    name: String,
    /// Index into the body list, or None for the world.
    parent: Option<usize>,
    offset: Pose<f64>,
    joint: Joint,
    position_index: Option<usize>,
}

/// A tree of rigid bodies rooted at the world frame.
///
/// Frames are numbered in insertion order starting at 1; the world is
/// `FrameId::world()`. A body's pose is `X_WP * X_PJ * X_JB(q)`, where
/// `X_PJ` is the fixed offset given when the body was added.
#[derive(Clone, Debug, Default)]
pub struct KinematicTree {
    bodies: Vec<Body>,
    num_positions: usize,
}

impl KinematicTree {
    pub fn new() -> Self {
        KinematicTree {
            bodies: Vec::new(),
            num_positions: 0,
        }
    }

    /// Adds a body attached to `parent` and returns its frame. Revolute and
    /// prismatic joints claim the next configuration index.
    pub fn add_frame(
        &mut self,
        name: &str,
        parent: FrameId,
        offset: RigidTransform,
        joint: Joint,
    ) -> KinematicsResult<FrameId> {
        let parent = if parent == FrameId::world() {
            None
        } else {
            Some(
                self.body_index(parent)
                    .ok_or(KinematicsError::UnknownParent(parent))?,
            )
        };
        let joint = match joint {
            Joint::Fixed => Joint::Fixed,
            Joint::Revolute { axis } => Joint::Revolute {
                axis: unit_axis(axis)?,
            },
            Joint::Prismatic { axis } => Joint::Prismatic {
                axis: unit_axis(axis)?,
            },
        };
        let position_index = match joint {
            Joint::Fixed => None,
            _ => {
                self.num_positions += 1;
                Some(self.num_positions - 1)
            }
        };
        self.bodies.push(Body {
            name: name.to_string(),
            parent,
            offset: Pose::from_transform(&offset),
            joint,
            position_index,
        });
        Ok(FrameId::new(self.bodies.len() as u64))
    }

    pub fn frame_name(&self, frame: FrameId) -> Option<&str> {
        if frame == FrameId::world() {
            return Some("world");
        }
        self.body_index(frame).map(|i| self.bodies[i].name.as_str())
    }

    /// The configuration index driven by the joint of `frame`, if any.
    pub fn position_index(&self, frame: FrameId) -> Option<usize> {
        self.body_index(frame)
            .and_then(|i| self.bodies[i].position_index)
    }

    fn body_index(&self, frame: FrameId) -> Option<usize> {
        let v = frame.value();
        if frame.is_valid() && v >= 1 && (v as usize) <= self.bodies.len() {
            Some(v as usize - 1)
        } else {
            None
        }
    }

    fn update_poses<S, F>(&self, ctx: &mut KinematicsContext<S>, offset: F) -> KinematicsResult<()>
    where
        S: Scalar,
        F: Fn(usize) -> Pose<S>,
    {
        if ctx.valid {
            return Ok(());
        }
        if ctx.positions.len() != self.num_positions {
            return Err(KinematicsError::PositionCountMismatch {
                expected: self.num_positions,
                actual: ctx.positions.len(),
            });
        }
        let mut poses: Vec<Pose<S>> = Vec::with_capacity(self.bodies.len());
        for (i, body) in self.bodies.iter().enumerate() {
            let motion = match (body.joint, body.position_index) {
                (Joint::Revolute { axis }, Some(k)) => Pose {
                    rotation: axis_angle(&[axis.x, axis.y, axis.z], &ctx.positions[k]),
                    translation: [S::zero(), S::zero(), S::zero()],
                },
                (Joint::Prismatic { axis }, Some(k)) => Pose {
                    rotation: identity3(),
                    translation: scale3(&lift3(&[axis.x, axis.y, axis.z]), &ctx.positions[k]),
                },
                _ => Pose::identity(),
            };
            let local = offset(i).compose(&motion);
            let pose = match body.parent {
                Some(p) => poses[p].compose(&local),
                None => local,
            };
            poses.push(pose);
        }
        ctx.poses = poses;
        ctx.valid = true;
        Ok(())
    }

    fn point_in_world<S, F>(
        &self,
        ctx: &mut KinematicsContext<S>,
        frame: FrameId,
        p_local: &Vec3<S>,
        offset: F,
    ) -> KinematicsResult<Vec3<S>>
    where
        S: Scalar,
        F: Fn(usize) -> Pose<S>,
    {
        if frame == FrameId::world() {
            return Ok(p_local.clone());
        }
        let i = self
            .body_index(frame)
            .ok_or(KinematicsError::UnknownFrame(frame))?;
        self.update_poses(ctx, offset)?;
        Ok(ctx.poses[i].transform_point(p_local))
    }
}

fn unit_axis(axis: Vector3<f64>) -> KinematicsResult<Vector3<f64>> {
    let m = axis.magnitude();
    if !(m > 0.0) || !m.is_finite() {
        return Err(KinematicsError::DegenerateAxis);
    }
    Ok(axis / m)
}

impl Kinematics for KinematicTree {
    type Symbolic = SymbolicKinematicTree;

    fn num_positions(&self) -> usize {
        self.num_positions
    }

    fn has_frame(&self, frame: FrameId) -> bool {
        frame == FrameId::world() || self.body_index(frame).is_some()
    }

    fn calc_point_in_world<S: Numeric>(
        &self,
        ctx: &mut KinematicsContext<S>,
        frame: FrameId,
        p_local: &Vec3<S>,
    ) -> KinematicsResult<Vec3<S>> {
        self.point_in_world(ctx, frame, p_local, |i| self.bodies[i].offset.lift())
    }

    fn calc_frame_pose_in_world(
        &self,
        q: &[f64],
        frame: FrameId,
    ) -> KinematicsResult<RigidTransform> {
        if frame == FrameId::world() {
            return Ok(Pose::<f64>::identity().to_transform());
        }
        let i = self
            .body_index(frame)
            .ok_or(KinematicsError::UnknownFrame(frame))?;
        let mut ctx = KinematicsContext::new(self.num_positions);
        ctx.set_positions(q.to_vec());
        self.update_poses(&mut ctx, |b| self.bodies[b].offset.clone())?;
        Ok(ctx.poses[i].to_transform())
    }

    fn to_symbolic(&self) -> SymbolicKinematicTree {
        trace!(bodies = self.bodies.len(), "materializing symbolic kinematic tree");
        SymbolicKinematicTree {
            offsets: self.bodies.iter().map(|b| b.offset.lift()).collect(),
            tree: self.clone(),
        }
    }
}

/// A `KinematicTree` whose constant parameters have been converted to
/// expressions once, up front.
#[derive(Clone, Debug)]
pub struct SymbolicKinematicTree {
    tree: KinematicTree,
    offsets: Vec<Pose<Expression>>,
}

impl SymbolicKinematics for SymbolicKinematicTree {
    fn calc_point_in_world(
        &self,
        ctx: &mut KinematicsContext<Expression>,
        frame: FrameId,
        p_local: &Vec3<Expression>,
    ) -> KinematicsResult<Vec3<Expression>> {
        self.tree
            .point_in_world(ctx, frame, p_local, |i| self.offsets[i].clone())
    }
}

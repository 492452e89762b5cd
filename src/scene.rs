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

//! Where geometries live: which frame each geometry is attached to, how it is
//! posed in that frame, and where the frames currently are in the world.

use std::collections::BTreeMap;

use cgmath::Transform;
use tracing::debug;

use crate::error::KinematicsResult;
use crate::geom::{identity_transform, RigidTransform, Shape};
use crate::ids::{FrameId, GeometryId};
use crate::kinematics::Kinematics;

/// Read access to geometry placement, as consumed by `ConvexSetMaker`.
pub trait GeometryQuery {
    fn shape(&self, id: GeometryId) -> Option<&Shape>;

    /// The frame the geometry is rigidly attached to.
    fn frame_id(&self, id: GeometryId) -> Option<FrameId>;

    /// `X_FG`: the pose of the geometry in its frame.
    fn pose_in_frame(&self, id: GeometryId) -> Option<RigidTransform>;

    /// `X_WF`: the pose of the frame in the world.
    fn frame_pose_in_world(&self, frame: FrameId) -> Option<RigidTransform>;

    /// `X_WG = X_WF * X_FG`.
    fn pose_in_world(&self, id: GeometryId) -> Option<RigidTransform> {
        let x_wf = self.frame_pose_in_world(self.frame_id(id)?)?;
        Some(x_wf.concat(&self.pose_in_frame(id)?))
    }
}

#[derive(Clone, Debug)]
struct GeometryInstance {
    name: String,
    frame: FrameId,
    pose_in_frame: RigidTransform,
    shape: Shape,
}

/// An in-memory collection of frames and the geometries attached to them.
#[derive(Clone, Debug)]
pub struct GeometryScene {
    frames: BTreeMap<FrameId, RigidTransform>,
    geometries: BTreeMap<GeometryId, GeometryInstance>,
    next_geometry: u64,
}

impl GeometryScene {
    /// Creates a scene containing only the world frame.
    pub fn new() -> Self {
        let mut frames = BTreeMap::new();
        frames.insert(FrameId::world(), identity_transform());
        GeometryScene {
            frames,
            geometries: BTreeMap::new(),
            next_geometry: 0,
        }
    }

    /// Adds a frame, or moves it if it is already present.
    pub fn set_frame_pose(&mut self, frame: FrameId, x_wf: RigidTransform) {
        self.frames.insert(frame, x_wf);
    }

    /// Attaches a geometry to `frame` with pose `x_fg`. The frame is added at
    /// the world origin if the scene does not know it yet.
    pub fn register_geometry(
        &mut self,
        name: &str,
        frame: FrameId,
        x_fg: RigidTransform,
        shape: Shape,
    ) -> GeometryId {
        let id = GeometryId::new(self.next_geometry);
        self.next_geometry += 1;
        self.frames.entry(frame).or_insert_with(identity_transform);
        self.geometries.insert(
            id,
            GeometryInstance {
                name: name.to_string(),
                frame,
                pose_in_frame: x_fg,
                shape,
            },
        );
        id
    }

    pub fn geometry_name(&self, id: GeometryId) -> Option<&str> {
        self.geometries.get(&id).map(|g| g.name.as_str())
    }

    pub fn geometry_ids<'a>(&'a self) -> impl Iterator<Item = GeometryId> + 'a {
        self.geometries.keys().cloned()
    }

    pub fn geometries_on_frame<'a>(
        &'a self,
        frame: FrameId,
    ) -> impl Iterator<Item = GeometryId> + 'a {
        self.geometries
            .iter()
            .filter(move |(_, g)| g.frame == frame)
            .map(|(id, _)| *id)
    }

    /// Recomputes every known frame's world pose at configuration `q`.
    pub fn update_frame_poses<K: Kinematics>(
        &mut self,
        kinematics: &K,
        q: &[f64],
    ) -> KinematicsResult<()> {
        for (frame, pose) in self.frames.iter_mut() {
            *pose = kinematics.calc_frame_pose_in_world(q, *frame)?;
        }
        debug!(frames = self.frames.len(), "updated frame poses");
        Ok(())
    }
}

impl Default for GeometryScene {
    fn default() -> Self {
        GeometryScene::new()
    }
}

impl GeometryQuery for GeometryScene {
    fn shape(&self, id: GeometryId) -> Option<&Shape> {
        self.geometries.get(&id).map(|g| &g.shape)
    }

    fn frame_id(&self, id: GeometryId) -> Option<FrameId> {
        self.geometries.get(&id).map(|g| g.frame)
    }

    fn pose_in_frame(&self, id: GeometryId) -> Option<RigidTransform> {
        self.geometries.get(&id).map(|g| g.pose_in_frame)
    }

    fn frame_pose_in_world(&self, frame: FrameId) -> Option<RigidTransform> {
        self.frames.get(&frame).cloned()
    }
}

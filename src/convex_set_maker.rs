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

//! Converts scene geometry into convex sets.
//!
//! Every collision shape kind has exactly one convex set representation:
//!
//! | shape       | set                                             |
//! |-------------|-------------------------------------------------|
//! | `Box`       | `HPolyhedron` with six faces                    |
//! | `Capsule`   | `MinkowskiSum` of a sphere and a segment        |
//! | `Cylinder`  | `CartesianProduct` of a disk and an interval    |
//! | `Ellipsoid` | `Hyperellipsoid`                                |
//! | `HalfSpace` | `HPolyhedron` with one face                     |
//! | `Sphere`    | `Hyperellipsoid`                                |
//! | `Convex`    | `VPolytope` of the vertices                     |
//! | `Mesh`      | `VPolytope` of the vertices (the convex hull)   |
//!
//! Sets are expressed in the reference frame R if one is set, otherwise in
//! the frame the geometry is attached to.

use cgmath::{Matrix3, Point3, Transform};
use nalgebra::{DMatrix, DVector};
use tracing::trace;

use crate::convex_set::{
    CartesianProduct, ConvexSet, HPolyhedron, Hyperellipsoid, MinkowskiSum, VPolytope,
};
use crate::error::{ConvexSetError, ConvexSetResult};
use crate::geom::{RigidTransform, Shape};
use crate::ids::{FrameId, GeometryId};
use crate::scene::GeometryQuery;

/// Produces a fresh convex set for a shape on every call.
pub struct ConvexSetMaker<'a, Q: GeometryQuery + ?Sized> {
    query: &'a Q,
    reference_frame: Option<FrameId>,
    geometry_id: Option<GeometryId>,
}

impl<'a, Q: GeometryQuery + ?Sized> ConvexSetMaker<'a, Q> {
    pub fn new(query: &'a Q, reference_frame: Option<FrameId>) -> Self {
        ConvexSetMaker {
            query,
            reference_frame,
            geometry_id: None,
        }
    }

    pub fn set_reference_frame(&mut self, frame: FrameId) -> ConvexSetResult<()> {
        if !frame.is_valid() {
            return Err(ConvexSetError::InvalidReferenceFrame(frame));
        }
        self.reference_frame = Some(frame);
        Ok(())
    }

    pub fn reference_frame(&self) -> Option<FrameId> {
        self.reference_frame
    }

    /// Sets the geometry whose pose subsequent conversions use.
    pub fn set_geometry_id(&mut self, id: GeometryId) {
        self.geometry_id = Some(id);
    }

    /// Looks up the shape of `id` and converts it.
    pub fn make_for_geometry(&mut self, id: GeometryId) -> ConvexSetResult<ConvexSet> {
        self.set_geometry_id(id);
        let shape = self
            .query
            .shape(id)
            .ok_or(ConvexSetError::UnknownGeometry(id))?;
        self.make_convex_set(shape)
    }

    /// `X_RG`, or `X_FG` when no reference frame is set.
    fn pose(&self) -> ConvexSetResult<RigidTransform> {
        let id = self.geometry_id.ok_or(ConvexSetError::GeometryNotSet)?;
        match self.reference_frame {
            Some(r) => {
                let x_wr = self
                    .query
                    .frame_pose_in_world(r)
                    .ok_or(ConvexSetError::UnknownFrame(r))?;
                let x_wg = self
                    .query
                    .pose_in_world(id)
                    .ok_or(ConvexSetError::UnknownGeometry(id))?;
                let x_rw = x_wr
                    .inverse_transform()
                    .ok_or(ConvexSetError::InvalidReferenceFrame(r))?;
                Ok(x_rw.concat(&x_wg))
            }
            None => self
                .query
                .pose_in_frame(id)
                .ok_or(ConvexSetError::UnknownGeometry(id)),
        }
    }

    /// Converts `shape`, placed at the current geometry's pose.
    pub fn make_convex_set(&self, shape: &Shape) -> ConvexSetResult<ConvexSet> {
        shape.validate()?;
        let x = self.pose()?;
        let rot = rotation(&x);
        let t = DVector::from_column_slice(&[x.disp.x, x.disp.y, x.disp.z]);
        trace!(kind = shape.kind_name(), "making convex set");

        let set = match shape {
            Shape::Box { half_extents: h } => {
                let ub = DVector::from_column_slice(&[h.x, h.y, h.z]);
                let local = HPolyhedron::make_box(&(-&ub), &ub)?;
                rigid_hpolyhedron(&local, &rot, &t)?.into()
            }
            Shape::Capsule { radius, length } => {
                let axis = &rot.column(2) * (length * 0.5);
                let ends = DMatrix::from_columns(&[&t + &axis, &t - &axis]);
                let ball = Hyperellipsoid::make_hypersphere(*radius, DVector::zeros(3))?;
                MinkowskiSum::new(vec![ball.into(), VPolytope::new(ends)?.into()])?.into()
            }
            Shape::Cylinder { radius, length } => {
                let disk = Hyperellipsoid::make_hypersphere(*radius, DVector::zeros(2))?;
                let half = DVector::from_element(1, length * 0.5);
                let interval = HPolyhedron::make_box(&(-&half), &half)?;
                // x_G = Rᵀ x_R - Rᵀ t
                let a = rot.transpose();
                let b = -(&a * &t);
                CartesianProduct::new(vec![disk.into(), interval.into()], a, b)?.into()
            }
            Shape::Ellipsoid { a, b, c } => {
                let inverse_axes = DVector::from_column_slice(&[1.0 / a, 1.0 / b, 1.0 / c]);
                let scale = DMatrix::from_diagonal(&inverse_axes);
                Hyperellipsoid::new(scale * rot.transpose(), t)?.into()
            }
            Shape::HalfSpace => {
                let normal = DMatrix::from_row_slice(1, 3, &[0.0, 0.0, 1.0]);
                let local = HPolyhedron::new(normal, DVector::zeros(1))?;
                rigid_hpolyhedron(&local, &rot, &t)?.into()
            }
            Shape::Sphere { radius } => Hyperellipsoid::make_hypersphere(*radius, t)?.into(),
            Shape::Convex(mesh) | Shape::Mesh(mesh) => {
                let columns: Vec<DVector<f64>> = mesh
                    .scaled_verts()
                    .map(|p| point_to_vector(x.transform_point(p)))
                    .collect();
                VPolytope::new(DMatrix::from_columns(&columns))?.into()
            }
            Shape::Cone { .. } => return Err(ConvexSetError::UnsupportedShape(shape.kind_name())),
        };
        Ok(set)
    }
}

fn rotation(x: &RigidTransform) -> DMatrix<f64> {
    let m = Matrix3::from(x.rot);
    // cgmath matrices are column-major: m[col][row]
    DMatrix::from_fn(3, 3, |r, c| m[c][r])
}

fn point_to_vector(p: Point3<f64>) -> DVector<f64> {
    DVector::from_column_slice(&[p.x, p.y, p.z])
}

/// Re-expresses `{x_G | A x_G <= b}` in the frame where `x = R x_G + t`.
fn rigid_hpolyhedron(
    local: &HPolyhedron,
    rot: &DMatrix<f64>,
    t: &DVector<f64>,
) -> ConvexSetResult<HPolyhedron> {
    let a = local.a() * rot.transpose();
    let b = local.b() + &a * t;
    HPolyhedron::new(a, b)
}

#[cfg(test)]
mod tests {
    mod convex_set_maker {
        use cgmath::{Quaternion, Rad, Rotation3, Vector3};
        use nalgebra::DVector;

        use crate::convex_set::ConvexSet;
        use crate::convex_set_maker::ConvexSetMaker;
        use crate::error::ConvexSetError;
        use crate::geom::{rigid_transform, translation, Shape};
        use crate::ids::{FrameId, GeometryId};
        use crate::mesh::Mesh;
        use crate::scene::GeometryScene;

        fn v(xs: &[f64]) -> DVector<f64> {
            DVector::from_row_slice(xs)
        }

        fn scene_with(shape: Shape) -> (GeometryScene, GeometryId) {
            let mut scene = GeometryScene::new();
            let body = FrameId::new(1);
            scene.set_frame_pose(body, translation(10.0, 0.0, 0.0));
            let quarter_z = Quaternion::from_angle_z(Rad(std::f64::consts::FRAC_PI_2));
            let pose = rigid_transform(quarter_z, Vector3::new(1.0, 0.0, 0.0));
            let id = scene.register_geometry("g", body, pose, shape);
            (scene, id)
        }

        #[test]
        fn test_box_contains_its_center() {
            let (scene, id) = scene_with(Shape::new_box(1.0, 2.0, 3.0));
            let mut maker = ConvexSetMaker::new(&scene, None);
            let set = maker.make_for_geometry(id).unwrap();
            assert!(matches!(set, ConvexSet::HPolyhedron(_)));
            assert!(set.point_in_set(&v(&[1.0, 0.0, 0.0]), 0.0).unwrap());
            // Rotated a quarter turn about z, so the long side lies along x.
            assert!(set.point_in_set(&v(&[1.9, 0.0, 0.0]), 1e-9).unwrap());
            assert!(!set.point_in_set(&v(&[1.0, 0.9, 0.0]), 1e-9).unwrap());
        }

        #[test]
        fn test_reference_frame() {
            let (scene, id) = scene_with(Shape::sphere(0.5));
            let mut maker = ConvexSetMaker::new(&scene, None);
            maker.set_reference_frame(FrameId::world()).unwrap();
            let set = maker.make_for_geometry(id).unwrap();
            assert_eq!(set.maybe_get_point().unwrap(), Some(v(&[11.0, 0.0, 0.0])));
            assert_eq!(
                maker.set_reference_frame(FrameId::default()),
                Err(ConvexSetError::InvalidReferenceFrame(FrameId::default()))
            );
        }

        #[test]
        fn test_capsule_cylinder_ellipsoid_halfspace() {
            let (scene, id) = scene_with(Shape::Capsule { radius: 0.25, length: 2.0 });
            let set = ConvexSetMaker::new(&scene, None).make_for_geometry(id).unwrap();
            assert!(set.point_in_set(&v(&[1.0, 0.0, 1.2]), 1e-6).unwrap());
            assert!(!set.point_in_set(&v(&[1.0, 0.0, 1.4]), 1e-6).unwrap());

            let (scene, id) = scene_with(Shape::Cylinder { radius: 0.25, length: 2.0 });
            let set = ConvexSetMaker::new(&scene, None).make_for_geometry(id).unwrap();
            assert!(set.point_in_set(&v(&[1.2, 0.0, 0.9]), 1e-9).unwrap());
            assert!(!set.point_in_set(&v(&[1.0, 0.0, 1.1]), 1e-9).unwrap());

            let (scene, id) = scene_with(Shape::Ellipsoid { a: 2.0, b: 0.5, c: 0.5 });
            let set = ConvexSetMaker::new(&scene, None).make_for_geometry(id).unwrap();
            // The long axis now points along y.
            assert!(set.point_in_set(&v(&[1.0, 1.9, 0.0]), 1e-9).unwrap());
            assert!(!set.point_in_set(&v(&[2.9, 0.0, 0.0]), 1e-9).unwrap());

            let (scene, id) = scene_with(Shape::HalfSpace);
            let set = ConvexSetMaker::new(&scene, None).make_for_geometry(id).unwrap();
            assert!(set.point_in_set(&v(&[100.0, -3.0, -1.0]), 0.0).unwrap());
            assert!(!set.point_in_set(&v(&[0.0, 0.0, 0.5]), 0.0).unwrap());
        }

        #[test]
        fn test_mesh_uses_vertices() {
            let mut cube = Mesh::unit_cube();
            cube.scale = 2.0;
            let (scene, id) = scene_with(Shape::Mesh(cube));
            match ConvexSetMaker::new(&scene, None).make_for_geometry(id).unwrap() {
                ConvexSet::VPolytope(poly) => {
                    assert_eq!(poly.vertices().ncols(), 8);
                    for c in poly.vertices().column_iter() {
                        assert!((c[0] - 1.0).abs() <= 1.0 + 1e-12);
                    }
                }
                other => panic!("expected a V-polytope, got {:?}", other),
            }
        }

        #[test]
        fn test_rejected_shapes() {
            let (scene, id) = scene_with(Shape::Cone { height: 1.0, a: 1.0, b: 1.0 });
            let mut maker = ConvexSetMaker::new(&scene, None);
            assert_eq!(maker.make_for_geometry(id), Err(ConvexSetError::UnsupportedShape("Cone")));

            maker.set_geometry_id(id);
            assert!(matches!(
                maker.make_convex_set(&Shape::sphere(0.0)),
                Err(ConvexSetError::MalformedShape { kind: "Sphere", .. })
            ));

            let fresh = ConvexSetMaker::new(&scene, None);
            assert_eq!(
                fresh.make_convex_set(&Shape::sphere(1.0)),
                Err(ConvexSetError::GeometryNotSet)
            );
            let mut lost = ConvexSetMaker::new(&scene, None);
            assert_eq!(
                lost.make_for_geometry(GeometryId::new(99)),
                Err(ConvexSetError::UnknownGeometry(GeometryId::new(99)))
            );
        }
    }
}

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

//! Geometric shapes attached to bodies and the rigid transforms that place
//! them.
//!
//! Every shape is described in its own geometry frame G:
//!
//! - `Box`: centered at the origin with the given half extents along x, y, z.
//! - `Capsule`, `Cylinder`: centered at the origin, axis along z, `length`
//!   measured between the centers of the end caps.
//! - `Ellipsoid`: principal semi-axes `a`, `b`, `c` along x, y, z.
//! - `HalfSpace`: everything with z <= 0, i.e. outward normal +z.
//! - `Sphere`: centered at the origin.
//! - `Convex`, `Mesh`: vertices given directly in G.
//! - `Cone`: a visualization-only shape with no collision representation.

use cgmath::{Decomposed, InnerSpace, Point3, Quaternion, Vector3, Zero};
use serde::{Deserialize, Serialize};

use crate::error::{ConvexSetError, ConvexSetResult};
use crate::mesh::Mesh;

/// A rigid transform. The scale is always 1.
pub type RigidTransform = Decomposed<Vector3<f64>, Quaternion<f64>>;

/// Creates a rigid transform from a (not necessarily normalized) rotation
/// and a translation.
pub fn rigid_transform(rot: Quaternion<f64>, disp: Vector3<f64>) -> RigidTransform {
    Decomposed {
        scale: 1.0,
        rot: rot.normalize(),
        disp,
    }
}

pub fn identity_transform() -> RigidTransform {
    rigid_transform(Quaternion::new(1.0, 0.0, 0.0, 0.0), Vector3::zero())
}

/// A pure translation.
pub fn translation(x: f64, y: f64, z: f64) -> RigidTransform {
    rigid_transform(Quaternion::new(1.0, 0.0, 0.0, 0.0), Vector3::new(x, y, z))
}

/// The kinds of geometry a scene can hold.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Shape {
    Box { half_extents: Vector3<f64> },
    Capsule { radius: f64, length: f64 },
    Cylinder { radius: f64, length: f64 },
    Ellipsoid { a: f64, b: f64, c: f64 },
    HalfSpace,
    Sphere { radius: f64 },
    Convex(Mesh),
    Mesh(Mesh),
    Cone { height: f64, a: f64, b: f64 },
}

impl Shape {
    pub fn new_box(width: f64, depth: f64, height: f64) -> Self {
        Shape::Box {
            half_extents: Vector3::new(width * 0.5, depth * 0.5, height * 0.5),
        }
    }

    pub fn sphere(radius: f64) -> Self {
        Shape::Sphere { radius }
    }

    /// A short name for the shape kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Shape::Box { .. } => "Box",
            Shape::Capsule { .. } => "Capsule",
            Shape::Cylinder { .. } => "Cylinder",
            Shape::Ellipsoid { .. } => "Ellipsoid",
            Shape::HalfSpace => "HalfSpace",
            Shape::Sphere { .. } => "Sphere",
            Shape::Convex(_) => "Convex",
            Shape::Mesh(_) => "Mesh",
            Shape::Cone { .. } => "Cone",
        }
    }

    /// Checks that the parameters describe a non-degenerate shape.
    pub fn validate(&self) -> ConvexSetResult<()> {
        let kind = self.kind_name();
        let malformed = |reason: String| Err(ConvexSetError::MalformedShape { kind, reason });
        let positive = |name: &str, v: f64| -> ConvexSetResult<()> {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(ConvexSetError::MalformedShape {
                    kind,
                    reason: format!("{} must be finite and positive, got {}", name, v),
                })
            }
        };
        match self {
            Shape::Box { half_extents: h } => {
                positive("half extent x", h.x)?;
                positive("half extent y", h.y)?;
                positive("half extent z", h.z)
            }
            Shape::Capsule { radius, length } | Shape::Cylinder { radius, length } => {
                positive("radius", *radius)?;
                if length.is_finite() && *length >= 0.0 {
                    Ok(())
                } else {
                    malformed(format!("length must be finite and non-negative, got {}", length))
                }
            }
            Shape::Ellipsoid { a, b, c } => {
                positive("a", *a)?;
                positive("b", *b)?;
                positive("c", *c)
            }
            Shape::HalfSpace => Ok(()),
            Shape::Sphere { radius } => positive("radius", *radius),
            Shape::Convex(mesh) | Shape::Mesh(mesh) => {
                positive("scale", mesh.scale)?;
                if mesh.verts.is_empty() {
                    return malformed("mesh has no vertices".to_string());
                }
                if mesh.verts.iter().any(|p| !finite_point(p)) {
                    return malformed("mesh has non-finite vertices".to_string());
                }
                Ok(())
            }
            Shape::Cone { height, a, b } => {
                positive("height", *height)?;
                positive("a", *a)?;
                positive("b", *b)
            }
        }
    }
}

fn finite_point(p: &Point3<f64>) -> bool {
    p.x.is_finite() && p.y.is_finite() && p.z.is_finite()
}

#[cfg(test)]
mod tests {
    mod geom {
        use cgmath::{Point3, Vector3};

        use crate::error::ConvexSetError;
        use crate::geom::Shape;
        use crate::mesh::Mesh;

        #[test]
        fn test_new_box() {
            match Shape::new_box(2.0, 4.0, 6.0) {
                Shape::Box { half_extents } => {
                    assert_eq!(half_extents, Vector3::new(1.0, 2.0, 3.0))
                }
                _ => panic!("expected a box"),
            }
        }

        #[test]
        fn test_validate() {
            assert!(Shape::sphere(1.0).validate().is_ok());
            assert!(Shape::HalfSpace.validate().is_ok());
            assert!(matches!(
                Shape::sphere(-1.0).validate(),
                Err(ConvexSetError::MalformedShape { kind: "Sphere", .. })
            ));
            assert!(Shape::Capsule { radius: 0.5, length: f64::NAN }.validate().is_err());
            assert!(Shape::Mesh(Mesh::new()).validate().is_err());
            let mut mesh = Mesh::new();
            mesh.push_vert(Point3::new(0.0, 0.0, 0.0));
            assert!(Shape::Convex(mesh).validate().is_ok());
        }

        #[test]
        fn test_deserialize() {
            let shape: Shape = serde_json::from_str(r#"{"Sphere":{"radius":0.25}}"#).unwrap();
            assert_eq!(shape.kind_name(), "Sphere");
            let shape: Shape = serde_json::from_str(r#""HalfSpace""#).unwrap();
            assert_eq!(shape.kind_name(), "HalfSpace");
        }
    }
}

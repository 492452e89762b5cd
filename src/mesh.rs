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

use std::vec::Vec;

use cgmath::{EuclideanSpace, Point3};
use serde::{Deserialize, Serialize};

/// A triangle mesh is a set of triangles that forms some sort of surface. There
/// are no requirements on the convexivity of the mesh; as an obstacle it is
/// represented by the convex hull of its vertices.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Mesh {
    pub scale: f64,
    pub verts: Vec<Point3<f64>>,
    pub faces: Vec<(usize, usize, usize)>,
}

impl Mesh {
    pub fn new() -> Self {
        Mesh {
            scale: 1.0,
            verts: Vec::new(),
            faces: Vec::new(),
        }
    }

    pub fn with_capacity(cap_verts: usize, cap_faces: usize) -> Self {
        Mesh {
            scale: 1.0,
            verts: Vec::with_capacity(cap_verts),
            faces: Vec::with_capacity(cap_faces),
        }
    }

    pub fn push_vert(&mut self, p: Point3<f64>) -> usize {
        let id = self.verts.len();
        self.verts.push(p);
        id
    }

    /// Adds a face. Panics if any index does not refer to a pushed vertex.
    pub fn push_face(&mut self, f: (usize, usize, usize)) -> usize {
        let n = self.verts.len();
        if f.0 >= n || f.1 >= n || f.2 >= n {
            panic!("face {:?} refers to a vertex outside of 0..{}", f, n);
        }
        let index = self.faces.len();
        self.faces.push(f);
        index
    }

    /// Vertices with the mesh scale applied.
    pub fn scaled_verts<'a>(&'a self) -> impl Iterator<Item = Point3<f64>> + 'a {
        let scale = self.scale;
        self.verts.iter().map(move |p| Point3::from_vec(p.to_vec() * scale))
    }

    /// An axis aligned unit cube centered at the origin, 8 vertices and 12
    /// faces.
    pub fn unit_cube() -> Self {
        let mut mesh = Mesh::with_capacity(8, 12);
        for i in 0..8 {
            let c = |bit: usize| if i & bit == 0 { -0.5 } else { 0.5 };
            mesh.push_vert(Point3::new(c(1), c(2), c(4)));
        }
        for &(a, b, c) in [
            (0, 2, 1), (1, 2, 3), (4, 5, 6), (5, 7, 6),
            (0, 1, 4), (1, 5, 4), (2, 6, 3), (3, 6, 7),
            (0, 4, 2), (2, 4, 6), (1, 3, 5), (3, 7, 5),
        ].iter() {
            mesh.push_face((a, b, c));
        }
        mesh
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Mesh::new()
    }
}

#[cfg(test)]
mod tests {
    mod mesh {
        use cgmath::Point3;

        use crate::mesh::Mesh;

        #[test]
        fn test_unit_cube() {
            let mut cube = Mesh::unit_cube();
            assert_eq!(cube.verts.len(), 8);
            assert_eq!(cube.faces.len(), 12);
            cube.scale = 2.0;
            for p in cube.scaled_verts() {
                assert_eq!(p.x.abs(), 1.0);
                assert_eq!(p.y.abs(), 1.0);
                assert_eq!(p.z.abs(), 1.0);
            }
        }

        #[test]
        #[should_panic]
        fn test_face_out_of_range() {
            let mut mesh = Mesh::new();
            mesh.push_vert(Point3::new(0.0, 0.0, 0.0));
            mesh.push_face((0, 1, 2));
        }
    }
}

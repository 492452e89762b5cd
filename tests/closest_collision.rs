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

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use iris_collision::cgmath::Vector3;
use iris_collision::nalgebra::{DMatrix, DVector};
use iris_collision::*;

/// A body sliding along world x carrying sphere A (radius 1) at its origin,
/// and sphere B (radius 1) welded to the world at x = 3. The spheres touch
/// at q = 1.
struct Slider {
    tree: Arc<KinematicTree>,
    scene: GeometryScene,
    frame_a: FrameId,
    sphere_a: GeometryId,
    sphere_b: GeometryId,
}

fn slider() -> Slider {
    let mut tree = KinematicTree::new();
    let frame_a = tree
        .add_frame("slider", FrameId::world(), identity_transform(),
                   Joint::Prismatic { axis: Vector3::new(1.0, 0.0, 0.0) })
        .unwrap();
    let mut scene = GeometryScene::new();
    let sphere_a =
        scene.register_geometry("a", frame_a, identity_transform(), Shape::sphere(1.0));
    let sphere_b = scene.register_geometry(
        "b",
        FrameId::world(),
        translation(3.0, 0.0, 0.0),
        Shape::sphere(1.0),
    );
    Slider {
        tree: Arc::new(tree),
        scene,
        frame_a,
        sphere_a,
        sphere_b,
    }
}

/// `|q| <= half_width`.
fn interval(half_width: f64) -> (DMatrix<f64>, DVector<f64>) {
    (
        DMatrix::from_column_slice(2, 1, &[1.0, -1.0]),
        DVector::from_element(2, half_width),
    )
}

fn program(
    s: &Slider,
    constraint: CollisionConstraint<KinematicTree>,
    half_width: f64,
) -> ClosestCollisionProgram {
    program_on(s, constraint, s.frame_a, half_width)
}

/// Like `program`, with sphere A attached to `frame_a` in the constraint.
fn program_on(
    s: &Slider,
    constraint: CollisionConstraint<KinematicTree>,
    frame_a: FrameId,
    half_width: f64,
) -> ClosestCollisionProgram {
    let mut maker = ConvexSetMaker::new(&s.scene, None);
    let set_a = maker.make_for_geometry(s.sphere_a).unwrap();
    let set_b = maker.make_for_geometry(s.sphere_b).unwrap();
    let ellipsoid = Hyperellipsoid::make_hypersphere(1.0, DVector::zeros(1)).unwrap();
    let (a, b) = interval(half_width);
    let frame_b = FrameId::world();
    ClosestCollisionProgram::new(constraint, frame_a, frame_b, &set_a, &set_b, &ellipsoid, a, b)
        .unwrap()
}

fn same_point(s: &Slider) -> CollisionConstraint<KinematicTree> {
    CollisionConstraint::SamePoint(SamePointConstraint::new(s.tree.clone()))
}

fn bounded(s: &Slider, margin: f64, half_width: f64) -> ClosestCollisionProgram {
    let constraint = PointsBoundedDistanceConstraint::new(s.tree.clone(), margin).unwrap();
    program(s, CollisionConstraint::BoundedDistance(constraint), half_width)
}

/// The distance between the witness points of the last solve.
fn witness_distance(prog: &ClosestCollisionProgram, q: f64) -> f64 {
    let (p_aa, p_bb) = prog.last_witness_points().unwrap();
    let p_wa = DVector::from_vec(vec![q + p_aa[0], p_aa[1], p_aa[2]]);
    (p_wa - p_bb).norm()
}

#[test]
fn test_contact_outside_region_is_infeasible() {
    let s = slider();
    let mut prog = program(&s, same_point(&s), 0.5);
    let found = prog.solve(&AugmentedLagrangianSolver::new(), None, None).unwrap();
    assert_eq!(found, None);
    assert!(prog.last_witness_points().is_none());
}

#[test]
fn test_tight_tolerance_is_not_infeasible() {
    let s = slider();
    for tol in [1e-9, 1e-11, 1e-13] {
        let mut prog = program(&s, same_point(&s), 2.0);
        let options = SolverOptions {
            feasibility_tolerance: tol,
            ..SolverOptions::default()
        };
        match prog.solve(&AugmentedLagrangianSolver::new(), None, Some(&options)) {
            Ok(Some(q)) => assert_abs_diff_eq!(q[0], 1.0, epsilon = 1e-4),
            Ok(None) => panic!("contact at q = 1 reported unreachable with tolerance {}", tol),
            Err(CollisionSearchError::SolverFailure { status, .. }) => {
                assert_ne!(status, SolutionStatus::InfeasibleConstraints)
            }
            Err(err) => panic!("unexpected error with tolerance {}: {}", tol, err),
        }
    }
}

#[test]
fn test_zero_margin_reaches_contact() {
    let s = slider();
    let mut prog = bounded(&s, 0.0, 2.0);
    let q = prog
        .solve(&AugmentedLagrangianSolver::new(), None, None)
        .unwrap()
        .expect("the spheres touch at q = 1");
    assert_abs_diff_eq!(q[0], 1.0, epsilon = 1e-3);
    assert_abs_diff_eq!(witness_distance(&prog, q[0]), 0.0, epsilon = 1e-3);

    let mut prog = bounded(&s, 0.0, 0.5);
    assert_eq!(prog.solve(&AugmentedLagrangianSolver::new(), None, None).unwrap(), None);
}

#[test]
fn test_unknown_frame_is_an_evaluation_error() {
    let s = slider();
    let mut prog = program_on(&s, same_point(&s), FrameId::new(9), 2.0);
    let result = prog.solve(&AugmentedLagrangianSolver::new(), None, None);
    assert!(
        matches!(result, Err(CollisionSearchError::Solver(SolverError::Evaluation(_)))),
        "got {:?}",
        result
    );
    assert!(prog.last_witness_points().is_none());
}

#[test]
fn test_active_margin() {
    let s = slider();
    let mut prog = bounded(&s, 0.5, 1.0);
    let q = prog
        .solve(&AugmentedLagrangianSolver::new(), None, None)
        .unwrap()
        .expect("a configuration within the margin exists");
    assert_abs_diff_eq!(q[0], 0.5, epsilon = 1e-3);
    assert_abs_diff_eq!(witness_distance(&prog, q[0]), 0.5, epsilon = 1e-3);
}

#[test]
fn test_inactive_margin() {
    let s = slider();
    let mut prog = bounded(&s, 1.5, 0.5);
    let q = prog
        .solve(&AugmentedLagrangianSolver::new(), None, None)
        .unwrap()
        .expect("the ellipsoid center is already within the margin");
    assert!(q[0].abs() <= 0.5 + 1e-6);
    assert!(witness_distance(&prog, q[0]) <= 1.5 + 1e-3);
}

#[test]
fn test_update_polytope_then_solve() {
    let s = slider();
    let mut prog = bounded(&s, 0.5, 1.0);
    // 0.8 <= q <= 1
    let a = DMatrix::from_column_slice(2, 1, &[1.0, -1.0]);
    let b = DVector::from_vec(vec![1.0, -0.8]);
    prog.update_polytope(a.clone(), b.clone()).unwrap();
    let q = prog.solve(&AugmentedLagrangianSolver::new(), None, None).unwrap().unwrap();
    let slack = &a * &q - &b;
    assert!(slack.iter().all(|v| *v <= 1e-5));
    assert_abs_diff_eq!(q[0], 0.8, epsilon = 1e-3);

    // Shrinking the region below the contact makes the program infeasible.
    let (a, b) = interval(0.2);
    prog.update_polytope(a, b).unwrap();
    assert_eq!(prog.solve(&AugmentedLagrangianSolver::new(), None, None).unwrap(), None);
}

#[test]
fn test_margin_update_takes_effect() {
    let s = slider();
    let mut prog = bounded(&s, 0.1, 0.5);
    assert_eq!(prog.solve(&AugmentedLagrangianSolver::new(), None, None).unwrap(), None);
    prog.set_max_distance(0.6).unwrap();
    let q = prog.solve(&AugmentedLagrangianSolver::new(), None, None).unwrap().unwrap();
    assert_abs_diff_eq!(q[0], 0.4, epsilon = 1e-3);
}

#[test]
fn test_repeated_solves_agree() {
    let s = slider();
    let mut prog = bounded(&s, 0.5, 1.0);
    let solver = AugmentedLagrangianSolver::new();
    let guess = DVector::from_element(1, 0.3);
    let first = prog.solve(&solver, Some(&guess), None).unwrap();
    let second = prog.solve(&solver, Some(&guess), None).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_iteration_limit_is_a_failure() {
    let s = slider();
    let mut prog = bounded(&s, 0.5, 1.0);
    let options = SolverOptions {
        max_outer_iterations: 1,
        max_inner_iterations: 1,
        ..SolverOptions::default()
    };
    match prog.solve(&AugmentedLagrangianSolver::new(), None, Some(&options)) {
        Err(CollisionSearchError::SolverFailure { solver, status }) => {
            assert_eq!(solver, AugmentedLagrangianSolver::NAME);
            assert_eq!(status, SolutionStatus::IterationLimit);
        }
        other => panic!("expected a solver failure, got {:?}", other),
    }
}

#[test]
fn test_box_contains_its_center() {
    let mut scene = GeometryScene::new();
    let id = scene.register_geometry(
        "box",
        FrameId::world(),
        translation(1.0, 2.0, 3.0),
        Shape::new_box(0.2, 0.4, 0.6),
    );
    let mut maker = ConvexSetMaker::new(&scene, None);
    let set = maker.make_for_geometry(id).unwrap();
    assert!(set.point_in_set(&DVector::from_vec(vec![1.0, 2.0, 3.0]), 0.0).unwrap());
}

#[test]
fn test_shapes_without_a_set_are_rejected() {
    let mut scene = GeometryScene::new();
    let cone = scene.register_geometry("cone", FrameId::world(), identity_transform(),
                                       Shape::Cone { height: 1.0, a: 0.5, b: 0.5 });
    let flat = scene.register_geometry("flat", FrameId::world(), identity_transform(),
                                       Shape::Box { half_extents: Vector3::new(1.0, 0.0, 1.0) });
    let mut maker = ConvexSetMaker::new(&scene, None);
    assert_eq!(maker.make_for_geometry(cone), Err(ConvexSetError::UnsupportedShape("Cone")));
    assert!(matches!(
        maker.make_for_geometry(flat),
        Err(ConvexSetError::MalformedShape { kind: "Box", .. })
    ));
}

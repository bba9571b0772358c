use inovo_iva::geometry::Transform;

const TOL_MM: f64 = 1e-6;
const TOL_DEG: f64 = 1e-4;

fn sample() -> Vec<Transform> {
    vec![
        Transform::identity(),
        Transform::new([400.0, 0.0, 300.0], [180.0, 0.0, 0.0]),
        Transform::new([-12.5, 88.0, 4.0], [10.0, -35.0, 120.0]),
        Transform::new([0.0, 250.0, -75.0], [-90.0, 45.0, -170.0]),
    ]
}

#[test]
fn identity_is_neutral_for_compose() {
    let id = Transform::identity();
    for t in sample() {
        assert!(id.compose(&t).approx_eq(&t, TOL_MM, TOL_DEG), "{:?}", t);
        assert!(t.compose(&id).approx_eq(&t, TOL_MM, TOL_DEG), "{:?}", t);
    }
}

#[test]
fn compose_with_inverse_is_identity() {
    let id = Transform::identity();
    for t in sample() {
        assert!(t.compose(&t.invert()).approx_eq(&id, TOL_MM, TOL_DEG), "{:?}", t);
        assert!(t.invert().compose(&t).approx_eq(&id, TOL_MM, TOL_DEG), "{:?}", t);
    }
}

#[test]
fn compose_is_associative() {
    let ts = sample();
    let (a, b, c) = (ts[1], ts[2], ts[3]);
    let left = a.compose(&b).compose(&c);
    let right = a.compose(&b.compose(&c));
    assert!(left.approx_eq(&right, TOL_MM, TOL_DEG));
}

#[test]
fn matrix_round_trip_preserves_pose() {
    for t in sample() {
        let back = Transform::from_matrix(&t.to_matrix());
        assert!(back.approx_eq(&t, TOL_MM, TOL_DEG), "{:?} -> {:?}", t, back);
    }
}

#[test]
fn compose_moves_in_tool_frame_and_then_in_base_frame() {
    // Tool pointing down: its own -z is the base +z.
    let approach = Transform::new([400.0, 0.0, 300.0], [180.0, 0.0, 0.0]);
    let step = Transform::from_z(-50.0);

    let in_tool = approach.compose(&step);
    let in_base = approach.then(&step);

    assert!((in_tool.z() - 350.0).abs() < 1e-9);
    assert!((in_base.z() - 250.0).abs() < 1e-9);
    assert!((in_base.x() - 400.0).abs() < 1e-9);
    assert!(in_base.approx_eq(&step.compose(&approach), TOL_MM, TOL_DEG));
}

#[test]
fn then_relative_rotates_in_place() {
    let pose = Transform::new([400.0, 100.0, 300.0], [180.0, 0.0, 0.0]);
    let turned = pose.then_relative_rz(30.0);

    assert!((turned.x() - 400.0).abs() < 1e-9);
    assert!((turned.y() - 100.0).abs() < 1e-9);
    assert!((turned.z() - 300.0).abs() < 1e-9);
    assert!(!turned.approx_eq(&pose, 1e-3, 1e-3));
}

#[test]
fn compose_relative_with_identity_reference_is_compose() {
    let ts = sample();
    let id = Transform::identity();
    for a in &ts {
        for b in &ts {
            let relative = a.compose_relative(b, &id);
            assert!(relative.approx_eq(&a.compose(b), TOL_MM, TOL_DEG));
        }
    }
}

#[test]
fn compose_relative_rotates_about_reference_point() {
    let rz90 = Transform::from_rz(90.0);
    let pivot = Transform::from_x(10.0);

    let about_pivot = Transform::identity().compose_relative(&rz90, &pivot);
    let about_origin = Transform::identity().compose(&rz90);

    assert!((about_pivot.x() - 10.0).abs() < 1e-9);
    assert!((about_pivot.y() + 10.0).abs() < 1e-9);
    assert!(about_pivot.z().abs() < 1e-9);
    assert!((about_pivot.rz() - 90.0).abs() < 1e-9);

    assert!(about_origin.vec_mm().iter().all(|v| v.abs() < 1e-9));
    assert!(!about_pivot.approx_eq(&about_origin, 1e-3, 1e-3));
}

#[test]
fn pivot_point_stays_fixed_under_relative_rotation() {
    let pivot = Transform::from_vec(10.0, 20.0, 0.0);
    let rotated = pivot.compose_relative(&Transform::from_rz(45.0), &Transform::identity());
    // The reference frame's own origin never moves when rotating about it.
    let centre = Transform::identity().compose_relative(&Transform::from_rz(45.0), &pivot);
    let mapped = centre.compose(&pivot);

    assert!((rotated.x() - 10.0).abs() < 1e-9);
    assert!((mapped.x() - pivot.x()).abs() < 1e-9);
    assert!((mapped.y() - pivot.y()).abs() < 1e-9);
}

#[test]
fn vec_and_euler_projections_split_a_pose() {
    let t = Transform::new([1.0, 2.0, 3.0], [10.0, 20.0, 30.0]);
    assert_eq!(t.vec_only().euler_deg(), [0.0; 3]);
    assert_eq!(t.vec_only().vec_mm(), [1.0, 2.0, 3.0]);
    assert_eq!(t.euler_only().vec_mm(), [0.0; 3]);
    assert_eq!(t.euler_only().euler_deg(), [10.0, 20.0, 30.0]);
}

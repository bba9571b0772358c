//! Spatial transforms: a translation in millimetres plus X-Y-Z Euler angles in
//! degrees.
//!
//! # Convention
//!
//! The rotation is built as `R = Rz(rz) · Ry(ry) · Rx(rx)`: rotate about X
//! first, then Y, then Z, all about fixed axes. The homogeneous matrix is
//!
//! ```text
//! | R  t |
//! | 0  1 |
//! ```
//!
//! Only the `(vec_mm, euler_deg)` pair is stored. Matrices are derived on
//! demand so repeated conversions do not accumulate drift in the stored value.
//!
//! # Gimbal lock
//!
//! When `ry` is ±90° the X and Z rotations act about the same axis and only
//! their sum (or difference) is observable. [`Transform::from_matrix`] then
//! reports `rz = 0` and folds the whole coupled rotation into `rx`. Round
//! trips through a matrix at those angles preserve the rotation, not the
//! individual `rx`/`rz` values.
//!
//! # Examples
//!
//! ```rust
//! use inovo_iva::geometry::Transform;
//!
//! let approach = Transform::from_vec(400.0, 0.0, 300.0).with_ry(180.0);
//! let above = approach.compose(&Transform::from_z(-50.0));
//! assert!((above.z() - 350.0).abs() < 1e-9);
//! ```

use std::ops::Mul;

use nalgebra::{Matrix3, Matrix4, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Below this, `cos(ry)` is treated as zero when extracting Euler angles.
const GIMBAL_EPSILON: f64 = 1e-9;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    vec_mm: [f64; 3],
    euler_deg: [f64; 3],
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        vec_mm: [0.0; 3],
        euler_deg: [0.0; 3],
    };

    pub fn new(vec_mm: [f64; 3], euler_deg: [f64; 3]) -> Self {
        Self { vec_mm, euler_deg }
    }

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    pub fn from_vec(x_mm: f64, y_mm: f64, z_mm: f64) -> Self {
        Self::new([x_mm, y_mm, z_mm], [0.0; 3])
    }

    pub fn from_euler(rx_deg: f64, ry_deg: f64, rz_deg: f64) -> Self {
        Self::new([0.0; 3], [rx_deg, ry_deg, rz_deg])
    }

    pub fn from_x(mm: f64) -> Self {
        Self::from_vec(mm, 0.0, 0.0)
    }
    pub fn from_y(mm: f64) -> Self {
        Self::from_vec(0.0, mm, 0.0)
    }
    pub fn from_z(mm: f64) -> Self {
        Self::from_vec(0.0, 0.0, mm)
    }
    pub fn from_rx(deg: f64) -> Self {
        Self::from_euler(deg, 0.0, 0.0)
    }
    pub fn from_ry(deg: f64) -> Self {
        Self::from_euler(0.0, deg, 0.0)
    }
    pub fn from_rz(deg: f64) -> Self {
        Self::from_euler(0.0, 0.0, deg)
    }

    pub fn vec_mm(&self) -> [f64; 3] {
        self.vec_mm
    }

    pub fn euler_deg(&self) -> [f64; 3] {
        self.euler_deg
    }

    pub fn x(&self) -> f64 {
        self.vec_mm[0]
    }
    pub fn y(&self) -> f64 {
        self.vec_mm[1]
    }
    pub fn z(&self) -> f64 {
        self.vec_mm[2]
    }
    pub fn rx(&self) -> f64 {
        self.euler_deg[0]
    }
    pub fn ry(&self) -> f64 {
        self.euler_deg[1]
    }
    pub fn rz(&self) -> f64 {
        self.euler_deg[2]
    }

    pub fn with_vec(self, x_mm: f64, y_mm: f64, z_mm: f64) -> Self {
        Self::new([x_mm, y_mm, z_mm], self.euler_deg)
    }

    pub fn with_euler(self, rx_deg: f64, ry_deg: f64, rz_deg: f64) -> Self {
        Self::new(self.vec_mm, [rx_deg, ry_deg, rz_deg])
    }

    pub fn with_x(mut self, mm: f64) -> Self {
        self.vec_mm[0] = mm;
        self
    }
    pub fn with_y(mut self, mm: f64) -> Self {
        self.vec_mm[1] = mm;
        self
    }
    pub fn with_z(mut self, mm: f64) -> Self {
        self.vec_mm[2] = mm;
        self
    }
    pub fn with_rx(mut self, deg: f64) -> Self {
        self.euler_deg[0] = deg;
        self
    }
    pub fn with_ry(mut self, deg: f64) -> Self {
        self.euler_deg[1] = deg;
        self
    }
    pub fn with_rz(mut self, deg: f64) -> Self {
        self.euler_deg[2] = deg;
        self
    }

    /// Keeps the translation, zeroes the rotation.
    pub fn vec_only(&self) -> Self {
        Self::new(self.vec_mm, [0.0; 3])
    }

    /// Keeps the rotation, zeroes the translation.
    pub fn euler_only(&self) -> Self {
        Self::new([0.0; 3], self.euler_deg)
    }

    pub fn is_finite(&self) -> bool {
        self.vec_mm.iter().chain(self.euler_deg.iter()).all(|v| v.is_finite())
    }

    pub fn rotation(&self) -> Rotation3<f64> {
        let [rx, ry, rz] = self.euler_deg;
        Rotation3::from_euler_angles(rx.to_radians(), ry.to_radians(), rz.to_radians())
    }

    pub fn translation(&self) -> Vector3<f64> {
        Vector3::from(self.vec_mm)
    }

    /// 4x4 homogeneous matrix of this transform.
    pub fn to_matrix(&self) -> Matrix4<f64> {
        let mut mat = Matrix4::identity();
        mat.fixed_view_mut::<3, 3>(0, 0).copy_from(self.rotation().matrix());
        mat.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation());
        mat
    }

    /// Decomposes a homogeneous matrix back into `(vec, euler)`.
    ///
    /// Only the upper 3x4 block is read; the bottom row is assumed to be
    /// `[0, 0, 0, 1]`.
    pub fn from_matrix(mat: &Matrix4<f64>) -> Self {
        let rot: Matrix3<f64> = mat.fixed_view::<3, 3>(0, 0).into_owned();
        Self::new(
            [mat[(0, 3)], mat[(1, 3)], mat[(2, 3)]],
            euler_from_rotation(&rot),
        )
    }

    /// `M(self) · M(rhs)`: applies `rhs` in this transform's own frame.
    pub fn compose(&self, rhs: &Transform) -> Transform {
        Transform::from_matrix(&(self.to_matrix() * rhs.to_matrix()))
    }

    /// Applies `transform` to `self`, expressed in the frame `reference`.
    ///
    /// Computes `M(self) · M(reference) · M(transform) · M(reference)⁻¹`.
    /// `reference` is given relative to `self`, so an identity reference
    /// reduces this to [`Transform::compose`]. With `self` at the identity
    /// the result is `transform` conjugated about `reference`, e.g. a
    /// rotation about the point `reference.vec_mm()` instead of the origin.
    pub fn compose_relative(&self, transform: &Transform, reference: &Transform) -> Transform {
        let reference_mat = reference.to_matrix();
        let conjugated = reference_mat * transform.to_matrix() * rigid_inverse(&reference_mat);
        Transform::from_matrix(&(self.to_matrix() * conjugated))
    }

    /// `M(self)⁻¹` decomposed back into `(vec, euler)`.
    pub fn invert(&self) -> Transform {
        Transform::from_matrix(&rigid_inverse(&self.to_matrix()))
    }

    /// `M(transform) · M(self)`: applies `transform` after `self` in the base
    /// frame.
    pub fn then(&self, transform: &Transform) -> Transform {
        transform.compose(self)
    }

    pub fn then_x(&self, mm: f64) -> Transform {
        self.then(&Transform::from_x(mm))
    }
    pub fn then_y(&self, mm: f64) -> Transform {
        self.then(&Transform::from_y(mm))
    }
    pub fn then_z(&self, mm: f64) -> Transform {
        self.then(&Transform::from_z(mm))
    }
    pub fn then_rx(&self, deg: f64) -> Transform {
        self.then(&Transform::from_rx(deg))
    }
    pub fn then_ry(&self, deg: f64) -> Transform {
        self.then(&Transform::from_ry(deg))
    }
    pub fn then_rz(&self, deg: f64) -> Transform {
        self.then(&Transform::from_rz(deg))
    }

    /// Base-frame counterpart of [`Transform::compose_relative`]:
    /// `M(reference) · M(transform) · M(reference)⁻¹ · M(self)`.
    ///
    /// An identity reference reduces this to [`Transform::then`].
    pub fn then_relative_to(&self, transform: &Transform, reference: &Transform) -> Transform {
        let reference_mat = reference.to_matrix();
        let conjugated = reference_mat * transform.to_matrix() * rigid_inverse(&reference_mat);
        Transform::from_matrix(&(conjugated * self.to_matrix()))
    }

    /// Applies `transform` about this transform's own position, with base
    /// frame axes. The position stays put for pure rotations.
    pub fn then_relative(&self, transform: &Transform) -> Transform {
        self.then_relative_to(transform, &self.vec_only())
    }

    pub fn then_relative_rx(&self, deg: f64) -> Transform {
        self.then_relative(&Transform::from_rx(deg))
    }
    pub fn then_relative_ry(&self, deg: f64) -> Transform {
        self.then_relative(&Transform::from_ry(deg))
    }
    pub fn then_relative_rz(&self, deg: f64) -> Transform {
        self.then_relative(&Transform::from_rz(deg))
    }

    /// Compares translation distance (mm) and the angle of the relative
    /// rotation (deg). Independent of which Euler triple encodes a rotation.
    pub fn approx_eq(&self, other: &Transform, tol_mm: f64, tol_deg: f64) -> bool {
        let distance = (self.translation() - other.translation()).norm();
        // ||R1 - R2||_F = 2·sqrt(2)·sin(θ/2); stays accurate near θ = 0
        // where acos of the trace does not.
        let chord = (self.rotation().matrix() - other.rotation().matrix()).norm();
        let angle = 2.0 * (chord / (2.0 * std::f64::consts::SQRT_2)).min(1.0).asin();
        distance <= tol_mm && angle.to_degrees() <= tol_deg
    }

    /// Parses the controller's pose reply, e.g.
    /// `{x : 0.1, y : -0.2, z : 0.3, rx : 3.14, ry : 0, rz : 1.57}`.
    ///
    /// The controller reports metres and radians; the result is in mm/deg.
    /// Unknown keys are ignored.
    pub fn from_robot(response: &str) -> Result<Transform, ProtocolError> {
        let cleaned: String = response
            .chars()
            .filter(|c| !matches!(c, ' ' | '{' | '}'))
            .collect();

        let mut values: [Option<f64>; 6] = [None; 6];
        for token in cleaned.split(',').filter(|t| !t.is_empty()) {
            let Some((key, value)) = token.split_once(':') else {
                continue;
            };
            let slot = match key {
                "x" => 0,
                "y" => 1,
                "z" => 2,
                "rx" => 3,
                "ry" => 4,
                "rz" => 5,
                _ => continue,
            };
            let value: f64 = value.parse().map_err(|_| {
                let message = format!("bad `{}` component in `{}`", key, response);
                ProtocolError::MalformedResponse(message)
            })?;
            values[slot] = Some(value);
        }

        let mut out = [0.0; 6];
        for (i, value) in values.iter().enumerate() {
            out[i] = value.ok_or_else(|| {
                ProtocolError::MalformedResponse(format!("incomplete pose `{}`", response))
            })?;
        }

        Ok(Transform::new(
            [out[0] * 1000.0, out[1] * 1000.0, out[2] * 1000.0],
            [out[3].to_degrees(), out[4].to_degrees(), out[5].to_degrees()],
        ))
    }
}

impl Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        self.compose(&rhs)
    }
}

impl Mul<&Transform> for &Transform {
    type Output = Transform;

    fn mul(self, rhs: &Transform) -> Transform {
        self.compose(rhs)
    }
}

/// `[R t]⁻¹ = [Rᵀ  -Rᵀt]`; exact for rigid transforms, no general inversion.
fn rigid_inverse(mat: &Matrix4<f64>) -> Matrix4<f64> {
    let rot_t = mat.fixed_view::<3, 3>(0, 0).transpose();
    let t = mat.fixed_view::<3, 1>(0, 3).into_owned();
    let mut inv = Matrix4::identity();
    inv.fixed_view_mut::<3, 3>(0, 0).copy_from(&rot_t);
    inv.fixed_view_mut::<3, 1>(0, 3).copy_from(&(-(rot_t * t)));
    inv
}

fn euler_from_rotation(rot: &Matrix3<f64>) -> [f64; 3] {
    let cos_ry = rot[(0, 0)].hypot(rot[(1, 0)]);
    let ry = (-rot[(2, 0)]).atan2(cos_ry);

    let (rx, rz) = if cos_ry > GIMBAL_EPSILON {
        (rot[(2, 1)].atan2(rot[(2, 2)]), rot[(1, 0)].atan2(rot[(0, 0)]))
    } else if rot[(2, 0)] < 0.0 {
        // ry = +90°: r12 = sin(rx - rz), r13 = cos(rx - rz)
        (rot[(0, 1)].atan2(rot[(0, 2)]), 0.0)
    } else {
        // ry = -90°: r12 = -sin(rx + rz), r13 = -cos(rx + rz)
        ((-rot[(0, 1)]).atan2(-rot[(0, 2)]), 0.0)
    };

    [rx.to_degrees(), ry.to_degrees(), rz.to_degrees()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_layout() {
        let t = Transform::from_vec(1.0, 2.0, 3.0).with_rz(90.0);
        let m = t.to_matrix();

        assert!((m[(0, 3)] - 1.0).abs() < 1e-12);
        assert!((m[(1, 3)] - 2.0).abs() < 1e-12);
        assert!((m[(2, 3)] - 3.0).abs() < 1e-12);
        assert_eq!(m[(3, 3)], 1.0);
        // rz(90) maps +x onto +y
        assert!((m[(1, 0)] - 1.0).abs() < 1e-12);
        assert!(m[(0, 0)].abs() < 1e-12);
    }

    #[test]
    fn test_rotation_order_is_x_then_y_then_z() {
        let t = Transform::from_euler(30.0, 45.0, 60.0);
        let expected = Rotation3::from_axis_angle(&Vector3::z_axis(), 60f64.to_radians())
            * Rotation3::from_axis_angle(&Vector3::y_axis(), 45f64.to_radians())
            * Rotation3::from_axis_angle(&Vector3::x_axis(), 30f64.to_radians());

        assert!((t.rotation().matrix() - expected.matrix()).norm() < 1e-12);
    }

    #[test]
    fn test_euler_roundtrip_away_from_lock() {
        let t = Transform::new([10.0, -20.0, 30.0], [12.5, -47.0, 170.0]);
        let back = Transform::from_matrix(&t.to_matrix());

        for i in 0..3 {
            assert!((back.vec_mm()[i] - t.vec_mm()[i]).abs() < 1e-9);
            assert!((back.euler_deg()[i] - t.euler_deg()[i]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_gimbal_lock_keeps_rotation() {
        for pitch in [90.0, -90.0] {
            let t = Transform::from_euler(20.0, pitch, 35.0);
            let back = Transform::from_matrix(&t.to_matrix());

            assert!((back.ry() - pitch).abs() < 1e-6);
            assert_eq!(back.rz(), 0.0);
            assert!(back.approx_eq(&t, 1e-9, 1e-6));
        }
    }

    #[test]
    fn test_rigid_inverse_matches_general_inverse() {
        let m = Transform::new([5.0, 6.0, -7.0], [10.0, 20.0, 30.0]).to_matrix();
        let general = m.try_inverse().unwrap();
        assert!((rigid_inverse(&m) - general).norm() < 1e-9);
    }

    #[test]
    fn test_from_robot_converts_units() {
        let t = Transform::from_robot(concat!(
            "{rx : 3.141593, ry : 0.000000, rz : 1.570796, ",
            "x : 0.100000, y : -0.020000, z : 0.300000, }",
        ))
        .unwrap();

        assert!((t.x() - 100.0).abs() < 1e-6);
        assert!((t.y() + 20.0).abs() < 1e-6);
        assert!((t.z() - 300.0).abs() < 1e-6);
        assert!((t.rx() - 180.0).abs() < 1e-3);
        assert!((t.rz() - 90.0).abs() < 1e-3);
    }

    #[test]
    fn test_from_robot_incomplete() {
        let err = Transform::from_robot("{x : 0.1, y : 0.2}").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedResponse(_)));
    }
}

//! The se(3) kernel: wedge/vee maps between twists and their 4x4 generators, and the
//! exponential and logarithm maps between generators and rigid transforms.
//!
//! Two parameterizations are supported:
//!
//! * [`Twist`], a 6-vector `[ωx, ωy, ωz, vx, vy, vz]` covering all of SE(3)
//! * [`YawTwist`], a 4-vector `[ψ, vx, vy, vz]` whose rotation is restricted to the vertical
//!   axis, for stations whose pitch and roll are known to be levelled
//!
//! In both cases the rotation components come first, which matches the layout produced by
//! [`wedge`]. The generator is the lie algebra element itself and is not a transform; only
//! its exponential is.

use crate::Skew3;
use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use nalgebra::{
    IsometryMatrix3, Matrix3, Matrix4, Rotation3, Translation3, Vector3, Vector4, Vector6,
};
#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Tolerance used by [`log`] to decide whether the rotation block is a proper rotation.
const ROTATION_TOLERANCE: f64 = 1e-6;

/// Builds the 4x4 generator of a 6-dof twist.
#[rustfmt::skip]
pub fn wedge(xi: &Vector6<f64>) -> Matrix4<f64> {
    Matrix4::new(
         0.0,   -xi[2],  xi[1], xi[3],
         xi[2],  0.0,   -xi[0], xi[4],
        -xi[1],  xi[0],  0.0,   xi[5],
         0.0,    0.0,    0.0,   0.0,
    )
}

/// Builds the 4x4 generator of a yaw-only twist.
#[rustfmt::skip]
pub fn wedge_yaw(xi: &Vector4<f64>) -> Matrix4<f64> {
    Matrix4::new(
        0.0,   -xi[0], 0.0, xi[1],
        xi[0],  0.0,   0.0, xi[2],
        0.0,    0.0,   0.0, xi[3],
        0.0,    0.0,   0.0, 0.0,
    )
}

/// Extracts the 6-dof twist from a generator.
///
/// Warning: Does no check to ensure the rotation block is actually skew-symmetric.
pub fn vee(generator: &Matrix4<f64>) -> Vector6<f64> {
    let w = rotation_block(generator);
    Vector6::new(
        w.x,
        w.y,
        w.z,
        generator.m14,
        generator.m24,
        generator.m34,
    )
}

/// Extracts the yaw-only twist from a generator, ignoring any pitch or roll terms.
pub fn vee_yaw(generator: &Matrix4<f64>) -> Vector4<f64> {
    Vector4::new(
        generator.m21,
        generator.m14,
        generator.m24,
        generator.m34,
    )
}

/// The exponential map from a generator to a homogeneous rigid transform.
///
/// Uses the closed form `R = exp(ŵ)`, `t = V(w)·v` rather than a general matrix exponential.
pub fn exp(generator: &Matrix4<f64>) -> Matrix4<f64> {
    Twist(vee(generator)).isometry().to_homogeneous()
}

/// The logarithm map from a homogeneous rigid transform to its generator.
///
/// Returns `None` if the upper-left block is not a proper rotation (not orthonormal, or a
/// reflection). The result is the principal logarithm, so rotations of exactly `π` have two
/// valid answers and either may be returned.
pub fn log(transform: &Matrix4<f64>) -> Option<Matrix4<f64>> {
    let r: Matrix3<f64> = transform.fixed_slice::<3, 3>(0, 0).into_owned();
    let orthonormal = (r.transpose() * r - Matrix3::identity()).norm() < ROTATION_TOLERANCE;
    if !orthonormal || r.determinant() <= 0.0 {
        return None;
    }
    let t = Vector3::new(transform.m14, transform.m24, transform.m34);
    let isometry = IsometryMatrix3::from_parts(
        Translation3::from(t),
        Rotation3::from_matrix_unchecked(r),
    );
    Some(Twist::from_isometry(&isometry).wedge())
}

fn rotation_block(generator: &Matrix4<f64>) -> Vector3<f64> {
    Vector3::new(generator.m32, generator.m13, generator.m21)
}

/// A member of se(3) laid out as `[ωx, ωy, ωz, vx, vy, vz]`.
#[derive(Debug, Clone, Copy, PartialEq, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Twist(pub Vector6<f64>);

impl Twist {
    pub fn new(rotation: Vector3<f64>, translation: Vector3<f64>) -> Self {
        Self(Vector6::new(
            rotation.x,
            rotation.y,
            rotation.z,
            translation.x,
            translation.y,
            translation.z,
        ))
    }

    pub fn zero() -> Self {
        Self(Vector6::zeros())
    }

    pub fn rotation(&self) -> Skew3 {
        Skew3(self.0.fixed_rows::<3>(0).into_owned())
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.0.fixed_rows::<3>(3).into_owned()
    }

    pub fn wedge(&self) -> Matrix4<f64> {
        wedge(&self.0)
    }

    /// Gets the rigid transform `exp(wedge(self))`.
    pub fn isometry(&self) -> IsometryMatrix3<f64> {
        let w = self.rotation();
        let t = w.left_jacobian() * self.translation();
        IsometryMatrix3::from_parts(Translation3::from(t), w.rotation())
    }

    /// Gets the twist whose exponential is `isometry`.
    pub fn from_isometry(isometry: &IsometryMatrix3<f64>) -> Self {
        let w: Skew3 = isometry.rotation.into();
        let v = w.left_jacobian_inverse() * isometry.translation.vector;
        Self::new(w.0, v)
    }
}

/// A yaw-only member of se(3) laid out as `[ψ, vx, vy, vz]`.
#[derive(Debug, Clone, Copy, PartialEq, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct YawTwist(pub Vector4<f64>);

impl YawTwist {
    pub fn new(yaw: f64, translation: Vector3<f64>) -> Self {
        Self(Vector4::new(yaw, translation.x, translation.y, translation.z))
    }

    pub fn yaw(&self) -> f64 {
        self.0[0]
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.0.fixed_rows::<3>(1).into_owned()
    }

    pub fn wedge(&self) -> Matrix4<f64> {
        wedge_yaw(&self.0)
    }

    /// The full twist this yaw-only twist embeds into.
    pub fn twist(&self) -> Twist {
        Twist::new(Skew3::yaw(self.yaw()).0, self.translation())
    }

    pub fn isometry(&self) -> IsometryMatrix3<f64> {
        self.twist().isometry()
    }

    /// Projects the transform onto the yaw-only subgroup, dropping pitch and roll.
    pub fn from_isometry(isometry: &IsometryMatrix3<f64>) -> Self {
        let (_, _, yaw) = isometry.rotation.euler_angles();
        let w = Skew3::yaw(yaw);
        Self::new(yaw, w.left_jacobian_inverse() * isometry.translation.vector)
    }
}

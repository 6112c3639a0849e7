use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use nalgebra::{Matrix3, Rotation3, Unit, Vector3};
#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Below this squared angle the exponential and logarithm switch to their Taylor expansions.
const SMALL_ANGLE_SQUARED: f64 = 1e-8;

/// Distance from `π` under which the logarithm recovers the axis from the symmetric part.
const NEAR_PI: f64 = 1e-6;

/// A rotation vector in so(3): axis times angle in radians.
///
/// The station resections optimize over these three free parameters. Poses themselves are
/// stored as rotation matrices.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Skew3(pub Vector3<f64>);

impl Skew3 {
    /// A rotation about the vertical axis only.
    pub fn yaw(angle: f64) -> Self {
        Self(Vector3::new(0.0, 0.0, angle))
    }

    /// The rotation angle in radians.
    pub fn angle(self) -> f64 {
        self.0.norm()
    }

    /// Converts the Skew3 to a Rotation3 matrix.
    pub fn rotation(self) -> Rotation3<f64> {
        self.into()
    }

    /// Reads the rotation vector off a skew-symmetric matrix. Only the lower-left entries and
    /// `m13` are read, symmetry is not checked.
    pub fn vee(mat: Matrix3<f64>) -> Self {
        Self(Vector3::new(mat.m32, mat.m13, mat.m21))
    }

    /// The cross-product matrix `[ω]×`.
    pub fn hat(self) -> Matrix3<f64> {
        self.0.cross_matrix()
    }

    /// `[ω]×²`, written out as `ω ωᵀ − ‖ω‖² I`.
    #[rustfmt::skip]
    pub fn hat2(self) -> Matrix3<f64> {
        let w = self.0;
        let w11 = w.x * w.x;
        let w12 = w.x * w.y;
        let w13 = w.x * w.z;
        let w22 = w.y * w.y;
        let w23 = w.y * w.z;
        let w33 = w.z * w.z;
        Matrix3::new(
            -w22 - w33,     w12,           w13,
             w12,          -w11 - w33,     w23,
             w13,           w23,          -w11 - w22,
        )
    }

    /// The left jacobian `V` of SO(3), which maps the translational part of an se(3)
    /// twist onto the translation of the resulting rigid transform.
    ///
    /// `V = I + (1 - cos θ) / θ² · ŵ + (θ - sin θ) / θ³ · ŵ²`
    pub fn left_jacobian(self) -> Matrix3<f64> {
        let theta2 = self.0.norm_squared();
        let (b, c) = if theta2 < SMALL_ANGLE_SQUARED {
            (
                0.5 - theta2 / 24.0 + theta2 * theta2 / 720.0,
                1.0 / 6.0 - theta2 / 120.0 + theta2 * theta2 / 5040.0,
            )
        } else {
            let theta = theta2.sqrt();
            (
                (1.0 - theta.cos()) / theta2,
                (theta - theta.sin()) / (theta2 * theta),
            )
        };
        Matrix3::identity() + self.hat() * b + self.hat2() * c
    }

    /// The inverse of [`Skew3::left_jacobian`], computed in closed form.
    ///
    /// Only valid for rotation angles below `2π`.
    pub fn left_jacobian_inverse(self) -> Matrix3<f64> {
        let theta2 = self.0.norm_squared();
        let d = if theta2 < SMALL_ANGLE_SQUARED {
            1.0 / 12.0 + theta2 / 720.0 + theta2 * theta2 / 30240.0
        } else {
            let theta = theta2.sqrt();
            let a = theta.sin() / theta;
            let b = (1.0 - theta.cos()) / theta2;
            (1.0 - a / (2.0 * b)) / theta2
        };
        Matrix3::identity() - self.hat() * 0.5 + self.hat2() * d
    }
}

/// This is the exponential map.
impl From<Skew3> for Rotation3<f64> {
    fn from(w: Skew3) -> Self {
        let theta2 = w.0.norm_squared();
        let (a, b) = if theta2 < SMALL_ANGLE_SQUARED {
            (
                1.0 - theta2 / 6.0 + theta2 * theta2 / 120.0,
                0.5 - theta2 / 24.0 + theta2 * theta2 / 720.0,
            )
        } else {
            let theta = theta2.sqrt();
            (theta.sin() / theta, (1.0 - theta.cos()) / theta2)
        };
        Rotation3::from_matrix_unchecked(Matrix3::identity() + w.hat() * a + w.hat2() * b)
    }
}

/// This is the log map.
///
/// The angle is recovered with `atan2` so that it stays accurate near zero, and the
/// axis is taken from the symmetric part of the matrix when the angle approaches `π`,
/// where the skew-symmetric part vanishes.
impl From<Rotation3<f64>> for Skew3 {
    fn from(r: Rotation3<f64>) -> Self {
        let m = r.matrix();
        let cos = ((m.trace() - 1.0) * 0.5).clamp(-1.0, 1.0);
        // `sin θ · axis`
        let sin_axis = Skew3::vee(m - m.transpose()).0 * 0.5;
        let sin = sin_axis.norm();
        let theta = sin.atan2(cos);

        if theta * theta < SMALL_ANGLE_SQUARED {
            return Self(sin_axis * (1.0 + theta * theta / 6.0));
        }

        if std::f64::consts::PI - theta < NEAR_PI {
            // (R + Rᵀ) / 2 = cos θ · I + (1 - cos θ) · a·aᵀ
            let outer = ((m + m.transpose()) * 0.5 - Matrix3::identity() * cos) / (1.0 - cos);
            let column = (0..3)
                .max_by(|&i, &j| outer[(i, i)].total_cmp(&outer[(j, j)]))
                .unwrap_or(0);
            let mut axis = outer.column(column).into_owned() / outer[(column, column)].sqrt();
            if axis.dot(&sin_axis) < 0.0 {
                axis = -axis;
            }
            return Self(Unit::new_normalize(axis).into_inner() * theta);
        }

        Self(sin_axis * (theta / sin))
    }
}

use crate::{Twist, YawTwist};
use derive_more::{AsMut, AsRef, From, Into};
use nalgebra::{IsometryMatrix3, Matrix3, Matrix4, Point3, Rotation3, Translation3, Vector3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Maximum deviation from orthonormality accepted by [`Pose::from_homogeneous`].
const ORTHONORMAL_TOLERANCE: f64 = 1e-6;

/// This trait is implemented by all the different poses in this library:
///
/// * [`StationToStation`] - Maps points measured by one station into the frame of another
/// * [`StationToWorld`] - Maps points measured by a station into the site frame
/// * [`WorldToStation`] - Maps site points into the local frame of a station
pub trait Pose: From<IsometryMatrix3<f64>> + Clone + Copy {
    type Inverse: Pose;

    /// Retrieve the isometry.
    fn isometry(self) -> IsometryMatrix3<f64>;

    /// Creates a pose with no change in position or orientation.
    fn identity() -> Self {
        IsometryMatrix3::identity().into()
    }

    /// Takes the inverse of the pose.
    fn inverse(self) -> Self::Inverse {
        self.isometry().inverse().into()
    }

    /// Create the pose from rotation and translation.
    fn from_parts(translation: Vector3<f64>, rotation: Rotation3<f64>) -> Self {
        IsometryMatrix3::from_parts(translation.into(), rotation).into()
    }

    /// Retrieve the homogeneous matrix.
    fn homogeneous(self) -> Matrix4<f64> {
        self.isometry().to_homogeneous()
    }

    /// Creates the pose from a homogeneous matrix.
    ///
    /// Returns `None` unless the upper-left block is a proper rotation and the last row is `[0, 0, 0, 1]`.
    fn from_homogeneous(matrix: &Matrix4<f64>) -> Option<Self> {
        let r: Matrix3<f64> = matrix.fixed_slice::<3, 3>(0, 0).into_owned();
        let bottom = Matrix4::identity().row(3) - matrix.row(3);
        if (r.transpose() * r - Matrix3::identity()).norm() > ORTHONORMAL_TOLERANCE
            || r.determinant() <= 0.0
            || bottom.norm() > ORTHONORMAL_TOLERANCE
        {
            return None;
        }
        Some(Self::from_parts(
            Vector3::new(matrix.m14, matrix.m24, matrix.m34),
            Rotation3::from_matrix_unchecked(r),
        ))
    }

    /// Retrieve the se(3) twist whose exponential is this pose.
    fn twist(self) -> Twist {
        Twist::from_isometry(&self.isometry())
    }

    /// Create the pose from its se(3) twist.
    fn from_twist(twist: Twist) -> Self {
        twist.isometry().into()
    }

    /// Retrieve the yaw-only twist, dropping any pitch and roll.
    fn yaw_twist(self) -> YawTwist {
        YawTwist::from_isometry(&self.isometry())
    }

    /// Create the pose from a yaw-only twist.
    fn from_yaw_twist(twist: YawTwist) -> Self {
        twist.isometry().into()
    }

    /// Heading of the pose about the vertical axis, in radians.
    fn yaw(self) -> f64 {
        self.isometry().rotation.euler_angles().2
    }

    /// Transform the given point into the output frame.
    fn transform(self, input: Point3<f64>) -> Point3<f64> {
        self.isometry() * input
    }
}

/// This contains a relative pose that maps the points measured by one station into the
/// local frame of another (usually the reference) station.
///
/// The local frame of a station is defined as thus:
///
/// * Origin is the intersection of the instrument's axes
/// * Positive z axis is up (zenith)
/// * Positive y axis is the zero of the horizontal circle
/// * Positive x axis completes a right-handed frame, so azimuth grows clockwise seen from above
#[derive(Debug, Clone, Copy, PartialEq, AsMut, AsRef, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct StationToStation(pub IsometryMatrix3<f64>);

impl Pose for StationToStation {
    type Inverse = StationToStation;

    #[inline(always)]
    fn isometry(self) -> IsometryMatrix3<f64> {
        self.into()
    }
}

impl StationToStation {
    /// Given the pose of two stations in a common site frame, derive the relative pose
    /// that maps points of station `from` into station `to`.
    pub fn from_station_poses(from: StationToWorld, to: StationToWorld) -> Self {
        (to.isometry().inverse() * from.isometry()).into()
    }
}

/// This contains a station pose, which is the pose of the station in the site frame.
/// This maps the points a station measures into site coordinates, and also tells you
/// where the station is set up and how its horizontal circle is oriented.
#[derive(Debug, Clone, Copy, PartialEq, AsMut, AsRef, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct StationToWorld(pub IsometryMatrix3<f64>);

impl Pose for StationToWorld {
    type Inverse = WorldToStation;

    #[inline(always)]
    fn isometry(self) -> IsometryMatrix3<f64> {
        self.into()
    }
}

impl StationToWorld {
    /// The position of the instrument in the site frame.
    pub fn position(self) -> Point3<f64> {
        Point3::from(self.0.translation.vector)
    }

    /// A levelled station pose with the given position and heading.
    pub fn levelled(position: Point3<f64>, yaw: f64) -> Self {
        IsometryMatrix3::from_parts(
            Translation3::from(position.coords),
            Rotation3::from_axis_angle(&Vector3::z_axis(), yaw),
        )
        .into()
    }
}

/// The inverse of a [`StationToWorld`]: maps site coordinates into a station's local frame.
#[derive(Debug, Clone, Copy, PartialEq, AsMut, AsRef, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct WorldToStation(pub IsometryMatrix3<f64>);

impl Pose for WorldToStation {
    type Inverse = StationToWorld;

    #[inline(always)]
    fn isometry(self) -> IsometryMatrix3<f64> {
        self.into()
    }
}

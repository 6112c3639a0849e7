//! # ts-core
//!
//! Common types for calibrating a setup of three theodolites (robotic total stations) that
//! track prisms on a rigid rig. All the other `ts-` crates depend on this one.
//!
//! A station measures a prism as a [`SphericalReading`]: a slope distance, a zenith angle and
//! a clockwise azimuth in its own frame. Calibrating the setup means finding the rigid
//! transforms that bring stations two and three into the frame of station one. These are
//! represented as [`StationToStation`] poses. When stations are resected against surveyed
//! pillars instead, the result is a [`StationToWorld`] pose.
//!
//! Optimizers do not work on rotation matrices directly. They work on members of the lie
//! algebra se(3), see the [`se3`] module, which also provides a yaw-only parameterization
//! for levelled instruments.

mod pose;
pub mod se3;
mod so3;
mod spherical;
mod station;

pub use nalgebra;
pub use pose::*;
pub use se3::{Twist, YawTwist};
pub use so3::*;
pub use spherical::*;
pub use station::*;

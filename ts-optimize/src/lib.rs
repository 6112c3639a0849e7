//! Nonlinear refinement of station poses.
//!
//! Both problems here are small dense least squares problems solved with
//! [`levenberg_marquardt`], using numerically differentiated Jacobians.
//!
//! * [`PrismDistanceOptimizer`] finds the poses of stations two and three relative to station
//!   one from the known distances between the prisms of a rigid rig.
//! * [`StationYawOptimizer`] places one levelled station on a set of surveyed pillars.
//!
//! Both start from an initial guess, usually the closed-form registration of `ts-geom`, and
//! return a [`ResectionReport`] describing how the optimization ended. Whether a run that
//! did not converge is an error is decided by [`ConvergencePolicy`].

mod error;
pub mod prism_distance;
mod report;
mod settings;
pub mod station_yaw;

pub use error::{OptimizeError, Result};
pub use levenberg_marquardt::TerminationReason;
pub use prism_distance::{PrismDistanceOptimizer, PrismDistanceResection};
pub use report::ResectionReport;
pub use settings::{ConvergencePolicy, OptimizerSettings, Parameterization};
pub use station_yaw::{StationYawOptimizer, StationYawResection};

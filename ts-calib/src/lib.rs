//! Calibration of three stations tracking the prisms of a rigid rig.
//!
//! This crate puts together the building blocks of `ts-geom` and `ts-optimize`:
//!
//! * [`motion`] finds the instants where the rig stands still and matches the trajectories
//!   of the stations in time
//! * [`cross_validation`] fits the relative poses of the stations on random training sets
//!   and measures the errors on the held-out samples
//! * [`pillars`] resects the stations on surveyed pillars
//! * [`io`] reads the marker and trajectory files

pub mod cross_validation;
mod error;
pub mod io;
pub mod motion;
pub mod pillars;
mod settings;
mod split;

pub use cross_validation::{
    dynamic_session_cross_validation, inter_prism_cross_validation, inter_prism_distance_errors,
    inter_prism_session_cross_validation, pairwise_errors, point_to_point_cross_validation,
    HeldOutErrors, InterPrismValidation, Prior,
};
pub use error::{CalibError, Result};
pub use io::{read_marker_file, read_points, read_trajectory, MarkerCalibration};
pub use motion::{Session, Trajectory};
pub use pillars::{resect_from_file, resect_from_points, PillarResection};
pub use settings::*;
pub use split::training_mask;

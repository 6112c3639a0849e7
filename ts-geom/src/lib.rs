//! Closed-form geometry used to calibrate theodolite setups.
//!
//! * [`registration`] finds the rigid transform that best aligns two sets of corresponding
//!   points, which gives the relative pose between two stations that tracked the same prism.
//! * [`resection`] places a levelled station in the site frame from its readings of two
//!   surveyed reference points.
//!
//! Both are exact and non-iterative. They are used on their own and to seed the optimizers
//! in `ts-optimize`.

mod error;
pub mod registration;
pub mod resection;

pub use error::{GeomError, Result};
pub use registration::{point_to_point, PointToPoint};
pub use resection::resect_two_points;

//! Resection of stations two and three against the known distances between the prisms of a
//! rigid rig.
//!
//! Each station tracks its own prism, so the stations never see the same point. What links
//! them is the rig: at every instant the three prisms are a fixed distance apart. With the
//! poses `T12` and `T13` mapping stations two and three into the frame of station one, every
//! sample `(p1, p2, p3)` contributes three residuals:
//!
//! ```text
//! ‖p1 − T12·p2‖ − d12
//! ‖p1 − T13·p3‖ − d13
//! ‖T12·p2 − T13·p3‖ − d23
//! ```
//!
//! The poses are parameterized by their twists and the problem is solved with
//! Levenberg-Marquardt using a numerical Jacobian.

use crate::{
    report::minimize, OptimizeError, OptimizerSettings, Parameterization, ResectionReport, Result,
};
use levenberg_marquardt::{differentiate_numerically, LeastSquaresProblem};
use log::debug;
use ts_core::{
    nalgebra::{
        dimension::{Dynamic, U1},
        DMatrix, DVector, VecStorage, Vector4, Vector6,
    },
    Correspondences, Pose, PrismDistances, StationToStation, Twist, YawTwist,
};

impl Parameterization {
    fn encode(self, pose: StationToStation) -> impl Iterator<Item = f64> {
        let params: Vec<f64> = match self {
            Parameterization::Se3 => pose.twist().0.iter().copied().collect(),
            Parameterization::YawOnly => pose.yaw_twist().0.iter().copied().collect(),
        };
        params.into_iter()
    }

    fn decode(self, params: &[f64]) -> StationToStation {
        match self {
            Parameterization::Se3 => {
                StationToStation::from_twist(Twist(Vector6::from_column_slice(params)))
            }
            Parameterization::YawOnly => {
                StationToStation::from_yaw_twist(YawTwist(Vector4::from_column_slice(params)))
            }
        }
    }
}

/// The least squares problem behind [`PrismDistanceOptimizer`].
#[derive(Clone)]
pub struct PrismDistanceProblem<'a> {
    samples: &'a Correspondences,
    distances: PrismDistances,
    parameterization: Parameterization,
    poses: [StationToStation; 2],
}

impl<'a> PrismDistanceProblem<'a> {
    pub fn new(
        samples: &'a Correspondences,
        distances: PrismDistances,
        parameterization: Parameterization,
        initial: [StationToStation; 2],
    ) -> Self {
        // Round-trip through the parameters so that a yaw-only problem starts levelled.
        let mut problem = Self {
            samples,
            distances,
            parameterization,
            poses: initial,
        };
        let params = problem.params();
        problem.set_params(&params);
        problem
    }

    /// The current estimates of station two and station three into station one.
    pub fn poses(&self) -> [StationToStation; 2] {
        self.poses
    }

    /// The residual of every sample, in the order `d12, d13, d23`.
    pub fn sample_residuals(&self) -> impl Iterator<Item = [f64; 3]> + '_ {
        let [t12, t13] = self.poses;
        let distances = self.distances;
        self.samples.iter().map(move |[p1, p2, p3]| {
            let q2 = t12.transform(p2);
            let q3 = t13.transform(p3);
            [
                (p1 - q2).norm() - distances.d12,
                (p1 - q3).norm() - distances.d13,
                (q2 - q3).norm() - distances.d23,
            ]
        })
    }
}

impl<'a> LeastSquaresProblem<f64, Dynamic, Dynamic> for PrismDistanceProblem<'a> {
    type ResidualStorage = VecStorage<f64, Dynamic, U1>;
    type JacobianStorage = VecStorage<f64, Dynamic, Dynamic>;
    type ParameterStorage = VecStorage<f64, Dynamic, U1>;

    fn set_params(&mut self, params: &DVector<f64>) {
        let dof = self.parameterization.dof();
        assert_eq!(
            params.len(),
            2 * dof,
            "parameter vector does not match the parameterization"
        );
        let params = params.as_slice();
        self.poses = [
            self.parameterization.decode(&params[..dof]),
            self.parameterization.decode(&params[dof..]),
        ];
    }

    fn params(&self) -> DVector<f64> {
        DVector::from_iterator(
            2 * self.parameterization.dof(),
            self.parameterization
                .encode(self.poses[0])
                .chain(self.parameterization.encode(self.poses[1])),
        )
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        Some(DVector::from_iterator(
            3 * self.samples.len(),
            self.sample_residuals().flatten(),
        ))
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let mut clone = self.clone();
        differentiate_numerically(&mut clone)
    }
}

/// The poses found by [`PrismDistanceOptimizer::optimize`].
#[derive(Debug, Clone)]
pub struct PrismDistanceResection {
    /// Station two into station one.
    pub station_two: StationToStation,
    /// Station three into station one.
    pub station_three: StationToStation,
    pub report: ResectionReport,
}

/// Refines the relative poses of stations two and three against the inter-prism distances.
///
/// ```no_run
/// use ts_core::{Correspondences, Pose, PrismDistances, StationToStation};
/// use ts_optimize::{OptimizerSettings, PrismDistanceOptimizer};
///
/// # let samples = Correspondences::default();
/// let distances = PrismDistances::new(0.38, 1.08, 0.81);
/// let optimizer = PrismDistanceOptimizer::new(OptimizerSettings::default());
/// let initial = [StationToStation::identity(); 2];
/// let resection = optimizer.optimize(&samples, distances, initial).unwrap();
/// println!("{:?}", resection.station_two);
/// ```
#[derive(Debug, Copy, Clone, Default)]
pub struct PrismDistanceOptimizer {
    settings: OptimizerSettings,
}

impl PrismDistanceOptimizer {
    pub fn new(settings: OptimizerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &OptimizerSettings {
        &self.settings
    }

    /// Starting from `initial` (station two into one, station three into one), minimizes the
    /// inter-prism distance residuals of `samples`.
    pub fn optimize(
        &self,
        samples: &Correspondences,
        distances: PrismDistances,
        initial: [StationToStation; 2],
    ) -> Result<PrismDistanceResection> {
        if samples.len() < self.settings.minimum_samples {
            return Err(OptimizeError::NotEnoughSamples {
                needed: self.settings.minimum_samples,
                got: samples.len(),
            });
        }
        debug!(
            "prism distance resection on {} samples with {:?} poses",
            samples.len(),
            self.settings.parameterization
        );
        let problem = PrismDistanceProblem::new(
            samples,
            distances,
            self.settings.parameterization,
            initial,
        );
        let (problem, report) = minimize(problem, &self.settings)?;
        let [station_two, station_three] = problem.poses();
        Ok(PrismDistanceResection {
            station_two,
            station_three,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ts_core::nalgebra::{Point3, Rotation3, Vector3};

    #[test]
    fn parameters_round_trip() {
        let pose = StationToStation::from_parts(
            Vector3::new(1.0, 2.0, 3.0),
            Rotation3::from_euler_angles(0.1, 0.2, 0.3),
        );
        let params: Vec<f64> = Parameterization::Se3.encode(pose).collect();
        assert_eq!(params.len(), 6);
        let back = Parameterization::Se3.decode(&params);
        assert_relative_eq!(back.homogeneous(), pose.homogeneous(), epsilon = 1e-12);
    }

    #[test]
    fn yaw_only_drops_tilt() {
        let samples = Correspondences::default();
        let tilted = StationToStation::from_parts(
            Vector3::new(1.0, 2.0, 3.0),
            Rotation3::from_euler_angles(0.1, 0.0, 0.3),
        );
        let problem = PrismDistanceProblem::new(
            &samples,
            PrismDistances::new(1.0, 1.0, 1.0),
            Parameterization::YawOnly,
            [tilted, StationToStation::identity()],
        );
        let (roll, pitch, yaw) = problem.poses()[0].isometry().rotation.euler_angles();
        assert_relative_eq!(roll, 0.0, epsilon = 1e-12);
        assert_relative_eq!(pitch, 0.0, epsilon = 1e-12);
        assert_relative_eq!(yaw, 0.3, epsilon = 1e-12);
        assert_eq!(problem.params().len(), 8);
    }

    #[test]
    fn residuals_vanish_at_truth() {
        let samples = Correspondences::new(
            vec![Point3::new(0.0, 0.0, 0.0)],
            vec![Point3::new(1.0, 0.0, 0.0)],
            vec![Point3::new(0.0, 2.0, 0.0)],
        );
        let problem = PrismDistanceProblem::new(
            &samples,
            PrismDistances::new(1.0, 2.0, 5.0f64.sqrt()),
            Parameterization::Se3,
            [StationToStation::identity(); 2],
        );
        let residuals = problem.residuals().unwrap();
        assert_eq!(residuals.len(), 3);
        assert_relative_eq!(residuals.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn refuses_small_sample_sets() {
        let samples: Correspondences = (0..6)
            .map(|i| [Point3::new(i as f64, 0.0, 0.0); 3])
            .collect();
        let result = PrismDistanceOptimizer::default().optimize(
            &samples,
            PrismDistances::new(1.0, 1.0, 1.0),
            [StationToStation::identity(); 2],
        );
        assert!(matches!(
            result,
            Err(OptimizeError::NotEnoughSamples { needed: 7, got: 6 })
        ));
    }
}

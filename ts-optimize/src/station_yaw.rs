use crate::{report::minimize, OptimizeError, OptimizerSettings, ResectionReport, Result};
use levenberg_marquardt::{differentiate_numerically, LeastSquaresProblem};
use ts_core::{
    nalgebra::{
        dimension::{Dynamic, U1},
        DMatrix, DVector, Point3, VecStorage, Vector3,
    },
    Pose, StationToWorld,
};
use ts_geom::point_to_point;

/// Two pillars give six residuals for four unknowns.
const MINIMUM_PILLARS: usize = 2;

/// Fits the position and heading of one levelled station so that its measurements of the
/// pillars land on their surveyed coordinates.
///
/// Parameters are `(x, y, z, yaw)` and there are three residuals per pillar, the components
/// of `pillar − T·measured`.
#[derive(Clone)]
pub struct StationYawProblem<'a> {
    measured: &'a [Point3<f64>],
    pillars: &'a [Point3<f64>],
    pose: StationToWorld,
}

impl<'a> StationYawProblem<'a> {
    /// Panics if `measured` and `pillars` differ in length.
    pub fn new(
        measured: &'a [Point3<f64>],
        pillars: &'a [Point3<f64>],
        initial: StationToWorld,
    ) -> Self {
        assert_eq!(
            measured.len(),
            pillars.len(),
            "every measurement needs its pillar"
        );
        Self {
            measured,
            pillars,
            pose: StationToWorld::levelled(initial.position(), initial.yaw()),
        }
    }

    pub fn pose(&self) -> StationToWorld {
        self.pose
    }
}

impl<'a> LeastSquaresProblem<f64, Dynamic, Dynamic> for StationYawProblem<'a> {
    type ResidualStorage = VecStorage<f64, Dynamic, U1>;
    type JacobianStorage = VecStorage<f64, Dynamic, Dynamic>;
    type ParameterStorage = VecStorage<f64, Dynamic, U1>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.pose = StationToWorld::levelled(Point3::new(x[0], x[1], x[2]), x[3]);
    }

    fn params(&self) -> DVector<f64> {
        let position = self.pose.position();
        DVector::from_column_slice(&[position.x, position.y, position.z, self.pose.yaw()])
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        Some(DVector::from_iterator(
            3 * self.measured.len(),
            self.measured
                .iter()
                .zip(self.pillars)
                .flat_map(|(&measured, pillar)| {
                    let error = pillar - self.pose.transform(measured);
                    [error.x, error.y, error.z]
                }),
        ))
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let mut clone = self.clone();
        differentiate_numerically(&mut clone)
    }
}

/// The pose found by [`StationYawOptimizer::optimize`].
#[derive(Debug, Clone)]
pub struct StationYawResection {
    pub pose: StationToWorld,
    pub report: ResectionReport,
}

/// Resects one levelled station on surveyed pillars.
///
/// The starting point comes from the closed-form registration of the measurements onto the
/// pillars, reduced to its position and heading. With only two pillars the registration is
/// degenerate, in which case the heading is taken from the horizontal direction between
/// them and the position from their centroids.
#[derive(Debug, Copy, Clone, Default)]
pub struct StationYawOptimizer {
    settings: OptimizerSettings,
}

impl StationYawOptimizer {
    pub fn new(settings: OptimizerSettings) -> Self {
        Self { settings }
    }

    pub fn optimize(
        &self,
        measured: &[Point3<f64>],
        pillars: &[Point3<f64>],
    ) -> Result<StationYawResection> {
        if measured.len() < MINIMUM_PILLARS {
            return Err(OptimizeError::NotEnoughSamples {
                needed: MINIMUM_PILLARS,
                got: measured.len(),
            });
        }
        let initial = initial_guess(measured, pillars);
        let problem = StationYawProblem::new(measured, pillars, initial);
        let (problem, report) = minimize(problem, &self.settings)?;
        Ok(StationYawResection {
            pose: problem.pose(),
            report,
        })
    }
}

fn initial_guess(measured: &[Point3<f64>], pillars: &[Point3<f64>]) -> StationToWorld {
    if let Ok(pose) = point_to_point(measured, pillars) {
        let isometry = pose.isometry();
        return StationToWorld::levelled(
            Point3::from(isometry.translation.vector),
            pose.yaw(),
        );
    }
    let seen = measured[1] - measured[0];
    let known = pillars[1] - pillars[0];
    let yaw = known.y.atan2(known.x) - seen.y.atan2(seen.x);
    let rotated = StationToWorld::levelled(Point3::origin(), yaw);
    let offset = (0..measured.len())
        .map(|i| pillars[i] - rotated.transform(measured[i]))
        .sum::<Vector3<f64>>()
        / measured.len() as f64;
    StationToWorld::levelled(Point3::from(offset), yaw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pillars() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.2),
            Point3::new(10.0, 8.0, -0.1),
            Point3::new(0.0, 8.0, 0.4),
        ]
    }

    #[test]
    fn recovers_levelled_station() {
        let station = StationToWorld::levelled(Point3::new(4.0, 3.0, 1.6), -2.1);
        let pillars = pillars();
        let measured: Vec<_> = pillars
            .iter()
            .map(|&p| station.inverse().transform(p))
            .collect();
        for count in [2, 4] {
            let resection = StationYawOptimizer::default()
                .optimize(&measured[..count], &pillars[..count])
                .unwrap();
            assert_relative_eq!(
                resection.pose.homogeneous(),
                station.homogeneous(),
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn needs_two_pillars() {
        let pillars = pillars();
        assert!(matches!(
            StationYawOptimizer::default().optimize(&pillars[..1], &pillars[..1]),
            Err(OptimizeError::NotEnoughSamples { needed: 2, got: 1 })
        ));
    }
}

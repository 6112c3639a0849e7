//! Random train/test evaluation of the station calibrations.
//!
//! Every iteration draws a fresh split of the samples, fits the poses of stations two and
//! three on the training part and measures errors on the held-out part. The same errors are
//! measured with a baseline calibration, usually the one registered on the markers, so that
//! both can be compared. All errors are in millimetres and collected flat over the
//! iterations.

use crate::{
    motion::{cluster_distance_errors, Session},
    split::training_mask,
    CalibError, CrossValidationSettings, MarkerCalibration, MotionSettings, Result,
};
use log::{debug, info};
use rand::Rng;
use ts_core::{Correspondences, Pose, PrismDistances, StationToStation};
use ts_geom::point_to_point;
use ts_optimize::{PrismDistanceOptimizer, ResectionReport};

/// Registration needs three points to fit.
const MINIMUM_REGISTRATION_SAMPLES: usize = 3;

/// The inter-prism resection is only attempted above this many samples.
const MINIMUM_RESECTION_SAMPLES: usize = 6;

/// Errors measured on held-out data, for the fitted and the baseline calibrations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeldOutErrors {
    pub fitted: Vec<f64>,
    pub baseline: Vec<f64>,
}

/// Where the inter-prism resection starts from, and what it is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prior {
    /// Registration of all the samples onto station one.
    PointToPoint,
    /// The calibration registered on the markers.
    Baseline,
}

/// The outcome of [`inter_prism_cross_validation`].
#[derive(Debug, Clone, Default)]
pub struct InterPrismValidation {
    /// `|‖·‖ − d|` of the held-out samples.
    pub distances: HeldOutErrors,
    /// Disagreement between the stations on the markers, when markers were supplied.
    pub markers: HeldOutErrors,
    /// `|‖·‖ − d|` of the cluster means, filled by [`inter_prism_session_cross_validation`].
    /// The baseline holds one error triple per cluster, the fitted side one per cluster and
    /// iteration.
    pub clusters: HeldOutErrors,
    /// The poses of stations two and three fitted at every iteration.
    pub poses: Vec<[StationToStation; 2]>,
    /// One report per iteration.
    pub reports: Vec<ResectionReport>,
}

/// Maps every sample into a common frame and returns, per sample, the distances between
/// the three positions in millimetres, in the order `12, 13, 23`.
///
/// When all three stations observe the same point these are the calibration errors.
pub fn pairwise_errors<P: Pose>(samples: &Correspondences, poses: [P; 3]) -> Vec<f64> {
    samples
        .iter()
        .flat_map(|[p1, p2, p3]| {
            let q1 = poses[0].transform(p1);
            let q2 = poses[1].transform(p2);
            let q3 = poses[2].transform(p3);
            [
                (q1 - q2).norm() * 1000.0,
                (q1 - q3).norm() * 1000.0,
                (q2 - q3).norm() * 1000.0,
            ]
        })
        .collect()
}

/// Maps every sample into a common frame and returns, per sample, how far the distances
/// between the prisms are from the rig's in millimetres, in the order `12, 13, 23`.
pub fn inter_prism_distance_errors<P: Pose>(
    samples: &Correspondences,
    poses: [P; 3],
    distances: PrismDistances,
) -> Vec<f64> {
    samples
        .iter()
        .flat_map(|[p1, p2, p3]| {
            let measured = PrismDistances::from_positions(
                poses[0].transform(p1),
                poses[1].transform(p2),
                poses[2].transform(p3),
            );
            [
                (measured.d12 - distances.d12).abs() * 1000.0,
                (measured.d13 - distances.d13).abs() * 1000.0,
                (measured.d23 - distances.d23).abs() * 1000.0,
            ]
        })
        .collect()
}

/// Fits stations two and three onto station one by registration and evaluates the fit on
/// held-out samples where all stations measured the same point.
pub fn point_to_point_cross_validation(
    samples: &Correspondences,
    baseline: Option<[StationToStation; 2]>,
    settings: &CrossValidationSettings,
    rng: &mut impl Rng,
) -> Result<HeldOutErrors> {
    check_split(samples.len(), MINIMUM_REGISTRATION_SAMPLES, settings)?;
    let mut errors = HeldOutErrors::default();
    for iteration in 0..settings.iterations {
        let mask = training_mask(rng, samples.len(), settings.training_ratio);
        let (training, held_out) = samples.partition(&mask);
        let fitted = [
            point_to_point(training.second(), training.first())?,
            point_to_point(training.third(), training.first())?,
        ];
        let fitted_errors = pairwise_errors(&held_out, into_station_one(fitted));
        debug!(
            "iteration {}: {} training samples, {} held-out errors",
            iteration,
            training.len(),
            fitted_errors.len()
        );
        errors.fitted.extend(fitted_errors);
        if let Some(baseline) = baseline {
            errors
                .baseline
                .extend(pairwise_errors(&held_out, into_station_one(baseline)));
        }
    }
    info!(
        "point to point cross validation: {} errors over {} iterations",
        errors.fitted.len(),
        settings.iterations
    );
    Ok(errors)
}

/// Fits stations two and three with the inter-prism distance resection and evaluates the fit
/// on held-out samples.
///
/// The resection of every iteration starts from the `prior`. The baseline is the marker
/// calibration when `markers` are given, in which case the disagreement of the stations on
/// the markers is measured for both calibrations. Without markers the prior is the only
/// calibration at hand and serves as the baseline. A [`Prior::Baseline`] requires markers.
pub fn inter_prism_cross_validation(
    samples: &Correspondences,
    distances: PrismDistances,
    prior: Prior,
    markers: Option<&MarkerCalibration>,
    optimizer: &PrismDistanceOptimizer,
    settings: &CrossValidationSettings,
    rng: &mut impl Rng,
) -> Result<InterPrismValidation> {
    if samples.len() <= MINIMUM_RESECTION_SAMPLES {
        return Err(CalibError::InsufficientData(format!(
            "{} samples, the inter-prism resection needs more than {}",
            samples.len(),
            MINIMUM_RESECTION_SAMPLES
        )));
    }
    check_split(samples.len(), optimizer.settings().minimum_samples, settings)?;
    let initial = match (prior, markers) {
        (Prior::PointToPoint, _) => [
            point_to_point(samples.second(), samples.first())?,
            point_to_point(samples.third(), samples.first())?,
        ],
        (Prior::Baseline, Some(markers)) => markers.baseline(),
        (Prior::Baseline, None) => {
            return Err(CalibError::InsufficientData(
                "a baseline prior needs marker measurements".to_owned(),
            ));
        }
    };
    let baseline = into_station_one(markers.map_or(initial, |markers| markers.baseline()));

    let mut validation = InterPrismValidation::default();
    for iteration in 0..settings.iterations {
        let mask = training_mask(rng, samples.len(), settings.training_ratio);
        let (training, held_out) = samples.partition(&mask);
        let resection = optimizer.optimize(&training, distances, initial)?;
        debug!(
            "iteration {}: cost {} after {} evaluations",
            iteration, resection.report.cost, resection.report.evaluations
        );
        let poses = [resection.station_two, resection.station_three];
        let fitted = into_station_one(poses);
        validation
            .distances
            .fitted
            .extend(inter_prism_distance_errors(&held_out, fitted, distances));
        validation
            .distances
            .baseline
            .extend(inter_prism_distance_errors(&held_out, baseline, distances));
        if let Some(markers) = markers {
            validation
                .markers
                .fitted
                .extend(pairwise_errors(&markers.markers, fitted));
            validation
                .markers
                .baseline
                .extend(pairwise_errors(&markers.markers, baseline));
        }
        validation.poses.push(poses);
        validation.reports.push(resection.report);
    }
    info!(
        "inter-prism cross validation: {} of {} iterations converged",
        validation.reports.iter().filter(|r| r.converged).count(),
        settings.iterations
    );
    Ok(validation)
}

/// Runs [`inter_prism_cross_validation`] on the static clusters of a rig session, then
/// checks the rig distances on the cluster means for every fitted calibration and the
/// baseline.
#[allow(clippy::too_many_arguments)]
pub fn inter_prism_session_cross_validation(
    session: &Session,
    distances: PrismDistances,
    prior: Prior,
    markers: Option<&MarkerCalibration>,
    optimizer: &PrismDistanceOptimizer,
    motion: &MotionSettings,
    settings: &CrossValidationSettings,
    rng: &mut impl Rng,
) -> Result<InterPrismValidation> {
    let clusters = session.static_clusters(motion);
    let stationary = clusters.concat();
    info!(
        "{} of {} samples stand still in {} clusters",
        stationary.len(),
        session.len(),
        clusters.len()
    );
    let samples = session.samples.select(&stationary);
    let mut validation = inter_prism_cross_validation(
        &samples,
        distances,
        prior,
        markers,
        optimizer,
        settings,
        rng,
    )?;

    let cluster_errors = |poses: [StationToStation; 3]| {
        let positions = into_common_frame(&session.samples, poses);
        cluster_distance_errors(&positions, &clusters, distances)
            .into_iter()
            .flatten()
            .map(f64::abs)
            .collect::<Vec<f64>>()
    };
    // Without markers the baseline is the registration prior, as in the cross validation.
    let baseline = match markers {
        Some(markers) => markers.baseline(),
        None => [
            point_to_point(samples.second(), samples.first())?,
            point_to_point(samples.third(), samples.first())?,
        ],
    };
    validation.clusters.baseline = cluster_errors(into_station_one(baseline));
    for &poses in &validation.poses {
        let errors = cluster_errors(into_station_one(poses));
        validation.clusters.fitted.extend(errors);
    }
    Ok(validation)
}

/// Keeps the static clusters of station one's prism, then runs
/// [`point_to_point_cross_validation`] on their samples.
pub fn dynamic_session_cross_validation(
    session: &Session,
    baseline: Option<[StationToStation; 2]>,
    motion: &MotionSettings,
    settings: &CrossValidationSettings,
    rng: &mut impl Rng,
) -> Result<HeldOutErrors> {
    let clusters = session.static_clusters(motion);
    let stationary = clusters.concat();
    info!(
        "{} of {} samples stand still in {} clusters",
        stationary.len(),
        session.len(),
        clusters.len()
    );
    point_to_point_cross_validation(
        &session.samples.select(&stationary),
        baseline,
        settings,
        rng,
    )
}

/// Maps every sample into the common frame of `poses`.
fn into_common_frame(samples: &Correspondences, poses: [StationToStation; 3]) -> Correspondences {
    samples
        .iter()
        .map(|[p1, p2, p3]| {
            [
                poses[0].transform(p1),
                poses[1].transform(p2),
                poses[2].transform(p3),
            ]
        })
        .collect()
}

fn into_station_one(poses: [StationToStation; 2]) -> [StationToStation; 3] {
    [StationToStation::identity(), poses[0], poses[1]]
}

fn check_split(
    len: usize,
    minimum_training: usize,
    settings: &CrossValidationSettings,
) -> Result<()> {
    let training = ((len as f64 * settings.training_ratio).round() as usize).min(len);
    if training < minimum_training || training == len {
        return Err(CalibError::InsufficientData(format!(
            "{} samples split into {} for training and {} held out",
            len,
            training,
            len - training
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;
    use ts_core::nalgebra::{Point3, Rotation3, Vector3};

    fn poses() -> [StationToStation; 2] {
        [
            StationToStation::from_parts(
                Vector3::new(3.0, -1.0, 0.2),
                Rotation3::from_euler_angles(0.0, 0.0, 0.7),
            ),
            StationToStation::from_parts(
                Vector3::new(-2.0, 4.0, -0.1),
                Rotation3::from_euler_angles(0.0, 0.0, -2.3),
            ),
        ]
    }

    /// The same points seen by all three stations.
    fn shared_points(count: usize) -> Correspondences {
        let [t12, t13] = poses();
        (0..count)
            .map(|i| {
                let a = i as f64;
                let p = Point3::new(a.sin() * 5.0, (a * 0.7).cos() * 4.0, 0.1 * a);
                [p, t12.inverse().transform(p), t13.inverse().transform(p)]
            })
            .collect()
    }

    #[test]
    fn exact_data_gives_zero_errors() {
        let samples = shared_points(20);
        let settings = CrossValidationSettings {
            iterations: 4,
            ..Default::default()
        };
        let errors = point_to_point_cross_validation(
            &samples,
            Some(poses()),
            &settings,
            &mut Pcg64::seed_from_u64(0),
        )
        .unwrap();
        assert_eq!(errors.fitted.len(), 4 * 5 * 3);
        assert_eq!(errors.baseline.len(), errors.fitted.len());
        for e in errors.fitted.iter().chain(&errors.baseline) {
            assert_relative_eq!(*e, 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn too_few_samples() {
        let settings = CrossValidationSettings::default();
        let mut rng = Pcg64::seed_from_u64(0);
        assert!(matches!(
            point_to_point_cross_validation(&shared_points(3), None, &settings, &mut rng),
            Err(CalibError::InsufficientData(_))
        ));
        assert!(matches!(
            inter_prism_cross_validation(
                &shared_points(6),
                PrismDistances::new(1.0, 1.0, 1.0),
                Prior::PointToPoint,
                None,
                &PrismDistanceOptimizer::default(),
                &settings,
                &mut rng,
            ),
            Err(CalibError::InsufficientData(_))
        ));
    }

    #[test]
    fn baseline_prior_needs_markers() {
        let result = inter_prism_cross_validation(
            &shared_points(30),
            PrismDistances::new(0.0, 0.0, 0.0),
            Prior::Baseline,
            None,
            &PrismDistanceOptimizer::default(),
            &CrossValidationSettings::default(),
            &mut Pcg64::seed_from_u64(0),
        );
        assert!(matches!(result, Err(CalibError::InsufficientData(_))));
    }

    #[test]
    fn distance_errors_in_millimetres() {
        let samples = Correspondences::new(
            vec![Point3::new(0.0, 0.0, 0.0)],
            vec![Point3::new(1.002, 0.0, 0.0)],
            vec![Point3::new(0.0, 1.0, 0.0)],
        );
        let errors = inter_prism_distance_errors(
            &samples,
            [StationToStation::identity(); 3],
            PrismDistances::new(1.0, 1.0, 2.0f64.sqrt()),
        );
        assert_eq!(errors.len(), 3);
        assert_relative_eq!(errors[0], 2.0, epsilon = 1e-9);
        assert_relative_eq!(errors[1], 0.0, epsilon = 1e-9);
    }
}

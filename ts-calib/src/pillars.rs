//! Resection of the three stations on surveyed pillars.
//!
//! Each station measures the same pillars, whose site coordinates are known. The stations
//! are levelled, so each one is fitted independently on its position and heading. The fit
//! is cross validated by training on every subset of `training_pillars` pillars and
//! evaluating on the remaining ones.

use crate::{io::read_marker_file, CalibError, PillarSettings, Result};
use itertools::Itertools;
use log::{debug, info, warn};
use std::path::Path;
use ts_core::{nalgebra::Point3, Correspondences, Pose, StationId, StationToWorld};
use ts_optimize::{ResectionReport, StationYawOptimizer, StationYawResection};

/// A station's heading and position are observable from two pillars.
const MINIMUM_PILLARS: usize = 2;

/// The outcome of [`resect_from_points`].
#[derive(Debug, Clone)]
pub struct PillarResection {
    /// The pose of every station in the site frame, fitted on all the pillars.
    pub poses: [StationToWorld; 3],
    pub reports: [ResectionReport; 3],
    /// Distances between the stations' estimates of every held-out pillar, in the order
    /// `12, 13, 23`, in millimetres.
    pub agreement_errors: Vec<f64>,
    /// Distance between every held-out pillar and its estimate by each station, in
    /// millimetres.
    pub station_errors: [Vec<f64>; 3],
}

/// Resects the stations on the pillars they measured.
///
/// `stations` holds the measurements of the pillars in each station frame, in the order of
/// `pillars`. Panics if the lengths differ.
pub fn resect_from_points(
    stations: &Correspondences,
    pillars: &[Point3<f64>],
    settings: &PillarSettings,
    optimizer: &StationYawOptimizer,
) -> Result<PillarResection> {
    assert_eq!(
        stations.len(),
        pillars.len(),
        "every pillar must be measured by the stations"
    );
    if pillars.len() < MINIMUM_PILLARS {
        return Err(CalibError::InsufficientData(format!(
            "{} pillars, a station needs at least {}",
            pillars.len(),
            MINIMUM_PILLARS
        )));
    }

    let mut agreement_errors = Vec::new();
    let mut station_errors: [Vec<f64>; 3] = Default::default();
    let training = settings.training_pillars.max(MINIMUM_PILLARS);
    if training < pillars.len() {
        for subset in (0..pillars.len()).combinations(training) {
            let held_out: Vec<usize> = (0..pillars.len())
                .filter(|i| !subset.contains(i))
                .collect();
            let poses = fit_stations(stations, pillars, &subset, optimizer)?.map(|r| r.pose);
            debug!("trained on pillars {:?}, evaluated on {:?}", subset, held_out);
            for &i in &held_out {
                let estimates = StationId::ALL
                    .map(|station| poses[station.index()].transform(stations.station(station)[i]));
                for station in StationId::ALL {
                    station_errors[station.index()]
                        .push((pillars[i] - estimates[station.index()]).norm() * 1000.0);
                }
                agreement_errors.extend([
                    (estimates[0] - estimates[1]).norm() * 1000.0,
                    (estimates[0] - estimates[2]).norm() * 1000.0,
                    (estimates[1] - estimates[2]).norm() * 1000.0,
                ]);
            }
        }
    } else {
        warn!(
            "{} pillars leave none out of {} training pillars, the resection is not evaluated",
            pillars.len(),
            training
        );
    }

    let all: Vec<usize> = (0..pillars.len()).collect();
    let [one, two, three] = fit_stations(stations, pillars, &all, optimizer)?;
    info!(
        "stations resected on {} pillars at {}, {} and {}",
        pillars.len(),
        one.pose.position(),
        two.pose.position(),
        three.pose.position()
    );
    Ok(PillarResection {
        poses: [one.pose, two.pose, three.pose],
        reports: [one.report, two.report, three.report],
        agreement_errors,
        station_errors,
    })
}

/// Reads the pillar measurements of the stations from a marker file, then delegates to
/// [`resect_from_points`].
pub fn resect_from_file(
    path: impl AsRef<Path>,
    pillars: &[Point3<f64>],
    settings: &PillarSettings,
    optimizer: &StationYawOptimizer,
) -> Result<PillarResection> {
    let calibration = read_marker_file(path, StationId::One)?;
    if calibration.markers.len() != pillars.len() {
        return Err(CalibError::InsufficientData(format!(
            "the file holds {} markers for {} pillars",
            calibration.markers.len(),
            pillars.len()
        )));
    }
    resect_from_points(&calibration.markers, pillars, settings, optimizer)
}

/// Fits the three stations on the pillars at `indices`, one task per station.
fn fit_stations(
    stations: &Correspondences,
    pillars: &[Point3<f64>],
    indices: &[usize],
    optimizer: &StationYawOptimizer,
) -> Result<[StationYawResection; 3]> {
    let known: Vec<Point3<f64>> = indices.iter().map(|&i| pillars[i]).collect();
    let fit = |station: StationId| -> Result<StationYawResection> {
        let points = stations.station(station);
        let measured: Vec<Point3<f64>> = indices.iter().map(|&i| points[i]).collect();
        Ok(optimizer.optimize(&measured, &known)?)
    };
    let (one, (two, three)) = rayon::join(
        || fit(StationId::One),
        || rayon::join(|| fit(StationId::Two), || fit(StationId::Three)),
    );
    Ok([one?, two?, three?])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pillars() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.1),
            Point3::new(20.0, 1.0, 0.4),
            Point3::new(18.0, 15.0, -0.2),
            Point3::new(-2.0, 12.0, 0.3),
        ]
    }

    fn stations() -> [StationToWorld; 3] {
        [
            StationToWorld::levelled(Point3::new(5.0, 5.0, 1.5), 0.4),
            StationToWorld::levelled(Point3::new(14.0, 6.0, 1.3), 2.9),
            StationToWorld::levelled(Point3::new(9.0, 11.0, 1.6), -1.3),
        ]
    }

    fn measure(stations: [StationToWorld; 3], pillars: &[Point3<f64>]) -> Correspondences {
        pillars
            .iter()
            .map(|&p| stations.map(|station| station.inverse().transform(p)))
            .collect()
    }

    #[test]
    fn recovers_exact_stations() {
        let truth = stations();
        let pillars = pillars();
        let resection = resect_from_points(
            &measure(truth, &pillars),
            &pillars,
            &PillarSettings::default(),
            &StationYawOptimizer::default(),
        )
        .unwrap();
        for (pose, truth) in resection.poses.iter().zip(&truth) {
            assert_relative_eq!(pose.homogeneous(), truth.homogeneous(), epsilon = 1e-6);
        }
        // Six subsets of two pillars, two held out each.
        assert_eq!(resection.agreement_errors.len(), 6 * 2 * 3);
        for errors in &resection.station_errors {
            assert_eq!(errors.len(), 6 * 2);
            assert!(errors.iter().all(|&e| e < 1e-3));
        }
    }

    #[test]
    fn one_pillar_is_not_enough() {
        let pillars = pillars();
        let result = resect_from_points(
            &measure(stations(), &pillars[..1]),
            &pillars[..1],
            &PillarSettings::default(),
            &StationYawOptimizer::default(),
        );
        assert!(matches!(result, Err(CalibError::InsufficientData(_))));
    }
}

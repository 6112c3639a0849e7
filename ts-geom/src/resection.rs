//! Resection of a levelled station from two surveyed reference points.
//!
//! A station that measures a prism at a known position learns two things about itself: its
//! height, from the vertical component of the measurement, and that it stands on a circle
//! of radius `d·sin(el)` around the prism, from the horizontal component. Two such circles
//! meet in at most two points, mirrored across the line joining the references, so the
//! station position has two candidates. The heading then follows from comparing the
//! direction between the two references in the site frame with the same direction as seen
//! by the station.

use crate::{GeomError, Result};
use log::debug;
use ts_core::{
    nalgebra::{Point3, Vector2},
    SphericalReading, StationToWorld,
};

/// Relative tolerance on circle tangency.
const TANGENCY_TOLERANCE: f64 = 1e-9;

/// Reference points closer than this in plan are considered the same point.
const MIN_BASELINE: f64 = 1e-9;

/// Computes both candidate poses of a levelled station from its readings of two reference
/// points with known site coordinates.
///
/// The readings are converted without the ranging offset, so they are expected to already
/// describe the reference points themselves.
///
/// The first candidate lies to the left of the baseline going from `references[0]` to
/// `references[1]` (seen from above), the second one to its right. Both candidates share
/// the same height and heading.
///
/// The sign of the heading is taken from the turn between the observed and the known
/// baselines, not from the order of the readings' x coordinates.
pub fn resect_two_points(
    references: [Point3<f64>; 2],
    readings: [SphericalReading; 2],
) -> Result<[StationToWorld; 2]> {
    let [ref_a, ref_b] = references;
    let [read_a, read_b] = readings;

    let z = 0.5 * ((ref_a.z - read_a.height()) + (ref_b.z - read_b.height()));

    let centre_a = ref_a.xy().coords;
    let centre_b = ref_b.xy().coords;
    let baseline = centre_b - centre_a;
    let separation = baseline.norm();
    if separation < MIN_BASELINE {
        return Err(GeomError::DegenerateInput(
            "reference points coincide in plan",
        ));
    }

    let radius_a = read_a.horizontal_distance();
    let radius_b = read_b.horizontal_distance();

    // Distance from `centre_a` to the radical line, along the baseline.
    let along = (separation * separation + radius_a * radius_a - radius_b * radius_b)
        / (2.0 * separation);
    let across_squared = radius_a * radius_a - along * along;
    if across_squared < -TANGENCY_TOLERANCE * radius_a.max(radius_b).powi(2) {
        return Err(GeomError::NoIntersection);
    }
    let across = across_squared.max(0.0).sqrt();

    let direction = baseline / separation;
    let normal = Vector2::new(-direction.y, direction.x);
    let foot = centre_a + direction * along;
    let left = foot + normal * across;
    let right = foot - normal * across;

    let yaw = heading(baseline, read_b.cartesian().xy() - read_a.cartesian().xy());
    debug!(
        "two point resection: z = {}, yaw = {}, candidates = {:?} {:?}",
        z, yaw, left, right
    );

    Ok([
        StationToWorld::levelled(Point3::new(left.x, left.y, z), yaw),
        StationToWorld::levelled(Point3::new(right.x, right.y, z), yaw),
    ])
}

/// The signed rotation about the vertical axis that turns `seen` into `known`.
///
/// The magnitude is the angle between the two directions, its sign is the sign of their
/// planar cross product.
fn heading(known: Vector2<f64>, seen: Vector2<f64>) -> f64 {
    let cos = known.dot(&seen) / (known.norm() * seen.norm());
    let angle = cos.clamp(-1.0, 1.0).acos();
    if seen.perp(&known) < 0.0 {
        -angle
    } else {
        angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ts_core::Pose;

    fn reading_of(station: StationToWorld, point: Point3<f64>) -> SphericalReading {
        SphericalReading::from_cartesian(station.inverse().transform(point))
    }

    #[test]
    fn recovers_station_among_candidates() {
        let station = StationToWorld::levelled(Point3::new(3.0, -4.0, 1.5), 0.7);
        let references = [Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let readings = [
            reading_of(station, references[0]),
            reading_of(station, references[1]),
        ];
        let candidates = resect_two_points(references, readings).unwrap();

        // The station is south of the baseline, which runs along +x.
        let found = candidates[1];
        assert_relative_eq!(found.position(), station.position(), epsilon = 1e-9);
        assert_relative_eq!(found.yaw(), 0.7, epsilon = 1e-9);
        assert_relative_eq!(candidates[0].position(), Point3::new(3.0, 4.0, 1.5), epsilon = 1e-9);
        for (reference, reading) in references.iter().zip(&readings) {
            assert_relative_eq!(found.transform(reading.cartesian()), *reference, epsilon = 1e-9);
        }
    }

    #[test]
    fn heading_sign_follows_the_turn() {
        let references = [Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        // At ±2.2 rad the first reading lies further along x than the second one.
        for yaw in [-2.2, -0.4, 0.4, 2.2] {
            let station = StationToWorld::levelled(Point3::new(3.0, -4.0, 1.5), yaw);
            let readings = [
                reading_of(station, references[0]),
                reading_of(station, references[1]),
            ];
            let candidates = resect_two_points(references, readings).unwrap();
            assert_relative_eq!(candidates[1].yaw(), yaw, epsilon = 1e-9);
            assert_relative_eq!(
                candidates[1].position(),
                station.position(),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn is_deterministic() {
        let references = [Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let readings = [
            SphericalReading::new(2.0, 1.2, 0.3),
            SphericalReading::new(2.2, 1.25, 0.6),
        ];
        let first = resect_two_points(references, readings);
        let second = resect_two_points(references, readings);
        assert_eq!(first, second);
    }

    #[test]
    fn coincident_references() {
        let references = [Point3::new(1.0, 1.0, 0.0), Point3::new(1.0, 1.0, 2.0)];
        let readings = [SphericalReading::new(2.0, 1.0, 0.0); 2];
        assert!(matches!(
            resect_two_points(references, readings),
            Err(GeomError::DegenerateInput(_))
        ));
    }

    #[test]
    fn circles_too_far_apart() {
        let references = [Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0)];
        let readings = [
            SphericalReading::new(2.0, 1.5, 0.0),
            SphericalReading::new(2.0, 1.5, 1.0),
        ];
        assert_eq!(
            resect_two_points(references, readings),
            Err(GeomError::NoIntersection)
        );
    }
}

use crate::{GeomError, Result};
use float_ord::FloatOrd;
use ts_core::{
    nalgebra::{Matrix3, Point3, Rotation3, Vector3},
    Pose, StationToStation,
};

const MIN_POINTS: usize = 3;

/// Least-squares rigid registration of two corresponding point sets.
///
/// Given points `p_i` in a source frame and `q_i` in a target frame, finds the rotation `R`
/// and translation `t` minimizing `Σ ‖q_i − (R·p_i + t)‖²`. The solution is the global
/// optimum and is obtained in closed form from the SVD of the centered cross-covariance
/// `H = Σ (p_i − p̄)(q_i − q̄)ᵀ = U·Σ·Vᵀ` as `R = V·Uᵀ` and `t = q̄ − R·p̄`. When `R` comes
/// out as a reflection, the column of `V` belonging to the smallest singular value is
/// negated, which gives the best proper rotation instead.
///
/// At least three points are needed, and they must not all lie on a line.
///
/// ```
/// use ts_core::nalgebra::{Point3, Rotation3, Vector3};
/// use ts_core::{Pose, StationToStation};
/// use ts_geom::registration::PointToPoint;
///
/// let pose = StationToStation::from_parts(
///     Vector3::new(1.0, -2.0, 0.3),
///     Rotation3::from_euler_angles(0.0, 0.0, 0.8),
/// );
/// let source = [
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 2.0, 0.0),
///     Point3::new(0.0, 0.0, 3.0),
/// ];
/// let target: Vec<_> = source.iter().map(|&p| pose.transform(p)).collect();
/// let estimate = PointToPoint::new().register(&source, &target).unwrap();
/// assert!((estimate.homogeneous() - pose.homogeneous()).norm() < 1e-9);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct PointToPoint {
    tolerance: f64,
}

impl PointToPoint {
    /// Creates a `PointToPoint` with default values.
    ///
    /// Same as calling [`Default::default`].
    pub fn new() -> Self {
        Default::default()
    }

    /// Set the relative tolerance used to detect degenerate point sets.
    ///
    /// The input is rejected when the largest singular value of the cross-covariance is
    /// below the tolerance, or when the second largest is below the tolerance times the
    /// largest.
    ///
    /// Default is `1e-10`.
    #[must_use]
    pub fn tolerance(self, tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Finds the pose that maps `source` onto `target`.
    ///
    /// Panics if the two slices have different lengths.
    pub fn register(
        &self,
        source: &[Point3<f64>],
        target: &[Point3<f64>],
    ) -> Result<StationToStation> {
        assert_eq!(
            source.len(),
            target.len(),
            "registration needs the same number of source and target points"
        );
        if source.len() < MIN_POINTS {
            return Err(GeomError::NotEnoughPoints {
                needed: MIN_POINTS,
                got: source.len(),
            });
        }

        let source_mean = centroid(source);
        let target_mean = centroid(target);
        let h = source
            .iter()
            .zip(target)
            .map(|(p, q)| (p - source_mean) * (q - target_mean).transpose())
            .fold(Matrix3::zeros(), |acc, outer| acc + outer);

        let svd = h.svd(true, true);
        let (u, v_t) = match (svd.u, svd.v_t) {
            (Some(u), Some(v_t)) => (u, v_t),
            _ => return Err(GeomError::DegenerateInput("SVD did not converge")),
        };
        let singular = svd.singular_values;

        let mut sorted = [singular[0], singular[1], singular[2]];
        sorted.sort_unstable_by_key(|&s| core::cmp::Reverse(FloatOrd(s)));
        if sorted[0] < self.tolerance {
            return Err(GeomError::DegenerateInput("all points coincide"));
        }
        if sorted[1] < self.tolerance * sorted[0] {
            return Err(GeomError::DegenerateInput("points are collinear"));
        }

        let mut v = v_t.transpose();
        let mut rotation = v * u.transpose();
        if rotation.determinant() < 0.0 {
            let smallest = singular
                .iter()
                .enumerate()
                .min_by_key(|&(_, &s)| FloatOrd(s))
                .map(|(ix, _)| ix)
                .unwrap_or(2);
            let flipped = -v.column(smallest);
            v.set_column(smallest, &flipped);
            rotation = v * u.transpose();
        }

        let rotation = Rotation3::from_matrix_unchecked(rotation);
        let translation = target_mean.coords - rotation * source_mean.coords;
        Ok(StationToStation::from_parts(translation, rotation))
    }
}

impl Default for PointToPoint {
    fn default() -> Self {
        Self { tolerance: 1e-10 }
    }
}

/// Registers `source` onto `target` with the default [`PointToPoint`] settings.
pub fn point_to_point(source: &[Point3<f64>], target: &[Point3<f64>]) -> Result<StationToStation> {
    PointToPoint::new().register(source, target)
}

fn centroid(points: &[Point3<f64>]) -> Point3<f64> {
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Point3::from(sum / points.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tetrahedron() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 3.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
        ]
    }

    #[test]
    fn identity_for_identical_sets() {
        let points = tetrahedron();
        let pose = point_to_point(&points, &points).unwrap();
        assert_relative_eq!(pose.homogeneous(), StationToStation::identity().homogeneous(), epsilon = 1e-12);
    }

    #[test]
    fn mirrored_target_still_gives_a_rotation() {
        let source = tetrahedron();
        let target: Vec<_> = source
            .iter()
            .map(|p| Point3::new(p.x, p.y, -p.z))
            .collect();
        let pose = point_to_point(&source, &target).unwrap();
        assert_relative_eq!(pose.isometry().rotation.matrix().determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn planar_points_are_enough() {
        let source = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let expected = StationToStation::from_parts(
            Vector3::new(0.5, 0.5, 0.5),
            Rotation3::from_euler_angles(0.3, 0.2, 0.1),
        );
        let target: Vec<_> = source.iter().map(|&p| expected.transform(p)).collect();
        let pose = point_to_point(&source, &target).unwrap();
        assert_relative_eq!(pose.homogeneous(), expected.homogeneous(), epsilon = 1e-9);
    }

    #[test]
    fn rejects_small_and_degenerate_sets() {
        let two = [Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        assert_eq!(
            point_to_point(&two, &two),
            Err(GeomError::NotEnoughPoints { needed: 3, got: 2 })
        );
        let coincident = [Point3::new(1.0, 1.0, 1.0); 4];
        assert!(matches!(
            point_to_point(&coincident, &coincident),
            Err(GeomError::DegenerateInput(_))
        ));
        let line: Vec<_> = (0..5).map(|i| Point3::new(i as f64, 2.0 * i as f64, 0.0)).collect();
        assert!(matches!(
            point_to_point(&line, &line),
            Err(GeomError::DegenerateInput(_))
        ));
    }

    #[test]
    #[should_panic]
    fn mismatched_lengths_panic() {
        let points = tetrahedron();
        let _ = point_to_point(&points, &points[1..]);
    }
}

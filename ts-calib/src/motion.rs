//! Detection of the instants where the calibration rig stands still, and temporal matching
//! of the trajectories recorded by the stations.

use crate::MotionSettings;
use core::ops::Range;
use log::debug;
use ts_core::{
    nalgebra::{Point3, Vector3},
    Correspondences, PrismDistances, RawObservation, StationId,
};

/// Time-stamped positions of one prism as seen by one station.
///
/// Timestamps are expected in increasing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    timestamps: Vec<f64>,
    points: Vec<Point3<f64>>,
}

impl Trajectory {
    /// Panics if `timestamps` and `points` differ in length.
    pub fn new(timestamps: Vec<f64>, points: Vec<Point3<f64>>) -> Self {
        assert_eq!(
            timestamps.len(),
            points.len(),
            "every position needs a timestamp"
        );
        Self { timestamps, points }
    }

    /// Keeps the valid observations of `station`, in the order given.
    pub fn from_observations<'a>(
        observations: impl IntoIterator<Item = &'a RawObservation>,
        station: StationId,
    ) -> Self {
        observations
            .into_iter()
            .filter(|o| o.station == station && o.is_valid())
            .map(|o| (o.timestamp, o.point()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }
}

impl FromIterator<(f64, Point3<f64>)> for Trajectory {
    fn from_iter<I: IntoIterator<Item = (f64, Point3<f64>)>>(iter: I) -> Self {
        let (timestamps, points) = iter.into_iter().unzip();
        Self { timestamps, points }
    }
}

/// Samples of the three stations matched in time, with the timestamps of station one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub timestamps: Vec<f64>,
    pub samples: Correspondences,
}

impl Session {
    /// Panics if `timestamps` and `samples` differ in length.
    pub fn new(timestamps: Vec<f64>, samples: Correspondences) -> Self {
        assert_eq!(
            timestamps.len(),
            samples.len(),
            "every sample needs a timestamp"
        );
        Self {
            timestamps,
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The clusters where station one's prism stands still, see [`static_clusters`].
    pub fn static_clusters(&self, settings: &MotionSettings) -> Vec<Vec<usize>> {
        static_clusters(&self.timestamps, self.samples.first(), settings)
    }
}

/// Indices of the samples whose speed since the previous sample is below `speed_limit`.
///
/// `dt` is the sampling period. The first sample has no predecessor and is never returned.
pub fn find_not_moving(points: &[Point3<f64>], speed_limit: f64, dt: f64) -> Vec<usize> {
    (1..points.len())
        .filter(|&i| (points[i] - points[i - 1]).norm() / dt < speed_limit)
        .collect()
}

/// Indices of the samples that moved less than `distance_limit` since the previous sample.
pub fn find_not_moving_by_distance(points: &[Point3<f64>], distance_limit: f64) -> Vec<usize> {
    (1..points.len())
        .filter(|&i| (points[i] - points[i - 1]).norm() < distance_limit)
        .collect()
}

/// Groups the `stationary` indices into clusters of samples close in time.
///
/// Two consecutive stationary indices share a cluster when their timestamps are at most
/// `max_gap` apart. Clusters with fewer than `min_cluster_size` members are dropped.
pub fn cluster_by_time(
    timestamps: &[f64],
    stationary: &[usize],
    max_gap: f64,
    min_cluster_size: usize,
) -> Vec<Vec<usize>> {
    let mut clusters = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    for &index in stationary {
        if let Some(&last) = current.last() {
            if timestamps[index] - timestamps[last] > max_gap {
                clusters.push(core::mem::take(&mut current));
            }
        }
        current.push(index);
    }
    if !current.is_empty() {
        clusters.push(current);
    }
    let before = clusters.len();
    clusters.retain(|cluster| cluster.len() >= min_cluster_size);
    debug!(
        "{} stationary samples form {} clusters, {} kept",
        stationary.len(),
        before,
        clusters.len()
    );
    clusters
}

/// Runs [`find_not_moving`] at the sampling rate of `settings`, then groups the result
/// with [`cluster_by_time`].
pub fn static_clusters(
    timestamps: &[f64],
    points: &[Point3<f64>],
    settings: &MotionSettings,
) -> Vec<Vec<usize>> {
    let stationary = find_not_moving(points, settings.speed_limit, settings.period());
    cluster_by_time(
        timestamps,
        &stationary,
        settings.max_gap,
        settings.min_cluster_size,
    )
}

/// The mean position of every cluster.
pub fn cluster_centroids(points: &[Point3<f64>], clusters: &[Vec<usize>]) -> Vec<Point3<f64>> {
    clusters
        .iter()
        .map(|cluster| mean(cluster.iter().map(|&i| points[i])))
        .collect()
}

/// Compares the distances between the cluster means of the three prisms with the rig.
///
/// `positions` must already be expressed in a common frame. Returns one
/// `[e12, e13, e23]` per cluster, each `‖·‖ − d` in millimetres.
pub fn cluster_distance_errors(
    positions: &Correspondences,
    clusters: &[Vec<usize>],
    distances: PrismDistances,
) -> Vec<[f64; 3]> {
    let first = cluster_centroids(positions.first(), clusters);
    let second = cluster_centroids(positions.second(), clusters);
    let third = cluster_centroids(positions.third(), clusters);
    first
        .into_iter()
        .zip(second)
        .zip(third)
        .map(|((p1, p2), p3)| {
            let measured = PrismDistances::from_positions(p1, p2, p3);
            [
                (measured.d12 - distances.d12) * 1000.0,
                (measured.d13 - distances.d13) * 1000.0,
                (measured.d23 - distances.d23) * 1000.0,
            ]
        })
        .collect()
}

/// Cuts a recording into the stretches without a gap longer than `max_gap`.
///
/// Stretches of fewer than three samples are dropped.
pub fn split_time_intervals(timestamps: &[f64], max_gap: f64) -> Vec<Range<usize>> {
    let mut intervals = Vec::new();
    let mut start = 0;
    for i in 1..=timestamps.len() {
        if i == timestamps.len() || timestamps[i] - timestamps[i - 1] > max_gap {
            if i - start >= 3 {
                intervals.push(start..i);
            }
            start = i;
        }
    }
    intervals
}

/// Index of the timestamp closest to `time` in the sorted `timestamps`.
///
/// On a tie the later sample wins. Returns `None` only when `timestamps` is empty.
pub fn closest_timestamp(timestamps: &[f64], time: f64) -> Option<usize> {
    if timestamps.is_empty() {
        return None;
    }
    let after = timestamps.partition_point(|&t| t < time);
    if after == 0 {
        return Some(0);
    }
    if after == timestamps.len() {
        return Some(after - 1);
    }
    if time - timestamps[after - 1] < timestamps[after] - time {
        Some(after - 1)
    } else {
        Some(after)
    }
}

/// Like [`closest_timestamp`], but only accepts a sample at most `tolerance` away.
pub fn closest_timestamp_within(timestamps: &[f64], time: f64, tolerance: f64) -> Option<usize> {
    closest_timestamp(timestamps, time).filter(|&i| (timestamps[i] - time).abs() <= tolerance)
}

/// Builds a session by pairing every sample of station one with the closest samples of
/// stations two and three, when both are within `tolerance` seconds.
pub fn match_by_time(trajectories: [&Trajectory; 3], tolerance: f64) -> Session {
    let [first, second, third] = trajectories;
    let mut session = Session::default();
    for (&time, &p1) in first.timestamps().iter().zip(first.points()) {
        let matched = closest_timestamp_within(second.timestamps(), time, tolerance).and_then(
            |i2| {
                closest_timestamp_within(third.timestamps(), time, tolerance)
                    .map(|i3| [p1, second.points()[i2], third.points()[i3]])
            },
        );
        if let Some(sample) = matched {
            session.timestamps.push(time);
            session.samples.push(sample);
        }
    }
    debug!(
        "matched {} of {} samples within {} s",
        session.len(),
        first.len(),
        tolerance
    );
    session
}

fn mean(points: impl Iterator<Item = Point3<f64>>) -> Point3<f64> {
    let (sum, count) = points.fold((Vector3::zeros(), 0usize), |(sum, count), p| {
        (sum + p.coords, count + 1)
    });
    Point3::from(sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Still for ten samples, moving at 1 m/s for eleven, then still again, at 10 Hz.
    fn still_move_still() -> Trajectory {
        (0..30)
            .map(|i| {
                let t = i as f64 * 0.1;
                let x = if i < 10 {
                    0.0
                } else if i <= 20 {
                    (i - 9) as f64 * 0.1
                } else {
                    1.1
                };
                (t, Point3::new(x, 2.0, 0.5))
            })
            .collect()
    }

    #[test]
    fn stationary_clusters() {
        let trajectory = still_move_still();
        let stationary = find_not_moving(trajectory.points(), 0.5, 0.1);
        let clusters = cluster_by_time(trajectory.timestamps(), &stationary, 0.15, 5);
        assert_eq!(clusters, vec![(1..10).collect::<Vec<_>>(), (21..30).collect()]);

        let centroids = cluster_centroids(trajectory.points(), &clusters);
        assert_relative_eq!(centroids[0], Point3::new(0.0, 2.0, 0.5), epsilon = 1e-12);
        assert_relative_eq!(centroids[1], Point3::new(1.1, 2.0, 0.5), epsilon = 1e-12);
    }

    #[test]
    fn distance_filter_agrees_with_speed_filter() {
        let trajectory = still_move_still();
        assert_eq!(
            find_not_moving_by_distance(trajectory.points(), 0.05),
            find_not_moving(trajectory.points(), 0.5, 0.1)
        );
    }

    #[test]
    fn small_clusters_are_dropped() {
        let timestamps: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let stationary = [1, 2, 3, 10, 11, 12, 13, 14];
        let clusters = cluster_by_time(&timestamps, &stationary, 1.0, 5);
        assert_eq!(clusters, vec![vec![10, 11, 12, 13, 14]]);
    }

    #[test]
    fn time_intervals() {
        let timestamps = [0.0, 0.1, 0.2, 0.3, 5.0, 5.1, 9.0, 9.1, 9.2];
        assert_eq!(split_time_intervals(&timestamps, 1.0), vec![0..4, 6..9]);
        assert!(split_time_intervals(&[], 1.0).is_empty());
    }

    #[test]
    fn closest_timestamps() {
        let timestamps = [0.0, 1.0, 2.0, 4.0];
        assert_eq!(closest_timestamp(&timestamps, -3.0), Some(0));
        assert_eq!(closest_timestamp(&timestamps, 1.2), Some(1));
        assert_eq!(closest_timestamp(&timestamps, 3.0), Some(3));
        assert_eq!(closest_timestamp(&timestamps, 9.0), Some(3));
        assert_eq!(closest_timestamp(&[], 1.0), None);
        assert_eq!(closest_timestamp_within(&timestamps, 3.0, 0.5), None);
        assert_eq!(closest_timestamp_within(&timestamps, 2.4, 0.5), Some(2));
    }

    #[test]
    fn matching_skips_lonely_samples() {
        let trajectory = still_move_still();
        let shifted: Trajectory = trajectory
            .timestamps()
            .iter()
            .zip(trajectory.points())
            .filter(|(&t, _)| t < 2.0)
            .map(|(&t, &p)| (t + 0.01, p))
            .collect();
        let matched = match_by_time([&trajectory, &shifted, &trajectory], 0.02);
        assert_eq!(matched.len(), 20);
        assert_eq!(matched.timestamps, trajectory.timestamps()[..20].to_vec());
        assert_eq!(
            matched.samples.get(5).map(|s| s[1]),
            Some(trajectory.points()[5])
        );
    }

    #[test]
    fn settings_drive_the_clusters() {
        let trajectory = still_move_still();
        let samples: Correspondences = trajectory.points().iter().map(|&p| [p; 3]).collect();
        let session = Session::new(trajectory.timestamps().to_vec(), samples);
        let settings = MotionSettings {
            speed_limit: 0.5,
            max_gap: 0.15,
            ..Default::default()
        };
        assert_eq!(
            session.static_clusters(&settings),
            vec![(1..10).collect::<Vec<_>>(), (21..30).collect()]
        );
        // A large gap merges both stops, a large minimum size drops them.
        let merged = MotionSettings {
            max_gap: 2.0,
            ..settings
        };
        assert_eq!(session.static_clusters(&merged).len(), 1);
        let strict = MotionSettings {
            min_cluster_size: 10,
            ..settings
        };
        assert!(session.static_clusters(&strict).is_empty());
    }

    #[test]
    fn cluster_errors_in_millimetres() {
        let positions = Correspondences::new(
            vec![Point3::new(0.0, 0.0, 0.0); 5],
            vec![Point3::new(1.001, 0.0, 0.0); 5],
            vec![Point3::new(0.0, 2.0, 0.0); 5],
        );
        let clusters = vec![(0..5).collect()];
        let errors = cluster_distance_errors(
            &positions,
            &clusters,
            PrismDistances::new(1.0, 2.0, (1.001f64.powi(2) + 4.0).sqrt()),
        );
        assert_eq!(errors.len(), 1);
        assert_relative_eq!(errors[0][0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(errors[0][1], 0.0, epsilon = 1e-9);
        assert_relative_eq!(errors[0][2], 0.0, epsilon = 1e-9);
    }
}

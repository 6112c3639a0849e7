use crate::SphericalReading;
use nalgebra::Point3;
#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// One of the three stations of a setup.
///
/// Station one is the reference: relative poses map the other stations into its frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum StationId {
    One,
    Two,
    Three,
}

impl StationId {
    pub const ALL: [StationId; 3] = [StationId::One, StationId::Two, StationId::Three];

    /// Zero-based index, for addressing per-station arrays.
    pub fn index(self) -> usize {
        match self {
            StationId::One => 0,
            StationId::Two => 1,
            StationId::Three => 2,
        }
    }

    /// The one-based number used in data files.
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }
}

impl TryFrom<u8> for StationId {
    type Error = u8;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        match number {
            1 => Ok(StationId::One),
            2 => Ok(StationId::Two),
            3 => Ok(StationId::Three),
            other => Err(other),
        }
    }
}

/// A measurement as supplied by a log reader.
///
/// `status` is the instrument's own status code, where `0` means the measurement is valid.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct RawObservation {
    pub station: StationId,
    pub status: i32,
    pub reading: SphericalReading,
    pub timestamp: f64,
}

impl RawObservation {
    pub fn is_valid(&self) -> bool {
        self.status == 0
    }

    /// The prism position in the station frame, ranging offset included.
    pub fn point(&self) -> Point3<f64> {
        self.reading.station_point()
    }
}

/// Positions measured simultaneously by the three stations.
///
/// Index `i` of every sequence refers to the same instant, so the three sequences always
/// share a length. Each point is expressed in the frame of the station that measured it.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Correspondences {
    first: Vec<Point3<f64>>,
    second: Vec<Point3<f64>>,
    third: Vec<Point3<f64>>,
}

impl Correspondences {
    /// Panics if the three sequences do not have the same length.
    pub fn new(
        first: Vec<Point3<f64>>,
        second: Vec<Point3<f64>>,
        third: Vec<Point3<f64>>,
    ) -> Self {
        assert_eq!(
            first.len(),
            second.len(),
            "stations one and two must have the same number of samples"
        );
        assert_eq!(
            first.len(),
            third.len(),
            "stations one and three must have the same number of samples"
        );
        Self {
            first,
            second,
            third,
        }
    }

    pub fn len(&self) -> usize {
        self.first.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_empty()
    }

    pub fn first(&self) -> &[Point3<f64>] {
        &self.first
    }

    pub fn second(&self) -> &[Point3<f64>] {
        &self.second
    }

    pub fn third(&self) -> &[Point3<f64>] {
        &self.third
    }

    /// The samples of one station.
    pub fn station(&self, station: StationId) -> &[Point3<f64>] {
        match station {
            StationId::One => &self.first,
            StationId::Two => &self.second,
            StationId::Three => &self.third,
        }
    }

    pub fn get(&self, index: usize) -> Option<[Point3<f64>; 3]> {
        Some([
            *self.first.get(index)?,
            self.second[index],
            self.third[index],
        ])
    }

    pub fn push(&mut self, sample: [Point3<f64>; 3]) {
        self.first.push(sample[0]);
        self.second.push(sample[1]);
        self.third.push(sample[2]);
    }

    pub fn iter(&self) -> impl Iterator<Item = [Point3<f64>; 3]> + '_ {
        self.first
            .iter()
            .zip(&self.second)
            .zip(&self.third)
            .map(|((&a, &b), &c)| [a, b, c])
    }

    /// A new set made of the samples at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Self {
        indices.iter().map(|&i| self.get_unchecked(i)).collect()
    }

    /// Splits the samples into those where `mask` is `true` and those where it is `false`.
    ///
    /// Panics if the mask length differs from the number of samples.
    pub fn partition(&self, mask: &[bool]) -> (Self, Self) {
        assert_eq!(mask.len(), self.len(), "mask must cover every sample");
        let mut selected = Self::default();
        let mut rest = Self::default();
        for (sample, &keep) in self.iter().zip(mask) {
            if keep {
                selected.push(sample);
            } else {
                rest.push(sample);
            }
        }
        (selected, rest)
    }

    fn get_unchecked(&self, index: usize) -> [Point3<f64>; 3] {
        [self.first[index], self.second[index], self.third[index]]
    }
}

impl FromIterator<[Point3<f64>; 3]> for Correspondences {
    fn from_iter<I: IntoIterator<Item = [Point3<f64>; 3]>>(iter: I) -> Self {
        let mut set = Self::default();
        for sample in iter {
            set.push(sample);
        }
        set
    }
}

/// Fixed distances between the three prisms of the calibration rig, in metres.
///
/// `d12` is the distance between the prism tracked by station one and the one tracked by
/// station two, and so on.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct PrismDistances {
    pub d12: f64,
    pub d13: f64,
    pub d23: f64,
}

impl PrismDistances {
    pub fn new(d12: f64, d13: f64, d23: f64) -> Self {
        Self { d12, d13, d23 }
    }

    /// Measures the distances from prism positions expressed in a common frame.
    pub fn from_positions(p1: Point3<f64>, p2: Point3<f64>, p3: Point3<f64>) -> Self {
        Self {
            d12: (p1 - p2).norm(),
            d13: (p1 - p3).norm(),
            d23: (p2 - p3).norm(),
        }
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.d12, self.d13, self.d23]
    }
}

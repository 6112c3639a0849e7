use nalgebra::Point3;
#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, TAU};

/// Constant added to every measured slope distance before it is turned into a point, in metres.
///
/// The instruments report the distance to the front of the prism holder; the reflection
/// centre sits 10 mm behind it.
pub const RANGING_OFFSET: f64 = 0.01;

/// A single measurement of a station, in the station's own spherical frame.
///
/// * `distance` - slope distance in metres
/// * `elevation` - vertical angle in radians, measured from the zenith (`0` is straight up)
/// * `azimuth` - horizontal angle in radians, measured clockwise from the station's `+y` axis
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct SphericalReading {
    pub distance: f64,
    pub elevation: f64,
    pub azimuth: f64,
}

impl SphericalReading {
    pub fn new(distance: f64, elevation: f64, azimuth: f64) -> Self {
        Self {
            distance,
            elevation,
            azimuth,
        }
    }

    /// The cartesian position described by the reading, without any ranging correction.
    pub fn cartesian(&self) -> Point3<f64> {
        spherical_to_cartesian(self.distance, self.elevation, self.azimuth)
    }

    /// The position of the prism in the station frame, with [`RANGING_OFFSET`] applied.
    pub fn station_point(&self) -> Point3<f64> {
        spherical_to_cartesian(
            self.distance + RANGING_OFFSET,
            self.elevation,
            self.azimuth,
        )
    }

    /// Builds the reading that would produce `point` through [`SphericalReading::cartesian`].
    pub fn from_cartesian(point: Point3<f64>) -> Self {
        cartesian_to_spherical(point)
    }

    /// Horizontal distance between the station and the prism.
    pub fn horizontal_distance(&self) -> f64 {
        self.distance * self.elevation.sin()
    }

    /// Height of the prism above the station's horizontal plane.
    pub fn height(&self) -> f64 {
        self.distance * self.elevation.cos()
    }
}

/// Converts a slope distance, zenith angle and clockwise azimuth (from `+y`) into a point.
pub fn spherical_to_cartesian(distance: f64, elevation: f64, azimuth: f64) -> Point3<f64> {
    let horizontal = distance * elevation.sin();
    Point3::new(
        horizontal * (FRAC_PI_2 - azimuth).cos(),
        horizontal * (FRAC_PI_2 - azimuth).sin(),
        distance * elevation.cos(),
    )
}

/// The inverse of [`spherical_to_cartesian`].
///
/// The origin maps to a zero reading, and points on the vertical axis get a zero azimuth.
/// Azimuths are returned in `[0, 2π)`.
pub fn cartesian_to_spherical(point: Point3<f64>) -> SphericalReading {
    let distance = point.coords.norm();
    let elevation = if distance == 0.0 {
        0.0
    } else {
        (point.z / distance).clamp(-1.0, 1.0).acos()
    };
    let azimuth = if point.x == 0.0 && point.y == 0.0 {
        0.0
    } else {
        (FRAC_PI_2 - point.y.atan2(point.x)).rem_euclid(TAU)
    };
    SphericalReading::new(distance, elevation, azimuth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn azimuth_is_clockwise_from_y() {
        let north = spherical_to_cartesian(2.0, FRAC_PI_2, 0.0);
        assert_relative_eq!(north, Point3::new(0.0, 2.0, 0.0), epsilon = 1e-12);
        let east = spherical_to_cartesian(2.0, FRAC_PI_2, FRAC_PI_2);
        assert_relative_eq!(east, Point3::new(2.0, 0.0, 0.0), epsilon = 1e-12);
        let zenith = spherical_to_cartesian(3.0, 0.0, 1.0);
        assert_relative_eq!(zenith, Point3::new(0.0, 0.0, 3.0), epsilon = 1e-12);
    }

    #[test]
    fn inverse_conversion() {
        let reading = SphericalReading::new(12.5, 1.4, 5.9);
        let back = cartesian_to_spherical(reading.cartesian());
        assert_relative_eq!(back.distance, reading.distance, epsilon = 1e-12);
        assert_relative_eq!(back.elevation, reading.elevation, epsilon = 1e-12);
        assert_relative_eq!(back.azimuth, reading.azimuth, epsilon = 1e-12);
    }

    #[test]
    fn degenerate_points() {
        let origin = cartesian_to_spherical(Point3::origin());
        assert_eq!(origin, SphericalReading::new(0.0, 0.0, 0.0));
        let nadir = cartesian_to_spherical(Point3::new(0.0, 0.0, -2.0));
        assert_relative_eq!(nadir.elevation, PI);
        assert_eq!(nadir.azimuth, 0.0);
    }

    #[test]
    fn station_point_adds_ranging_offset() {
        let reading = SphericalReading::new(5.0, 0.9, 0.3);
        let offset = reading.station_point().coords.norm() - reading.cartesian().coords.norm();
        assert_relative_eq!(offset, RANGING_OFFSET, epsilon = 1e-12);
    }
}

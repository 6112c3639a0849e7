//! Readers for the text files produced in the field.
//!
//! A marker file is a comma separated table with one header line. Every row holds the
//! station number, an unused column, the instrument status, the vertical angle, the
//! horizontal angle and the slope distance (radians and metres). Further columns are
//! ignored. Only rows with status `0` are kept, and every station must have measured the
//! same markers in the same order.
//!
//! A trajectory file has one `timestamp x y z` row per sample, separated by commas or
//! whitespace. Blank lines, `#` comments and a leading header are skipped. A points file,
//! such as the surveyed coordinates of the pillars, has the same layout with `x y z` rows.

use crate::{motion::Trajectory, CalibError, Result};
use log::{debug, info};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};
use ts_core::{
    nalgebra::Point3, Correspondences, Pose, SphericalReading, StationId, StationToStation,
};
use ts_geom::point_to_point;

/// The markers of a marker file and the poses registering the stations onto one another.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerCalibration {
    /// The station whose frame the poses map into.
    pub reference: StationId,
    /// The markers as measured by each station, in its own frame.
    pub markers: Correspondences,
    /// The pose of every station into the reference station, indexed by
    /// [`StationId::index`]. The reference maps onto itself with the identity.
    pub poses: [StationToStation; 3],
}

impl MarkerCalibration {
    /// Registers the stations measuring `markers` onto `reference`.
    pub fn register(markers: Correspondences, reference: StationId) -> Result<Self> {
        let target = markers.station(reference);
        let mut poses = [StationToStation::identity(); 3];
        for station in StationId::ALL {
            if station != reference {
                poses[station.index()] = point_to_point(markers.station(station), target)?;
            }
        }
        Ok(Self {
            reference,
            markers,
            poses,
        })
    }

    /// The poses of stations two and three into station one, whatever the reference.
    pub fn baseline(&self) -> [StationToStation; 2] {
        let one_to_reference = self.poses[StationId::One.index()];
        let into_one = |station: StationId| -> StationToStation {
            (one_to_reference.isometry().inverse() * self.poses[station.index()].isometry())
                .into()
        };
        [into_one(StationId::Two), into_one(StationId::Three)]
    }

    /// The markers of every station mapped into the reference frame.
    pub fn markers_in_reference(&self) -> Correspondences {
        let [t1, t2, t3] = self.poses;
        self.markers
            .iter()
            .map(|[p1, p2, p3]| [t1.transform(p1), t2.transform(p2), t3.transform(p3)])
            .collect()
    }
}

/// Reads a marker file and registers the stations onto `reference`.
pub fn read_marker_file(
    path: impl AsRef<Path>,
    reference: StationId,
) -> Result<MarkerCalibration> {
    let path = path.as_ref();
    info!("reading markers from {}", path.display());
    parse_marker_file(BufReader::new(File::open(path)?), reference)
}

/// Parses the content of a marker file, see [`read_marker_file`].
pub fn parse_marker_file(
    reader: impl BufRead,
    reference: StationId,
) -> Result<MarkerCalibration> {
    let mut stations: [Vec<Point3<f64>>; 3] = Default::default();
    let mut last_line = 0;
    for (index, line) in reader.lines().enumerate().skip(1) {
        let line_number = index + 1;
        last_line = line_number;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let columns: Vec<&str> = line.split(',').map(str::trim).collect();
        if columns.len() < 6 {
            return Err(parse_error(
                line_number,
                format!("expected at least 6 columns, found {}", columns.len()),
            ));
        }
        let number: u8 = parse_column(&columns, 0, line_number)?;
        let station = StationId::try_from(number)
            .map_err(|n| parse_error(line_number, format!("unknown station {}", n)))?;
        let status: i32 = parse_column(&columns, 2, line_number)?;
        if status != 0 {
            continue;
        }
        let reading = SphericalReading::new(
            parse_column(&columns, 5, line_number)?,
            parse_column(&columns, 3, line_number)?,
            parse_column(&columns, 4, line_number)?,
        );
        stations[station.index()].push(reading.station_point());
    }

    let [first, second, third] = stations;
    if first.len() != second.len() || first.len() != third.len() {
        return Err(parse_error(
            last_line,
            format!(
                "stations measured {}, {} and {} valid markers",
                first.len(),
                second.len(),
                third.len()
            ),
        ));
    }
    debug!("{} markers per station", first.len());
    MarkerCalibration::register(Correspondences::new(first, second, third), reference)
}

/// Reads the trajectory of one prism.
pub fn read_trajectory(path: impl AsRef<Path>) -> Result<Trajectory> {
    let path = path.as_ref();
    info!("reading trajectory from {}", path.display());
    parse_trajectory(BufReader::new(File::open(path)?))
}

/// Parses the content of a trajectory file, see [`read_trajectory`].
pub fn parse_trajectory(reader: impl BufRead) -> Result<Trajectory> {
    let rows = parse_rows::<4>(reader)?;
    Ok(rows
        .into_iter()
        .map(|[t, x, y, z]| (t, Point3::new(x, y, z)))
        .collect())
}

/// Reads a list of points, one `x y z` row each.
pub fn read_points(path: impl AsRef<Path>) -> Result<Vec<Point3<f64>>> {
    let path = path.as_ref();
    info!("reading points from {}", path.display());
    parse_points(BufReader::new(File::open(path)?))
}

/// Parses the content of a points file, see [`read_points`].
pub fn parse_points(reader: impl BufRead) -> Result<Vec<Point3<f64>>> {
    let rows = parse_rows::<3>(reader)?;
    Ok(rows.into_iter().map(|[x, y, z]| Point3::new(x, y, z)).collect())
}

/// Reads rows of at least `N` numbers, keeping the first `N`.
fn parse_rows<const N: usize>(reader: impl BufRead) -> Result<Vec<[f64; N]>> {
    let mut rows = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let columns: Vec<&str> = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|c| !c.is_empty())
            .collect();
        let header = columns.first().map_or(false, |c| c.parse::<f64>().is_err());
        if rows.is_empty() && header {
            continue;
        }
        if columns.len() < N {
            return Err(parse_error(
                line_number,
                format!("expected {} values, found {}", N, columns.len()),
            ));
        }
        let mut row = [0.0; N];
        for (column, value) in row.iter_mut().enumerate() {
            *value = parse_column(&columns, column, line_number)?;
        }
        rows.push(row);
    }
    Ok(rows)
}

fn parse_column<T: core::str::FromStr>(columns: &[&str], column: usize, line: usize) -> Result<T> {
    columns[column].parse().map_err(|_| {
        parse_error(
            line,
            format!("cannot parse column {}: {:?}", column, columns[column]),
        )
    })
}

fn parse_error(line: usize, message: String) -> CalibError {
    CalibError::Parse { line, message }
}

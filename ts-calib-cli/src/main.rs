use average::{Mean, Variance};
use float_ord::FloatOrd;
use log::*;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::Serialize;
use std::path::{Path, PathBuf};
use structopt::StructOpt;
use ts_calib::{
    dynamic_session_cross_validation, inter_prism_session_cross_validation,
    motion::match_by_time, point_to_point_cross_validation, read_marker_file, read_points,
    read_trajectory, resect_from_file, CalibError, CalibSettings, HeldOutErrors,
    MarkerCalibration, Prior, Session,
};
use ts_core::{nalgebra::Matrix4, Pose, PrismDistances, StationId};
use ts_geom::GeomError;
use ts_optimize::{PrismDistanceOptimizer, StationYawOptimizer};

#[derive(StructOpt, Clone)]
#[structopt(name = "ts-calib", about = "A tool for calibrating three-theodolite setups")]
struct Opt {
    /// The file where settings are specified.
    ///
    /// This is in the format of `ts_calib::CalibSettings`. Defaults are used when the file
    /// cannot be read.
    #[structopt(short, long, default_value = "ts-calib-settings.json")]
    settings: PathBuf,
    /// Seed of the random train/test splits, overriding the settings file.
    #[structopt(long)]
    seed: Option<u64>,
    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt, Clone)]
enum Command {
    /// Registers the stations on the markers of a marker file
    Markers {
        #[structopt(parse(from_os_str))]
        file: PathBuf,
        /// The station whose frame the others are registered into (1, 2 or 3)
        #[structopt(long, default_value = "1", parse(try_from_str = parse_station))]
        reference: StationId,
    },
    /// Cross validates the registration on control points measured by all the stations
    Static {
        /// Marker file giving the baseline calibration
        #[structopt(long, parse(from_os_str))]
        markers: PathBuf,
        /// Marker file of the control points
        #[structopt(parse(from_os_str))]
        control: PathBuf,
    },
    /// Cross validates the registration on sessions where all the stations tracked one prism
    ///
    /// A session is a directory holding `station_1.txt`, `station_2.txt` and `station_3.txt`.
    Dynamic {
        /// Marker file giving the baseline calibration
        #[structopt(long, parse(from_os_str))]
        markers: Option<PathBuf>,
        #[structopt(parse(from_os_str))]
        sessions: Vec<PathBuf>,
    },
    /// Cross validates the inter-prism distance resection on rig sessions
    ///
    /// A session is a directory holding `station_1.txt`, `station_2.txt` and `station_3.txt`.
    InterPrism {
        /// Marker file giving the baseline calibration
        #[structopt(long, parse(from_os_str))]
        markers: Option<PathBuf>,
        /// Distance between the prisms tracked by stations one and two, in metres
        #[structopt(long)]
        d12: f64,
        /// Distance between the prisms tracked by stations one and three, in metres
        #[structopt(long)]
        d13: f64,
        /// Distance between the prisms tracked by stations two and three, in metres
        #[structopt(long)]
        d23: f64,
        /// Start from the registration of the session (`ptp`) or from the markers (`markers`)
        #[structopt(long, default_value = "ptp", parse(try_from_str = parse_prior))]
        prior: Prior,
        #[structopt(parse(from_os_str))]
        sessions: Vec<PathBuf>,
    },
    /// Resects the stations on surveyed pillars
    Pillars {
        /// The site coordinates of the pillars, one `x y z` row each
        #[structopt(long, parse(from_os_str))]
        pillars: PathBuf,
        /// Marker file of the stations measuring the pillars, in the same order
        #[structopt(parse(from_os_str))]
        file: PathBuf,
    },
}

fn parse_station(s: &str) -> Result<StationId, String> {
    let number: u8 = s.parse().map_err(|e| format!("{}", e))?;
    StationId::try_from(number).map_err(|n| format!("there is no station {}", n))
}

fn parse_prior(s: &str) -> Result<Prior, String> {
    match s {
        "ptp" => Ok(Prior::PointToPoint),
        "markers" => Ok(Prior::Baseline),
        other => Err(format!("unknown prior {:?}, expected ptp or markers", other)),
    }
}

/// Summary statistics of a set of errors, in millimetres.
#[derive(Debug, Serialize)]
struct Summary {
    count: usize,
    mean: f64,
    std_dev: f64,
    median: f64,
    p95: f64,
    max: f64,
}

impl Summary {
    fn of(errors: &[f64]) -> Option<Self> {
        if errors.is_empty() {
            return None;
        }
        let mean: Mean = errors.iter().copied().collect();
        let variance: Variance = errors.iter().copied().collect();
        let mut sorted = errors.to_vec();
        sorted.sort_unstable_by_key(|&e| FloatOrd(e));
        let quantile = |q: f64| sorted[((sorted.len() - 1) as f64 * q).round() as usize];
        Some(Self {
            count: errors.len(),
            mean: mean.mean(),
            std_dev: variance.sample_variance().sqrt(),
            median: quantile(0.5),
            p95: quantile(0.95),
            max: sorted[sorted.len() - 1],
        })
    }
}

#[derive(Debug, Serialize)]
struct Comparison {
    fitted: Option<Summary>,
    baseline: Option<Summary>,
}

impl From<&HeldOutErrors> for Comparison {
    fn from(errors: &HeldOutErrors) -> Self {
        Self {
            fitted: Summary::of(&errors.fitted),
            baseline: Summary::of(&errors.baseline),
        }
    }
}

#[derive(Debug, Serialize)]
struct SessionReport {
    session: PathBuf,
    errors: Comparison,
    #[serde(skip_serializing_if = "Option::is_none")]
    markers: Option<Comparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    clusters: Option<Comparison>,
}

/// A pose as the rows of its homogeneous matrix.
fn rows(matrix: Matrix4<f64>) -> [[f64; 4]; 4] {
    let mut rows = [[0.0; 4]; 4];
    for (r, row) in rows.iter_mut().enumerate() {
        for (c, value) in row.iter_mut().enumerate() {
            *value = matrix[(r, c)];
        }
    }
    rows
}

fn print_json(value: &impl Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("unable to serialize the report: {}", e),
    }
}

fn load_session(directory: &Path, tolerance: f64) -> ts_calib::Result<Session> {
    let trajectories = [
        read_trajectory(directory.join("station_1.txt"))?,
        read_trajectory(directory.join("station_2.txt"))?,
        read_trajectory(directory.join("station_3.txt"))?,
    ];
    let [first, second, third] = &trajectories;
    Ok(match_by_time([first, second, third], tolerance))
}

fn load_markers(path: Option<&Path>) -> ts_calib::Result<Option<MarkerCalibration>> {
    path.map(|path| read_marker_file(path, StationId::One))
        .transpose()
}

/// Whether a session failure only means that the session holds no usable data.
fn is_unusable_session(error: &CalibError) -> bool {
    matches!(
        error,
        CalibError::InsufficientData(_)
            | CalibError::Geom(GeomError::NotEnoughPoints { .. })
            | CalibError::Geom(GeomError::DegenerateInput(_))
    )
}

fn main() {
    pretty_env_logger::init_timed();
    let opt = Opt::from_args();

    let settings = std::fs::File::open(&opt.settings)
        .ok()
        .and_then(|file| serde_json::from_reader(file).ok());
    if settings.is_some() {
        info!("loaded existing settings");
    } else {
        info!("used default settings");
    }
    let mut settings: CalibSettings = settings.unwrap_or_default();
    if opt.seed.is_some() {
        settings.cross_validation.seed = opt.seed;
    }

    if let Err(e) = run(opt.command, &settings) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(command: Command, settings: &CalibSettings) -> ts_calib::Result<()> {
    let mut rng = match settings.cross_validation.seed {
        Some(seed) => Pcg64::seed_from_u64(seed),
        None => Pcg64::from_entropy(),
    };

    match command {
        Command::Markers { file, reference } => {
            let calibration = read_marker_file(&file, reference)?;
            let poses: Vec<_> = calibration
                .poses
                .iter()
                .map(|pose| rows(pose.homogeneous()))
                .collect();
            print_json(&poses);
        }
        Command::Static { markers, control } => {
            let baseline = read_marker_file(&markers, StationId::One)?.baseline();
            let control = read_marker_file(&control, StationId::One)?;
            let errors = point_to_point_cross_validation(
                &control.markers,
                Some(baseline),
                &settings.cross_validation,
                &mut rng,
            )?;
            print_json(&Comparison::from(&errors));
        }
        Command::Dynamic { markers, sessions } => {
            let baseline = load_markers(markers.as_deref())?.map(|m| m.baseline());
            let mut reports = Vec::new();
            for session in sessions {
                let samples = load_session(&session, settings.motion.sync_tolerance)?;
                match dynamic_session_cross_validation(
                    &samples,
                    baseline,
                    &settings.motion,
                    &settings.cross_validation,
                    &mut rng,
                ) {
                    Ok(errors) => reports.push(SessionReport {
                        session,
                        errors: Comparison::from(&errors),
                        markers: None,
                        clusters: None,
                    }),
                    Err(e) if is_unusable_session(&e) => {
                        warn!("skipping {}: {}", session.display(), e)
                    }
                    Err(e) => return Err(e),
                }
            }
            print_json(&reports);
        }
        Command::InterPrism {
            markers,
            d12,
            d13,
            d23,
            prior,
            sessions,
        } => {
            let markers = load_markers(markers.as_deref())?;
            let distances = PrismDistances::new(d12, d13, d23);
            let optimizer = PrismDistanceOptimizer::new(settings.optimizer);
            let mut reports = Vec::new();
            for session in sessions {
                let samples = load_session(&session, settings.motion.sync_tolerance)?;
                match inter_prism_session_cross_validation(
                    &samples,
                    distances,
                    prior,
                    markers.as_ref(),
                    &optimizer,
                    &settings.motion,
                    &settings.cross_validation,
                    &mut rng,
                ) {
                    Ok(validation) => reports.push(SessionReport {
                        session,
                        errors: Comparison::from(&validation.distances),
                        markers: markers
                            .as_ref()
                            .map(|_| Comparison::from(&validation.markers)),
                        clusters: Some(Comparison::from(&validation.clusters)),
                    }),
                    Err(e) if is_unusable_session(&e) => {
                        warn!("skipping {}: {}", session.display(), e)
                    }
                    Err(e) => return Err(e),
                }
            }
            print_json(&reports);
        }
        Command::Pillars { pillars, file } => {
            let pillars = read_points(&pillars)?;
            let resection = resect_from_file(
                &file,
                &pillars,
                &settings.pillars,
                &StationYawOptimizer::new(settings.optimizer),
            )?;
            #[derive(Serialize)]
            struct PillarReport {
                poses: Vec<[[f64; 4]; 4]>,
                agreement: Option<Summary>,
                stations: Vec<Option<Summary>>,
            }
            print_json(&PillarReport {
                poses: resection
                    .poses
                    .iter()
                    .map(|pose| rows(pose.homogeneous()))
                    .collect(),
                agreement: Summary::of(&resection.agreement_errors),
                stations: resection
                    .station_errors
                    .iter()
                    .map(|errors| Summary::of(errors))
                    .collect(),
            });
        }
    }
    Ok(())
}

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};
use ts_optimize::OptimizerSettings;

/// The settings for a calibration run.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct CalibSettings {
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub cross_validation: CrossValidationSettings,
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub motion: MotionSettings,
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub pillars: PillarSettings,
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub optimizer: OptimizerSettings,
}

/// The settings of the random train/test cross validation.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CrossValidationSettings {
    /// The number of random splits to evaluate.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_iterations"))]
    pub iterations: usize,
    /// The fraction of the samples used for fitting, the rest is held out.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_training_ratio"))]
    pub training_ratio: f64,
    /// Seeds the random splits. When absent the splits differ between runs.
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub seed: Option<u64>,
}

impl Default for CrossValidationSettings {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            training_ratio: default_training_ratio(),
            seed: None,
        }
    }
}

/// The settings of the static-point filter.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MotionSettings {
    /// Samples moving slower than this (m/s) are considered static.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_speed_limit"))]
    pub speed_limit: f64,
    /// The sampling rate of the trajectories (Hz).
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_rate"))]
    pub rate: f64,
    /// Static samples further apart in time than this (s) belong to different clusters.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_max_gap"))]
    pub max_gap: f64,
    /// Clusters with fewer static samples are discarded.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_min_cluster_size")
    )]
    pub min_cluster_size: usize,
    /// Samples of different stations further apart in time than this (s) are not matched.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_sync_tolerance"))]
    pub sync_tolerance: f64,
}

impl MotionSettings {
    /// Time between two samples.
    pub fn period(&self) -> f64 {
        1.0 / self.rate
    }
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            speed_limit: default_speed_limit(),
            rate: default_rate(),
            max_gap: default_max_gap(),
            min_cluster_size: default_min_cluster_size(),
            sync_tolerance: default_sync_tolerance(),
        }
    }
}

/// The settings of the resection on surveyed pillars.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PillarSettings {
    /// The number of pillars each station is fitted on, the remaining ones are used to
    /// evaluate the fit.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_training_pillars")
    )]
    pub training_pillars: usize,
}

impl Default for PillarSettings {
    fn default() -> Self {
        Self {
            training_pillars: default_training_pillars(),
        }
    }
}

fn default_iterations() -> usize {
    20
}

fn default_training_ratio() -> f64 {
    0.75
}

fn default_speed_limit() -> f64 {
    2.0
}

fn default_rate() -> f64 {
    10.0
}

fn default_max_gap() -> f64 {
    1.0
}

fn default_min_cluster_size() -> usize {
    5
}

fn default_sync_tolerance() -> f64 {
    0.05
}

fn default_training_pillars() -> usize {
    2
}

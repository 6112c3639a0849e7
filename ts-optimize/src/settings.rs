#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// How the two free station poses are parameterized during optimization.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Parameterization {
    /// Full se(3) twists, six parameters per pose.
    Se3,
    /// Yaw and translation only, four parameters per pose. Suited to levelled instruments.
    YawOnly,
}

impl Parameterization {
    /// Number of parameters describing one pose.
    pub fn dof(self) -> usize {
        match self {
            Parameterization::Se3 => 6,
            Parameterization::YawOnly => 4,
        }
    }
}

/// What to do when Levenberg-Marquardt stops without reporting convergence.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConvergencePolicy {
    /// Log a warning and keep the last iterate.
    Warn,
    /// Return [`OptimizeError::NotConverged`](crate::OptimizeError::NotConverged).
    Fail,
}

/// The settings shared by the optimizers of this crate.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OptimizerSettings {
    /// Relative reduction of the cost below which the optimization stops.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_ftol"))]
    pub ftol: f64,
    /// Relative step size below which the optimization stops.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_xtol"))]
    pub xtol: f64,
    /// Multiplied by the number of parameters plus one, this caps the number of evaluations.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_patience"))]
    pub patience: usize,
    /// The parameterization of the poses in the prism distance problem.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_parameterization")
    )]
    pub parameterization: Parameterization,
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_convergence"))]
    pub convergence: ConvergencePolicy,
    /// The prism distance problem refuses to run on fewer samples than this.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_minimum_samples")
    )]
    pub minimum_samples: usize,
}

impl OptimizerSettings {
    #[must_use]
    pub fn parameterization(self, parameterization: Parameterization) -> Self {
        Self {
            parameterization,
            ..self
        }
    }

    #[must_use]
    pub fn convergence(self, convergence: ConvergencePolicy) -> Self {
        Self {
            convergence,
            ..self
        }
    }

    #[must_use]
    pub fn patience(self, patience: usize) -> Self {
        Self { patience, ..self }
    }
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            ftol: default_ftol(),
            xtol: default_xtol(),
            patience: default_patience(),
            parameterization: default_parameterization(),
            convergence: default_convergence(),
            minimum_samples: default_minimum_samples(),
        }
    }
}

fn default_ftol() -> f64 {
    1e-15
}

fn default_xtol() -> f64 {
    1e-15
}

fn default_patience() -> usize {
    2000
}

fn default_parameterization() -> Parameterization {
    Parameterization::Se3
}

fn default_convergence() -> ConvergencePolicy {
    ConvergencePolicy::Warn
}

fn default_minimum_samples() -> usize {
    7
}

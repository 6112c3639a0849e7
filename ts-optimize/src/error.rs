use levenberg_marquardt::TerminationReason;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("Levenberg-Marquardt did not converge ({termination:?}), final cost {cost}")]
    NotConverged {
        termination: TerminationReason,
        cost: f64,
    },
    #[error("need at least {needed} samples, got {got}")]
    NotEnoughSamples { needed: usize, got: usize },
}

pub type Result<T> = core::result::Result<T, OptimizeError>;

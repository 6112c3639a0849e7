use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeomError {
    #[error("need at least {needed} point correspondences, got {got}")]
    NotEnoughPoints { needed: usize, got: usize },
    #[error("degenerate input: {0}")]
    DegenerateInput(&'static str),
    #[error("the horizontal circles around the reference points do not intersect")]
    NoIntersection,
}

pub type Result<T> = core::result::Result<T, GeomError>;

use thiserror::Error;
use ts_geom::GeomError;
use ts_optimize::OptimizeError;

#[derive(Debug, Error)]
pub enum CalibError {
    #[error("registration or resection failed: {0}")]
    Geom(#[from] GeomError),
    #[error("optimization failed: {0}")]
    Optimize(#[from] OptimizeError),
    #[error("not enough usable data: {0}")]
    InsufficientData(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

pub type Result<T> = core::result::Result<T, CalibError>;

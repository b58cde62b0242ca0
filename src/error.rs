use thiserror::Error;

use crate::options::Method;

/// ソルバー外側のレイヤー（引数解析・出力）で発生するエラー
#[derive(Debug, Error)]
pub enum Error {
    #[error("This version only works with Jacobi (requested: {0})")]
    UnsupportedMethod(Method),

    #[error("precision must be within 1e-20 .. 1e-4, got {0:e}")]
    InvalidPrecision(f64),

    #[error("iterations must be within 1 .. {max}, got {got}")]
    InvalidIterations { got: u64, max: u64 },

    #[error("cannot interpret {0:?} as precision/iteration value")]
    InvalidTermValue(String),

    #[error("Speicherprobleme! ({bytes} Bytes angefordert)")]
    Allocation { bytes: usize },

    #[error("failed to build rayon thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GreylistError {
    #[error("greylist database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("cannot prepare greylist directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

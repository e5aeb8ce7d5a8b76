use std::path::PathBuf;

/// Fatal to a bundle load. Every other failure mode in the pipeline
/// (pattern compile errors, activation eval errors, out-of-range hits) is
/// non-fatal and flows through a [`crate::sink::WarningSink`] instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read bundle file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse bundle file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

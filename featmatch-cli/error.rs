use featmatch_core::FeatureError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config file {path}: {message}")]
    Config { path: String, message: String },
}

pub type CliResult<T> = Result<T, CliError>;

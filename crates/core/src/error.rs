use autoreg_plugin::CodecError;
use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::PipelineState;

#[derive(Error, Debug)]
pub enum AutoregError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("I/O error on input {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Injection into {target} failed: {reason}")]
    Injection { target: String, reason: String },
    #[error("Invalid pipeline transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: PipelineState,
        to: PipelineState,
    },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AutoregError {
    pub fn input(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AutoregError::Input {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, AutoregError>;

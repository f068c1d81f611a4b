use std::path::PathBuf;
use thiserror::Error;
use vision_types::{ModelTask, VisionError};

#[derive(Error, Debug)]
pub enum ModelError {
    #[error(transparent)]
    Vision(#[from] VisionError),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Path {0} already exists and is not empty")]
    ArtifactExists(PathBuf),
    #[error("invalid packaged model artifact: {0}")]
    InvalidArtifact(String),
    #[error("unsupported model format version {found}, supported: {supported}")]
    UnsupportedFormatVersion { found: u32, supported: u32 },
    #[error("{0} backend is not available in this build")]
    BackendUnavailable(&'static str),
    #[error("input does not match the model signature: {0}")]
    SignatureMismatch(String),
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("unsupported task: {0}")]
    UnsupportedTask(ModelTask),
    #[error("inference failed: {0}")]
    Inference(String),
}

impl ModelError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> ModelError {
        let path = path.into();
        move |source| ModelError::Io { path, source }
    }
}

use automl_vision::ModelError;
use thiserror::Error;
use vision_types::{ModelTask, VisionError};

#[derive(Error, Debug)]
pub enum WrapError {
    #[error(transparent)]
    Vision(#[from] VisionError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("no classes given and none embedded in the packaged model")]
    MissingClasses,
    #[error("predicted label '{0}' is not in the class list")]
    UnknownLabel(String),
    #[error("task {requested} is not supported by this wrapper")]
    UnsupportedTask { requested: ModelTask },
    #[error("expected {expected} predictions, got {actual}")]
    PredictionCount { expected: usize, actual: usize },
    #[error("Parameter '{name}' must be in range [0, 1], got: {value}")]
    InvalidThreshold { name: &'static str, value: f32 },
}

impl WrapError {
    // Lookup-kind failures: classes given as a mapping, or a predicted label
    // missing from the class list.
    pub fn is_key_error(&self) -> bool {
        matches!(
            self,
            WrapError::Vision(VisionError::ClassesNotALabelList) | WrapError::UnknownLabel(_)
        )
    }
}

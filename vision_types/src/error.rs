use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("classes parameter not a list of class labels")]
    ClassesNotALabelList,
    #[error("class labels must not be empty")]
    EmptyClassLabels,
    #[error("duplicate class label: {0}")]
    DuplicateClassLabel(String),
    #[error("class label at position {0} must be a non-empty string")]
    InvalidClassLabel(usize),
    #[error("Error decoding base64 image: {0}")]
    Base64Decode(#[from] base64::DecodeError),
    #[error("Error decoding image: {0}")]
    ImageDecode(String),
    #[error("Error encoding image: {0}")]
    ImageEncode(String),
    #[error("image index {index} out of range for batch of {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("unknown model task: {0}")]
    UnknownTask(String),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

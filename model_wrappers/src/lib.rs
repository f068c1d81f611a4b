mod app;
mod drise;
mod error;
mod labels;
mod object_detection;
mod validation;
mod wrap;

#[cfg(test)]
mod test_utils;

pub mod config;

pub use app::{run, start_app, ImagePredictions};
pub use drise::{DetectionRecord, DriseModel, PackagedModelDriseWrapper, RawModelDriseWrapper};
pub use error::WrapError;
pub use labels::{label_detections, LabeledDetection};
pub use object_detection::{ObjectDetectionModel, WrappedObjectDetectionModel};
pub use validation::{
    validate_drise_model, validate_wrapped_object_detection_model, ValidationError,
};
pub use wrap::{wrap_model, wrap_model_with_classes_value};

use crate::{
    error::WrapError,
    object_detection::{ObjectDetectionModel, WrappedObjectDetectionModel},
};
use automl_vision::PackagedModel;
use std::sync::Arc;
use vision_types::{ClassLabels, ImageBatch, ModelTask, PredictionSet};

pub fn wrap_model(
    model: Arc<PackagedModel>,
    examples: &ImageBatch,
    task: ModelTask,
    classes: Option<ClassLabels>,
) -> Result<WrappedObjectDetectionModel, WrapError> {
    match task {
        ModelTask::ObjectDetection => {}
        requested => return Err(WrapError::UnsupportedTask { requested }),
    }

    let classes = match classes {
        Some(classes) => classes,
        None => model.classes().cloned().ok_or(WrapError::MissingClasses)?,
    };
    if classes.len() < model.number_of_classes() {
        tracing::warn!(
            "{} class labels given for a model predicting {} classes, detections of unlisted classes are dropped",
            classes.len(),
            model.number_of_classes()
        );
    } else if classes.len() > model.number_of_classes() {
        tracing::warn!(
            "{} class labels given for a model predicting {} classes",
            classes.len(),
            model.number_of_classes()
        );
    }

    let wrapped = WrappedObjectDetectionModel::new(model, classes, task);

    if !examples.is_empty() {
        let sample = examples.slice(0..1)?;
        let predictions = wrapped.predict(&sample)?;
        tracing::debug!(
            "Sample prediction returned {} detections",
            predictions.first().map_or(0, PredictionSet::len)
        );
    }

    Ok(wrapped)
}

pub fn wrap_model_with_classes_value(
    model: Arc<PackagedModel>,
    examples: &ImageBatch,
    task: ModelTask,
    classes: Option<&serde_json::Value>,
) -> Result<WrappedObjectDetectionModel, WrapError> {
    let classes = classes.map(ClassLabels::try_from).transpose()?;
    wrap_model(model, examples, task, classes)
}

mod patch_detector;

#[cfg(feature = "onnx")]
mod onnx;

use crate::{
    automl_model::AutoMlObjectDetectionModel,
    error::ModelError,
    settings::{InferenceSettings, ModelSettings, PostProcess},
};
use ndarray::ArrayView4;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
};
use vision_types::{ClassLabels, PredictionSet};

#[cfg(feature = "onnx")]
pub use onnx::OnnxDetector;
pub use patch_detector::PatchDetector;

pub trait ObjectDetector: Send + Sync {
    fn number_of_classes(&self) -> usize;

    // Runs detection on an `N x 3 x H x W` batch with values in `[0, 1]`.
    // Returns one prediction set per image, in the coordinates of the input.
    fn forward(
        &self,
        images: ArrayView4<f32>,
        post: &PostProcess,
    ) -> Result<Vec<PredictionSet>, ModelError>;

    fn state(&self) -> ModelState;

    fn artifact_files(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelName {
    PatchDetector,
    YoloOnnx,
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelName::PatchDetector => f.write_str("patch_detector"),
            ModelName::YoloOnnx => f.write_str("yolo_onnx"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelState {
    PatchDetector {
        weights: Vec<Vec<f32>>,
        biases: Vec<f32>,
    },
    Onnx {
        file: String,
    },
}

pub(crate) fn build_detector(
    state: &ModelState,
    number_of_classes: usize,
    inference_settings: &InferenceSettings,
    artifacts_dir: &Path,
) -> Result<Box<dyn ObjectDetector>, ModelError> {
    match state {
        ModelState::PatchDetector { weights, biases } => Ok(Box::new(
            PatchDetector::from_state(weights, biases, number_of_classes)?,
        )),
        #[cfg(feature = "onnx")]
        ModelState::Onnx { file } => Ok(Box::new(OnnxDetector::new(
            &artifacts_dir.join(file),
            number_of_classes,
            inference_settings.num_instances,
        )?)),
        #[cfg(not(feature = "onnx"))]
        ModelState::Onnx { .. } => {
            let _ = (inference_settings, artifacts_dir);
            Err(ModelError::BackendUnavailable("onnx"))
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ObjectDetectionModelFactory;

impl ObjectDetectionModelFactory {
    pub fn get_model_wrapper(
        &self,
        number_of_classes: usize,
        model_name: ModelName,
        model_settings: Option<ModelSettings>,
        classes: Option<ClassLabels>,
        seed: u64,
    ) -> Result<AutoMlObjectDetectionModel, ModelError> {
        if number_of_classes == 0 {
            return Err(ModelError::InvalidSettings(
                "number_of_classes must be positive".to_string(),
            ));
        }

        let detector: Box<dyn ObjectDetector> = match model_name {
            ModelName::PatchDetector => Box::new(PatchDetector::initialize(number_of_classes, seed)),
            ModelName::YoloOnnx => {
                return Err(ModelError::InvalidSettings(format!(
                    "{} models are built from an ONNX file, not initialised",
                    model_name
                )))
            }
        };

        AutoMlObjectDetectionModel::new(
            model_name,
            detector,
            classes,
            model_settings.unwrap_or_default(),
            InferenceSettings::default(),
        )
    }
}

use crate::{
    checkpoint::{ModelCheckpoint, ModelSpecs},
    error::ModelError,
    model::{build_detector, ModelName, ObjectDetector},
    settings::{InferenceSettings, ModelSettings, PostProcess},
    transforms::{to_tensor, InferenceTransform},
};
use image::DynamicImage;
use ndarray::Axis;
use std::{fmt, path::Path};
use vision_types::{ClassLabels, PredictionSet};

pub struct AutoMlObjectDetectionModel {
    model_name: ModelName,
    model: Box<dyn ObjectDetector>,
    number_of_classes: usize,
    classes: Option<ClassLabels>,
    model_settings: ModelSettings,
    inference_settings: InferenceSettings,
}

impl fmt::Debug for AutoMlObjectDetectionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoMlObjectDetectionModel")
            .field("model_name", &self.model_name)
            .field("number_of_classes", &self.number_of_classes)
            .field("classes", &self.classes)
            .field("model_settings", &self.model_settings)
            .field("inference_settings", &self.inference_settings)
            .finish_non_exhaustive()
    }
}

impl AutoMlObjectDetectionModel {
    pub fn new(
        model_name: ModelName,
        model: Box<dyn ObjectDetector>,
        classes: Option<ClassLabels>,
        model_settings: ModelSettings,
        inference_settings: InferenceSettings,
    ) -> Result<Self, ModelError> {
        model_settings.validate().map_err(ModelError::InvalidSettings)?;

        let number_of_classes = model.number_of_classes();
        if let Some(classes) = &classes {
            if classes.len() != number_of_classes {
                return Err(ModelError::InvalidSettings(format!(
                    "model predicts {} classes but {} class labels were given",
                    number_of_classes,
                    classes.len()
                )));
            }
        }

        Ok(Self {
            model_name,
            model,
            number_of_classes,
            classes,
            model_settings,
            inference_settings,
        })
    }

    #[cfg(feature = "onnx")]
    pub fn from_onnx_file(
        path: &Path,
        classes: ClassLabels,
        model_settings: ModelSettings,
        inference_settings: InferenceSettings,
    ) -> Result<Self, ModelError> {
        let detector = crate::model::OnnxDetector::new(
            path,
            classes.len(),
            inference_settings.num_instances,
        )?;
        Self::new(
            ModelName::YoloOnnx,
            Box::new(detector),
            Some(classes),
            model_settings,
            inference_settings,
        )
    }

    pub(crate) fn from_checkpoint(
        checkpoint: ModelCheckpoint,
        model_settings: ModelSettings,
        artifacts_dir: &Path,
    ) -> Result<Self, ModelError> {
        let ModelCheckpoint {
            model_name,
            number_of_classes,
            model_state,
            specs,
        } = checkpoint;

        let model = build_detector(
            &model_state,
            number_of_classes,
            &specs.inference_settings,
            artifacts_dir,
        )?;
        if model.number_of_classes() != number_of_classes {
            return Err(ModelError::InvalidArtifact(format!(
                "checkpoint declares {} classes but the model state has {}",
                number_of_classes,
                model.number_of_classes()
            )));
        }

        Self::new(
            model_name,
            model,
            specs.classes,
            model_settings,
            specs.inference_settings,
        )
    }

    pub fn checkpoint(&self) -> ModelCheckpoint {
        ModelCheckpoint {
            model_name: self.model_name,
            number_of_classes: self.number_of_classes,
            model_state: self.model.state(),
            specs: ModelSpecs::new(
                self.model_settings,
                self.inference_settings,
                self.classes.clone(),
            ),
        }
    }

    pub fn inner(&self) -> &dyn ObjectDetector {
        self.model.as_ref()
    }

    pub fn model_name(&self) -> ModelName {
        self.model_name
    }

    pub fn number_of_classes(&self) -> usize {
        self.number_of_classes
    }

    pub fn classes(&self) -> Option<&ClassLabels> {
        self.classes.as_ref()
    }

    pub fn model_settings(&self) -> &ModelSettings {
        &self.model_settings
    }

    pub fn inference_settings(&self) -> &InferenceSettings {
        &self.inference_settings
    }

    pub fn get_inference_transform(&self) -> InferenceTransform {
        InferenceTransform {
            min_size: self.model_settings.min_size,
            max_size: self.model_settings.max_size,
        }
    }

    pub fn detect(
        &self,
        image: &DynamicImage,
        post: &PostProcess,
    ) -> Result<PredictionSet, ModelError> {
        let tensor = to_tensor(image);
        let transformed = self.get_inference_transform().apply(tensor.view())?;
        let batch = transformed.tensor.view().insert_axis(Axis(0));

        let prediction = self
            .model
            .forward(batch, post)?
            .into_iter()
            .next()
            .unwrap_or_default();

        Ok(prediction
            .iter()
            .map(|detection| transformed.to_original(detection))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ObjectDetectionModelFactory;
    use image::{Rgb, RgbImage};
    use vision_types::create_black_image;

    fn fridge_labels() -> ClassLabels {
        ClassLabels::new(["can", "carton", "milk_bottle", "water_bottle"]).unwrap()
    }

    #[test]
    fn test_class_count_must_match() {
        let result = ObjectDetectionModelFactory.get_model_wrapper(
            3,
            ModelName::PatchDetector,
            None,
            Some(fridge_labels()),
            0,
        );
        assert!(matches!(result, Err(ModelError::InvalidSettings(_))));
    }

    #[test]
    fn test_detect_maps_back_to_image_coordinates() {
        let settings = ModelSettings {
            min_size: 32,
            box_score_thresh: 0.,
            ..Default::default()
        };
        let model = ObjectDetectionModelFactory
            .get_model_wrapper(
                4,
                ModelName::PatchDetector,
                Some(settings),
                Some(fridge_labels()),
                5,
            )
            .unwrap();

        let image = DynamicImage::ImageRgb8(RgbImage::from_fn(120, 80, |x, y| {
            if x > 40 && x < 90 && y > 20 && y < 60 {
                Rgb([220, 30, 30])
            } else {
                Rgb([90, 90, 90])
            }
        }));
        let prediction = model.detect(&image, &settings.post_process()).unwrap();
        assert!(!prediction.is_empty());
        for detection in prediction.iter() {
            assert!(detection.x2 <= 120. && detection.y2 <= 80.);
            assert!(detection.x1 >= 0. && detection.y1 >= 0.);
        }
    }

    #[test]
    fn test_black_image_with_strict_thresholds() {
        let settings = ModelSettings {
            min_size: 10,
            box_score_thresh: 0.9,
            nms_iou_thresh: 0.9,
            ..Default::default()
        };
        let model = ObjectDetectionModelFactory
            .get_model_wrapper(4, ModelName::PatchDetector, Some(settings), None, 1)
            .unwrap();
        let prediction = model
            .detect(&create_black_image(640, 480), &settings.post_process())
            .unwrap();
        assert!(prediction.is_empty());
    }

    #[test]
    fn test_checkpoint_keeps_specs() {
        let model = ObjectDetectionModelFactory
            .get_model_wrapper(
                4,
                ModelName::PatchDetector,
                None,
                Some(fridge_labels()),
                9,
            )
            .unwrap();
        let checkpoint = model.checkpoint();
        assert_eq!(checkpoint.number_of_classes, 4);
        assert_eq!(checkpoint.specs.classes, Some(fridge_labels()));
        assert_eq!(checkpoint.specs.model_specs.model_settings, ModelSettings::default());
    }
}

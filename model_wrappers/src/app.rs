use crate::{
    config::Config,
    labels::{label_detections, LabeledDetection},
    object_detection::ObjectDetectionModel,
    wrap::wrap_model,
};
use anyhow::Context;
use automl_vision::PackagedModel;
use serde::Serialize;
use std::sync::Arc;
use vision_types::{ImageBatch, ModelTask};

#[derive(Debug, Clone, Serialize)]
pub struct ImagePredictions {
    pub file: String,
    pub detections: Vec<LabeledDetection>,
}

pub fn run(config: &Config) -> anyhow::Result<Vec<ImagePredictions>> {
    let model = PackagedModel::load(&config.model.path)
        .with_context(|| format!("Failed to load model from {:?}", config.model.path))?;

    let paths = config.images.get_paths();
    let batch = ImageBatch::load_base64_images(&paths, true).context("Failed to read images")?;

    let mut wrapped = wrap_model(
        Arc::new(model),
        &batch,
        ModelTask::ObjectDetection,
        config.model.classes.clone(),
    )?;
    if let Some(iou_threshold) = config.scoring.iou_threshold {
        wrapped = wrapped.with_iou_threshold(iou_threshold)?;
    }
    if let Some(score_threshold) = config.scoring.score_threshold {
        wrapped = wrapped.with_score_threshold(score_threshold)?;
    }

    let predictions = wrapped.predict(&batch)?;

    Ok(config
        .images
        .files
        .iter()
        .zip(&predictions)
        .map(|(file, prediction)| {
            let detections = label_detections(prediction, wrapped.classes());
            for detection in &detections {
                tracing::info!(
                    "{}: {} ({:.2}) at [{:.1}, {:.1}, {:.1}, {:.1}]",
                    file,
                    detection.class_label,
                    detection.confidence,
                    detection.x1,
                    detection.y1,
                    detection.x2,
                    detection.y2
                );
            }
            ImagePredictions {
                file: file.clone(),
                detections,
            }
        })
        .collect())
}

pub fn start_app(config: Config) -> anyhow::Result<()> {
    let predictions = match run(&config) {
        Ok(predictions) => predictions,
        Err(e) => {
            tracing::error!("Prediction failed: {:?}", e);
            return Err(e);
        }
    };

    println!("{}", serde_json::to_string_pretty(&predictions)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{ImagesConfig, LogLevel, ModelConfig, ScoringConfig},
        test_utils::{fridge_images, fridge_labels, small_settings},
    };
    use automl_vision::{
        model::{ModelName, ObjectDetectionModelFactory},
        ModelPackager, SettingsOverrides,
    };
    use std::path::Path;

    fn write_fixture(root: &Path) -> Config {
        let model = ObjectDetectionModelFactory
            .get_model_wrapper(
                4,
                ModelName::PatchDetector,
                Some(small_settings()),
                Some(fridge_labels()),
                42,
            )
            .unwrap();
        let model_dir = root.join("model");
        ModelPackager::default()
            .save(&model, &model_dir, &SettingsOverrides::default())
            .unwrap();

        let image_dir = root.join("images");
        std::fs::create_dir(&image_dir).unwrap();
        let mut files = Vec::new();
        for (index, image) in fridge_images().iter().enumerate() {
            let file = format!("shelf_{}.png", index);
            image.save(image_dir.join(&file)).unwrap();
            files.push(file);
        }

        Config {
            log_level: LogLevel::Info,
            model: ModelConfig {
                path: model_dir,
                classes: None,
            },
            scoring: ScoringConfig {
                iou_threshold: Some(0.5),
                score_threshold: Some(0.),
            },
            images: ImagesConfig {
                dir: image_dir,
                files,
            },
        }
    }

    #[test]
    fn test_run() {
        let tmp = tempfile::tempdir().unwrap();
        let config = write_fixture(tmp.path());
        config.model.validate().unwrap();

        let predictions = run(&config).unwrap();
        assert_eq!(predictions.len(), 3);
        assert_eq!(predictions[2].file, "shelf_2.png");

        let labels = fridge_labels();
        assert!(predictions
            .iter()
            .flat_map(|image| &image.detections)
            .all(|detection| labels.index_of(&detection.class_label).is_some()));
        assert!(predictions.iter().any(|image| !image.detections.is_empty()));
    }

    #[test]
    fn test_run_rejects_bad_threshold() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = write_fixture(tmp.path());
        config.scoring.score_threshold = Some(2.);
        assert!(run(&config).is_err());
    }

    #[test]
    fn test_run_missing_image() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = write_fixture(tmp.path());
        config.images.files.push("missing.png".to_string());
        assert!(run(&config).is_err());
    }
}

use crate::error::WrapError;
use automl_vision::{PackagedModel, ScoredImage, ScoringParams};
use ndarray::Array2;
use std::{collections::HashMap, sync::Arc};
use vision_types::{ClassLabels, Detection, ImageBatch, ModelTask, PredictionSet};

pub trait ObjectDetectionModel {
    fn predict(&self, batch: &ImageBatch) -> Result<Vec<PredictionSet>, WrapError>;

    fn predict_proba(&self, batch: &ImageBatch) -> Result<Vec<Array2<f32>>, WrapError> {
        let number_of_classes = self.classes().len();
        Ok(self
            .predict(batch)?
            .iter()
            .map(|prediction| class_score_matrix(prediction, number_of_classes))
            .collect())
    }

    fn classes(&self) -> &ClassLabels;
}

pub(crate) fn class_score_matrix(prediction: &PredictionSet, number_of_classes: usize) -> Array2<f32> {
    let mut scores = Array2::zeros((prediction.len(), number_of_classes));
    for (row, detection) in prediction.iter().enumerate() {
        if let Some(cell) = scores.get_mut((row, detection.class_id as usize)) {
            *cell = detection.confidence;
        }
    }
    scores
}

/// A packaged model adapted to [`ObjectDetectionModel`].
///
/// Packaged labels are resolved once, when the wrapper is built: by name in
/// the resolved class list, otherwise by the model's own class position.
/// Detections whose position falls outside the class list are dropped.
#[derive(Debug, Clone)]
pub struct WrappedObjectDetectionModel {
    model: Arc<PackagedModel>,
    classes: ClassLabels,
    class_ids: HashMap<String, Option<u32>>,
    task: ModelTask,
    params: ScoringParams,
}

impl WrappedObjectDetectionModel {
    pub(crate) fn new(model: Arc<PackagedModel>, classes: ClassLabels, task: ModelTask) -> Self {
        let class_ids = resolve_class_ids(&model, &classes);
        Self {
            model,
            classes,
            class_ids,
            task,
            params: ScoringParams::default(),
        }
    }

    pub fn with_thresholds(self, iou_threshold: f32, score_threshold: f32) -> Result<Self, WrapError> {
        self.with_iou_threshold(iou_threshold)?
            .with_score_threshold(score_threshold)
    }

    pub fn with_iou_threshold(mut self, iou_threshold: f32) -> Result<Self, WrapError> {
        self.params.box_iou_thresh = Some(check_threshold("iou_threshold", iou_threshold)?);
        Ok(self)
    }

    pub fn with_score_threshold(mut self, score_threshold: f32) -> Result<Self, WrapError> {
        self.params.box_score_thresh = Some(check_threshold("score_threshold", score_threshold)?);
        Ok(self)
    }

    pub fn task(&self) -> ModelTask {
        self.task
    }

    pub fn model(&self) -> &Arc<PackagedModel> {
        &self.model
    }

    pub fn scoring_params(&self) -> &ScoringParams {
        &self.params
    }

    fn to_prediction_set(
        &self,
        scored: &ScoredImage,
        (width, height): (u32, u32),
    ) -> Result<PredictionSet, WrapError> {
        let (width, height) = (width as f32, height as f32);
        let mut detections = Vec::with_capacity(scored.boxes.len());
        for scored_box in &scored.boxes {
            let class_id = match self.class_ids.get(&scored_box.label) {
                Some(Some(class_id)) => *class_id,
                Some(None) => continue,
                None => return Err(WrapError::UnknownLabel(scored_box.label.clone())),
            };
            detections.push(Detection {
                class_id,
                confidence: scored_box.score.clamp(0., 1.),
                x1: scored_box.bbox.top_x * width,
                y1: scored_box.bbox.top_y * height,
                x2: scored_box.bbox.bottom_x * width,
                y2: scored_box.bbox.bottom_y * height,
            });
        }
        Ok(PredictionSet::new(detections))
    }
}

fn resolve_class_ids(model: &PackagedModel, classes: &ClassLabels) -> HashMap<String, Option<u32>> {
    (0..model.number_of_classes())
        .map(|position| {
            // models packaged without class names label boxes with their class id
            let label = model
                .classes()
                .and_then(|embedded| embedded.get(position))
                .map(str::to_string)
                .unwrap_or_else(|| position.to_string());
            let class_id = classes
                .index_of(&label)
                .or_else(|| (position < classes.len()).then_some(position))
                .map(|id| id as u32);
            (label, class_id)
        })
        .collect()
}

fn check_threshold(name: &'static str, value: f32) -> Result<f32, WrapError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(WrapError::InvalidThreshold { name, value });
    }
    Ok(value)
}

impl ObjectDetectionModel for WrappedObjectDetectionModel {
    fn predict(&self, batch: &ImageBatch) -> Result<Vec<PredictionSet>, WrapError> {
        let scored = self.model.predict(batch, &self.params)?;
        if scored.len() != batch.len() {
            return Err(WrapError::PredictionCount {
                expected: batch.len(),
                actual: scored.len(),
            });
        }

        let predictions = scored
            .iter()
            .enumerate()
            .map(|(index, image)| self.to_prediction_set(image, batch.image_size(index)?))
            .collect::<Result<Vec<_>, WrapError>>()?;

        tracing::debug!(
            "Returning {} detections for {} images",
            predictions.iter().map(PredictionSet::len).sum::<usize>(),
            predictions.len()
        );
        Ok(predictions)
    }

    fn classes(&self) -> &ClassLabels {
        &self.classes
    }
}

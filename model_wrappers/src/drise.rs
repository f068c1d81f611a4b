use crate::{
    error::WrapError,
    object_detection::{class_score_matrix, ObjectDetectionModel, WrappedObjectDetectionModel},
};
use automl_vision::{
    model::ObjectDetector,
    transforms::{tensor_to_image, InferenceTransform},
    PackagedModel, PostProcess,
};
use ndarray::{Array1, Array2, ArrayView4, Axis};
use std::sync::Arc;
use vision_types::{ClassLabels, ImageBatch, ModelTask, PredictionSet};

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRecord {
    // `N x 4` rows of `[x1, y1, x2, y2]` in input pixels.
    pub bounding_boxes: Array2<f32>,
    pub objectness_scores: Array1<f32>,
    // `N x C`, the detection score in the column of its class.
    pub class_scores: Array2<f32>,
}

impl DetectionRecord {
    pub fn from_predictions(prediction: &PredictionSet, number_of_classes: usize) -> Self {
        let detections = &prediction.detections;
        let bounding_boxes = Array2::from_shape_fn((detections.len(), 4), |(row, col)| {
            let detection = &detections[row];
            match col {
                0 => detection.x1,
                1 => detection.y1,
                2 => detection.x2,
                _ => detection.y2,
            }
        });

        Self {
            bounding_boxes,
            // the detectors have no separate objectness head
            objectness_scores: Array1::ones(detections.len()),
            class_scores: class_score_matrix(prediction, number_of_classes),
        }
    }

    pub fn len(&self) -> usize {
        self.bounding_boxes.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait DriseModel {
    fn predict(&self, images: ArrayView4<f32>) -> Result<Vec<DetectionRecord>, WrapError>;

    fn number_of_classes(&self) -> usize;

    fn has_predict_proba(&self) -> bool {
        false
    }
}

pub struct RawModelDriseWrapper<'a> {
    model: &'a dyn ObjectDetector,
    number_of_classes: usize,
    transform: InferenceTransform,
    iou_threshold: f32,
    score_threshold: f32,
}

impl<'a> RawModelDriseWrapper<'a> {
    pub fn new(
        model: &'a dyn ObjectDetector,
        number_of_classes: usize,
        transform: InferenceTransform,
        iou_threshold: f32,
        score_threshold: f32,
    ) -> Result<Self, WrapError> {
        for (name, value) in [
            ("iou_threshold", iou_threshold),
            ("score_threshold", score_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(WrapError::InvalidThreshold { name, value });
            }
        }

        Ok(Self {
            model,
            number_of_classes,
            transform,
            iou_threshold,
            score_threshold,
        })
    }

    fn post_process(&self) -> PostProcess {
        PostProcess {
            box_score_thresh: self.score_threshold,
            nms_iou_thresh: self.iou_threshold,
            ..PostProcess::default()
        }
    }
}

impl DriseModel for RawModelDriseWrapper<'_> {
    fn predict(&self, images: ArrayView4<f32>) -> Result<Vec<DetectionRecord>, WrapError> {
        let post = self.post_process();

        images
            .axis_iter(Axis(0))
            .map(|image| -> Result<DetectionRecord, WrapError> {
                let transformed = self.transform.apply(image)?;
                let batch = transformed.tensor.view().insert_axis(Axis(0));
                let prediction = self
                    .model
                    .forward(batch, &post)?
                    .into_iter()
                    .next()
                    .unwrap_or_default();

                let prediction: PredictionSet = prediction
                    .iter()
                    .filter(|detection| (detection.class_id as usize) < self.number_of_classes)
                    .filter(|detection| detection.confidence >= self.score_threshold)
                    .map(|detection| transformed.to_original(detection))
                    .collect();

                Ok(DetectionRecord::from_predictions(
                    &prediction,
                    self.number_of_classes,
                ))
            })
            .collect()
    }

    fn number_of_classes(&self) -> usize {
        self.number_of_classes
    }
}

#[derive(Debug, Clone)]
pub struct PackagedModelDriseWrapper {
    wrapped: WrappedObjectDetectionModel,
}

impl PackagedModelDriseWrapper {
    pub fn new(model: Arc<PackagedModel>, classes: ClassLabels) -> Self {
        Self {
            wrapped: WrappedObjectDetectionModel::new(model, classes, ModelTask::ObjectDetection),
        }
    }

    pub fn classes(&self) -> &ClassLabels {
        self.wrapped.classes()
    }

    pub fn predict_proba(&self, images: ArrayView4<f32>) -> Result<Vec<Array2<f32>>, WrapError> {
        let batch = to_image_batch(images)?;
        self.wrapped.predict_proba(&batch)
    }
}

fn to_image_batch(images: ArrayView4<f32>) -> Result<ImageBatch, WrapError> {
    let decoded = images
        .axis_iter(Axis(0))
        .map(tensor_to_image)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ImageBatch::from_images(&decoded, true)?)
}

impl DriseModel for PackagedModelDriseWrapper {
    fn predict(&self, images: ArrayView4<f32>) -> Result<Vec<DetectionRecord>, WrapError> {
        let batch = to_image_batch(images)?;
        let number_of_classes = self.number_of_classes();
        Ok(self
            .wrapped
            .predict(&batch)?
            .iter()
            .map(|prediction| DetectionRecord::from_predictions(prediction, number_of_classes))
            .collect())
    }

    fn number_of_classes(&self) -> usize {
        self.wrapped.classes().len()
    }

    fn has_predict_proba(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_utils::{fridge_images, fridge_labels, load_packaged_model},
        validation::validate_drise_model,
    };
    use automl_vision::transforms::to_tensor;
    use ndarray::{stack, Array4};
    use vision_types::Detection;

    fn tiled_image() -> Array4<f32> {
        let tensor = to_tensor(&fridge_images()[0]);
        stack(Axis(0), &[tensor.view(), tensor.view()]).unwrap()
    }

    #[test]
    fn test_drise_wrappers() {
        let model = load_packaged_model(Some(fridge_labels()), None);
        let raw_model = model.raw_model();
        let images = tiled_image();

        let raw_wrapper = RawModelDriseWrapper::new(
            raw_model.inner(),
            raw_model.number_of_classes(),
            raw_model.get_inference_transform(),
            0.25,
            0.5,
        )
        .unwrap();
        validate_drise_model(&raw_wrapper, images.view(), false).unwrap();
        let raw_records = raw_wrapper.predict(images.view()).unwrap();

        let packaged_wrapper = PackagedModelDriseWrapper::new(model.clone(), fridge_labels());
        validate_drise_model(&packaged_wrapper, images.view(), true).unwrap();
        let packaged_records = packaged_wrapper.predict(images.view()).unwrap();

        assert_eq!(raw_records.len(), 2);
        assert_eq!(raw_records.len(), packaged_records.len());
        for (raw, packaged) in raw_records.iter().zip(&packaged_records) {
            assert_eq!(raw.class_scores.ncols(), 4);
            assert_eq!(raw.class_scores.ncols(), packaged.class_scores.ncols());
        }
        // identical tiles give identical records
        assert_eq!(raw_records[0], raw_records[1]);
    }

    #[test]
    fn test_raw_wrapper_respects_score_threshold() {
        let model = load_packaged_model(Some(fridge_labels()), None);
        let raw_model = model.raw_model();
        let images = tiled_image();

        let wrapper = RawModelDriseWrapper::new(
            raw_model.inner(),
            4,
            raw_model.get_inference_transform(),
            0.5,
            0.3,
        )
        .unwrap();
        let (_, _, height, width) = images.dim();
        for record in wrapper.predict(images.view()).unwrap() {
            assert_eq!(record.objectness_scores.len(), record.len());
            for row in record.class_scores.rows() {
                let score = row.iter().cloned().fold(0., f32::max);
                assert!(score >= 0.3);
            }
            for bbox in record.bounding_boxes.rows() {
                assert!(bbox[0] >= 0. && bbox[2] <= width as f32);
                assert!(bbox[1] >= 0. && bbox[3] <= height as f32);
            }
        }
    }

    #[test]
    fn test_raw_wrapper_rejects_thresholds() {
        let model = load_packaged_model(Some(fridge_labels()), None);
        let raw_model = model.raw_model();
        let result = RawModelDriseWrapper::new(
            raw_model.inner(),
            4,
            raw_model.get_inference_transform(),
            1.25,
            0.5,
        );
        assert!(matches!(
            result,
            Err(WrapError::InvalidThreshold {
                name: "iou_threshold",
                ..
            })
        ));
    }

    #[test]
    fn test_packaged_wrapper_predict_proba() {
        let model = load_packaged_model(Some(fridge_labels()), None);
        let wrapper = PackagedModelDriseWrapper::new(model, fridge_labels());
        let images = tiled_image();

        let records = wrapper.predict(images.view()).unwrap();
        let probas = wrapper.predict_proba(images.view()).unwrap();
        assert_eq!(probas.len(), records.len());
        for (proba, record) in probas.iter().zip(&records) {
            assert_eq!(proba, &record.class_scores);
        }
    }

    #[test]
    fn test_detection_record_layout() {
        let prediction = PredictionSet::new(vec![
            Detection {
                class_id: 2,
                confidence: 0.75,
                x1: 1.,
                y1: 2.,
                x2: 3.,
                y2: 4.,
            },
            Detection {
                class_id: 0,
                confidence: 0.5,
                x1: 5.,
                y1: 6.,
                x2: 7.,
                y2: 8.,
            },
        ]);
        let record = DetectionRecord::from_predictions(&prediction, 3);

        assert_eq!(record.len(), 2);
        assert_eq!(record.bounding_boxes.row(1).to_vec(), vec![5., 6., 7., 8.]);
        assert_eq!(record.objectness_scores.to_vec(), vec![1., 1.]);
        assert_eq!(record.class_scores.row(0).to_vec(), vec![0., 0., 0.75]);
        assert_eq!(record.class_scores.row(1).to_vec(), vec![0.5, 0., 0.]);

        let empty = DetectionRecord::from_predictions(&PredictionSet::default(), 3);
        assert!(empty.is_empty());
        assert_eq!(empty.class_scores.dim(), (0, 3));
    }
}

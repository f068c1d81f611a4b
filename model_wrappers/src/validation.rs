use crate::{
    drise::{DetectionRecord, DriseModel},
    error::WrapError,
    object_detection::ObjectDetectionModel,
};
use ndarray::ArrayView4;
use thiserror::Error;
use vision_types::{ImageBatch, PredictionSet};

// pixel slack for boxes rescaled back onto the input image
const BOX_TOLERANCE: f32 = 1e-3;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error(transparent)]
    Wrap(#[from] WrapError),
    #[error("expected {expected} predictions, got {actual}")]
    PredictionCount { expected: usize, actual: usize },
    #[error("image {image}: class id {class_id} outside the {number_of_classes} known classes")]
    ClassOutOfRange {
        image: usize,
        class_id: u32,
        number_of_classes: usize,
    },
    #[error("image {image}: score {score} outside [0, 1]")]
    ScoreOutOfRange { image: usize, score: f32 },
    #[error("image {image}: box {bbox:?} does not fit a {width}x{height} image")]
    BoxOutOfBounds {
        image: usize,
        bbox: [f32; 4],
        width: u32,
        height: u32,
    },
    #[error("image {image}: {what} has shape {actual:?}, expected {expected:?}")]
    Shape {
        image: usize,
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("has_predict_proba is {actual}, expected {expected}")]
    PredictProba { expected: bool, actual: bool },
}

pub fn validate_wrapped_object_detection_model(
    model: &impl ObjectDetectionModel,
    data: &ImageBatch,
    expected_len: usize,
) -> Result<(), ValidationError> {
    let predictions = model.predict(data)?;
    if predictions.len() != expected_len {
        return Err(ValidationError::PredictionCount {
            expected: expected_len,
            actual: predictions.len(),
        });
    }

    let number_of_classes = model.classes().len();
    for (image, prediction) in predictions.iter().enumerate() {
        let (width, height) = data.image_size(image).map_err(WrapError::from)?;
        check_prediction(image, prediction, number_of_classes, width, height)?;
    }

    let probas = model.predict_proba(data)?;
    if probas.len() != predictions.len() {
        return Err(ValidationError::PredictionCount {
            expected: predictions.len(),
            actual: probas.len(),
        });
    }
    for (image, (proba, prediction)) in probas.iter().zip(&predictions).enumerate() {
        let expected = (prediction.len(), number_of_classes);
        if proba.dim() != expected {
            return Err(ValidationError::Shape {
                image,
                what: "predict_proba",
                expected,
                actual: proba.dim(),
            });
        }
    }

    Ok(())
}

fn check_prediction(
    image: usize,
    prediction: &PredictionSet,
    number_of_classes: usize,
    width: u32,
    height: u32,
) -> Result<(), ValidationError> {
    for detection in prediction.iter() {
        if detection.class_id as usize >= number_of_classes {
            return Err(ValidationError::ClassOutOfRange {
                image,
                class_id: detection.class_id,
                number_of_classes,
            });
        }
        if !(0.0..=1.0).contains(&detection.confidence) {
            return Err(ValidationError::ScoreOutOfRange {
                image,
                score: detection.confidence,
            });
        }
        check_box(
            image,
            [detection.x1, detection.y1, detection.x2, detection.y2],
            width,
            height,
        )?;
    }
    Ok(())
}

fn check_box(image: usize, bbox: [f32; 4], width: u32, height: u32) -> Result<(), ValidationError> {
    let [x1, y1, x2, y2] = bbox;
    let fits = x1 >= -BOX_TOLERANCE
        && y1 >= -BOX_TOLERANCE
        && x2 <= width as f32 + BOX_TOLERANCE
        && y2 <= height as f32 + BOX_TOLERANCE
        && x1 <= x2
        && y1 <= y2;
    if !fits {
        return Err(ValidationError::BoxOutOfBounds {
            image,
            bbox,
            width,
            height,
        });
    }
    Ok(())
}

pub fn validate_drise_model(
    model: &impl DriseModel,
    images: ArrayView4<f32>,
    has_predict_proba: bool,
) -> Result<(), ValidationError> {
    if model.has_predict_proba() != has_predict_proba {
        return Err(ValidationError::PredictProba {
            expected: has_predict_proba,
            actual: model.has_predict_proba(),
        });
    }

    let (batch_size, _, height, width) = images.dim();
    let records = model.predict(images)?;
    if records.len() != batch_size {
        return Err(ValidationError::PredictionCount {
            expected: batch_size,
            actual: records.len(),
        });
    }

    let number_of_classes = model.number_of_classes();
    for (image, record) in records.iter().enumerate() {
        check_record(image, record, number_of_classes, width as u32, height as u32)?;
    }
    Ok(())
}

fn check_record(
    image: usize,
    record: &DetectionRecord,
    number_of_classes: usize,
    width: u32,
    height: u32,
) -> Result<(), ValidationError> {
    let rows = record.len();
    let shapes = [
        ("bounding_boxes", (rows, 4), record.bounding_boxes.dim()),
        ("objectness_scores", (rows, 1), (record.objectness_scores.len(), 1)),
        (
            "class_scores",
            (rows, number_of_classes),
            record.class_scores.dim(),
        ),
    ];
    for (what, expected, actual) in shapes {
        if expected != actual {
            return Err(ValidationError::Shape {
                image,
                what,
                expected,
                actual,
            });
        }
    }

    if let Some(score) = record
        .class_scores
        .iter()
        .chain(record.objectness_scores.iter())
        .find(|score| !(0.0..=1.0).contains(*score))
    {
        return Err(ValidationError::ScoreOutOfRange {
            image,
            score: *score,
        });
    }

    for bbox in record.bounding_boxes.rows() {
        check_box(image, [bbox[0], bbox[1], bbox[2], bbox[3]], width, height)?;
    }
    Ok(())
}

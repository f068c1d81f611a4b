use serde::Serialize;
use vision_types::{ClassLabels, PredictionSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledDetection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub class_label: String,
    pub confidence: f32,
}

pub fn label_detections(prediction: &PredictionSet, classes: &ClassLabels) -> Vec<LabeledDetection> {
    prediction
        .iter()
        .map(|detection| {
            let class_label = match classes.get(detection.class_id as usize) {
                Some(label) => label.to_string(),
                None => format!("Unknown class {}", detection.class_id),
            };
            LabeledDetection {
                x1: detection.x1,
                y1: detection.y1,
                x2: detection.x2,
                y2: detection.y2,
                class_label,
                confidence: detection.confidence,
            }
        })
        .collect()
}

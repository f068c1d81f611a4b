use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use vision_types::{ImageBatch, ModelTask, IMAGE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    String,
    Double,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: ColumnType,
}

impl ColumnSpec {
    fn new(name: &str, data_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSignature {
    pub inputs: Vec<ColumnSpec>,
    pub outputs: Vec<ColumnSpec>,
    #[serde(default)]
    pub params: Vec<ColumnSpec>,
}

impl ModelSignature {
    pub fn for_task(task: ModelTask) -> Result<Self, ModelError> {
        match task {
            ModelTask::ObjectDetection => Ok(Self {
                inputs: vec![ColumnSpec::new(IMAGE, ColumnType::String)],
                outputs: vec![
                    ColumnSpec::new("filename", ColumnType::String),
                    ColumnSpec::new("boxes", ColumnType::String),
                ],
                params: vec![
                    ColumnSpec::new("box_score_thresh", ColumnType::Double),
                    ColumnSpec::new("box_iou_thresh", ColumnType::Double),
                ],
            }),
            other => Err(ModelError::UnsupportedTask(other)),
        }
    }

    pub fn validate_input(&self, batch: &ImageBatch) -> Result<(), ModelError> {
        for column in &self.inputs {
            match (column.name.as_str(), column.data_type) {
                (IMAGE, ColumnType::String) => {
                    if let Some(index) = batch.iter().position(|record| record.image.is_empty()) {
                        return Err(ModelError::SignatureMismatch(format!(
                            "row {} has an empty '{}' value",
                            index, IMAGE
                        )));
                    }
                }
                (name, data_type) => {
                    return Err(ModelError::SignatureMismatch(format!(
                        "required input column '{}' of type {:?} is not provided",
                        name, data_type
                    )))
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vision_types::ImageRecord;

    #[test]
    fn test_object_detection_signature() {
        let signature = ModelSignature::for_task(ModelTask::ObjectDetection).unwrap();
        assert_eq!(signature.inputs.len(), 1);
        assert_eq!(signature.inputs[0].name, "image");
        let batch = ImageBatch::new(vec![ImageRecord::new("aGVsbG8=".to_string())]);
        assert!(signature.validate_input(&batch).is_ok());
        assert!(signature.validate_input(&ImageBatch::default()).is_ok());
    }

    #[test]
    fn test_empty_image_is_rejected() {
        let signature = ModelSignature::for_task(ModelTask::ObjectDetection).unwrap();
        let batch = ImageBatch::new(vec![
            ImageRecord::new("aGVsbG8=".to_string()),
            ImageRecord::new(String::new()),
        ]);
        assert!(matches!(
            signature.validate_input(&batch),
            Err(ModelError::SignatureMismatch(message)) if message.contains("row 1")
        ));
    }

    #[test]
    fn test_unknown_input_column() {
        let mut signature = ModelSignature::for_task(ModelTask::ObjectDetection).unwrap();
        signature.inputs.push(ColumnSpec::new("mask", ColumnType::String));
        let batch = ImageBatch::new(vec![ImageRecord::new("aGVsbG8=".to_string())]);
        assert!(signature.validate_input(&batch).is_err());
    }
}

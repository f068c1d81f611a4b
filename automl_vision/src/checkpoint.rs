use crate::{
    model::{ModelName, ModelState},
    settings::{InferenceSettings, ModelSettings},
};
use serde::{Deserialize, Serialize};
use vision_types::ClassLabels;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCheckpoint {
    pub model_name: ModelName,
    pub number_of_classes: usize,
    pub model_state: ModelState,
    pub specs: ModelSpecs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpecs {
    pub model_settings: ModelSettings,
    pub inference_settings: InferenceSettings,
    #[serde(default)]
    pub classes: Option<ClassLabels>,
    pub model_specs: NestedModelSpecs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedModelSpecs {
    pub model_settings: ModelSettings,
    pub inference_settings: InferenceSettings,
}

impl ModelSpecs {
    pub fn new(
        model_settings: ModelSettings,
        inference_settings: InferenceSettings,
        classes: Option<ClassLabels>,
    ) -> Self {
        Self {
            model_settings,
            inference_settings,
            classes,
            model_specs: NestedModelSpecs {
                model_settings,
                inference_settings,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checkpoint_layout() {
        let checkpoint = ModelCheckpoint {
            model_name: ModelName::PatchDetector,
            number_of_classes: 1,
            model_state: ModelState::PatchDetector {
                weights: vec![vec![0.; 6]],
                biases: vec![-1.],
            },
            specs: ModelSpecs::new(
                ModelSettings::default(),
                InferenceSettings { num_instances: 1 },
                Some(ClassLabels::new(["can"]).unwrap()),
            ),
        };

        let value = serde_json::to_value(&checkpoint).unwrap();
        assert_eq!(value["model_name"], json!("patch_detector"));
        assert_eq!(value["number_of_classes"], json!(1));
        assert_eq!(value["model_state"]["kind"], json!("patch_detector"));
        assert_eq!(value["specs"]["classes"], json!(["can"]));
        assert_eq!(
            value["specs"]["model_specs"]["inference_settings"],
            json!({"num_instances": 1})
        );

        let restored: ModelCheckpoint = serde_json::from_value(value).unwrap();
        assert_eq!(restored, checkpoint);
    }
}

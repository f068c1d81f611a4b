use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_min_size")]
    pub min_size: u32,
    #[serde(default = "default_max_size")]
    pub max_size: u32,
    #[serde(default = "default_box_score_thresh")]
    pub box_score_thresh: f32,
    #[serde(default = "default_nms_iou_thresh")]
    pub nms_iou_thresh: f32,
    #[serde(default = "default_box_detections_per_img")]
    pub box_detections_per_img: usize,
}

fn default_min_size() -> u32 {
    600
}

fn default_max_size() -> u32 {
    1333
}

fn default_box_score_thresh() -> f32 {
    0.3
}

fn default_nms_iou_thresh() -> f32 {
    0.5
}

fn default_box_detections_per_img() -> usize {
    100
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            min_size: default_min_size(),
            max_size: default_max_size(),
            box_score_thresh: default_box_score_thresh(),
            nms_iou_thresh: default_nms_iou_thresh(),
            box_detections_per_img: default_box_detections_per_img(),
        }
    }
}

impl ModelSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_size == 0 {
            return Err("min_size must be positive".to_string());
        }
        if self.max_size < self.min_size {
            return Err(format!(
                "max_size ({}) must not be smaller than min_size ({})",
                self.max_size, self.min_size
            ));
        }
        validate_unit_interval(self.box_score_thresh, "box_score_thresh")?;
        validate_unit_interval(self.nms_iou_thresh, "nms_iou_thresh")?;
        if self.box_detections_per_img == 0 {
            return Err("box_detections_per_img must be positive".to_string());
        }
        Ok(())
    }

    pub fn post_process(&self) -> PostProcess {
        PostProcess {
            box_score_thresh: self.box_score_thresh,
            nms_iou_thresh: self.nms_iou_thresh,
            box_detections_per_img: self.box_detections_per_img,
        }
    }
}

pub(crate) fn validate_unit_interval(value: f32, name: &str) -> Result<(), String> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(format!("Parameter '{}' must be in range [0, 1], got: {}", name, value));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InferenceSettings {
    #[serde(default = "default_model_instances")]
    pub num_instances: usize,
}

fn default_model_instances() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(5)
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            num_instances: default_model_instances(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_score_thresh: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nms_iou_thresh: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_detections_per_img: Option<usize>,
}

impl SettingsOverrides {
    pub fn apply(&self, settings: &ModelSettings) -> ModelSettings {
        ModelSettings {
            min_size: self.min_size.unwrap_or(settings.min_size),
            max_size: self.max_size.unwrap_or(settings.max_size),
            box_score_thresh: self.box_score_thresh.unwrap_or(settings.box_score_thresh),
            nms_iou_thresh: self.nms_iou_thresh.unwrap_or(settings.nms_iou_thresh),
            box_detections_per_img: self
                .box_detections_per_img
                .unwrap_or(settings.box_detections_per_img),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostProcess {
    pub box_score_thresh: f32,
    pub nms_iou_thresh: f32,
    pub box_detections_per_img: usize,
}

impl Default for PostProcess {
    fn default() -> Self {
        ModelSettings::default().post_process()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_settings_take_defaults() {
        let settings: ModelSettings = serde_json::from_value(json!({
            "min_size": 10,
            "box_score_thresh": 0.9,
            "nms_iou_thresh": 0.9
        }))
        .unwrap();
        assert_eq!(settings.min_size, 10);
        assert_eq!(settings.max_size, 1333);
        assert_eq!(settings.box_score_thresh, 0.9);
        assert_eq!(settings.box_detections_per_img, 100);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let mut settings = ModelSettings::default();
        settings.box_score_thresh = 1.5;
        assert!(settings.validate().is_err());

        let mut settings = ModelSettings::default();
        settings.max_size = 10;
        assert!(settings.validate().is_err());

        let mut settings = ModelSettings::default();
        settings.nms_iou_thresh = f32::NAN;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let overrides: SettingsOverrides = serde_json::from_value(json!({})).unwrap();
        assert_eq!(overrides.apply(&ModelSettings::default()), ModelSettings::default());

        let overrides = SettingsOverrides {
            box_score_thresh: Some(0.75),
            ..Default::default()
        };
        let settings = overrides.apply(&ModelSettings::default());
        assert_eq!(settings.box_score_thresh, 0.75);
        assert_eq!(settings.min_size, 600);
    }
}

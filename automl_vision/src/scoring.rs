use crate::{
    error::ModelError,
    settings::{validate_unit_interval, ModelSettings, PostProcess},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_score_thresh: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_iou_thresh: Option<f32>,
}

impl ScoringParams {
    pub fn post_process(&self, settings: &ModelSettings) -> Result<PostProcess, ModelError> {
        let mut post = settings.post_process();
        if let Some(score) = self.box_score_thresh {
            validate_unit_interval(score, "box_score_thresh").map_err(ModelError::InvalidSettings)?;
            post.box_score_thresh = score;
        }
        if let Some(iou) = self.box_iou_thresh {
            validate_unit_interval(iou, "box_iou_thresh").map_err(ModelError::InvalidSettings)?;
            post.nms_iou_thresh = iou;
        }
        Ok(post)
    }
}

// Box corners as fractions of the image width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedBox {
    pub top_x: f32,
    pub top_y: f32,
    pub bottom_x: f32,
    pub bottom_y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredBox {
    #[serde(rename = "box")]
    pub bbox: NormalizedBox,
    pub label: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredImage {
    pub filename: String,
    pub boxes: Vec<ScoredBox>,
}

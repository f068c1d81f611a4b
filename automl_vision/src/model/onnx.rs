use super::{ModelState, ObjectDetector};
use crate::{
    error::ModelError,
    settings::PostProcess,
    transforms::{check_image_tensor, resize_tensor},
};
use ndarray::{s, Array4, ArrayView4, Axis};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};
use vision_types::{non_max_suppression, Detection, PredictionSet};

const INPUT_SIZE: usize = 640;

#[derive(Clone)]
pub struct OnnxDetector {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    model_path: PathBuf,
    number_of_classes: usize,
}

impl OnnxDetector {
    pub fn new(
        model_path: &Path,
        number_of_classes: usize,
        num_instances: usize,
    ) -> Result<Self, ModelError> {
        if !model_path.exists() {
            return Err(ModelError::InvalidArtifact(format!(
                "Model file not found: {:?}",
                model_path
            )));
        }

        let sessions = (0..num_instances.max(1))
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(model_path)?;
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<Result<Vec<_>, ort::Error>>()
            .map_err(|e| ModelError::Inference(format!("failed to create session: {}", e)))?;

        tracing::info!("Created {} ONNX sessions", sessions.len());

        Ok(Self {
            sessions: Arc::new(sessions),
            counter: Arc::new(AtomicUsize::new(0)),
            model_path: model_path.to_path_buf(),
            number_of_classes,
        })
    }

    fn run_inference(&self, input: &Array4<f32>) -> Result<ndarray::ArrayD<f32>, ModelError> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| ModelError::Inference(format!("session mutex poisoned: {}", e)))?;

        tracing::debug!("Handling request with session {}", index);
        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| ModelError::Inference(format!("failed to build tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        let (shape, data) = outputs["output0"]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Inference(format!("failed to extract tensor: {}", e)))?;

        ndarray::ArrayD::from_shape_vec(shape.to_ixdyn(), data.to_vec())
            .map_err(|e| ModelError::Inference(format!("invalid tensor shape: {}", e)))
    }
}

impl ObjectDetector for OnnxDetector {
    fn number_of_classes(&self) -> usize {
        self.number_of_classes
    }

    fn forward(
        &self,
        images: ArrayView4<f32>,
        post: &PostProcess,
    ) -> Result<Vec<PredictionSet>, ModelError> {
        let mut predictions = Vec::with_capacity(images.len_of(Axis(0)));

        for image in images.axis_iter(Axis(0)) {
            let (img_height, img_width) = check_image_tensor(image)?;
            let input = resize_tensor(image, INPUT_SIZE, INPUT_SIZE)?.insert_axis(Axis(0));
            let outputs = self.run_inference(&input)?;

            let outputs = outputs.t();
            let output = outputs.slice(s![.., .., 0]);
            let mut boxes = Vec::new();

            for row in output.axis_iter(Axis(0)) {
                let row: Vec<_> = row.iter().copied().collect();
                let Some((class_id, prob)) = row
                    .iter()
                    .skip(4)
                    .copied()
                    .enumerate()
                    .reduce(|accum, row| if row.1 > accum.1 { row } else { accum })
                else {
                    continue;
                };

                if prob <= post.box_score_thresh || class_id >= self.number_of_classes {
                    continue;
                }

                let xc = row[0] / INPUT_SIZE as f32 * img_width as f32;
                let yc = row[1] / INPUT_SIZE as f32 * img_height as f32;
                let w = row[2] / INPUT_SIZE as f32 * img_width as f32;
                let h = row[3] / INPUT_SIZE as f32 * img_height as f32;

                boxes.push(Detection {
                    class_id: class_id as u32,
                    confidence: prob.clamp(0., 1.),
                    x1: xc - w / 2.,
                    y1: yc - h / 2.,
                    x2: xc + w / 2.,
                    y2: yc + h / 2.,
                });
            }

            let mut kept = non_max_suppression(boxes, post.nms_iou_thresh, true);
            kept.truncate(post.box_detections_per_img);
            predictions.push(PredictionSet::new(kept));
        }

        Ok(predictions)
    }

    fn state(&self) -> ModelState {
        ModelState::Onnx {
            file: self
                .model_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "model.onnx".to_string()),
        }
    }

    fn artifact_files(&self) -> Vec<PathBuf> {
        vec![self.model_path.clone()]
    }
}

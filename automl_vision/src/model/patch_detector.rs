use super::{ModelState, ObjectDetector};
use crate::{error::ModelError, settings::PostProcess, transforms::check_image_tensor};
use ndarray::{s, Array1, Array2, ArrayView2, ArrayView3, ArrayView4, Axis};
use rand::{rngs::StdRng, Rng, SeedableRng};
use vision_types::{non_max_suppression, Detection, PredictionSet};

pub const NUM_FEATURES: usize = 6;

// Window sides as fractions of the shorter image side.
const WINDOW_FRACTIONS: [f32; 2] = [0.25, 0.5];

#[derive(Debug, Clone)]
pub struct PatchDetector {
    weights: Array2<f32>,
    biases: Array1<f32>,
}

impl PatchDetector {
    // Biases start in `[-2, 0)`, so a featureless (all-black) patch scores
    // at most 0.5.
    pub fn initialize(number_of_classes: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let weights = Array2::from_shape_fn((number_of_classes, NUM_FEATURES), |_| {
            rng.random_range(-4.0f32..4.0)
        });
        let biases = Array1::from_shape_fn(number_of_classes, |_| rng.random_range(-2.0f32..0.0));
        Self { weights, biases }
    }

    pub fn from_state(
        weights: &[Vec<f32>],
        biases: &[f32],
        number_of_classes: usize,
    ) -> Result<Self, ModelError> {
        if weights.len() != number_of_classes || biases.len() != number_of_classes {
            return Err(ModelError::InvalidArtifact(format!(
                "patch detector state has {} weight rows and {} biases, expected {}",
                weights.len(),
                biases.len(),
                number_of_classes
            )));
        }
        if let Some(row) = weights.iter().find(|row| row.len() != NUM_FEATURES) {
            return Err(ModelError::InvalidArtifact(format!(
                "patch detector weight row has {} features, expected {}",
                row.len(),
                NUM_FEATURES
            )));
        }

        let flat: Vec<f32> = weights.iter().flatten().copied().collect();
        let weights = Array2::from_shape_vec((number_of_classes, NUM_FEATURES), flat)
            .map_err(|e| ModelError::InvalidArtifact(e.to_string()))?;

        Ok(Self {
            weights,
            biases: Array1::from(biases.to_vec()),
        })
    }

    fn detect_single(&self, image: ArrayView3<f32>, post: &PostProcess) -> PredictionSet {
        let (_, height, width) = image.dim();
        let luma = luminance(image);
        let min_side = height.min(width) as f32;

        let mut boxes = Vec::new();
        for fraction in WINDOW_FRACTIONS {
            let size = ((fraction * min_side).round() as usize).max(1);
            let stride = (size / 2).max(1);

            for y0 in (0..=height - size).step_by(stride) {
                for x0 in (0..=width - size).step_by(stride) {
                    let features = window_features(image, luma.view(), y0, x0, size);
                    let (class_id, confidence) = self.score(&features);
                    if confidence <= post.box_score_thresh {
                        continue;
                    }

                    boxes.push(Detection {
                        class_id: class_id as u32,
                        confidence,
                        x1: x0 as f32,
                        y1: y0 as f32,
                        x2: (x0 + size) as f32,
                        y2: (y0 + size) as f32,
                    });
                }
            }
        }

        let mut kept = non_max_suppression(boxes, post.nms_iou_thresh, true);
        kept.truncate(post.box_detections_per_img);
        PredictionSet::new(kept)
    }

    fn score(&self, features: &Array1<f32>) -> (usize, f32) {
        let logits = self.weights.dot(features) + &self.biases;
        logits
            .iter()
            .enumerate()
            .map(|(class_id, logit)| (class_id, sigmoid(*logit)))
            .reduce(|best, current| if current.1 > best.1 { current } else { best })
            .unwrap_or((0, 0.))
    }
}

impl ObjectDetector for PatchDetector {
    fn number_of_classes(&self) -> usize {
        self.biases.len()
    }

    fn forward(
        &self,
        images: ArrayView4<f32>,
        post: &PostProcess,
    ) -> Result<Vec<PredictionSet>, ModelError> {
        images
            .axis_iter(Axis(0))
            .map(|image| {
                check_image_tensor(image)?;
                Ok(self.detect_single(image, post))
            })
            .collect()
    }

    fn state(&self) -> ModelState {
        ModelState::PatchDetector {
            weights: self.weights.outer_iter().map(|row| row.to_vec()).collect(),
            biases: self.biases.to_vec(),
        }
    }
}

fn sigmoid(x: f32) -> f32 {
    1. / (1. + (-x).exp())
}

fn luminance(image: ArrayView3<f32>) -> Array2<f32> {
    let r = image.index_axis(Axis(0), 0);
    let g = image.index_axis(Axis(0), 1);
    let b = image.index_axis(Axis(0), 2);
    &r * 0.299 + &g * 0.587 + &b * 0.114
}

fn window_features(
    image: ArrayView3<f32>,
    luma: ArrayView2<f32>,
    y0: usize,
    x0: usize,
    size: usize,
) -> Array1<f32> {
    let patch = image.slice(s![.., y0..y0 + size, x0..x0 + size]);
    let luma = luma.slice(s![y0..y0 + size, x0..x0 + size]);

    let mut features = Array1::zeros(NUM_FEATURES);
    for c in 0..3 {
        features[c] = patch.index_axis(Axis(0), c).mean().unwrap_or(0.);
    }

    let luma_mean = luma.mean().unwrap_or(0.);
    features[3] = luma.mapv(|v| (v - luma_mean).abs()).mean().unwrap_or(0.);

    let grad_x = &luma.slice(s![.., 1..]) - &luma.slice(s![.., ..-1]);
    let grad_y = &luma.slice(s![1.., ..]) - &luma.slice(s![..-1, ..]);
    features[4] = grad_x.mapv(f32::abs).mean().unwrap_or(0.);
    features[5] = grad_y.mapv(f32::abs).mean().unwrap_or(0.);

    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    fn post(box_score_thresh: f32) -> PostProcess {
        PostProcess {
            box_score_thresh,
            nms_iou_thresh: 0.5,
            box_detections_per_img: 100,
        }
    }

    fn checkerboard(height: usize, width: usize) -> Array4<f32> {
        Array4::from_shape_fn((1, 3, height, width), |(_, c, y, x)| {
            if (x / 4 + y / 4 + c) % 2 == 0 {
                1.
            } else {
                0.
            }
        })
    }

    #[test]
    fn test_initialize_is_deterministic() {
        let a = PatchDetector::initialize(4, 7);
        let b = PatchDetector::initialize(4, 7);
        let c = PatchDetector::initialize(4, 8);
        assert_eq!(a.state(), b.state());
        assert_ne!(a.state(), c.state());
        assert_eq!(a.number_of_classes(), 4);
    }

    #[test]
    fn test_black_image_has_no_confident_detection() {
        let detector = PatchDetector::initialize(4, 42);
        let images = Array4::<f32>::zeros((2, 3, 24, 32));
        let predictions = detector.forward(images.view(), &post(0.5)).unwrap();
        assert_eq!(predictions.len(), 2);
        assert!(predictions.iter().all(PredictionSet::is_empty));
    }

    #[test]
    fn test_detections_are_well_formed() {
        let detector = PatchDetector::initialize(4, 3);
        let images = checkerboard(32, 48);
        let predictions = detector.forward(images.view(), &post(0.)).unwrap();
        assert_eq!(predictions.len(), 1);
        assert!(!predictions[0].is_empty());
        for detection in predictions[0].iter() {
            assert!(detection.class_id < 4);
            assert!((0. ..=1.).contains(&detection.confidence));
            assert!(detection.x1 < detection.x2 && detection.x2 <= 48.);
            assert!(detection.y1 < detection.y2 && detection.y2 <= 32.);
        }
    }

    #[test]
    fn test_detections_per_image_cap() {
        let detector = PatchDetector::initialize(4, 3);
        let images = checkerboard(32, 48);
        let capped = PostProcess {
            box_detections_per_img: 2,
            nms_iou_thresh: 1.,
            ..post(0.)
        };
        let predictions = detector.forward(images.view(), &capped).unwrap();
        assert_eq!(predictions[0].len(), 2);
    }

    #[test]
    fn test_state_round_trip() {
        let detector = PatchDetector::initialize(3, 11);
        let ModelState::PatchDetector { weights, biases } = detector.state() else {
            panic!("unexpected state kind");
        };
        let restored = PatchDetector::from_state(&weights, &biases, 3).unwrap();
        let images = checkerboard(16, 16);
        assert_eq!(
            detector.forward(images.view(), &post(0.)).unwrap(),
            restored.forward(images.view(), &post(0.)).unwrap()
        );
        assert!(PatchDetector::from_state(&weights, &biases, 4).is_err());
    }

    #[test]
    fn test_rejects_non_rgb_tensor() {
        let detector = PatchDetector::initialize(2, 0);
        let images = Array4::<f32>::zeros((1, 1, 8, 8));
        assert!(detector.forward(images.view(), &post(0.5)).is_err());
    }
}

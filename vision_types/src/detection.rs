use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub confidence: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Detection {
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn intersection(&self, other: &Detection) -> f32 {
        let w = self.x2.min(other.x2) - self.x1.max(other.x1);
        let h = self.y2.min(other.y2) - self.y1.max(other.y1);
        w.max(0.) * h.max(0.)
    }

    pub fn union(&self, other: &Detection) -> f32 {
        self.area() + other.area() - self.intersection(other)
    }

    pub fn iou(&self, other: &Detection) -> f32 {
        let union = self.union(other);
        if union <= 0. {
            return 0.;
        }
        self.intersection(other) / union
    }

    // `[class_id, x1, y1, x2, y2, score]`
    pub fn as_row(&self) -> [f32; 6] {
        [
            self.class_id as f32,
            self.x1,
            self.y1,
            self.x2,
            self.y2,
            self.confidence,
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionSet {
    pub detections: Vec<Detection>,
}

impl PredictionSet {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }

    pub fn rows(&self) -> Vec<[f32; 6]> {
        self.detections.iter().map(Detection::as_row).collect()
    }
}

impl IntoIterator for PredictionSet {
    type Item = Detection;
    type IntoIter = std::vec::IntoIter<Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.detections.into_iter()
    }
}

impl FromIterator<Detection> for PredictionSet {
    fn from_iter<I: IntoIterator<Item = Detection>>(iter: I) -> Self {
        Self {
            detections: iter.into_iter().collect(),
        }
    }
}

/// Greedy non-maximum suppression. Highest confidence first; a box is dropped
/// when its IoU with an already kept box reaches `iou_threshold`. With
/// `class_aware` only boxes of the same class suppress each other.
pub fn non_max_suppression(
    mut boxes: Vec<Detection>,
    iou_threshold: f32,
    class_aware: bool,
) -> Vec<Detection> {
    boxes.sort_by(|box1, box2| box2.confidence.total_cmp(&box1.confidence));
    let mut result: Vec<Detection> = Vec::new();

    while !boxes.is_empty() {
        let kept = boxes.remove(0);
        boxes.retain(|other| {
            (class_aware && other.class_id != kept.class_id) || kept.iou(other) < iou_threshold
        });
        result.push(kept);
    }

    result
}

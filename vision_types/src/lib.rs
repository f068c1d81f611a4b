mod batch;
mod classes;
mod detection;
mod error;
mod image_input;
mod task;

pub use batch::{ImageBatch, ImageRecord, IMAGE, IMAGE_SIZE};
pub use classes::{ClassLabels, CLASSES_NOT_A_LABEL_LIST};
pub use detection::{non_max_suppression, Detection, PredictionSet};
pub use error::VisionError;
pub use image_input::{base64_to_image, create_black_image, image_to_base64, ImageInput};
pub use task::ModelTask;

use crate::error::ModelError;
use image::{imageops::{self, FilterType}, DynamicImage, Rgb, Rgb32FImage, RgbImage};
use ndarray::{Array3, ArrayView3};
use vision_types::Detection;

pub fn to_tensor(image: &DynamicImage) -> Array3<f32> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut tensor = Array3::zeros((3, height as usize, width as usize));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        let [r, g, b] = pixel.0;
        tensor[[0, y, x]] = (r as f32) / 255.;
        tensor[[1, y, x]] = (g as f32) / 255.;
        tensor[[2, y, x]] = (b as f32) / 255.;
    }

    tensor
}

pub fn tensor_to_image(tensor: ArrayView3<f32>) -> Result<DynamicImage, ModelError> {
    let (height, width) = check_image_tensor(tensor)?;

    let image = RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgb([
            quantize(tensor[[0, y, x]]),
            quantize(tensor[[1, y, x]]),
            quantize(tensor[[2, y, x]]),
        ])
    });

    Ok(DynamicImage::ImageRgb8(image))
}

fn quantize(value: f32) -> u8 {
    (value.clamp(0., 1.) * 255.).round() as u8
}

pub(crate) fn check_image_tensor(tensor: ArrayView3<f32>) -> Result<(usize, usize), ModelError> {
    let (channels, height, width) = tensor.dim();
    if channels != 3 || height == 0 || width == 0 {
        return Err(ModelError::Inference(format!(
            "expected a non-empty 3 x H x W image tensor, got shape {:?}",
            tensor.shape()
        )));
    }
    Ok((height, width))
}

pub fn resize_tensor(
    tensor: ArrayView3<f32>,
    out_height: usize,
    out_width: usize,
) -> Result<Array3<f32>, ModelError> {
    let (height, width) = check_image_tensor(tensor)?;

    let image = Rgb32FImage::from_fn(width as u32, height as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgb([tensor[[0, y, x]], tensor[[1, y, x]], tensor[[2, y, x]]])
    });
    let resized = imageops::resize(
        &image,
        out_width as u32,
        out_height as u32,
        FilterType::Triangle,
    );

    let mut output = Array3::zeros((3, out_height, out_width));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for (c, value) in pixel.0.iter().enumerate() {
            output[[c, y, x]] = *value;
        }
    }

    Ok(output)
}

/// Resize applied before the detector sees an image: the shorter side goes
/// to `min_size` unless the longer side would then exceed `max_size`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceTransform {
    pub min_size: u32,
    pub max_size: u32,
}

#[derive(Debug, Clone)]
pub struct TransformedImage {
    pub tensor: Array3<f32>,
    pub scale_x: f32,
    pub scale_y: f32,
    pub original_width: usize,
    pub original_height: usize,
}

impl TransformedImage {
    /// Maps a detection from transformed to original coordinates, clipped to
    /// the original image.
    pub fn to_original(&self, detection: &Detection) -> Detection {
        let max_x = self.original_width as f32;
        let max_y = self.original_height as f32;
        Detection {
            x1: (detection.x1 / self.scale_x).clamp(0., max_x),
            y1: (detection.y1 / self.scale_y).clamp(0., max_y),
            x2: (detection.x2 / self.scale_x).clamp(0., max_x),
            y2: (detection.y2 / self.scale_y).clamp(0., max_y),
            ..*detection
        }
    }
}

impl InferenceTransform {
    pub fn target_size(&self, height: usize, width: usize) -> (usize, usize) {
        let min_side = height.min(width) as f32;
        let max_side = height.max(width) as f32;

        let mut scale = self.min_size as f32 / min_side;
        if max_side * scale > self.max_size as f32 {
            scale = self.max_size as f32 / max_side;
        }

        (
            ((height as f32 * scale).round() as usize).max(1),
            ((width as f32 * scale).round() as usize).max(1),
        )
    }

    pub fn apply(&self, image: ArrayView3<f32>) -> Result<TransformedImage, ModelError> {
        let (height, width) = check_image_tensor(image)?;
        let (out_height, out_width) = self.target_size(height, width);

        let tensor = if (out_height, out_width) == (height, width) {
            image.to_owned()
        } else {
            resize_tensor(image, out_height, out_width)?
        };

        Ok(TransformedImage {
            tensor,
            scale_x: out_width as f32 / width as f32,
            scale_y: out_height as f32 / height as f32,
            original_width: width,
            original_height: height,
        })
    }
}

use crate::error::VisionError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

#[derive(Debug, Clone)]
pub enum ImageInput {
    Decoded(DynamicImage),
    Base64(String),
}

impl ImageInput {
    pub fn decode(&self) -> Result<DynamicImage, VisionError> {
        match self {
            ImageInput::Decoded(image) => Ok(image.clone()),
            ImageInput::Base64(encoded) => base64_to_image(encoded),
        }
    }

    pub fn to_base64(&self) -> Result<String, VisionError> {
        match self {
            ImageInput::Decoded(image) => image_to_base64(image, ImageFormat::Png),
            ImageInput::Base64(encoded) => Ok(encoded.clone()),
        }
    }

    pub fn dimensions(&self) -> Result<(u32, u32), VisionError> {
        match self {
            ImageInput::Decoded(image) => Ok(image.dimensions()),
            ImageInput::Base64(encoded) => Ok(base64_to_image(encoded)?.dimensions()),
        }
    }
}

impl From<DynamicImage> for ImageInput {
    fn from(image: DynamicImage) -> Self {
        ImageInput::Decoded(image)
    }
}

impl From<String> for ImageInput {
    fn from(encoded: String) -> Self {
        ImageInput::Base64(encoded)
    }
}

pub fn image_to_base64(image: &DynamicImage, format: ImageFormat) -> Result<String, VisionError> {
    let mut buffer: Vec<u8> = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), format)
        .map_err(|e| VisionError::ImageEncode(e.to_string()))?;
    Ok(STANDARD.encode(&buffer))
}

pub fn base64_to_image(encoded: &str) -> Result<DynamicImage, VisionError> {
    let image_data = STANDARD.decode(encoded.trim())?;

    let image_reader = image::ImageReader::new(Cursor::new(image_data))
        .with_guessed_format()
        .map_err(|e| VisionError::ImageDecode(e.to_string()))?;

    image_reader
        .decode()
        .map_err(|e| VisionError::ImageDecode(e.to_string()))
}

pub fn create_black_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([0, 0, 0])))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(37, 21, |x, y| {
            Rgb([(x * 6) as u8, (y * 11) as u8, ((x + y) * 3) as u8])
        }))
    }

    #[test]
    fn test_png_round_trip_is_pixel_identical() {
        let image = gradient_image();
        let encoded = image_to_base64(&image, ImageFormat::Png).unwrap();
        let decoded = base64_to_image(&encoded).unwrap();
        assert_eq!(decoded.dimensions(), (37, 21));
        assert_eq!(decoded.to_rgb8(), image.to_rgb8());
    }

    #[test]
    fn test_black_image() {
        let image = create_black_image(12, 7);
        assert_eq!(image.dimensions(), (12, 7));
        assert!(image.to_rgb8().pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_inputs_are_interchangeable() {
        let image = gradient_image();
        let decoded = ImageInput::from(image.clone());
        let encoded = ImageInput::from(decoded.to_base64().unwrap());
        assert_eq!(decoded.dimensions().unwrap(), encoded.dimensions().unwrap());
        assert_eq!(
            decoded.decode().unwrap().to_rgb8(),
            encoded.decode().unwrap().to_rgb8()
        );
    }

    #[test]
    fn test_invalid_base64() {
        assert!(matches!(
            base64_to_image("not base64!"),
            Err(VisionError::Base64Decode(_))
        ));
        let not_an_image = STANDARD.encode(b"plain text");
        assert!(matches!(
            base64_to_image(&not_an_image),
            Err(VisionError::ImageDecode(_))
        ));
    }
}

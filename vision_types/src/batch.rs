use crate::{
    error::VisionError,
    image_input::{base64_to_image, image_to_base64, ImageInput},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, GenericImageView, ImageFormat};
use serde::{Deserialize, Serialize};
use std::{ops::Range, path::Path};

pub const IMAGE: &str = "image";
pub const IMAGE_SIZE: &str = "image_size";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<(u32, u32)>,
}

impl ImageRecord {
    pub fn new(image: String) -> Self {
        Self {
            image,
            image_size: None,
        }
    }

    pub fn with_size(image: String, width: u32, height: u32) -> Self {
        Self {
            image,
            image_size: Some((width, height)),
        }
    }

    pub fn decode(&self) -> Result<DynamicImage, VisionError> {
        base64_to_image(&self.image)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageBatch {
    records: Vec<ImageRecord>,
}

impl ImageBatch {
    pub fn new(records: Vec<ImageRecord>) -> Self {
        Self { records }
    }

    pub fn from_images(images: &[DynamicImage], with_size: bool) -> Result<Self, VisionError> {
        let records = images
            .iter()
            .map(|image| {
                let encoded = image_to_base64(image, ImageFormat::Png)?;
                if with_size {
                    let (width, height) = image.dimensions();
                    Ok(ImageRecord::with_size(encoded, width, height))
                } else {
                    Ok(ImageRecord::new(encoded))
                }
            })
            .collect::<Result<Vec<_>, VisionError>>()?;
        Ok(Self { records })
    }

    pub fn from_inputs<I>(inputs: I, with_size: bool) -> Result<Self, VisionError>
    where
        I: IntoIterator<Item = ImageInput>,
    {
        let records = inputs
            .into_iter()
            .map(|input| {
                let encoded = input.to_base64()?;
                if with_size {
                    let (width, height) = input.dimensions()?;
                    Ok(ImageRecord::with_size(encoded, width, height))
                } else {
                    Ok(ImageRecord::new(encoded))
                }
            })
            .collect::<Result<Vec<_>, VisionError>>()?;
        Ok(Self { records })
    }

    pub fn load_base64_images<P: AsRef<Path>>(
        paths: &[P],
        return_image_size: bool,
    ) -> Result<Self, VisionError> {
        let records = paths
            .iter()
            .map(|path| {
                let path = path.as_ref();
                let bytes = std::fs::read(path).map_err(|source| VisionError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                let mut record = ImageRecord::new(STANDARD.encode(&bytes));
                if return_image_size {
                    let (width, height) = record.decode()?.dimensions();
                    record.image_size = Some((width, height));
                }
                Ok(record)
            })
            .collect::<Result<Vec<_>, VisionError>>()?;
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ImageRecord> {
        self.records.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ImageRecord> {
        self.records.get(index)
    }

    pub fn slice(&self, range: Range<usize>) -> Result<Self, VisionError> {
        if range.end > self.records.len() || range.start > range.end {
            return Err(VisionError::IndexOutOfRange {
                index: range.end,
                len: self.records.len(),
            });
        }
        Ok(Self {
            records: self.records[range].to_vec(),
        })
    }

    pub fn set_image(&mut self, index: usize, image: ImageInput) -> Result<(), VisionError> {
        let len = self.records.len();
        let record = self
            .records
            .get_mut(index)
            .ok_or(VisionError::IndexOutOfRange { index, len })?;
        let (width, height) = image.dimensions()?;
        record.image = image.to_base64()?;
        if record.image_size.is_some() {
            record.image_size = Some((width, height));
        }
        Ok(())
    }

    pub fn image_size(&self, index: usize) -> Result<(u32, u32), VisionError> {
        let record = self.records.get(index).ok_or(VisionError::IndexOutOfRange {
            index,
            len: self.records.len(),
        })?;
        match record.image_size {
            Some(size) => Ok(size),
            None => Ok(record.decode()?.dimensions()),
        }
    }
}

impl<'a> IntoIterator for &'a ImageBatch {
    type Item = &'a ImageRecord;
    type IntoIter = std::slice::Iter<'a, ImageRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

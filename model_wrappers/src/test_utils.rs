use automl_vision::{
    model::{ModelName, ObjectDetectionModelFactory},
    ModelPackager, ModelSettings, PackagedModel, SettingsOverrides,
};
use image::{DynamicImage, Rgb, RgbImage};
use std::sync::Arc;
use vision_types::{ClassLabels, ImageBatch};

pub(crate) fn fridge_labels() -> ClassLabels {
    ClassLabels::new(["can", "carton", "milk_bottle", "water_bottle"]).unwrap()
}

pub(crate) fn small_settings() -> ModelSettings {
    ModelSettings {
        min_size: 64,
        ..Default::default()
    }
}

pub(crate) fn fridge_images() -> Vec<DynamicImage> {
    let objects: [&[(u32, u32, u32, u32, [u8; 3])]; 3] = [
        &[(10, 20, 30, 60, [200, 30, 30]), (60, 10, 90, 70, [240, 240, 240])],
        &[(5, 5, 45, 35, [30, 90, 200])],
        &[
            (20, 30, 40, 75, [40, 160, 60]),
            (50, 25, 70, 75, [220, 200, 40]),
            (80, 40, 110, 70, [120, 60, 20]),
        ],
    ];

    objects
        .iter()
        .map(|boxes| {
            DynamicImage::ImageRgb8(RgbImage::from_fn(120, 80, |x, y| {
                boxes
                    .iter()
                    .find(|(x1, y1, x2, y2, _)| x >= *x1 && x < *x2 && y >= *y1 && y < *y2)
                    .map(|(_, _, _, _, color)| Rgb(*color))
                    .unwrap_or(Rgb([180, 180, 170]))
            }))
        })
        .collect()
}

pub(crate) fn fridge_samples() -> ImageBatch {
    ImageBatch::from_images(&fridge_images(), true).unwrap()
}

pub(crate) fn load_packaged_model(
    classes: Option<ClassLabels>,
    model_settings: Option<ModelSettings>,
) -> Arc<PackagedModel> {
    let model = ObjectDetectionModelFactory
        .get_model_wrapper(
            4,
            ModelName::PatchDetector,
            Some(model_settings.unwrap_or_else(small_settings)),
            classes,
            42,
        )
        .unwrap();

    let tmp_output_dir = tempfile::tempdir().unwrap();
    let remote_path = tmp_output_dir.path().join("outputs");
    ModelPackager::default()
        .save(&model, &remote_path, &SettingsOverrides::default())
        .unwrap();

    Arc::new(PackagedModel::load(&remote_path).unwrap())
}

use crate::{
    automl_model::AutoMlObjectDetectionModel,
    checkpoint::ModelCheckpoint,
    error::ModelError,
    model::ModelName,
    scoring::{NormalizedBox, ScoredBox, ScoredImage, ScoringParams},
    settings::SettingsOverrides,
    signature::ModelSignature,
};
use image::GenericImageView;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use vision_types::{ClassLabels, ImageBatch, ModelTask};

pub const MLMODEL_FILENAME: &str = "MLmodel";
pub const ENVIRONMENT_FILENAME: &str = "environment.yaml";
pub const ARTIFACTS_DIR: &str = "artifacts";
pub const MODEL_FILENAME: &str = "model.json";
pub const MODEL_SETTINGS_FILENAME: &str = "settings.json";
pub const FORMAT_VERSION: u32 = 1;
pub const FLAVOR: &str = "automl_vision";

const MODEL_ARTIFACT: &str = "model";
const SETTINGS_ARTIFACT: &str = "settings";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlModelMetadata {
    pub format_version: u32,
    pub flavor: String,
    pub task_type: ModelTask,
    pub model_name: ModelName,
    pub artifacts: BTreeMap<String, String>,
    pub env: String,
    pub signature: ModelSignature,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    pub name: String,
    pub channels: Vec<String>,
    pub dependencies: Vec<Dependency>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dependency {
    Package(String),
    Group(BTreeMap<String, Vec<String>>),
}

impl Default for EnvironmentSpec {
    fn default() -> Self {
        Self {
            name: format!("{}-env", env!("CARGO_PKG_NAME")),
            channels: vec!["crates-io".to_string()],
            dependencies: vec![Dependency::Package(format!(
                "{}={}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))],
        }
    }
}

/// Writes models in the packaged layout:
///
/// ```text
/// <path>/MLmodel
/// <path>/environment.yaml
/// <path>/artifacts/model.json
/// <path>/artifacts/settings.json
/// <path>/artifacts/<extra model files>
/// ```
#[derive(Debug, Clone, Default)]
pub struct ModelPackager {
    environment: EnvironmentSpec,
}

impl ModelPackager {
    pub fn new(environment: EnvironmentSpec) -> Self {
        Self { environment }
    }

    // Files are staged in a temporary sibling directory and moved into place
    // once complete; the staging directory is removed on every exit path.
    pub fn save(
        &self,
        model: &AutoMlObjectDetectionModel,
        path: &Path,
        settings_overrides: &SettingsOverrides,
    ) -> Result<(), ModelError> {
        prepare_target(path)?;

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(ModelError::io(parent))?;

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(parent)
            .map_err(ModelError::io(parent))?;

        self.write_package(staging.path(), model, settings_overrides)?;
        fs::rename(staging.path(), path).map_err(ModelError::io(path))?;

        tracing::info!(
            "Saved {} model with {} classes at {}",
            model.model_name(),
            model.number_of_classes(),
            path.display()
        );
        Ok(())
    }

    fn write_package(
        &self,
        root: &Path,
        model: &AutoMlObjectDetectionModel,
        settings_overrides: &SettingsOverrides,
    ) -> Result<(), ModelError> {
        let artifacts_dir = root.join(ARTIFACTS_DIR);
        fs::create_dir_all(&artifacts_dir).map_err(ModelError::io(&artifacts_dir))?;

        write_json(&artifacts_dir.join(MODEL_FILENAME), &model.checkpoint())?;
        write_json(
            &artifacts_dir.join(MODEL_SETTINGS_FILENAME),
            settings_overrides,
        )?;

        for source in model.inner().artifact_files() {
            let file_name = source.file_name().ok_or_else(|| {
                ModelError::InvalidArtifact(format!("{} has no file name", source.display()))
            })?;
            let target = artifacts_dir.join(file_name);
            fs::copy(&source, &target).map_err(ModelError::io(&source))?;
        }

        let artifacts = BTreeMap::from([
            (
                MODEL_ARTIFACT.to_string(),
                format!("{}/{}", ARTIFACTS_DIR, MODEL_FILENAME),
            ),
            (
                SETTINGS_ARTIFACT.to_string(),
                format!("{}/{}", ARTIFACTS_DIR, MODEL_SETTINGS_FILENAME),
            ),
        ]);
        let task_type = ModelTask::ObjectDetection;
        let metadata = MlModelMetadata {
            format_version: FORMAT_VERSION,
            flavor: FLAVOR.to_string(),
            task_type,
            model_name: model.model_name(),
            artifacts,
            env: ENVIRONMENT_FILENAME.to_string(),
            signature: ModelSignature::for_task(task_type)?,
        };

        write_yaml(&root.join(MLMODEL_FILENAME), &metadata)?;
        write_yaml(&root.join(ENVIRONMENT_FILENAME), &self.environment)?;
        Ok(())
    }
}

fn prepare_target(path: &Path) -> Result<(), ModelError> {
    if !path.exists() {
        return Ok(());
    }
    if path.is_dir() {
        let mut entries = fs::read_dir(path).map_err(ModelError::io(path))?;
        if entries.next().is_none() {
            return fs::remove_dir(path).map_err(ModelError::io(path));
        }
    }
    Err(ModelError::ArtifactExists(path.to_path_buf()))
}

#[derive(Debug)]
pub struct PackagedModel {
    metadata: MlModelMetadata,
    model: AutoMlObjectDetectionModel,
}

impl PackagedModel {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let metadata: MlModelMetadata = read_yaml(&path.join(MLMODEL_FILENAME))?;
        if metadata.format_version != FORMAT_VERSION {
            return Err(ModelError::UnsupportedFormatVersion {
                found: metadata.format_version,
                supported: FORMAT_VERSION,
            });
        }
        if metadata.flavor != FLAVOR {
            return Err(ModelError::InvalidArtifact(format!(
                "unknown flavor '{}'",
                metadata.flavor
            )));
        }

        let model_file = artifact_path(path, &metadata, MODEL_ARTIFACT)?;
        let settings_file = artifact_path(path, &metadata, SETTINGS_ARTIFACT)?;

        let checkpoint: ModelCheckpoint = read_json(&model_file)?;
        if checkpoint.model_name != metadata.model_name {
            return Err(ModelError::InvalidArtifact(format!(
                "MLmodel declares {} but the checkpoint holds {}",
                metadata.model_name, checkpoint.model_name
            )));
        }
        let overrides: SettingsOverrides = read_json(&settings_file)?;
        let model_settings = overrides.apply(&checkpoint.specs.model_settings);

        let artifacts_dir = model_file.parent().unwrap_or(path).to_path_buf();
        let model =
            AutoMlObjectDetectionModel::from_checkpoint(checkpoint, model_settings, &artifacts_dir)?;

        tracing::info!(
            "Loaded {} model for {} from {}",
            metadata.model_name,
            metadata.task_type,
            path.display()
        );
        Ok(Self { metadata, model })
    }

    pub fn metadata(&self) -> &MlModelMetadata {
        &self.metadata
    }

    pub fn task(&self) -> ModelTask {
        self.metadata.task_type
    }

    pub fn signature(&self) -> &ModelSignature {
        &self.metadata.signature
    }

    pub fn classes(&self) -> Option<&ClassLabels> {
        self.model.classes()
    }

    pub fn number_of_classes(&self) -> usize {
        self.model.number_of_classes()
    }

    pub fn raw_model(&self) -> &AutoMlObjectDetectionModel {
        &self.model
    }

    // Scores a batch following the packaged signature. Boxes are normalized
    // to the image size; labels come from the embedded class list, or are
    // the class id when the model has none.
    pub fn predict(
        &self,
        batch: &ImageBatch,
        params: &ScoringParams,
    ) -> Result<Vec<ScoredImage>, ModelError> {
        self.metadata.signature.validate_input(batch)?;
        let post = params.post_process(self.model.model_settings())?;

        let scored = batch
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let image = record.decode()?;
                let (width, height) = image.dimensions();
                let (width, height) = (width as f32, height as f32);

                let boxes = self
                    .model
                    .detect(&image, &post)?
                    .iter()
                    .map(|detection| ScoredBox {
                        bbox: NormalizedBox {
                            top_x: detection.x1 / width,
                            top_y: detection.y1 / height,
                            bottom_x: detection.x2 / width,
                            bottom_y: detection.y2 / height,
                        },
                        label: self.label_for(detection.class_id),
                        score: detection.confidence,
                    })
                    .collect();

                Ok(ScoredImage {
                    filename: format!("image_{}", index),
                    boxes,
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        tracing::debug!("Scored {} images", scored.len());
        Ok(scored)
    }

    fn label_for(&self, class_id: u32) -> String {
        self.model
            .classes()
            .and_then(|classes| classes.get(class_id as usize))
            .map(str::to_string)
            .unwrap_or_else(|| class_id.to_string())
    }
}

fn artifact_path(root: &Path, metadata: &MlModelMetadata, name: &str) -> Result<PathBuf, ModelError> {
    let relative = metadata.artifacts.get(name).ok_or_else(|| {
        ModelError::InvalidArtifact(format!("MLmodel does not list a '{}' artifact", name))
    })?;
    let relative = Path::new(relative);
    if relative.is_absolute()
        || relative
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(ModelError::InvalidArtifact(format!(
            "artifact '{}' points outside the package: {}",
            name,
            relative.display()
        )));
    }
    Ok(root.join(relative))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ModelError> {
    let contents = serde_json::to_vec_pretty(value).map_err(|source| ModelError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, contents).map_err(ModelError::io(path))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let contents = fs::read(path).map_err(ModelError::io(path))?;
    serde_json::from_slice(&contents).map_err(|source| ModelError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<(), ModelError> {
    let contents = serde_yaml::to_string(value).map_err(|source| ModelError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, contents).map_err(ModelError::io(path))
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let contents = fs::read_to_string(path).map_err(ModelError::io(path))?;
    serde_yaml::from_str(&contents).map_err(|source| ModelError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

mod automl_model;
mod checkpoint;
mod error;
mod packaging;
mod scoring;
mod settings;
mod signature;

pub mod model;
pub mod transforms;

pub use automl_model::AutoMlObjectDetectionModel;
pub use checkpoint::{ModelCheckpoint, ModelSpecs, NestedModelSpecs};
pub use error::ModelError;
pub use packaging::{
    Dependency, EnvironmentSpec, MlModelMetadata, ModelPackager, PackagedModel, ARTIFACTS_DIR,
    ENVIRONMENT_FILENAME, FLAVOR, FORMAT_VERSION, MLMODEL_FILENAME, MODEL_FILENAME,
    MODEL_SETTINGS_FILENAME,
};
pub use scoring::{NormalizedBox, ScoredBox, ScoredImage, ScoringParams};
pub use settings::{InferenceSettings, ModelSettings, PostProcess, SettingsOverrides};
pub use signature::{ColumnSpec, ColumnType, ModelSignature};

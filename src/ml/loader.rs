//! Model artifact loading
//!
//! Artifacts are a serialized [`ModelArtifact`], either JSON or bincode. JSON
//! is tried first; bincode is the fallback.

use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    is_year_feature,
    models::{LinearRegressionModel, RegressionModel, DEFAULT_FEATURES},
    FeatureRow,
};
use crate::error::ModelLoadError;

/// Value given to every non-year feature in a fresh baseline.
pub const DEFAULT_FEATURE_VALUE: f64 = 100.0;

/// Serialized form of any model the service can run
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelArtifact {
    Linear(LinearRegressionModel),
    #[cfg(feature = "ml")]
    RandomForest(super::smartcore::SmartcoreRandomForest),
}

impl ModelArtifact {
    pub fn into_model(self) -> Result<Arc<dyn RegressionModel>, ModelLoadError> {
        match self {
            ModelArtifact::Linear(model) => {
                // Re-run constructor checks on deserialized heads
                let model = LinearRegressionModel::new(model.heads, model.metadata)
                    .map_err(|e| ModelLoadError::Decode(e.to_string()))?;
                Ok(Arc::new(model))
            }
            #[cfg(feature = "ml")]
            ModelArtifact::RandomForest(mut model) => {
                model
                    .restore_from_serialization()
                    .map_err(|e| ModelLoadError::Decode(e.to_string()))?;
                Ok(Arc::new(model))
            }
        }
    }

    pub fn to_json(&self) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn to_bincode(&self) -> anyhow::Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| anyhow::anyhow!("Failed to serialize model: {}", e))
    }
}

/// Decode an artifact, JSON first, then bincode
pub fn load_model_bytes(bytes: &[u8]) -> Result<Arc<dyn RegressionModel>, ModelLoadError> {
    let artifact = match serde_json::from_slice::<ModelArtifact>(bytes) {
        Ok(artifact) => artifact,
        Err(json_err) => {
            debug!(error = %json_err, "model is not JSON, trying bincode");
            bincode::deserialize::<ModelArtifact>(bytes).map_err(|bin_err| {
                ModelLoadError::Decode(format!("json: {}; bincode: {}", json_err, bin_err))
            })?
        }
    };
    artifact.into_model()
}

pub fn load_model_file(path: &Path) -> Result<Arc<dyn RegressionModel>, ModelLoadError> {
    let bytes = std::fs::read(path).map_err(|source| ModelLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_model_bytes(&bytes)
}

/// Where a model comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModelSource {
    Bundled,
    File(PathBuf),
}

impl ModelSource {
    pub fn from_optional_path(path: Option<&str>) -> Self {
        match path {
            Some(p) if !p.trim().is_empty() => ModelSource::File(PathBuf::from(p)),
            _ => ModelSource::Bundled,
        }
    }

    fn load(&self) -> Result<Arc<dyn RegressionModel>, ModelLoadError> {
        match self {
            ModelSource::Bundled => Ok(Arc::new(LinearRegressionModel::bundled())),
            ModelSource::File(path) => load_model_file(path),
        }
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Bundled => write!(f, "bundled"),
            ModelSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Loads each source once and hands out shared, read-only handles.
#[derive(Default)]
pub struct ModelStore {
    models: Mutex<HashMap<ModelSource, Arc<dyn RegressionModel>>>,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(
        &self,
        source: &ModelSource,
    ) -> Result<Arc<dyn RegressionModel>, ModelLoadError> {
        let mut models = self.models.lock();
        if let Some(model) = models.get(source) {
            return Ok(Arc::clone(model));
        }

        let model = source.load()?;
        info!(
            %source,
            model_id = %model.metadata().model_id,
            features = model.metadata().feature_names.len(),
            "model loaded"
        );
        models.insert(source.clone(), Arc::clone(&model));
        Ok(model)
    }

    pub fn count(&self) -> usize {
        self.models.lock().len()
    }
}

/// Feature names a model expects, or the fallback list if it declares none.
pub fn feature_schema(model: &dyn RegressionModel) -> Vec<String> {
    let declared = &model.metadata().feature_names;
    if declared.is_empty() {
        DEFAULT_FEATURES.iter().map(|s| s.to_string()).collect()
    } else {
        declared.clone()
    }
}

/// Starting values for a schema: year columns get `start_year`, the rest
/// [`DEFAULT_FEATURE_VALUE`].
pub fn default_baseline(schema: &[String], start_year: i32) -> anyhow::Result<FeatureRow> {
    FeatureRow::from_pairs(schema.iter().map(|name| {
        let value = if is_year_feature(name) {
            f64::from(start_year)
        } else {
            DEFAULT_FEATURE_VALUE
        };
        (name.clone(), value)
    }))
}

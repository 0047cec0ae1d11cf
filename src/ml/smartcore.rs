//! SmartCore RandomForest Wrapper
//!
//! Single-output price model backed by smartcore's `RandomForestRegressor`.

use super::{
    models::RegressionModel, FeatureRow, ModelMetadata, ModelOutput, ModelType, OutputArity,
    ValidationMetrics,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};

use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// SmartCore RandomForest Model Wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct SmartcoreRandomForest {
    pub metadata: ModelMetadata,
    #[serde(skip)]
    model: Option<Forest>,
    /// Serialized forest (for persistence)
    model_bytes: Option<Vec<u8>>,
    pub n_trees: usize,
    pub max_depth: Option<usize>,
}

impl SmartcoreRandomForest {
    pub fn new(model: Forest, metadata: ModelMetadata, n_trees: usize, max_depth: Option<usize>) -> Self {
        Self {
            metadata,
            model: Some(model),
            model_bytes: None,
            n_trees,
            max_depth,
        }
    }

    /// 100 trees, depth 12. Housing tables are small, so there is room
    /// for deeper trees than a streaming model would use.
    pub fn default_parameters() -> RandomForestRegressorParameters {
        Self::custom_parameters(100, Some(12), 2)
    }

    pub fn custom_parameters(
        n_trees: usize,
        max_depth: Option<usize>,
        min_samples_split: usize,
    ) -> RandomForestRegressorParameters {
        RandomForestRegressorParameters {
            max_depth: max_depth.map(|d| d as u16),
            min_samples_leaf: 1,
            min_samples_split,
            n_trees,
            m: None,
            keep_samples: false,
            seed: 42,
        }
    }

    /// Fit a forest on rows of features (in `feature_names` order) and prices
    pub fn train(
        x: &[Vec<f64>],
        y: &[f64],
        params: RandomForestRegressorParameters,
        feature_names: Vec<String>,
    ) -> Result<Self> {
        if x.is_empty() || y.is_empty() {
            anyhow::bail!("Cannot train on empty dataset");
        }
        if x.len() != y.len() {
            anyhow::bail!(
                "Feature and target count mismatch: {} features, {} targets",
                x.len(),
                y.len()
            );
        }

        let n_trees = params.n_trees;
        let max_depth = params.max_depth.map(|d| d as usize);

        let n_samples = x.len();
        let n_features = feature_names.len();
        let mut flat_data = Vec::with_capacity(n_samples * n_features);
        for row in x {
            if row.len() != n_features {
                anyhow::bail!(
                    "Row has {} values, expected {} features",
                    row.len(),
                    n_features
                );
            }
            flat_data.extend_from_slice(row);
        }

        let x_matrix = DenseMatrix::new(n_samples, n_features, flat_data, false);
        let y_vec = y.to_vec();

        let model = RandomForestRegressor::fit(&x_matrix, &y_vec, params)
            .map_err(|e| anyhow::anyhow!("RandomForest training failed: {:?}", e))?;

        let fitted = model
            .predict(&x_matrix)
            .map_err(|e| anyhow::anyhow!("Prediction failed during validation: {:?}", e))?;
        let validation_metrics = ValidationMetrics::from_predictions(&fitted, y)?;

        tracing::info!(
            n_samples,
            n_trees,
            r2 = validation_metrics.r2,
            "random forest trained"
        );

        let metadata = ModelMetadata {
            model_id: format!("smartcore_rf_{}", uuid::Uuid::new_v4()),
            model_type: ModelType::RandomForest,
            version: "1.0.0".to_string(),
            trained_at: chrono::Utc::now(),
            training_samples: n_samples,
            validation_metrics,
            feature_names,
        };

        Ok(Self::new(model, metadata, n_trees, max_depth))
    }

    /// Snapshot the fitted forest into `model_bytes`
    pub fn prepare_for_serialization(&mut self) -> Result<()> {
        if let Some(model) = &self.model {
            let bytes = bincode::serialize(model)
                .map_err(|e| anyhow::anyhow!("Failed to serialize model: {}", e))?;
            self.model_bytes = Some(bytes);
        }
        Ok(())
    }

    /// Rebuild the forest from `model_bytes`
    pub fn restore_from_serialization(&mut self) -> Result<()> {
        match &self.model_bytes {
            Some(bytes) => {
                let model: Forest = bincode::deserialize(bytes)
                    .map_err(|e| anyhow::anyhow!("Failed to deserialize model: {}", e))?;
                self.model = Some(model);
                Ok(())
            }
            None if self.model.is_some() => Ok(()),
            None => anyhow::bail!("Artifact carries no serialized forest"),
        }
    }
}

impl RegressionModel for SmartcoreRandomForest {
    fn predict(&self, features: &FeatureRow) -> Result<ModelOutput> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Model not loaded"))?;

        let x = DenseMatrix::new(1, features.len(), features.values().to_vec(), false);
        let predictions = model
            .predict(&x)
            .map_err(|e| anyhow::anyhow!("Prediction failed: {:?}", e))?;

        let value = predictions
            .first()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Model returned empty predictions"))?;

        Ok(ModelOutput::Single(value))
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn output_arity(&self) -> OutputArity {
        OutputArity::Single
    }
}

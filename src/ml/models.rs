//! ML Model Definitions
//!
//! The `RegressionModel` contract and the linear model bundled with the service.

use super::{FeatureRow, ModelMetadata, ModelOutput, ModelType, OutputArity, ValidationMetrics};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Feature names of the bundled model, also the fallback schema for models
/// that do not declare one.
pub const DEFAULT_FEATURES: [&str; 4] = ["Year", "Current_Avg_Price", "Income_Index", "Interest_Rate"];

/// Trait for regression models driving a forecast
#[cfg_attr(test, mockall::automock)]
pub trait RegressionModel: Send + Sync {
    /// Predict from a single row of features
    fn predict(&self, features: &FeatureRow) -> Result<ModelOutput>;

    /// Get model metadata
    fn metadata(&self) -> &ModelMetadata;

    /// Shape of every output `predict` returns
    fn output_arity(&self) -> OutputArity;

    /// Get model type
    fn model_type(&self) -> ModelType {
        self.metadata().model_type
    }
}

/// One linear output head
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearHead {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearHead {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }

    fn evaluate(&self, features: &[f64]) -> f64 {
        features
            .iter()
            .zip(self.coefficients.iter())
            .map(|(f, c)| f * c)
            .sum::<f64>()
            + self.intercept
    }
}

/// Linear Regression Model with one head (price) or two (price, material cost)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegressionModel {
    pub metadata: ModelMetadata,
    pub heads: Vec<LinearHead>,
}

impl LinearRegressionModel {
    pub fn new(heads: Vec<LinearHead>, metadata: ModelMetadata) -> Result<Self> {
        if heads.is_empty() || heads.len() > 2 {
            anyhow::bail!("Linear model needs one or two output heads, got {}", heads.len());
        }
        let n_features = metadata.feature_names.len();
        if let Some(head) = heads.iter().find(|h| h.coefficients.len() != n_features) {
            anyhow::bail!(
                "Coefficient count mismatch: {} feature names, {} coefficients",
                n_features,
                head.coefficients.len()
            );
        }
        Ok(Self { metadata, heads })
    }

    /// The model shipped with the service. Price tracks the current average
    /// price scaled by income and dampened by interest rate; material cost is
    /// roughly a third of price.
    pub fn bundled() -> Self {
        let metadata = ModelMetadata {
            model_id: "bundled_linear".to_string(),
            model_type: ModelType::LinearRegression,
            version: "1.0.0".to_string(),
            trained_at: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
            training_samples: 0,
            validation_metrics: ValidationMetrics::new(0.0, 0.0, 0.0, 0.0),
            feature_names: DEFAULT_FEATURES.iter().map(|s| s.to_string()).collect(),
        };

        Self {
            metadata,
            heads: vec![
                LinearHead::new(vec![0.0, 1_000.0, 250.0, -250.0], 0.0),
                LinearHead::new(vec![0.0, 330.0, 80.0, -50.0], 0.0),
            ],
        }
    }

    /// Create a simple model with uniform coefficients (for testing)
    pub fn dummy_model(n_features: usize) -> Self {
        let metadata = ModelMetadata {
            model_id: "dummy_linear".to_string(),
            model_type: ModelType::LinearRegression,
            version: "0.1.0".to_string(),
            trained_at: chrono::Utc::now(),
            training_samples: 1000,
            validation_metrics: ValidationMetrics::new(0.5, 0.7, 5.0, 0.85),
            feature_names: (0..n_features).map(|i| format!("feature_{}", i)).collect(),
        };

        Self {
            metadata,
            heads: vec![LinearHead::new(vec![1.0; n_features], 0.0)],
        }
    }
}

impl RegressionModel for LinearRegressionModel {
    fn predict(&self, features: &FeatureRow) -> Result<ModelOutput> {
        let expected = self.metadata.feature_names.len();
        if features.len() != expected {
            anyhow::bail!(
                "Feature count mismatch: expected {}, got {}",
                expected,
                features.len()
            );
        }

        let values = features.values();
        match self.heads.as_slice() {
            [price] => Ok(ModelOutput::Single(price.evaluate(values))),
            [price, material] => Ok(ModelOutput::Pair(
                price.evaluate(values),
                material.evaluate(values),
            )),
            _ => anyhow::bail!("Linear model has {} output heads", self.heads.len()),
        }
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn output_arity(&self) -> OutputArity {
        if self.heads.len() == 2 {
            OutputArity::Pair
        } else {
            OutputArity::Single
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(names: &[&str]) -> ModelMetadata {
        ModelMetadata {
            model_id: "test".to_string(),
            model_type: ModelType::LinearRegression,
            version: "0.1.0".to_string(),
            trained_at: chrono::Utc::now(),
            training_samples: 100,
            validation_metrics: ValidationMetrics::new(0.5, 0.7, 5.0, 0.85),
            feature_names: names.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_linear_regression_predict() {
        let model = LinearRegressionModel::new(
            vec![LinearHead::new(vec![2.0, 3.0, 1.0], 5.0)],
            metadata(&["f1", "f2", "f3"]),
        )
        .unwrap();

        let features = FeatureRow::from_pairs([("f1", 1.0), ("f2", 2.0), ("f3", 3.0)]).unwrap();

        let prediction = model.predict(&features).unwrap();
        // 2*1 + 3*2 + 1*3 + 5 = 16
        assert_eq!(prediction, ModelOutput::Single(16.0));
        assert_eq!(model.output_arity(), OutputArity::Single);
    }

    #[test]
    fn test_two_head_model_predicts_pair() {
        let model = LinearRegressionModel::new(
            vec![
                LinearHead::new(vec![1.0, 0.0], 0.0),
                LinearHead::new(vec![0.0, 2.0], 1.0),
            ],
            metadata(&["a", "b"]),
        )
        .unwrap();

        let features = FeatureRow::from_pairs([("a", 10.0), ("b", 3.0)]).unwrap();
        assert_eq!(model.predict(&features).unwrap(), ModelOutput::Pair(10.0, 7.0));
        assert_eq!(model.output_arity(), OutputArity::Pair);
    }

    #[test]
    fn test_feature_count_mismatch() {
        let model = LinearRegressionModel::dummy_model(3);
        let features = FeatureRow::from_pairs([("feature_0", 1.0)]).unwrap();
        assert!(model.predict(&features).is_err());
    }

    #[test]
    fn test_new_rejects_bad_heads() {
        assert!(LinearRegressionModel::new(vec![], metadata(&["a"])).is_err());
        assert!(LinearRegressionModel::new(
            vec![LinearHead::new(vec![1.0, 2.0], 0.0)],
            metadata(&["a"])
        )
        .is_err());
    }

    #[test]
    fn test_bundled_model() {
        let model = LinearRegressionModel::bundled();
        assert_eq!(model.output_arity(), OutputArity::Pair);
        assert_eq!(model.metadata().feature_names.len(), DEFAULT_FEATURES.len());

        let features = FeatureRow::from_pairs([
            ("Year", 2025.0),
            ("Current_Avg_Price", 100.0),
            ("Income_Index", 100.0),
            ("Interest_Rate", 5.0),
        ])
        .unwrap();
        let output = model.predict(&features).unwrap();
        // 100*1000 + 100*250 - 5*250
        assert_eq!(output.primary(), 123_750.0);
        assert!(output.secondary() > 0.0);
    }
}

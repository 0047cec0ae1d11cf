//! Machine Learning Module
//!
//! Regression models consumed by the forecast projector:
//! - Feature rows in the model's column order
//! - Tagged model outputs (price only, or price and material cost)
//! - Model metadata and validation metrics
//!
//! # Architecture
//! - `models`: the `RegressionModel` trait and the bundled linear model
//! - `loader`: artifact decoding, feature schema discovery, load-once store
//! - `smartcore`: random forest wrapper (feature `ml`)

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

pub mod loader;
pub mod models;

#[cfg(feature = "ml")]
pub mod smartcore;

/// ML Model Type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ModelType {
    LinearRegression,
    RandomForest,
    GradientBoosting,
}

/// ML Model Metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_id: String,
    pub model_type: ModelType,
    pub version: String,
    pub trained_at: chrono::DateTime<chrono::Utc>,
    pub training_samples: usize,
    pub validation_metrics: ValidationMetrics,
    pub feature_names: Vec<String>,
}

/// Validation Metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub mae: f64,  // Mean Absolute Error
    pub rmse: f64, // Root Mean Square Error
    pub mape: f64, // Mean Absolute Percentage Error
    pub r2: f64,   // R-squared
}

impl ValidationMetrics {
    pub fn new(mae: f64, rmse: f64, mape: f64, r2: f64) -> Self {
        Self {
            mae,
            rmse,
            mape,
            r2,
        }
    }

    /// Score predictions against known targets
    pub fn from_predictions(predictions: &[f64], targets: &[f64]) -> Result<Self> {
        if predictions.len() != targets.len() {
            anyhow::bail!("Prediction and target count mismatch");
        }
        if predictions.is_empty() {
            anyhow::bail!("No predictions to evaluate");
        }

        let n = predictions.len() as f64;
        let pairs = || predictions.iter().zip(targets.iter());

        let mae = pairs().map(|(p, t)| (p - t).abs()).sum::<f64>() / n;
        let rmse = (pairs().map(|(p, t)| (p - t).powi(2)).sum::<f64>() / n).sqrt();
        let mape = pairs()
            .filter(|(_, t)| t.abs() > 1e-10)
            .map(|(p, t)| ((p - t) / t).abs() * 100.0)
            .sum::<f64>()
            / n;

        let mean_target = targets.iter().sum::<f64>() / n;
        let ss_tot: f64 = targets.iter().map(|t| (t - mean_target).powi(2)).sum();
        let ss_res: f64 = pairs().map(|(p, t)| (t - p).powi(2)).sum();
        let r2 = if ss_tot.abs() < 1e-10 {
            0.0
        } else {
            1.0 - ss_res / ss_tot
        };

        Ok(Self::new(mae, rmse, mape, r2))
    }

    /// Check if metrics meet quality thresholds
    pub fn meets_quality_threshold(&self, max_mape: f64, min_r2: f64) -> bool {
        self.mape <= max_mape && self.r2 >= min_r2
    }
}

/// One row of named numeric features, in column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    feature_names: Vec<String>,
    features: Vec<f64>,
}

impl FeatureRow {
    pub fn new(features: Vec<f64>, feature_names: Vec<String>) -> Result<Self> {
        if features.len() != feature_names.len() {
            anyhow::bail!(
                "Feature count mismatch: {} features, {} names",
                features.len(),
                feature_names.len()
            );
        }
        for (i, name) in feature_names.iter().enumerate() {
            if feature_names[..i].contains(name) {
                anyhow::bail!("Duplicate feature name '{}'", name);
            }
        }
        Ok(Self {
            features,
            feature_names,
        })
    }

    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let (names, values): (Vec<String>, Vec<f64>) =
            pairs.into_iter().map(|(n, v)| (n.into(), v)).unzip();
        Self::new(values, names)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn values(&self) -> &[f64] {
        &self.features
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.index_of(name).map(|i| self.features[i])
    }

    /// Overwrite an existing feature. Returns `false` if the name is unknown.
    pub fn set(&mut self, name: &str, value: f64) -> bool {
        match self.index_of(name) {
            Some(i) => {
                self.features[i] = value;
                true
            }
            None => false,
        }
    }

    pub(crate) fn values_mut(&mut self) -> &mut [f64] {
        &mut self.features
    }

    /// Reorder into `schema` column order. The key sets must match exactly.
    pub fn aligned_to(&self, schema: &[String]) -> Result<Self, ForecastError> {
        let missing: Vec<String> = schema
            .iter()
            .filter(|name| self.index_of(name).is_none())
            .cloned()
            .collect();
        let unexpected: Vec<String> = self
            .feature_names
            .iter()
            .filter(|name| !schema.contains(name))
            .cloned()
            .collect();

        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(ForecastError::SchemaMismatch {
                missing,
                unexpected,
            });
        }

        let features = schema
            .iter()
            .filter_map(|name| self.get(name))
            .collect();
        Ok(Self {
            features,
            feature_names: schema.to_vec(),
        })
    }
}

/// Legacy year-column heuristic: the name contains "year", any case.
pub fn is_year_feature(name: &str) -> bool {
    name.to_lowercase().contains("year")
}

/// Number of quantities a model predicts per row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputArity {
    /// Housing price only
    Single,
    /// Housing price and material cost
    Pair,
}

/// A single-row prediction, tagged by shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ModelOutput {
    Single(f64),
    Pair(f64, f64),
}

impl ModelOutput {
    pub fn arity(&self) -> OutputArity {
        match self {
            ModelOutput::Single(_) => OutputArity::Single,
            ModelOutput::Pair(..) => OutputArity::Pair,
        }
    }

    pub fn primary(&self) -> f64 {
        match *self {
            ModelOutput::Single(p) | ModelOutput::Pair(p, _) => p,
        }
    }

    /// Second quantity, or 0 for single-output models
    pub fn secondary(&self) -> f64 {
        match *self {
            ModelOutput::Single(_) => 0.0,
            ModelOutput::Pair(_, s) => s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_feature_row_creation() {
        let row = FeatureRow::new(vec![1.0, 2.0, 3.0], names(&["f1", "f2", "f3"])).unwrap();
        assert_eq!(row.len(), 3);
        assert!(!row.is_empty());
        assert_eq!(row.get("f2"), Some(2.0));
        assert_eq!(row.get("nope"), None);
    }

    #[test]
    fn test_feature_row_rejects_bad_input() {
        assert!(FeatureRow::new(vec![1.0], names(&["f1", "f2"])).is_err());
        assert!(FeatureRow::new(vec![1.0, 2.0], names(&["f1", "f1"])).is_err());
    }

    #[test]
    fn test_feature_row_set() {
        let mut row = FeatureRow::from_pairs([("Year", 2025.0), ("Price", 10.0)]).unwrap();
        assert!(row.set("Price", 12.5));
        assert!(!row.set("Missing", 1.0));
        assert_eq!(row.get("Price"), Some(12.5));
    }

    #[test]
    fn test_aligned_to_reorders() {
        let row = FeatureRow::from_pairs([("b", 2.0), ("a", 1.0)]).unwrap();
        let aligned = row.aligned_to(&names(&["a", "b"])).unwrap();
        assert_eq!(aligned.names(), names(&["a", "b"]).as_slice());
        assert_eq!(aligned.values(), &[1.0, 2.0]);
    }

    #[test]
    fn test_aligned_to_reports_mismatch() {
        let row = FeatureRow::from_pairs([("a", 1.0), ("z", 9.0)]).unwrap();
        match row.aligned_to(&names(&["a", "b"])) {
            Err(ForecastError::SchemaMismatch {
                missing,
                unexpected,
            }) => {
                assert_eq!(missing, names(&["b"]));
                assert_eq!(unexpected, names(&["z"]));
            }
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_model_output_accessors() {
        let single = ModelOutput::Single(42.0);
        assert_eq!(single.primary(), 42.0);
        assert_eq!(single.secondary(), 0.0);
        assert_eq!(single.arity(), OutputArity::Single);

        let pair = ModelOutput::Pair(42.0, 7.0);
        assert_eq!(pair.secondary(), 7.0);
        assert_eq!(pair.arity(), OutputArity::Pair);
    }

    #[test]
    fn test_validation_metrics_from_predictions() {
        let metrics =
            ValidationMetrics::from_predictions(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(metrics.mae, 0.0);
        assert_eq!(metrics.rmse, 0.0);
        assert_eq!(metrics.r2, 1.0);

        assert!(ValidationMetrics::from_predictions(&[1.0], &[1.0, 2.0]).is_err());
        assert!(ValidationMetrics::from_predictions(&[], &[]).is_err());
    }

    #[test]
    fn test_validation_metrics() {
        let metrics = ValidationMetrics::new(0.5, 0.7, 5.0, 0.95);

        assert!(metrics.meets_quality_threshold(10.0, 0.9));
        assert!(!metrics.meets_quality_threshold(3.0, 0.9));
        assert!(!metrics.meets_quality_threshold(10.0, 0.97));
    }
}

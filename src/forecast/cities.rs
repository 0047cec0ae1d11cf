//! Per-city fan-out
//!
//! Every city gets an independent projection on a blocking worker. The model
//! handle is shared read-only across workers.

use std::sync::Arc;

use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{
    projector::{project_with_cancel, ProjectionRequest},
    summary::ForecastSummary,
};
use crate::{domain::CityForecast, error::ForecastError, ml::models::RegressionModel, ml::FeatureRow};

/// Split a comma separated list, dropping blanks
pub fn parse_cities(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Project `baseline` once per city. Results keep the order of `cities`.
///
/// The first failing city fails the whole call and stops the other workers
/// at their next step.
pub async fn project_cities(
    model: Arc<dyn RegressionModel>,
    cities: &[String],
    baseline: &FeatureRow,
    request: &ProjectionRequest,
    scenario_label: &str,
) -> Result<Vec<CityForecast>, ForecastError> {
    if cities.is_empty() {
        return Err(ForecastError::configuration("at least one city is required"));
    }

    let cancel = CancellationToken::new();
    let _stop_on_exit = cancel.clone().drop_guard();

    let handles = cities.iter().map(|city| {
        let model = Arc::clone(&model);
        let city = city.clone();
        let baseline = baseline.clone();
        let request = request.clone();
        let scenario = scenario_label.to_string();
        let cancel = cancel.clone();

        let handle = tokio::task::spawn_blocking(move || {
            let steps = project_with_cancel(model.as_ref(), &baseline, &request, &cancel)
                .inspect_err(|e| warn!(%city, error = %e, "city forecast failed"))?;
            let summary = ForecastSummary::from_steps(&steps, scenario);
            Ok::<_, ForecastError>(CityForecast {
                city,
                steps,
                summary,
            })
        });

        async move {
            handle
                .await
                .map_err(|e| ForecastError::Worker(e.to_string()))?
        }
    });

    let forecasts = try_join_all(handles).await?;
    info!(
        cities = forecasts.len(),
        horizon = request.horizon,
        "city forecasts complete"
    );
    Ok(forecasts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{
        loader::default_baseline, models::LinearRegressionModel, ModelMetadata, ModelOutput,
        OutputArity,
    };

    struct FailingModel(ModelMetadata);

    impl RegressionModel for FailingModel {
        fn predict(&self, _features: &FeatureRow) -> anyhow::Result<ModelOutput> {
            anyhow::bail!("model exploded")
        }

        fn metadata(&self) -> &ModelMetadata {
            &self.0
        }

        fn output_arity(&self) -> OutputArity {
            OutputArity::Single
        }
    }

    #[test]
    fn test_parse_cities() {
        assert_eq!(
            parse_cities("New York, Austin"),
            vec!["New York".to_string(), "Austin".to_string()]
        );
        assert_eq!(parse_cities(" , Paris,, "), vec!["Paris".to_string()]);
        assert!(parse_cities("").is_empty());
    }

    #[tokio::test]
    async fn test_project_cities_keeps_order() {
        let model = LinearRegressionModel::bundled();
        let baseline = default_baseline(&model.metadata.feature_names, 2025).unwrap();
        let model: Arc<dyn RegressionModel> = Arc::new(model);
        let cities = parse_cities("Lisbon, Oslo, Austin");
        let request = ProjectionRequest::new(7, 0.03);

        let forecasts = project_cities(model, &cities, &baseline, &request, "Baseline")
            .await
            .unwrap();

        let names: Vec<&str> = forecasts.iter().map(|f| f.city.as_str()).collect();
        assert_eq!(names, vec!["Lisbon", "Oslo", "Austin"]);
        for forecast in &forecasts {
            assert_eq!(forecast.steps.len(), 8);
            assert_eq!(forecast.steps[0].year, 2025);
            assert_eq!(forecast.summary.as_ref().unwrap().final_year, 2032);
        }
        assert_eq!(forecasts[0].steps, forecasts[2].steps);
    }

    #[tokio::test]
    async fn test_project_cities_propagates_failure() {
        let metadata = LinearRegressionModel::dummy_model(0).metadata;
        let model: Arc<dyn RegressionModel> = Arc::new(FailingModel(metadata));
        let baseline = FeatureRow::from_pairs(Vec::<(String, f64)>::new()).unwrap();

        let err = project_cities(
            model,
            &parse_cities("A, B"),
            &baseline,
            &ProjectionRequest::new(3, 0.0),
            "Baseline",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ForecastError::ModelInvocation { step: 0, .. }));
    }

    #[tokio::test]
    async fn test_no_cities() {
        let model: Arc<dyn RegressionModel> = Arc::new(LinearRegressionModel::bundled());
        let baseline = FeatureRow::from_pairs([("Year", 2025.0)]).unwrap();
        let err = project_cities(model, &[], &baseline, &ProjectionRequest::new(1, 0.0), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, ForecastError::Configuration(_)));
    }
}

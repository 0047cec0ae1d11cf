//! Shared service state and request resolution
//!
//! A forecast request may leave any field out; missing values come from the
//! `[forecast]` config section, then from built-in defaults.

use std::{collections::BTreeMap, path::Path, sync::Arc};

use anyhow::Result;
use chrono::Datelike;
use tracing::{info, warn};

use crate::{
    config::Config,
    domain::CityForecast,
    error::ForecastError,
    forecast::{
        estimate_uncertainty, load_history, parse_cities, project_cities, resolve_growth_rate,
        GrowthScenario, HistorySummary, ProjectionRequest, YearField,
    },
    ml::{
        loader::{default_baseline, feature_schema, ModelSource, ModelStore},
        models::RegressionModel,
        FeatureRow,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub model: Arc<dyn RegressionModel>,
    pub schema: Arc<Vec<String>>,
    pub history: Option<Arc<HistorySummary>>,
}

impl AppState {
    /// Resolve the configured model through `store` and read the optional
    /// training table.
    pub fn new(cfg: Config, store: &ModelStore) -> Result<Self> {
        let source = ModelSource::from_optional_path(cfg.model.path.as_deref());
        let model = store.get_or_load(&source)?;

        let history = cfg.model.history_csv.as_deref().and_then(|path| {
            match load_history(Path::new(path)) {
                Ok(history) => {
                    info!(path, rows = history.rows, "history table loaded");
                    Some(history)
                }
                Err(e) => {
                    warn!(path, error = %e, "ignoring unreadable history table");
                    None
                }
            }
        });

        Ok(Self::with_model(cfg, model, history))
    }

    pub fn with_model(
        cfg: Config,
        model: Arc<dyn RegressionModel>,
        history: Option<HistorySummary>,
    ) -> Self {
        let schema = feature_schema(model.as_ref());
        Self {
            cfg: Arc::new(cfg),
            model,
            schema: Arc::new(schema),
            history: history.map(Arc::new),
        }
    }

    pub fn default_start_year(&self) -> i32 {
        self.cfg
            .forecast
            .start_year
            .unwrap_or_else(|| chrono::Utc::now().year())
    }

    pub fn default_baseline(&self, start_year: i32) -> Result<FeatureRow, ForecastError> {
        default_baseline(&self.schema, start_year)
            .map_err(|e| ForecastError::configuration(e.to_string()))
    }

    /// Fill a partial request from configuration
    pub fn resolve(&self, input: ForecastInput) -> Result<ResolvedForecast, ForecastError> {
        let defaults = &self.cfg.forecast;

        let cities = match input.cities {
            Some(raw) => raw,
            None => defaults.cities.clone(),
        };
        if cities.is_empty() {
            return Err(ForecastError::configuration("at least one city is required"));
        }

        let scenario =
            GrowthScenario::parse(input.scenario.as_deref().unwrap_or(&defaults.scenario))?;
        let growth_rate = resolve_growth_rate(
            scenario,
            input.growth_override_percent.or(defaults.growth_override_percent),
        )?;
        let uncertainty = input
            .uncertainty
            .or(defaults.uncertainty)
            .unwrap_or_else(|| estimate_uncertainty(self.history.as_deref()));

        let horizon = match input.horizon {
            Some(h) => u32::try_from(h).map_err(|_| {
                ForecastError::configuration(format!("horizon must be non-negative, got {}", h))
            })?,
            None => defaults.horizon_years,
        };

        let start_year = input.start_year.unwrap_or_else(|| self.default_start_year());
        let year_field = match input.year_field.or_else(|| defaults.year_field.clone()) {
            Some(name) => YearField::Named(name),
            None => YearField::Detect,
        };

        let mut baseline = self.default_baseline(start_year)?;
        let unexpected: Vec<String> = input
            .baseline
            .iter()
            .filter_map(|(name, value)| (!baseline.set(name, *value)).then(|| name.clone()))
            .collect();
        if !unexpected.is_empty() {
            return Err(ForecastError::SchemaMismatch {
                missing: vec![],
                unexpected,
            });
        }

        let request = ProjectionRequest::new(horizon, growth_rate)
            .with_uncertainty(uncertainty)
            .with_year_field(year_field)
            .with_start_year(start_year);
        request.validate()?;

        Ok(ResolvedForecast {
            country: defaults.country.clone(),
            cities,
            baseline,
            scenario,
            request,
        })
    }

    /// Resolve and run a forecast for every requested city
    pub async fn forecast(
        &self,
        input: ForecastInput,
    ) -> Result<(ResolvedForecast, Vec<CityForecast>), ForecastError> {
        let resolved = self.resolve(input)?;
        let forecasts = project_cities(
            Arc::clone(&self.model),
            &resolved.cities,
            &resolved.baseline,
            &resolved.request,
            &resolved.scenario.to_string(),
        )
        .await?;
        Ok((resolved, forecasts))
    }
}

/// A forecast request with every field optional
#[derive(Debug, Clone, Default)]
pub struct ForecastInput {
    pub cities: Option<Vec<String>>,
    pub baseline: BTreeMap<String, f64>,
    pub horizon: Option<i64>,
    pub scenario: Option<String>,
    pub growth_override_percent: Option<f64>,
    pub uncertainty: Option<f64>,
    pub start_year: Option<i32>,
    pub year_field: Option<String>,
}

impl ForecastInput {
    pub fn with_cities_text(mut self, raw: &str) -> Self {
        self.cities = Some(parse_cities(raw));
        self
    }
}

/// A forecast request after defaults are applied
#[derive(Debug, Clone)]
pub struct ResolvedForecast {
    pub country: String,
    pub cities: Vec<String>,
    pub baseline: FeatureRow,
    pub scenario: GrowthScenario,
    pub request: ProjectionRequest,
}

use std::{collections::BTreeMap, time::Instant};

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{error::ApiError, response::ApiResponse},
    domain::CityForecast,
    forecast::{
        cities::parse_cities,
        export::{export_file_name, render_table, to_csv},
    },
    ml::{ModelMetadata, OutputArity},
    service::{AppState, ForecastInput, ResolvedForecast},
};

/// Cities as a list or as a comma separated string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CitiesInput {
    List(Vec<String>),
    Text(String),
}

impl CitiesInput {
    fn into_list(self) -> Vec<String> {
        match self {
            CitiesInput::List(list) => list
                .into_iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            CitiesInput::Text(raw) => parse_cities(&raw),
        }
    }
}

/// Body of the forecast endpoints. Every field is optional.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ForecastRequest {
    pub cities: Option<CitiesInput>,
    #[serde(default)]
    pub baseline: BTreeMap<String, f64>,
    #[validate(range(min = 0, max = 50))]
    pub horizon: Option<i64>,
    pub scenario: Option<String>,
    #[validate(range(min = -10.0, max = 15.0))]
    pub growth_override_percent: Option<f64>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub uncertainty: Option<f64>,
    pub start_year: Option<i32>,
    pub year_field: Option<String>,
}

impl From<ForecastRequest> for ForecastInput {
    fn from(req: ForecastRequest) -> Self {
        ForecastInput {
            cities: req.cities.map(CitiesInput::into_list),
            baseline: req.baseline,
            horizon: req.horizon,
            scenario: req.scenario,
            growth_override_percent: req.growth_override_percent,
            uncertainty: req.uncertainty,
            start_year: req.start_year,
            year_field: req.year_field,
        }
    }
}

/// Forecast results for all requested cities
#[derive(Debug, Serialize)]
pub struct ForecastResponse {
    pub forecast_id: Uuid,
    pub country: String,
    pub scenario: String,
    pub growth_rate: f64,
    pub uncertainty: f64,
    pub start_year: i32,
    pub forecasts: Vec<CityForecast>,
}

impl ForecastResponse {
    fn new(resolved: ResolvedForecast, forecasts: Vec<CityForecast>) -> Self {
        Self {
            forecast_id: Uuid::new_v4(),
            country: resolved.country,
            scenario: resolved.scenario.to_string(),
            growth_rate: resolved.request.growth_rate,
            uncertainty: resolved.request.uncertainty,
            start_year: resolved.request.start_year,
            forecasts,
        }
    }
}

/// What a client needs to build a baseline form
#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub metadata: ModelMetadata,
    pub output_arity: OutputArity,
    pub features: Vec<String>,
    pub default_baseline: BTreeMap<String, f64>,
}

async fn run(
    state: &AppState,
    req: ForecastRequest,
) -> Result<(ResolvedForecast, Vec<CityForecast>), ApiError> {
    req.validate()?;
    Ok(state.forecast(req.into()).await?)
}

/// GET /api/v1/model - Model metadata and feature schema
pub async fn get_model(State(state): State<AppState>) -> Result<ApiResponse<ModelInfo>, ApiError> {
    let baseline = state.default_baseline(state.default_start_year())?;
    let default_baseline = baseline
        .names()
        .iter()
        .cloned()
        .zip(baseline.values().iter().copied())
        .collect();

    Ok(ApiResponse::success(ModelInfo {
        metadata: state.model.metadata().clone(),
        output_arity: state.model.output_arity(),
        features: state.schema.as_ref().clone(),
        default_baseline,
    }))
}

/// POST /api/v1/forecast - Forecast every requested city
pub async fn post_forecast(
    State(state): State<AppState>,
    Json(req): Json<ForecastRequest>,
) -> Result<ApiResponse<ForecastResponse>, ApiError> {
    let started = Instant::now();
    let (resolved, forecasts) = run(&state, req).await?;
    let count = forecasts.len();

    Ok(ApiResponse::success(ForecastResponse::new(resolved, forecasts))
        .with_count(count)
        .with_duration(started.elapsed().as_millis() as u64))
}

/// POST /api/v1/forecast/csv - Forecast as a CSV download
pub async fn post_forecast_csv(
    State(state): State<AppState>,
    Json(req): Json<ForecastRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (resolved, forecasts) = run(&state, req).await?;
    let body = to_csv(&forecasts)?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_file_name(resolved.request.start_year)
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

/// POST /api/v1/forecast/table - Forecast as a plain text table
pub async fn post_forecast_table(
    State(state): State<AppState>,
    Json(req): Json<ForecastRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (_, forecasts) = run(&state, req).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        render_table(&forecasts),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_accepts_city_text_or_list() {
        let req: ForecastRequest =
            serde_json::from_str(r#"{"cities": "New York, Austin"}"#).unwrap();
        let input: ForecastInput = req.into();
        assert_eq!(input.cities.unwrap().len(), 2);

        let req: ForecastRequest =
            serde_json::from_str(r#"{"cities": [" Oslo ", ""], "horizon": 8}"#).unwrap();
        let input: ForecastInput = req.into();
        assert_eq!(input.cities, Some(vec!["Oslo".to_string()]));
        assert_eq!(input.horizon, Some(8));
    }

    #[test]
    fn test_request_validation() {
        let ok: ForecastRequest = serde_json::from_str(r#"{"horizon": 10}"#).unwrap();
        assert!(ok.validate().is_ok());

        let too_far: ForecastRequest = serde_json::from_str(r#"{"horizon": 51}"#).unwrap();
        assert!(too_far.validate().is_err());

        let negative: ForecastRequest = serde_json::from_str(r#"{"horizon": -1}"#).unwrap();
        assert!(negative.validate().is_err());

        let wild: ForecastRequest =
            serde_json::from_str(r#"{"growth_override_percent": 30.0}"#).unwrap();
        assert!(wild.validate().is_err());
    }
}

//! Multi-year forecast projection
//!
//! Starting from a baseline feature row, each step asks the model for a
//! prediction, records it with a linearly widening band, then advances the
//! row one year: the year column moves forward by 1 and every other feature
//! compounds by `1 + growth_rate`.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    domain::ProjectionStep,
    error::ForecastError,
    ml::{is_year_feature, models::RegressionModel, FeatureRow},
};

/// Band-widening coefficient used when the caller has no better estimate
pub const DEFAULT_UNCERTAINTY: f64 = 0.05;

/// Which feature, if any, holds the calendar year
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearField {
    /// First feature whose name contains "year", any case
    #[default]
    Detect,
    Named(String),
    /// No year feature; years count up from `start_year`
    Absent,
}

impl YearField {
    fn resolve(&self, row: &FeatureRow) -> Result<Option<usize>, ForecastError> {
        match self {
            YearField::Detect => Ok(row.names().iter().position(|n| is_year_feature(n))),
            YearField::Named(name) => row.index_of(name).map(Some).ok_or_else(|| {
                ForecastError::configuration(format!("year field '{}' is not a feature", name))
            }),
            YearField::Absent => Ok(None),
        }
    }
}

/// Parameters of a single projection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionRequest {
    /// Years projected past the baseline; the run yields `horizon + 1` steps
    pub horizon: u32,
    /// Per-year multiplicative change of every non-year feature
    pub growth_rate: f64,
    pub uncertainty: f64,
    pub year_field: YearField,
    /// First year when no year field exists
    pub start_year: i32,
}

impl ProjectionRequest {
    pub fn new(horizon: u32, growth_rate: f64) -> Self {
        use chrono::Datelike;
        Self {
            horizon,
            growth_rate,
            uncertainty: DEFAULT_UNCERTAINTY,
            year_field: YearField::default(),
            start_year: chrono::Utc::now().year(),
        }
    }

    pub fn with_uncertainty(mut self, uncertainty: f64) -> Self {
        self.uncertainty = uncertainty;
        self
    }

    pub fn with_year_field(mut self, year_field: YearField) -> Self {
        self.year_field = year_field;
        self
    }

    pub fn with_start_year(mut self, start_year: i32) -> Self {
        self.start_year = start_year;
        self
    }

    pub fn validate(&self) -> Result<(), ForecastError> {
        if !self.growth_rate.is_finite() || self.growth_rate <= -1.0 {
            return Err(ForecastError::configuration(format!(
                "growth rate must be finite and greater than -1, got {}",
                self.growth_rate
            )));
        }
        if !self.uncertainty.is_finite() || self.uncertainty < 0.0 {
            return Err(ForecastError::configuration(format!(
                "uncertainty must be finite and non-negative, got {}",
                self.uncertainty
            )));
        }
        Ok(())
    }
}

/// Project `baseline` forward `request.horizon` years.
///
/// Any model failure aborts the run; no partial sequence is returned.
pub fn project(
    model: &dyn RegressionModel,
    baseline: &FeatureRow,
    request: &ProjectionRequest,
) -> Result<Vec<ProjectionStep>, ForecastError> {
    run(model, baseline, request, None)
}

/// Like [`project`], checking `cancel` before every step.
pub fn project_with_cancel(
    model: &dyn RegressionModel,
    baseline: &FeatureRow,
    request: &ProjectionRequest,
    cancel: &CancellationToken,
) -> Result<Vec<ProjectionStep>, ForecastError> {
    run(model, baseline, request, Some(cancel))
}

fn run(
    model: &dyn RegressionModel,
    baseline: &FeatureRow,
    request: &ProjectionRequest,
    cancel: Option<&CancellationToken>,
) -> Result<Vec<ProjectionStep>, ForecastError> {
    request.validate()?;

    if let Some(name) = baseline
        .names()
        .iter()
        .zip(baseline.values())
        .find_map(|(name, v)| (!v.is_finite()).then_some(name))
    {
        return Err(ForecastError::configuration(format!(
            "baseline feature '{}' is not a finite number",
            name
        )));
    }

    let schema = &model.metadata().feature_names;
    let mut row = if schema.is_empty() {
        baseline.clone()
    } else {
        baseline.aligned_to(schema)?
    };

    let year_idx = request.year_field.resolve(&row)?;
    let arity = model.output_arity();

    debug!(
        model_id = %model.metadata().model_id,
        horizon = request.horizon,
        growth_rate = request.growth_rate,
        uncertainty = request.uncertainty,
        year_field = year_idx.map(|i| row.names()[i].as_str()),
        "starting projection"
    );

    let mut steps = Vec::with_capacity(request.horizon as usize + 1);
    for step in 0..=request.horizon {
        if cancel.is_some_and(|token| token.is_cancelled()) {
            return Err(ForecastError::Cancelled { step });
        }

        let output = model
            .predict(&row)
            .map_err(|source| ForecastError::ModelInvocation { step, source })?;
        if output.arity() != arity {
            return Err(ForecastError::ModelInvocation {
                step,
                source: anyhow::anyhow!(
                    "model declared {:?} output but returned {:?}",
                    arity,
                    output.arity()
                ),
            });
        }

        let year = match year_idx {
            Some(i) => row.values()[i].trunc() as i32,
            None => i32::try_from(step)
                .map(|s| request.start_year.saturating_add(s))
                .unwrap_or(i32::MAX),
        };

        steps.push(ProjectionStep::with_band(
            year,
            output.primary(),
            output.secondary(),
            request.uncertainty,
            step,
        ));

        if step < request.horizon {
            advance(&mut row, year_idx, request.growth_rate);
        }
    }

    debug!(steps = steps.len(), "projection complete");
    Ok(steps)
}

/// Move the row one year forward in place
fn advance(row: &mut FeatureRow, year_idx: Option<usize>, growth_rate: f64) {
    let factor = 1.0 + growth_rate;
    for (i, value) in row.values_mut().iter_mut().enumerate() {
        if Some(i) == year_idx {
            *value += 1.0;
        } else {
            *value *= factor;
        }
    }
}

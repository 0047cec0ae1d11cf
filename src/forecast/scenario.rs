//! Growth scenarios and the uncertainty band coefficient

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::projector::DEFAULT_UNCERTAINTY;
use crate::error::ForecastError;

/// Band coefficient once historical training data backs the model
pub const HISTORY_UNCERTAINTY: f64 = 0.08;

/// Allowed range for a custom growth override, in percent
pub const GROWTH_OVERRIDE_RANGE: std::ops::RangeInclusive<f64> = -10.0..=15.0;

/// Named market outlook
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum GrowthScenario {
    Pessimistic,
    #[default]
    Baseline,
    Optimistic,
}

impl GrowthScenario {
    /// Annual growth rate as a fraction
    pub fn growth_rate(&self) -> f64 {
        match self {
            Self::Pessimistic => -0.02,
            Self::Baseline => 0.03,
            Self::Optimistic => 0.07,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ForecastError> {
        raw.trim()
            .parse()
            .map_err(|_| ForecastError::configuration(format!("unknown growth scenario '{}'", raw)))
    }
}

/// Growth rate for a run: the override (in percent) if given, else the scenario's rate.
pub fn resolve_growth_rate(
    scenario: GrowthScenario,
    override_percent: Option<f64>,
) -> Result<f64, ForecastError> {
    match override_percent {
        None => Ok(scenario.growth_rate()),
        Some(pct) if GROWTH_OVERRIDE_RANGE.contains(&pct) => Ok(pct / 100.0),
        Some(pct) => Err(ForecastError::configuration(format!(
            "growth override {}% outside [{}, {}]",
            pct,
            GROWTH_OVERRIDE_RANGE.start(),
            GROWTH_OVERRIDE_RANGE.end()
        ))),
    }
}

/// Historical training table shipped next to a model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySummary {
    pub columns: Vec<String>,
    pub rows: usize,
}

/// Read a training CSV just far enough to know it holds data
pub fn load_history(path: &Path) -> anyhow::Result<HistorySummary> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening history file {}", path.display()))?;

    let columns: Vec<String> = reader
        .headers()
        .with_context(|| format!("reading header of {}", path.display()))?
        .iter()
        .map(str::to_string)
        .collect();
    if columns.is_empty() {
        anyhow::bail!("history file {} is empty", path.display());
    }

    let mut rows = 0;
    for record in reader.records() {
        record.with_context(|| format!("reading row {} of {}", rows + 1, path.display()))?;
        rows += 1;
    }
    if rows == 0 {
        anyhow::bail!("history file {} has a header but no rows", path.display());
    }

    Ok(HistorySummary { columns, rows })
}

/// Band coefficient for a run. Any historical data widens the band.
pub fn estimate_uncertainty(history: Option<&HistorySummary>) -> f64 {
    match history {
        Some(_) => HISTORY_UNCERTAINTY,
        None => DEFAULT_UNCERTAINTY,
    }
}

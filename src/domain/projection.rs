use serde::{Deserialize, Serialize};

use crate::forecast::summary::ForecastSummary;

/// One simulated year of a forecast
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionStep {
    #[serde(rename = "Year")]
    pub year: i32,
    /// Predicted housing price
    #[serde(rename = "Housing Price")]
    pub primary_value: f64,
    /// Predicted material cost, 0 for price-only models
    #[serde(rename = "Material Cost")]
    pub secondary_value: f64,
    #[serde(rename = "Lower Bound")]
    pub lower_bound: f64,
    #[serde(rename = "Upper Bound")]
    pub upper_bound: f64,
}

impl ProjectionStep {
    /// Build a step with a band widening linearly in `step_index`.
    /// Bounds are not clamped and go negative once
    /// `uncertainty * step_index > 1`.
    pub fn with_band(
        year: i32,
        primary_value: f64,
        secondary_value: f64,
        uncertainty: f64,
        step_index: u32,
    ) -> Self {
        let spread = uncertainty * f64::from(step_index);
        Self {
            year,
            primary_value,
            secondary_value,
            lower_bound: primary_value * (1.0 - spread),
            upper_bound: primary_value * (1.0 + spread),
        }
    }

    pub fn band_width(&self) -> f64 {
        self.upper_bound - self.lower_bound
    }
}

/// Forecast for one target city
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityForecast {
    pub city: String,
    pub steps: Vec<ProjectionStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ForecastSummary>,
}

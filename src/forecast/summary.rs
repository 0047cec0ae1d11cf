use serde::{Deserialize, Serialize};

use crate::domain::ProjectionStep;

/// Headline figures of one city's forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub current_price: f64,
    pub final_year: i32,
    pub final_price: f64,
    /// `None` when the current price is zero
    pub total_growth_percent: Option<f64>,
    pub scenario: String,
}

impl ForecastSummary {
    pub fn from_steps(steps: &[ProjectionStep], scenario: impl Into<String>) -> Option<Self> {
        let first = steps.first()?;
        let last = steps.last()?;

        let total_growth_percent = (first.primary_value != 0.0)
            .then(|| (last.primary_value / first.primary_value - 1.0) * 100.0);

        Some(Self {
            current_price: first.primary_value,
            final_year: last.year,
            final_price: last.primary_value,
            total_growth_percent,
            scenario: scenario.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(year: i32, price: f64) -> ProjectionStep {
        ProjectionStep::with_band(year, price, 0.0, 0.0, 0)
    }

    #[test]
    fn test_summary_kpis() {
        let steps = vec![step(2025, 200.0), step(2026, 210.0), step(2027, 250.0)];
        let summary = ForecastSummary::from_steps(&steps, "Baseline").unwrap();

        assert_eq!(summary.current_price, 200.0);
        assert_eq!(summary.final_year, 2027);
        assert_eq!(summary.final_price, 250.0);
        assert!((summary.total_growth_percent.unwrap() - 25.0).abs() < 1e-9);
        assert_eq!(summary.scenario, "Baseline");
    }

    #[test]
    fn test_summary_of_nothing() {
        assert!(ForecastSummary::from_steps(&[], "Baseline").is_none());
    }

    #[test]
    fn test_zero_start_price_has_no_growth_figure() {
        let steps = vec![step(2025, 0.0), step(2026, 10.0)];
        let summary = ForecastSummary::from_steps(&steps, "Optimistic").unwrap();
        assert_eq!(summary.total_growth_percent, None);
    }
}

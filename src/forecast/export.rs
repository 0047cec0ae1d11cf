//! Tabular output: CSV download and a fixed-width text table

use anyhow::Result;
use itertools::Itertools;
use serde::Serialize;

use crate::domain::{CityForecast, ProjectionStep};

pub const CSV_HEADER: [&str; 6] = [
    "Year",
    "Housing Price",
    "Material Cost",
    "Lower Bound",
    "Upper Bound",
    "City",
];

pub fn export_file_name(start_year: i32) -> String {
    format!("housing_forecast_{}.csv", start_year)
}

/// One exported line: a step tagged with its city
#[derive(Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Year")]
    year: i32,
    #[serde(rename = "Housing Price")]
    primary_value: f64,
    #[serde(rename = "Material Cost")]
    secondary_value: f64,
    #[serde(rename = "Lower Bound")]
    lower_bound: f64,
    #[serde(rename = "Upper Bound")]
    upper_bound: f64,
    #[serde(rename = "City")]
    city: &'a str,
}

impl<'a> ExportRow<'a> {
    fn new(step: &ProjectionStep, city: &'a str) -> Self {
        Self {
            year: step.year,
            primary_value: step.primary_value,
            secondary_value: step.secondary_value,
            lower_bound: step.lower_bound,
            upper_bound: step.upper_bound,
            city,
        }
    }
}

/// All cities stacked into one CSV, one row per step. The header is written
/// even when there are no rows.
pub fn to_csv(forecasts: &[CityForecast]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for forecast in forecasts {
        for step in &forecast.steps {
            writer.serialize(ExportRow::new(step, &forecast.city))?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV: {}", e))?;
    Ok(String::from_utf8(bytes)?)
}

/// `$1,234.56`; negatives as `-$1,234.56`
pub fn format_currency(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let grouped = whole
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| String::from_utf8_lossy(chunk))
        .join(",");

    // -0.004 rounds to 0.00 and prints unsigned
    let sign = if value < 0.0 && fixed.bytes().any(|b| b.is_ascii_digit() && b != b'0') {
        "-"
    } else {
        ""
    };
    format!("{}${}.{}", sign, grouped, cents)
}

/// Fixed-width table with currency formatting, one block per city
pub fn render_table(forecasts: &[CityForecast]) -> String {
    let mut out = String::new();
    for forecast in forecasts {
        out.push_str(&format!("{}\n", forecast.city));
        out.push_str(&format!(
            "{:>6}  {:>16}  {:>16}  {:>16}  {:>16}\n",
            CSV_HEADER[0], CSV_HEADER[1], CSV_HEADER[2], CSV_HEADER[3], CSV_HEADER[4]
        ));
        for step in &forecast.steps {
            out.push_str(&table_row(step));
        }
        out.push('\n');
    }
    out
}

fn table_row(step: &ProjectionStep) -> String {
    format!(
        "{:>6}  {:>16}  {:>16}  {:>16}  {:>16}\n",
        step.year,
        format_currency(step.primary_value),
        format_currency(step.secondary_value),
        format_currency(step.lower_bound),
        format_currency(step.upper_bound)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn forecast(city: &str) -> CityForecast {
        CityForecast {
            city: city.to_string(),
            steps: vec![
                ProjectionStep::with_band(2025, 100.0, 30.0, 0.05, 0),
                ProjectionStep::with_band(2026, 110.0, 33.0, 0.05, 1),
            ],
            summary: None,
        }
    }

    #[test]
    fn test_csv_layout() {
        let csv = to_csv(&[forecast("Austin"), forecast("New York")]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 5);
        assert_eq!(
            lines[0],
            "Year,Housing Price,Material Cost,Lower Bound,Upper Bound,City"
        );
        assert!(lines[1].starts_with("2025,"));
        assert!(lines[1].ends_with(",Austin"));
        assert!(lines[4].ends_with(",New York"));
    }

    #[test]
    fn test_csv_values_read_back() {
        let text = to_csv(&[forecast("Austin")]).unwrap();
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();

        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[1][0], "2026");
        let price: f64 = rows[1][1].parse().unwrap();
        let lower: f64 = rows[1][3].parse().unwrap();
        assert_eq!(price, 110.0);
        assert!((lower - 104.5).abs() < 1e-9);
        assert_eq!(&rows[1][5], "Austin");
    }

    #[test]
    fn test_csv_quotes_city() {
        let text = to_csv(&[forecast("Portland, \"OR\"")]).unwrap();
        assert!(text.lines().nth(1).unwrap().ends_with(",\"Portland, \"\"OR\"\"\""));

        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let first = reader.records().next().unwrap().unwrap();
        assert_eq!(first.len(), 6);
        assert_eq!(&first[5], "Portland, \"OR\"");
    }

    #[test]
    fn test_empty_export_keeps_header() {
        let csv = to_csv(&[]).unwrap();
        assert_eq!(
            csv,
            "Year,Housing Price,Material Cost,Lower Bound,Upper Bound,City\n"
        );
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name(2026), "housing_forecast_2026.csv");
    }

    #[rstest]
    #[case(0.0, "$0.00")]
    #[case(5.5, "$5.50")]
    #[case(999.999, "$1,000.00")]
    #[case(1234567.891, "$1,234,567.89")]
    #[case(-2500.0, "-$2,500.00")]
    #[case(-0.001, "$0.00")]
    fn test_format_currency(#[case] value: f64, #[case] expected: &str) {
        assert_eq!(format_currency(value), expected);
    }

    #[test]
    fn test_render_table() {
        let table = render_table(&[forecast("Austin")]);
        assert!(table.starts_with("Austin\n"));
        assert!(table.contains("$110.00"));
        assert!(table.contains("$104.50"));
    }
}

use anyhow::Result;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub enable_cors: bool,
}

fn default_request_timeout() -> u64 { 30 }

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

/// Where the model and its optional training table live. No path means the
/// bundled model.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelConfig {
    pub path: Option<String>,
    pub history_csv: Option<String>,
}

/// Defaults applied to forecast requests that leave a field out
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub country: String,
    pub cities: Vec<String>,
    pub horizon_years: u32,
    /// Current year when unset
    pub start_year: Option<i32>,
    pub scenario: String,
    pub growth_override_percent: Option<f64>,
    /// Derived from `model.history_csv` when unset
    pub uncertainty: Option<f64>,
    /// Legacy detection when unset
    pub year_field: Option<String>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            country: "United States".to_string(),
            cities: vec!["New York".to_string(), "Austin".to_string()],
            horizon_years: 7,
            start_year: None,
            scenario: "baseline".to_string(),
            growth_override_percent: None,
            uncertainty: None,
            year_field: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("HOUSING__").split("__"));
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        Ok(figment.extract()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let figment = Figment::new().merge(Toml::string(
            r#"
            [server]
            host = "127.0.0.1"
            port = 8080
            "#,
        ));
        let cfg = Config::from_figment(figment).unwrap();

        assert_eq!(cfg.server.request_timeout_secs, 30);
        assert!(cfg.model.path.is_none());
        assert_eq!(cfg.forecast.horizon_years, 7);
        assert_eq!(cfg.forecast.cities.len(), 2);
        assert_eq!(cfg.server.socket_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_forecast_overrides() {
        let figment = Figment::new().merge(Toml::string(
            r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [model]
            path = "models/rf.json"

            [forecast]
            cities = ["Lisbon"]
            horizon_years = 10
            scenario = "optimistic"
            growth_override_percent = 4.5
            year_field = "Year"
            "#,
        ));
        let cfg = Config::from_figment(figment).unwrap();

        assert_eq!(cfg.model.path.as_deref(), Some("models/rf.json"));
        assert_eq!(cfg.forecast.cities, vec!["Lisbon".to_string()]);
        assert_eq!(cfg.forecast.horizon_years, 10);
        assert_eq!(cfg.forecast.growth_override_percent, Some(4.5));
        assert_eq!(cfg.forecast.country, "United States");
    }

    #[test]
    fn test_missing_server_section_fails() {
        let figment = Figment::new().merge(Toml::string("[forecast]\nhorizon_years = 8\n"));
        assert!(Config::from_figment(figment).is_err());
    }
}

//! Housing price and material cost forecasting.
//!
//! [`forecast::project`] is the core: it walks a baseline feature row forward
//! year by year through a [`ml::models::RegressionModel`]. The rest of the
//! crate loads models, resolves scenarios, fans out per city and serves the
//! results over HTTP.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod ml;
pub mod service;
pub mod telemetry;

pub use error::{ForecastError, ModelLoadError};

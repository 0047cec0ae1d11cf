use axum::{
    routing::{get, post},
    Router,
};

use crate::{
    api::forecast::{get_model, post_forecast, post_forecast_csv, post_forecast_table},
    service::AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/model", get(get_model))
        .route("/forecast", post(post_forecast))
        .route("/forecast/csv", post(post_forecast_csv))
        .route("/forecast/table", post(post_forecast_table))
        .with_state(state)
}

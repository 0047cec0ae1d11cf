use anyhow::Result;
use housing_forecast::{api, config, ml::loader::ModelStore, service::AppState, telemetry};
use config::Config;
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = Config::load()?;

    let store = ModelStore::new();
    let app_state = AppState::new(cfg.clone(), &store)?;
    info!(
        model_id = %app_state.model.metadata().model_id,
        features = ?app_state.schema,
        "model ready"
    );

    let app = api::router(app_state, &cfg);
    let addr = cfg.server.socket_addr()?;

    if cfg.server.host == "0.0.0.0" {
        warn!("Server binding to 0.0.0.0 - forecast API will be reachable from the network");
    }

    info!(%addr, "starting housing forecast service");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    warn!("shutdown complete");
    Ok(())
}

use park_flow::forecast::ForecastRun;
use park_flow::{api, artifacts, config, state};
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tracing::Level;

fn init_tracing(level: Level) {
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn parse_level(raw: &str) -> Level {
    raw.parse().unwrap_or(Level::INFO)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match config::load_default() {
        Ok(config) => config,
        Err(err) => {
            init_tracing(Level::INFO);
            tracing::error!(
                config_path = config::DEFAULT_CONFIG_PATH,
                error = %err,
                "Failed to load config"
            );
            return Err(err.into());
        }
    };
    init_tracing(parse_level(config.log_level()));
    tracing::info!(
        config_path = config::DEFAULT_CONFIG_PATH,
        app = %config.app.name,
        "park-flow starting"
    );

    let mut app_state = state::AppState::new();
    app_state.set_workers(config.workers());
    app_state.set_trend_points(config.trend_points());

    match config.artifact_paths() {
        Some(paths) => match artifacts::load_from_paths(&paths, config.cadence()) {
            Ok(store) => app_state.set_store(Arc::new(store)),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to load artifacts, forecasts unavailable");
            }
        },
        None => {
            tracing::warn!("No artifact paths configured in [artifacts], forecasts unavailable");
        }
    }

    tokio::spawn(log_forecast_runs(app_state.subscribe_latest()));
    let state = Arc::new(RwLock::new(app_state));

    let app = api::router(Arc::clone(&state));
    let port = config.server_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, workers = config.workers(), "API server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn log_forecast_runs(mut runs: watch::Receiver<Option<Arc<ForecastRun>>>) {
    while runs.changed().await.is_ok() {
        let latest = runs.borrow_and_update().clone();
        if let Some(run) = latest {
            tracing::info!(
                target_time = %run.target,
                steps = run.steps,
                forecasted = run.availability.bundles.len(),
                failed = run.availability.failures.len(),
                "Latest forecast updated"
            );
        }
    }
}

use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use titanic_predictor::{
    config::Settings,
    http::{self, AppState},
    load_model, FeatureVector, PredictionService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("failed to load settings")?;

    let default_level = if settings.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let model = load_model(&settings.model_path)
        .with_context(|| format!("failed to load model from {}", settings.model_path))?;
    tracing::info!("loaded model: {}", model.describe());

    // Warmup on a typical passenger (3rd class, male, default age, Southampton)
    let warm = FeatureVector([3.0, 0.0, titanic_predictor::DEFAULT_AGE, 13.68, 0.0, 0.0, 1.0]);
    let p = model
        .predict_probability(&warm)
        .context("warmup prediction failed")?;
    tracing::info!("warmup forward ok (p={:.4})", p);

    if settings.debug {
        tracing::warn!("DEBUG is on; internal errors are returned to clients");
    }
    if settings.allowed_hosts.iter().any(|h| h == "*") {
        tracing::warn!("ALLOWED_HOSTS contains '*'; host header is not checked");
    }

    let addr = settings.socket_addr()?;
    let service = PredictionService::new(model).with_prediction_logging(settings.log_predictions);
    let app = http::router(AppState {
        service,
        settings: Arc::new(settings),
    });

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

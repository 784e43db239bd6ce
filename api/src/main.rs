use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use pads_api::AppState;
use pads_api::config::Settings;
use pads_api::routes;

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pads_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let settings = Settings::from_env().context("Invalid configuration")?;
    tokio::fs::create_dir_all(&settings.upload_dir)
        .await
        .with_context(|| format!("Failed to create {:?}", settings.upload_dir))?;

    let addr = format!("{}:{}", settings.host, settings.port);
    let state = Arc::new(AppState::from_settings(settings).context("Failed to load classifier")?);
    tracing::info!(
        model = state.analyzer.model_id(),
        sampling = ?state.analyzer.sampling(),
        upload_dir = %state.settings.upload_dir.display(),
        "Analyzer ready"
    );

    let app = routes::build_app(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    tracing::info!("Server stopped, classifier released");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

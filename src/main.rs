mod api;
mod collector;
mod config;
mod db;
mod duplicates;
mod errors;
mod ingest;
mod system;

use std::sync::Arc;

use anyhow::Context;
use axum::routing::get;
use axum::Router;
use axum_prometheus::PrometheusMetricLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::api::create_api_router;
use crate::collector::CollectorClient;
use crate::config::{HostRewrite, Settings};
use crate::db::Store;

#[derive(Clone)]
pub struct InnerState {
    pub store: Store,
    pub collector: CollectorClient,
    pub host_rewrites: Arc<[HostRewrite]>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "video_catalog=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env().context("Failed to read configuration")?;

    let store = Store::open(&settings.database)
        .await
        .context("Failed to initialize the video store")?;
    if let Some(path) = &settings.seed_dump_path {
        let report = ingest::import_text_dump_file(&store.videos(), path).await;
        tracing::info!(path = %path.display(), imported = report.imported, "Seed dump processed");
    }

    let collector =
        CollectorClient::new(&settings.collector).context("Failed to build collector client")?;

    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    let app_state = InnerState {
        store: store.clone(),
        collector,
        host_rewrites: Arc::from(settings.collector.host_rewrites.clone()),
    };

    let app = Router::new()
        .route("/metrics", get(|| async move { metric_handle.render() }))
        .merge(create_api_router(app_state))
        .layer(prometheus_layer);

    let listener = tokio::net::TcpListener::bind(&settings.bind_address)
        .await
        .with_context(|| format!("Could not bind {}", settings.bind_address))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server stopped unexpectedly")?;

    store.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

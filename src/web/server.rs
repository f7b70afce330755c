use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use super::api::{self, AppState};
use crate::config::Config;
use crate::nlp::{GibbsTrainer, HttpReviewSource, Preprocessor, TopicPipeline};
use crate::training::JobCoordinator;

/// Build the full application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router().with_state(state)
}

/// Production collaborators: HTTP scraper and the Gibbs sampler.
pub fn default_pipeline(config: &Config) -> TopicPipeline {
    TopicPipeline {
        source: Arc::new(HttpReviewSource::new(&config.scraper)),
        trainer: Arc::new(GibbsTrainer::new(
            config.policy.iterations,
            config.policy.seed,
        )),
        preprocessor: Arc::new(Preprocessor::default()),
        review_limit: config.scraper.review_limit,
    }
}

/// Start the studio server and run until Ctrl+C.
///
/// `on_ready` is called with the bound address once the listener is up.
pub async fn start_server(config: Config, on_ready: impl FnOnce(SocketAddr)) -> Result<()> {
    let coordinator = JobCoordinator::new(&config, default_pipeline(&config));
    let state = Arc::new(AppState { coordinator });

    let mut app = build_router(state);

    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(
        addr = %local_addr,
        state_dir = %config.state_dir.display(),
        max_concurrent = config.limits.max_concurrent,
        "studio server listening"
    );
    on_ready(local_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

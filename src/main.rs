use std::process::ExitCode;
use std::sync::Arc;

use event_gate::admission::{AdmissionPipeline, LoggingProcessor};
use event_gate::config::GateConfig;
use event_gate::dedupe::DedupeCache;
use event_gate::server::{AppState, build_router};
use event_gate::webhooks::SignatureVerifier;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "event_gate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match GateConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        bind_addr = %config.bind_addr,
        cache_capacity = config.cache.capacity,
        cache_ttl_secs = config.cache.ttl.as_secs(),
        handled_events = ?config.pipeline.handled_event_types,
        "Starting event gate"
    );

    let pipeline = AdmissionPipeline::new(
        SignatureVerifier::new(config.signing_secret.clone()),
        Arc::new(DedupeCache::with_config(config.cache)),
        LoggingProcessor,
        config.pipeline.clone(),
    );
    let app = build_router(AppState::new(pipeline), config.max_body_bytes);

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(bind_addr = %config.bind_addr, error = %e, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("listening on {}", config.bind_addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    tracing::info!("Shut down");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
}

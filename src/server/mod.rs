//! HTTP front door for Slack event deliveries.
//!
//! This module implements the HTTP server that:
//! - Accepts Slack Events API deliveries, verifies and deduplicates them, and
//!   acknowledges before any processing happens
//! - Provides an admission statistics endpoint for observability
//! - Provides health checks for liveness probes
//!
//! # Endpoints
//!
//! - `POST /slack/events` - Accepts Slack deliveries (returns 200 on admission or drop)
//! - `GET /api/v1/admission/stats` - Returns outcome counters as JSON
//! - `GET /health` - Returns 200 if server is running

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;

use crate::admission::{AdmissionPipeline, EventProcessor};

pub mod health;
pub mod stats;
pub mod webhook;

pub use health::health_handler;
pub use stats::stats_handler;
pub use webhook::slack_events_handler;

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
pub struct AppState<P> {
    pipeline: Arc<AdmissionPipeline<P>>,
}

impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        AppState {
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

impl<P: EventProcessor> AppState<P> {
    pub fn new(pipeline: AdmissionPipeline<P>) -> Self {
        Self::from_shared(Arc::new(pipeline))
    }

    /// Wraps a pipeline that is also held elsewhere.
    pub fn from_shared(pipeline: Arc<AdmissionPipeline<P>>) -> Self {
        AppState { pipeline }
    }

    pub fn pipeline(&self) -> &AdmissionPipeline<P> {
        &self.pipeline
    }
}

/// Builds the axum Router with all endpoints.
///
/// Request bodies larger than `max_body_bytes` are refused with 413 before
/// they reach the pipeline.
pub fn build_router<P: EventProcessor>(
    app_state: AppState<P>,
    max_body_bytes: usize,
) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/slack/events", post(slack_events_handler::<P>))
        .route("/api/v1/admission/stats", get(stats_handler::<P>))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(app_state)
}

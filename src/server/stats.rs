//! Admission statistics endpoint for observability.
//!
//! Provides a read-only view of pipeline outcome counters and cache occupancy.

use axum::Json;
use axum::extract::State;

use super::AppState;
use crate::admission::{EventProcessor, StatsSnapshot};

/// Stats handler.
///
/// # Example
///
/// ```ignore
/// GET /api/v1/admission/stats HTTP/1.1
///
/// HTTP/1.1 200 OK
/// Content-Type: application/json
///
/// {
///   "accepted": 12,
///   "duplicates_dropped": 3,
///   ...
///   "cache_size": 12,
///   "cache_capacity": 1000
/// }
/// ```
pub async fn stats_handler<P: EventProcessor>(
    State(app_state): State<AppState<P>>,
) -> Json<StatsSnapshot> {
    Json(app_state.pipeline().stats())
}

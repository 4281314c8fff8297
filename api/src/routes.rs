// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::handlers;
use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// Builds the full router: the two scheduler endpoints plus the ambient
/// `/metrics` and `/healthz` surface, all against one shared [`AppState`].
#[must_use]
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/scheduler/register_host", post(handlers::register_host))
        .route("/scheduler/request", post(handlers::request))
        .route("/metrics", get(handlers::metrics))
        .route("/healthz", get(handlers::healthz))
        .with_state(state)
}

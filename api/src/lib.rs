// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The REST request front-end: the two scheduler endpoints
//! and the ambient `/metrics` and `/healthz` surface, behind one `axum`
//! router over a shared [`AppState`].

mod errors;
mod handlers;
mod routes;
mod state;


pub use errors::ApiError;
pub use routes::build_router;
pub use state::AppState;

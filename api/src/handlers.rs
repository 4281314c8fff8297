// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::errors::ApiError;
use crate::state::AppState;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::{http::StatusCode, Json};
use qosctl_types::Priority;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::Arc;

const DEFAULT_REQUEST_RATE_BPS: u64 = 10_000_000;

#[derive(Debug, Deserialize)]
pub struct RegisterHostBody {
    pub host_ip: Ipv4Addr,
    pub permit_port: u16,
    pub recv_port: u16,
}

#[derive(Debug, Serialize)]
pub struct RegisterHostResponse {
    pub ok: bool,
}

/// `POST /scheduler/register_host`
#[tracing::instrument(level = "debug", skip(state))]
pub async fn register_host(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterHostBody>,
) -> Result<Json<RegisterHostResponse>, ApiError> {
    if body.permit_port == 0 || body.recv_port == 0 {
        return Err(ApiError::bad_request("permit_port and recv_port must be nonzero"));
    }
    state.scheduler.register_host(body.host_ip, body.permit_port, body.recv_port);
    Ok(Json(RegisterHostResponse { ok: true }))
}

#[derive(Debug, Deserialize)]
pub struct RequestBody {
    pub src_ip: Ipv4Addr,
    pub src_port: u16,
    pub size_bytes: u64,
    #[serde(default)]
    pub request_rate_bps: Option<u64>,
    /// `0/1/2`, per the wire contract — not the lowercase class name.
    pub priority: u8,
}

#[derive(Debug, Serialize)]
pub struct RequestResponse {
    pub flow_id: u64,
    pub status: String,
    pub dst_ip: Ipv4Addr,
    /// Not yet known while the flow sits in `pending`: the destination
    /// port is drawn by the admission loop, not at request time.
    pub dst_port: Option<u16>,
}

/// `POST /scheduler/request`
#[tracing::instrument(level = "debug", skip(state))]
pub async fn request(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RequestBody>,
) -> Result<Response, ApiError> {
    if body.size_bytes == 0 {
        return Err(ApiError::bad_request("size_bytes must be positive"));
    }
    if body.src_port == 0 {
        return Err(ApiError::bad_request("src_port must be nonzero"));
    }
    let Some(priority) = Priority::from_u8(body.priority) else {
        return Err(ApiError::bad_request("priority must be 0, 1, or 2"));
    };
    let request_rate_bps = body.request_rate_bps.unwrap_or(DEFAULT_REQUEST_RATE_BPS);

    let (flow_id, dst_ip) = state.scheduler.submit_flow(
        body.src_ip,
        Some(body.src_port),
        body.size_bytes,
        request_rate_bps,
        priority,
    )?;

    Ok((
        StatusCode::OK,
        Json(RequestResponse {
            flow_id: flow_id.0,
            status: "pending".to_string(),
            dst_ip,
            dst_port: None,
        }),
    )
        .into_response())
}

/// `GET /metrics`
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.render_metrics(),
    )
        .into_response()
}

/// `GET /healthz`: `200 OK` once the scheduler has completed its first
/// admission tick, `503` otherwise so a load balancer doesn't route to a
/// controller that hasn't finished wiring up its datapaths yet.
pub async fn healthz(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

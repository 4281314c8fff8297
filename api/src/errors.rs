// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use qosctl_scheduler::RequestError;
use serde::Serialize;

/// Uniform JSON error body for every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip)]
    status: StatusCode,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>) -> Self {
        ApiError {
            error: error.into(),
            status,
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.error }))).into_response()
    }
}

/// `NonPositiveSize`/`NonPositiveRate` are malformed requests (400).
/// `UnknownSource` is also a client error: the caller must `register_host`
/// first. `NoPeerHost` is a 503: the request itself was well-formed, but
/// the controller currently has no destination to offer.
impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        let status = match err {
            RequestError::NonPositiveSize | RequestError::NonPositiveRate | RequestError::UnknownSource(_) => {
                StatusCode::BAD_REQUEST
            }
            RequestError::NoPeerHost => StatusCode::SERVICE_UNAVAILABLE,
        };
        ApiError::new(status, err.to_string())
    }
}

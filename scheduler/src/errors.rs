// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::net::Ipv4Addr;
use thiserror::Error;

/// Synchronous rejection of a flow request, surfaced by the front-end as
/// an HTTP status. Anything that gets past this point is inserted into
/// `pending` and admitted asynchronously; it is never an error from here on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("size_bytes must be positive")]
    NonPositiveSize,

    #[error("request_rate_bps must be positive")]
    NonPositiveRate,

    #[error("source {0} is not a registered host")]
    UnknownSource(Ipv4Addr),

    #[error("no peer host is registered to serve as a destination")]
    NoPeerHost,
}

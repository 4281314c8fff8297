// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! DSCP, queue, and ephemeral-port allocators.

mod dscp;
mod errors;
mod port;

pub use dscp::{dscp_for, queue_for, DscpAllocator};
pub use errors::AllocError;
pub use port::PortAllocator;

// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Domain types shared by every crate in the QoS admission controller.
//!
//! This crate holds no behaviour beyond small invariant-preserving
//! constructors: the admission predicate, the allocators, and the
//! scheduling loop all live in their own crates and operate on these types.

mod flow;
mod hop;
mod port;
mod priority;

pub use flow::{Flow, FlowStatus, FlowTransitionError};
pub use hop::{Dpid, Hop};
pub use port::{PortKey, PortState};
pub use priority::Priority;

use std::fmt;

/// Globally unique identifier for a flow.
///
/// Encodes the submitting host in its high digits (see
/// [`crate::flow::Flow::id_from_source`]) purely as a diagnostic
/// convenience; nothing downstream depends on the encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct FlowId(pub u64);

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for FlowId {
    fn from(value: u64) -> Self {
        FlowId(value)
    }
}

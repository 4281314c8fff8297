// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Host registry and outbound signalling socket: the `FLOW_PREPARE` /
//! `PERMIT` protocol coordinating source and sink.

mod channel;
mod registry;
mod wire;

pub use channel::{FlowSignalInfo, HostChannel};
pub use registry::{HostEntry, HostRegistry};
pub use wire::SignalMessage;

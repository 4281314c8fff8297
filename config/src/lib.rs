// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Declarative configuration loading: the topology document (port
//! capacities and the static path table) and the controller document
//! (bind addresses, log root, interval overrides).

mod controller;
mod errors;
mod runid;
mod topology;

pub use controller::ControllerConfig;
pub use errors::ConfigError;
pub use runid::{alloc_run_id, alloc_run_id_today};
pub use topology::{PathEntry, PathTable, PortCapacity, RawHop, TopologyConfig};

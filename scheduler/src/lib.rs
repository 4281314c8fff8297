// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The scheduling and resource-management engine: flow
//! tables, the admission loop, datapath lifecycle, and the lifecycle glue
//! tying the path table, port ledger, allocators, installer, host channel,
//! and stats collector together behind one coherent API.

mod admit;
mod datapaths;
mod engine;
mod errors;
mod tables;

pub use admit::can_admit;
pub use datapaths::DatapathRegistry;
pub use engine::SchedulerCore;
pub use errors::RequestError;
pub use tables::FlowTables;

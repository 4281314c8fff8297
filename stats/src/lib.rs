// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Periodic statistics collection: per-hop rate estimation,
//! idle tracking, staged tail-release, terminal detection, and the
//! observation logs consumed by external plotting tools.

mod observation;
mod rate;
mod release;
mod source;
mod terminal;

pub use observation::ObservationLog;
pub use rate::record_sample;
pub use release::{tail_release, RELEASE_EPSILON};
pub use source::{FlowStatSample, InMemoryStatsSource, StatsSource};
pub use terminal::check_terminal;

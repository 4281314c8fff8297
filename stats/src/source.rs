// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use parking_lot::Mutex;
use qosctl_types::Dpid;
use std::collections::HashMap;

/// One flow-stats counter reply, already demultiplexed to a single switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowStatSample {
    pub dpid: Dpid,
    pub cookie: u64,
    pub byte_count: u64,
}

/// Abstraction over the datapath's per-tick counter replies. A zero
/// cookie high word is a system/default rule and callers must ignore it;
/// this trait only hands back what the switch reported.
///
/// Port- and queue-stats requests are also dispatched every tick,
/// but their replies feed only the port-snapshot log
/// (already produced from the ledger's own [`qosctl_ledger::PortLedger::snapshot`])
/// and are otherwise inert for this controller's admission/tail-release
/// logic, so only the flow-stats reply path is modeled as a trait method.
pub trait StatsSource: Send + Sync {
    fn poll_flow_stats(&self, dpid: Dpid) -> Vec<FlowStatSample>;
}

/// In-memory [`StatsSource`] used by tests: byte counters are set directly
/// rather than arriving over a switch connection.
#[derive(Default)]
pub struct InMemoryStatsSource {
    counters: Mutex<HashMap<(Dpid, u64), u64>>,
}

impl InMemoryStatsSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_byte_count(&self, dpid: Dpid, cookie: u64, byte_count: u64) {
        self.counters.lock().insert((dpid, cookie), byte_count);
    }
}

impl StatsSource for InMemoryStatsSource {
    fn poll_flow_stats(&self, dpid: Dpid) -> Vec<FlowStatSample> {
        self.counters
            .lock()
            .iter()
            .filter(|((d, _), _)| *d == dpid)
            .map(|((dpid, cookie), byte_count)| FlowStatSample {
                dpid: *dpid,
                cookie: *cookie,
                byte_count: *byte_count,
            })
            .collect()
    }
}

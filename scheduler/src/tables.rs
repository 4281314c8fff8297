// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use qosctl_types::{Flow, FlowId, FlowStatus};
use std::collections::{HashMap, HashSet, VecDeque};

/// Flow tables owned exclusively by the scheduler core: every flow ever
/// admitted, the FIFO of flows awaiting admission, and the set of
/// currently-installed, non-terminal flows.
#[derive(Default)]
pub struct FlowTables {
    pub(crate) flows: HashMap<FlowId, Flow>,
    pub(crate) pending: VecDeque<FlowId>,
    pub(crate) active: HashSet<FlowId>,
}

impl FlowTables {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, flow_id: FlowId) -> Option<&Flow> {
        self.flows.get(&flow_id)
    }

    pub fn get_mut(&mut self, flow_id: FlowId) -> Option<&mut Flow> {
        self.flows.get_mut(&flow_id)
    }

    #[must_use]
    pub fn pending_ids(&self) -> Vec<FlowId> {
        self.pending.iter().copied().collect()
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn active_ids(&self) -> Vec<FlowId> {
        self.active.iter().copied().collect()
    }

    #[must_use]
    pub fn is_active(&self, flow_id: FlowId) -> bool {
        self.active.contains(&flow_id)
    }

    #[must_use]
    pub fn finished_count(&self) -> usize {
        self.flows.values().filter(|f| f.status().is_terminal()).count()
    }

    #[must_use]
    pub fn all_ids(&self) -> Vec<FlowId> {
        self.flows.keys().copied().collect()
    }

    /// Inserts a freshly constructed flow and appends it to the pending
    /// FIFO. Callers are expected to have set `flow.flow_id` already.
    pub fn insert_pending(&mut self, flow: Flow) -> FlowId {
        let flow_id = flow.flow_id;
        self.flows.insert(flow_id, flow);
        self.pending.push_back(flow_id);
        flow_id
    }

    pub fn pop_pending_front(&mut self) -> Option<FlowId> {
        self.pending.pop_front()
    }

    /// Puts a flow back at the tail of the pending FIFO: used when a
    /// scheduling-tick attempt finds no path or no capacity. Draining
    /// exactly `pending_len()` entries per tick and re-queuing the ones
    /// that stay pending preserves their relative insertion order across
    /// a single tick.
    pub fn requeue_pending(&mut self, flow_id: FlowId) {
        self.pending.push_back(flow_id);
    }

    pub fn activate(&mut self, flow_id: FlowId) {
        self.active.insert(flow_id);
    }

    pub fn deactivate(&mut self, flow_id: FlowId) {
        self.active.remove(&flow_id);
    }
}

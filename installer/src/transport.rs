// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::rule::{FlowRule, TableId};
use parking_lot::Mutex;
use qosctl_types::Dpid;
use std::collections::HashMap;

/// Abstraction over the OpenFlow 1.3 wire encoding. The installer owns
/// rule shape and cookie logic; a real implementation would serialize
/// these calls to `OFPFlowMod`/`OFPFlowDelete` messages on a switch
/// connection. Tests and local dry runs use [`InMemoryTransport`].
pub trait DatapathTransport: Send + Sync {
    fn install(&self, dpid: Dpid, rule: FlowRule);

    /// Deletes every rule on `table` whose cookie matches
    /// `cookie & cookie_mask == cookie & cookie_mask`, i.e. a standard
    /// OpenFlow masked delete.
    fn delete_masked(&self, dpid: Dpid, table: TableId, cookie: u64, cookie_mask: u64);

    /// Wipes every rule on every table for `dpid` (defensive cold start).
    fn wipe_all(&self, dpid: Dpid);
}

/// In-memory [`DatapathTransport`] used by tests and local dry runs.
///
/// Keeps every installed rule keyed by `(dpid, table, cookie)` so tests can
/// assert on exactly what the installer would have sent to a real switch.
#[derive(Default)]
pub struct InMemoryTransport {
    rules: Mutex<HashMap<Dpid, HashMap<(TableId, u64), FlowRule>>>,
}

impl InMemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn rules_on(&self, dpid: Dpid, table: TableId) -> Vec<FlowRule> {
        self.rules
            .lock()
            .get(&dpid)
            .map(|per_table| {
                per_table
                    .iter()
                    .filter(|((t, _), _)| *t == table)
                    .map(|(_, rule)| rule.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_cookie(&self, dpid: Dpid, table: TableId, cookie: u64) -> bool {
        self.rules
            .lock()
            .get(&dpid)
            .is_some_and(|per_table| per_table.contains_key(&(table, cookie)))
    }
}

impl DatapathTransport for InMemoryTransport {
    #[tracing::instrument(level = "trace", skip(self, rule))]
    fn install(&self, dpid: Dpid, rule: FlowRule) {
        self.rules
            .lock()
            .entry(dpid)
            .or_default()
            .insert((rule.table, rule.cookie), rule);
    }

    #[tracing::instrument(level = "trace", skip(self))]
    fn delete_masked(&self, dpid: Dpid, table: TableId, cookie: u64, cookie_mask: u64) {
        if let Some(per_table) = self.rules.lock().get_mut(&dpid) {
            per_table.retain(|(t, existing_cookie), _| {
                !(*t == table && (existing_cookie & cookie_mask) == (cookie & cookie_mask))
            });
        }
    }

    #[tracing::instrument(level = "trace", skip(self))]
    fn wipe_all(&self, dpid: Dpid) {
        self.rules.lock().remove(&dpid);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rule::{Action, Match};

    fn rule(table: TableId, priority: u16, cookie: u64) -> FlowRule {
        FlowRule {
            table,
            priority,
            cookie,
            matches: Match::Any,
            actions: vec![Action::Output(1)],
        }
    }

    #[test]
    fn install_then_masked_delete_by_flow_id() {
        let t = InMemoryTransport::new();
        let dpid = Dpid(1);
        t.install(dpid, rule(TableId::Qos, 200, crate::cookie::make_cookie(qosctl_types::FlowId(7), 1)));
        t.install(dpid, rule(TableId::Qos, 200, crate::cookie::make_cookie(qosctl_types::FlowId(7), 2)));
        t.install(dpid, rule(TableId::Qos, 200, crate::cookie::make_cookie(qosctl_types::FlowId(8), 1)));
        assert_eq!(t.rules_on(dpid, TableId::Qos).len(), 3);

        t.delete_masked(dpid, TableId::Qos, crate::cookie::make_cookie(qosctl_types::FlowId(7), 0), FLOW_ID_MASK);
        let remaining = t.rules_on(dpid, TableId::Qos);
        assert_eq!(remaining.len(), 1);
        assert_eq!(crate::cookie::flow_id_of(remaining[0].cookie), qosctl_types::FlowId(8));
    }

    #[test]
    fn wipe_all_clears_every_table() {
        let t = InMemoryTransport::new();
        let dpid = Dpid(1);
        t.install(dpid, rule(TableId::Classify, 100, 0));
        t.install(dpid, rule(TableId::Qos, 200, 1));
        t.wipe_all(dpid);
        assert!(t.rules_on(dpid, TableId::Classify).is_empty());
        assert!(t.rules_on(dpid, TableId::Qos).is_empty());
    }
}

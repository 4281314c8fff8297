// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use parking_lot::Mutex;
use qosctl_installer::{bootstrap_switch, DatapathTransport};
use qosctl_types::Dpid;
use std::collections::HashSet;

/// Connected-switch registry. Datapaths are append-only from the
/// controller's view until a disconnect event; there is no redistribution
/// of already-active flows when one drops.
#[derive(Default)]
pub struct DatapathRegistry {
    connected: Mutex<HashSet<Dpid>>,
}

impl DatapathRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly connected switch and installs its default pipeline
    /// (wipe, then classify/QoS/learning tables). A duplicate feature-reply
    /// for an already-known dpid is a no-op: the bootstrap is cold-start
    /// defensive, not idempotent-safe to repeat on every keepalive.
    #[tracing::instrument(level = "debug", skip(self, transport))]
    pub fn on_connected(&self, dpid: Dpid, transport: &dyn DatapathTransport) {
        let mut connected = self.connected.lock();
        if connected.insert(dpid) {
            bootstrap_switch(transport, dpid);
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub fn on_disconnected(&self, dpid: Dpid) {
        self.connected.lock().remove(&dpid);
    }

    #[must_use]
    pub fn is_connected(&self, dpid: Dpid) -> bool {
        self.connected.lock().contains(&dpid)
    }

    #[must_use]
    pub fn connected(&self) -> Vec<Dpid> {
        self.connected.lock().iter().copied().collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use qosctl_installer::{InMemoryTransport, TableId};

    #[test]
    fn first_connect_bootstraps_the_pipeline() {
        let registry = DatapathRegistry::new();
        let transport = InMemoryTransport::new();
        registry.on_connected(Dpid(1), &transport);
        assert!(registry.is_connected(Dpid(1)));
        assert_eq!(transport.rules_on(Dpid(1), TableId::Classify).len(), 4);
    }

    #[test]
    fn repeat_connect_does_not_rewipe() {
        let registry = DatapathRegistry::new();
        let transport = InMemoryTransport::new();
        registry.on_connected(Dpid(1), &transport);
        transport.install(
            Dpid(1),
            qosctl_installer::FlowRule {
                table: TableId::Qos,
                priority: 200,
                cookie: 42,
                matches: qosctl_installer::Match::Any,
                actions: vec![],
            },
        );
        registry.on_connected(Dpid(1), &transport);
        assert_eq!(transport.rules_on(Dpid(1), TableId::Qos).len(), 1);
    }

    #[test]
    fn disconnect_drops_from_the_table() {
        let registry = DatapathRegistry::new();
        let transport = InMemoryTransport::new();
        registry.on_connected(Dpid(1), &transport);
        registry.on_disconnected(Dpid(1));
        assert!(!registry.is_connected(Dpid(1)));
    }
}

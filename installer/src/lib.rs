// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Translates admitted flows into datapath rule insertions/deletions.
//! Owns rule shape and cookie logic; the OpenFlow 1.3 wire
//! encoding itself lives behind [`DatapathTransport`].

mod cookie;
mod rule;
mod transport;

pub use cookie::{flow_id_of, hop_index_of, make_cookie, FLOW_ID_MASK};
pub use rule::{Action, FlowRule, Match, TableId};
pub use transport::{DatapathTransport, InMemoryTransport};

use qosctl_types::{Dpid, FlowId, Hop};

/// Priority of every per-flow QoS-table rule, strictly above the default
/// pipeline's 0-100 range.
pub const FLOW_RULE_PRIORITY: u16 = 200;

/// Installs the default three-table pipeline on a newly connected switch:
/// a DSCP-range classifier, a fallthrough QoS table, and a
/// learning-table fallthrough to the controller. These rules are never
/// touched by flow-level operations, which are scoped to [`TableId::Qos`].
pub fn bootstrap_switch(transport: &dyn DatapathTransport, dpid: Dpid) {
    transport.wipe_all(dpid);

    transport.install(
        dpid,
        FlowRule {
            table: TableId::Classify,
            priority: 100,
            cookie: 0,
            matches: Match::DscpRange { low: 32, high: 47 },
            actions: vec![Action::WriteMetadata(2), Action::GotoTable(TableId::Qos)],
        },
    );
    transport.install(
        dpid,
        FlowRule {
            table: TableId::Classify,
            priority: 90,
            cookie: 0,
            matches: Match::DscpRange { low: 16, high: 31 },
            actions: vec![Action::WriteMetadata(1), Action::GotoTable(TableId::Qos)],
        },
    );
    transport.install(
        dpid,
        FlowRule {
            table: TableId::Classify,
            priority: 80,
            cookie: 0,
            matches: Match::DscpRange { low: 0, high: 15 },
            actions: vec![Action::WriteMetadata(0), Action::GotoTable(TableId::Qos)],
        },
    );
    transport.install(
        dpid,
        FlowRule {
            table: TableId::Classify,
            priority: 0,
            cookie: 0,
            matches: Match::Any,
            actions: vec![Action::GotoTable(TableId::Learning)],
        },
    );
    transport.install(
        dpid,
        FlowRule {
            table: TableId::Qos,
            priority: 0,
            cookie: 0,
            matches: Match::Any,
            actions: vec![Action::GotoTable(TableId::Learning)],
        },
    );
    transport.install(
        dpid,
        FlowRule {
            table: TableId::Learning,
            priority: 0,
            cookie: 0,
            matches: Match::Any,
            actions: vec![Action::SendToController],
        },
    );
}

/// Installs one QoS-table rule per hop in `path`, using a 1-based hop
/// index as part of the rule's cookie.
#[tracing::instrument(level = "trace", skip(transport, path))]
pub fn install_flow(
    transport: &dyn DatapathTransport,
    path: &[Hop],
    flow_id: FlowId,
    ipv4_src: std::net::Ipv4Addr,
    ipv4_dst: std::net::Ipv4Addr,
    dscp: u8,
    queue_id: u8,
) {
    for (zero_based, hop) in path.iter().enumerate() {
        let hop_index = (zero_based + 1) as u32;
        transport.install(
            hop.dpid,
            FlowRule {
                table: TableId::Qos,
                priority: FLOW_RULE_PRIORITY,
                cookie: make_cookie(flow_id, hop_index),
                matches: Match::Ipv4Flow {
                    ipv4_src,
                    ipv4_dst,
                    ip_dscp: dscp,
                },
                actions: vec![Action::SetQueue(queue_id), Action::Output(hop.out_port)],
            },
        );
    }
}

/// Masked delete of every rule carrying `flow_id`'s cookie high word,
/// scoped to the QoS table, on every switch in `path`.
#[tracing::instrument(level = "trace", skip(transport, path))]
pub fn delete_flow_all(transport: &dyn DatapathTransport, path: &[Hop], flow_id: FlowId) {
    for hop in path {
        transport.delete_masked(hop.dpid, TableId::Qos, make_cookie(flow_id, 0), FLOW_ID_MASK);
    }
}

/// Directed delete of one flow's rule on a single switch, used during
/// hop-by-hop tail-release.
#[tracing::instrument(level = "trace", skip(transport))]
pub fn delete_flow_hop(transport: &dyn DatapathTransport, dpid: Dpid, flow_id: FlowId, hop_index: u32) {
    let cookie = make_cookie(flow_id, hop_index);
    transport.delete_masked(dpid, TableId::Qos, cookie, u64::MAX);
}

#[cfg(test)]
mod test {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn bootstrap_seeds_default_pipeline_and_skips_flow_table() {
        let transport = InMemoryTransport::new();
        let dpid = Dpid(1);
        bootstrap_switch(&transport, dpid);
        assert_eq!(transport.rules_on(dpid, TableId::Classify).len(), 4);
        assert_eq!(transport.rules_on(dpid, TableId::Qos).len(), 1);
        assert_eq!(transport.rules_on(dpid, TableId::Learning).len(), 1);
    }

    #[test]
    fn install_flow_writes_one_rule_per_hop_at_fixed_priority() {
        let transport = InMemoryTransport::new();
        let path = vec![Hop::new(Dpid(1), 2), Hop::new(Dpid(2), 3), Hop::new(Dpid(3), 4)];
        install_flow(
            &transport,
            &path,
            FlowId(10_000),
            Ipv4Addr::new(10, 0, 1, 1),
            Ipv4Addr::new(10, 0, 3, 1),
            16,
            1,
        );
        for hop in &path {
            let rules = transport.rules_on(hop.dpid, TableId::Qos);
            assert_eq!(rules.len(), 1);
            assert_eq!(rules[0].priority, FLOW_RULE_PRIORITY);
        }
    }

    #[test]
    fn delete_flow_all_removes_every_hop_rule() {
        let transport = InMemoryTransport::new();
        let path = vec![Hop::new(Dpid(1), 2), Hop::new(Dpid(2), 3)];
        install_flow(
            &transport,
            &path,
            FlowId(20_000),
            Ipv4Addr::new(10, 0, 1, 1),
            Ipv4Addr::new(10, 0, 3, 1),
            32,
            2,
        );
        delete_flow_all(&transport, &path, FlowId(20_000));
        for hop in &path {
            assert!(transport.rules_on(hop.dpid, TableId::Qos).is_empty());
        }
    }

    #[test]
    fn delete_flow_hop_removes_only_that_hop() {
        let transport = InMemoryTransport::new();
        let path = vec![Hop::new(Dpid(1), 2), Hop::new(Dpid(2), 3)];
        install_flow(
            &transport,
            &path,
            FlowId(30_000),
            Ipv4Addr::new(10, 0, 1, 1),
            Ipv4Addr::new(10, 0, 3, 1),
            0,
            0,
        );
        delete_flow_hop(&transport, Dpid(1), FlowId(30_000), 1);
        assert!(transport.rules_on(Dpid(1), TableId::Qos).is_empty());
        assert_eq!(transport.rules_on(Dpid(2), TableId::Qos).len(), 1);
    }
}

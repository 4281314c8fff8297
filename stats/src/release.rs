// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use qosctl_installer::DatapathTransport;
use qosctl_ledger::PortLedger;
use qosctl_types::{Flow, PortKey};

/// Tolerance applied to `size_bytes` when deciding a hop has seen the
/// whole flow pass through it.
pub const RELEASE_EPSILON: f64 = 1.02;

fn threshold(size_bytes: u64) -> u64 {
    (size_bytes as f64 * RELEASE_EPSILON).ceil() as u64
}

/// Walks `flow`'s path and reclaims any predecessor hop whose successor
/// has now observed the full flow size, per the staged
/// tail-release. Hop 0 is never predecessor-released: there is nothing
/// upstream of the first hop to reclaim.
#[tracing::instrument(level = "trace", skip(flow, ledger, transport))]
pub fn tail_release(flow: &mut Flow, ledger: &PortLedger, transport: &dyn DatapathTransport) {
    let threshold = threshold(flow.size_bytes);
    let path = flow.path.clone();

    for k in 1..path.len() {
        let hop = path[k];
        if flow.released_hops.contains(&hop.dpid) {
            continue;
        }
        let observed = flow.hop_bytes.get(&hop.dpid).copied().unwrap_or(0);
        if observed < threshold {
            continue;
        }

        let predecessor = path[k - 1];
        let hop_index = k as u32;
        qosctl_installer::delete_flow_hop(transport, predecessor.dpid, flow.flow_id, hop_index);
        ledger.release_one(
            PortKey::new(predecessor.dpid, predecessor.out_port),
            flow.send_rate_bps,
            flow.priority,
        );
        flow.released_hops.insert(hop.dpid);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use qosctl_installer::InMemoryTransport;
    use qosctl_types::{Dpid, FlowId, Hop, Priority};
    use std::net::Ipv4Addr;

    fn three_hop_flow() -> Flow {
        let mut f = Flow::new(
            FlowId(10_000),
            Ipv4Addr::new(10, 0, 1, 1),
            Ipv4Addr::new(10, 0, 3, 1),
            10_000_000,
            10_000_000,
            Priority::Gold,
        );
        f.path = vec![
            Hop::new(Dpid(1), 11),
            Hop::new(Dpid(2), 12),
            Hop::new(Dpid(3), 13),
        ];
        f.send_rate_bps = 10_000_000;
        f
    }

    #[test]
    fn releases_predecessor_once_successor_crosses_threshold() {
        let mut flow = three_hop_flow();
        let ledger = PortLedger::new([
            (PortKey::new(Dpid(1), 11), 20_000_000),
            (PortKey::new(Dpid(2), 12), 20_000_000),
            (PortKey::new(Dpid(3), 13), 20_000_000),
        ]);
        for hop in &flow.path {
            ledger.reserve(&[PortKey::new(hop.dpid, hop.out_port)], flow.send_rate_bps, flow.priority);
        }
        let transport = InMemoryTransport::new();
        qosctl_installer::install_flow(
            &transport,
            &flow.path,
            flow.flow_id,
            flow.src_ip,
            flow.dst_ip,
            0,
            2,
        );

        flow.hop_bytes.insert(Dpid(2), 10_200_000);
        tail_release(&mut flow, &ledger, &transport);

        assert!(flow.released_hops.contains(&Dpid(2)));
        assert!(!transport.has_cookie(
            Dpid(1),
            qosctl_installer::TableId::Qos,
            qosctl_installer::make_cookie(flow.flow_id, 1)
        ));
        assert_eq!(ledger.snapshot()[0].reserved_bps, 0);

        flow.hop_bytes.insert(Dpid(3), 10_200_000);
        tail_release(&mut flow, &ledger, &transport);
        assert!(flow.released_hops.contains(&Dpid(3)));
        assert_eq!(ledger.snapshot()[1].reserved_bps, 0);
        assert_eq!(ledger.snapshot()[2].reserved_bps, 10_000_000);
    }

    #[test]
    fn first_hop_is_never_predecessor_released() {
        let mut flow = three_hop_flow();
        flow.hop_bytes.insert(Dpid(1), 50_000_000);
        let ledger = PortLedger::new([(PortKey::new(Dpid(1), 11), 20_000_000)]);
        let transport = InMemoryTransport::new();
        tail_release(&mut flow, &ledger, &transport);
        assert!(flow.released_hops.is_empty());
    }
}

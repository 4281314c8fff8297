// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use qosctl_types::FlowId;
use std::net::Ipv4Addr;

/// One newline-terminated JSON record exchanged over the signalling
/// socket. `FLOW_PREPARE` carries no ports (the sink
/// is told only what to expect); `PERMIT` additionally carries the chosen
/// source and destination ports.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum SignalMessage {
    #[serde(rename = "FLOW_PREPARE")]
    FlowPrepare {
        flow_id: FlowId,
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        send_rate_bps: u64,
        size_bytes: u64,
        dscp: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        run_ts: Option<String>,
    },
    #[serde(rename = "PERMIT")]
    Permit {
        flow_id: FlowId,
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        src_port: u16,
        dst_port: u16,
        send_rate_bps: u64,
        size_bytes: u64,
        dscp: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        run_ts: Option<String>,
    },
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flow_prepare_serializes_with_type_tag() {
        let msg = SignalMessage::FlowPrepare {
            flow_id: FlowId(10_000),
            src_ip: Ipv4Addr::new(10, 0, 1, 1),
            dst_ip: Ipv4Addr::new(10, 0, 3, 1),
            send_rate_bps: 5_000_000,
            size_bytes: 1_000_000,
            dscp: 16,
            run_ts: Some("20260727_1".to_string()),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"FLOW_PREPARE\""));
        let round_trip: SignalMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(round_trip, msg);
    }

    #[test]
    fn permit_carries_ports_flow_prepare_does_not() {
        let msg = SignalMessage::Permit {
            flow_id: FlowId(10_000),
            src_ip: Ipv4Addr::new(10, 0, 1, 1),
            dst_ip: Ipv4Addr::new(10, 0, 3, 1),
            src_port: 20_000,
            dst_port: 20_001,
            send_rate_bps: 5_000_000,
            size_bytes: 1_000_000,
            dscp: 16,
            run_ts: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"src_port\":20000"));
        assert!(!json.contains("run_ts"));
    }
}

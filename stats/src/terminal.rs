// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::release::RELEASE_EPSILON;
use qosctl_alloc::DscpAllocator;
use qosctl_installer::DatapathTransport;
use qosctl_ledger::PortLedger;
use qosctl_types::{Flow, FlowStatus, PortKey};
use std::time::{Duration, Instant};

fn threshold(size_bytes: u64) -> u64 {
    (size_bytes as f64 * RELEASE_EPSILON).ceil() as u64
}

/// Decides whether `flow` has finished, per the terminal
/// detection: either the last hop has observed the full flow size, or it
/// has been idle for at least `t_idle`. On a positive decision, performs
/// terminal processing (mask-delete, release every still-reserved hop,
/// return the DSCP codepoint, transition to `Finished`) and returns `true`.
///
/// A no-op, returning `false`, if `flow` is already terminal or neither
/// condition holds.
#[tracing::instrument(level = "trace", skip(flow, ledger, transport, dscp_alloc))]
pub fn check_terminal(
    flow: &mut Flow,
    ledger: &PortLedger,
    transport: &dyn DatapathTransport,
    dscp_alloc: &DscpAllocator,
    now: Instant,
    t_idle: Duration,
) -> bool {
    if flow.status().is_terminal() {
        return false;
    }
    let Some(last_hop) = flow.path.last().copied() else {
        return false;
    };

    let last_bytes = flow.hop_bytes.get(&last_hop.dpid).copied().unwrap_or(0);
    let byte_condition = last_bytes >= threshold(flow.size_bytes);
    let idle_condition = flow
        .idle_since
        .is_some_and(|since| now.saturating_duration_since(since) >= t_idle);

    if !byte_condition && !idle_condition {
        return false;
    }

    qosctl_installer::delete_flow_all(transport, &flow.path, flow.flow_id);
    for hop in flow.path.clone() {
        if !flow.released_hops.contains(&hop.dpid) {
            ledger.release_one(PortKey::new(hop.dpid, hop.out_port), flow.send_rate_bps, flow.priority);
            flow.released_hops.insert(hop.dpid);
        }
    }
    dscp_alloc.free(flow.flow_id);
    let _ = flow.transition_to(FlowStatus::Finished);
    flow.finished_at = Some(now);
    true
}

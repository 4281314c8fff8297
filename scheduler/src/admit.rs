// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use qosctl_ledger::{AdmitReason, PortLedger};
use qosctl_types::{Hop, PortKey};

/// Returns not just pass/fail but the rate the flow would send at and the
/// first failing reason. Admission here is peak-rate and
/// single-class-blind: no preemption, no borrowing between classes, no
/// rate degradation. `send_rate_bps` equals the requested rate on success
/// and `0` otherwise.
#[must_use]
pub fn can_admit(ledger: &PortLedger, request_rate_bps: u64, path: &[Hop]) -> (bool, u64, AdmitReason) {
    let ports: Vec<PortKey> = path.iter().map(|hop| PortKey::new(hop.dpid, hop.out_port)).collect();
    let reason = ledger.can_reserve(&ports, request_rate_bps);
    if reason.is_ok() {
        (true, request_rate_bps, reason)
    } else {
        (false, 0, reason)
    }
}

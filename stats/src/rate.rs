// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use qosctl_types::{Dpid, Flow, FlowStatus};
use std::time::{Duration, Instant};

const MIN_DELTA_T: Duration = Duration::from_millis(1);

/// Records one flow-stats sample for `dpid`: updates the cumulative byte
/// count, the instantaneous rate, and (for the last hop only) the idle
/// tracker.
///
/// The first sample for a given `dpid` has no predecessor to diff against,
/// so it is stored with `rate_bps = 0` rather than invented from nothing.
#[tracing::instrument(level = "trace", skip(flow))]
pub fn record_sample(flow: &mut Flow, dpid: Dpid, byte_count: u64, now: Instant) {
    let prev_bytes = flow.hop_bytes.get(&dpid).copied();
    let prev_time = flow.hop_last_time.get(&dpid).copied();

    let delta_bytes = byte_count.saturating_sub(prev_bytes.unwrap_or(0));
    let rate_bps = match prev_time {
        Some(prev_time) => {
            let delta_t = now.saturating_duration_since(prev_time).max(MIN_DELTA_T);
            (8 * delta_bytes * 1000) / delta_t.as_millis().max(1) as u64
        }
        None => 0,
    };

    flow.hop_bytes.insert(dpid, byte_count);
    flow.hop_last_time.insert(dpid, now);
    flow.hop_rate_bps.insert(dpid, rate_bps);

    // The admission loop only ever sets `Allowed`; the first byte actually
    // observed at the first hop is what earns a flow its `Active` status.
    if delta_bytes > 0 && flow.status() == FlowStatus::Allowed && flow.path.first().is_some_and(|hop| hop.dpid == dpid) {
        let _ = flow.transition_to(FlowStatus::Active);
    }

    if flow.path.last().is_some_and(|hop| hop.dpid == dpid) {
        if delta_bytes > 0 {
            flow.idle_since = None;
        } else {
            flow.idle_since.get_or_insert(now);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use qosctl_types::{FlowId, Hop, Priority};
    use std::net::Ipv4Addr;

    fn sample_flow() -> Flow {
        let mut f = Flow::new(
            FlowId(10_000),
            Ipv4Addr::new(10, 0, 1, 1),
            Ipv4Addr::new(10, 0, 3, 1),
            5_000_000,
            1_000_000,
            Priority::Silver,
        );
        f.path = vec![Hop::new(Dpid(1), 2), Hop::new(Dpid(2), 3)];
        f
    }

    #[test]
    fn first_sample_has_zero_rate_and_stores_baseline() {
        let mut flow = sample_flow();
        let now = Instant::now();
        record_sample(&mut flow, Dpid(1), 1_000, now);
        assert_eq!(flow.hop_bytes[&Dpid(1)], 1_000);
        assert_eq!(flow.hop_rate_bps[&Dpid(1)], 0);
    }

    #[test]
    fn second_sample_computes_rate_from_delta() {
        let mut flow = sample_flow();
        let t0 = Instant::now();
        record_sample(&mut flow, Dpid(1), 0, t0);
        let t1 = t0 + Duration::from_millis(500);
        record_sample(&mut flow, Dpid(1), 625_000, t1);
        assert_eq!(flow.hop_rate_bps[&Dpid(1)], 10_000_000);
    }

    #[test]
    fn idle_tracking_only_applies_to_last_hop() {
        let mut flow = sample_flow();
        let t0 = Instant::now();
        record_sample(&mut flow, Dpid(1), 0, t0);
        assert!(flow.idle_since.is_none());

        record_sample(&mut flow, Dpid(2), 0, t0);
        assert!(flow.idle_since.is_some());

        let t1 = t0 + Duration::from_millis(10);
        record_sample(&mut flow, Dpid(2), 500, t1);
        assert!(flow.idle_since.is_none());
    }

    #[test]
    fn first_traffic_at_first_hop_promotes_allowed_to_active() {
        let mut flow = sample_flow();
        let _ = flow.transition_to(qosctl_types::FlowStatus::Allowed);
        record_sample(&mut flow, Dpid(1), 0, Instant::now());
        assert_eq!(flow.status(), qosctl_types::FlowStatus::Allowed);
        record_sample(&mut flow, Dpid(1), 1_000, Instant::now());
        assert_eq!(flow.status(), qosctl_types::FlowStatus::Active);
    }

    #[test]
    fn idle_since_does_not_move_once_set() {
        let mut flow = sample_flow();
        let t0 = Instant::now();
        record_sample(&mut flow, Dpid(2), 0, t0);
        let first = flow.idle_since;
        let t1 = t0 + Duration::from_millis(50);
        record_sample(&mut flow, Dpid(2), 0, t1);
        assert_eq!(flow.idle_since, first);
    }
}

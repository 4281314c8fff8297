// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::{Dpid, FlowId, Hop, Priority};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Instant;
use thiserror::Error;

/// Lifecycle state of a [`Flow`].
///
/// Transitions are monotone along `Pending -> Allowed -> Active ->
/// Finished`, except that `Failed` is reachable from any non-terminal
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FlowStatus {
    Pending,
    Allowed,
    Active,
    Finished,
    Failed,
}

impl FlowStatus {
    const fn rank(self) -> u8 {
        match self {
            FlowStatus::Pending => 0,
            FlowStatus::Allowed => 1,
            FlowStatus::Active => 2,
            FlowStatus::Finished => 3,
            FlowStatus::Failed => u8::MAX,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, FlowStatus::Finished | FlowStatus::Failed)
    }
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowStatus::Pending => "pending",
            FlowStatus::Allowed => "allowed",
            FlowStatus::Active => "active",
            FlowStatus::Finished => "finished",
            FlowStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("cannot transition flow from terminal state {0} to {1}")]
    AlreadyTerminal(FlowStatus, FlowStatus),
    #[error("cannot transition flow backward from {0} to {1}")]
    Backward(FlowStatus, FlowStatus),
}

/// A single flow's scheduling and observation state.
///
/// Invariants (enforced by the methods below, not by field visibility
/// alone): `send_rate_bps <= request_rate_bps` and is never raised once
/// set; `dscp`/`queue_id`/`src_port`/`dst_port` are assigned exactly once
/// at `Pending -> Allowed` and released exactly once at `* -> Finished`.
#[derive(Debug, Clone)]
pub struct Flow {
    pub flow_id: FlowId,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub request_rate_bps: u64,
    pub size_bytes: u64,
    pub priority: Priority,

    pub send_rate_bps: u64,
    pub dscp: Option<u8>,
    pub queue_id: Option<u8>,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
    /// Caller-declared source port from the admission request, carried
    /// until the `pending -> allowed` transition assigns the real
    /// `src_port`/`dst_port` pair. `None` when the request left it to the
    /// controller's ephemeral-port allocator.
    pub requested_src_port: Option<u16>,
    pub path: Vec<Hop>,

    status: FlowStatus,
    pub created_at: Instant,
    pub allowed_at: Option<Instant>,
    pub finished_at: Option<Instant>,
    pub prepared_at: Option<Instant>,
    pub permitted_at: Option<Instant>,

    pub hop_bytes: HashMap<Dpid, u64>,
    pub hop_last_time: HashMap<Dpid, Instant>,
    pub hop_rate_bps: HashMap<Dpid, u64>,
    pub released_hops: HashSet<Dpid>,
    pub idle_since: Option<Instant>,
}

impl Flow {
    #[must_use]
    pub fn new(
        flow_id: FlowId,
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        request_rate_bps: u64,
        size_bytes: u64,
        priority: Priority,
    ) -> Self {
        Flow {
            flow_id,
            src_ip,
            dst_ip,
            request_rate_bps,
            size_bytes,
            priority,
            send_rate_bps: 0,
            dscp: None,
            queue_id: None,
            src_port: None,
            dst_port: None,
            requested_src_port: None,
            path: Vec::new(),
            status: FlowStatus::Pending,
            created_at: Instant::now(),
            allowed_at: None,
            finished_at: None,
            prepared_at: None,
            permitted_at: None,
            hop_bytes: HashMap::new(),
            hop_last_time: HashMap::new(),
            hop_rate_bps: HashMap::new(),
            released_hops: HashSet::new(),
            idle_since: None,
        }
    }

    /// Derives a flow id from the requesting source address.
    ///
    /// `host_no = max(0, last_octet - 100)`; ids are drawn from
    /// `host_no * 10000 + 10000 + (seq - 1)` where `seq` is a 1-based,
    /// per-host sequence counter owned by the caller.
    #[must_use]
    pub fn id_from_source(src_ip: Ipv4Addr, per_host_seq: u64) -> FlowId {
        let last_octet = u64::from(src_ip.octets()[3]);
        let host_no = last_octet.saturating_sub(100);
        FlowId(host_no * 10_000 + 10_000 + (per_host_seq - 1))
    }

    #[must_use]
    pub const fn status(&self) -> FlowStatus {
        self.status
    }

    /// Moves the flow to `next`, enforcing the monotone order described in
    /// `Failed` is reachable from any non-terminal state.
    pub fn transition_to(&mut self, next: FlowStatus) -> Result<(), FlowTransitionError> {
        if self.status.is_terminal() {
            return Err(FlowTransitionError::AlreadyTerminal(self.status, next));
        }
        if next != FlowStatus::Failed && next.rank() < self.status.rank() {
            return Err(FlowTransitionError::Backward(self.status, next));
        }
        self.status = next;
        Ok(())
    }

    /// Sets `send_rate_bps`, clamped so it can never exceed
    /// `request_rate_bps` and never increases once set.
    pub fn set_send_rate(&mut self, requested: u64) {
        let capped = requested.min(self.request_rate_bps);
        self.send_rate_bps = self.send_rate_bps.max(capped).min(self.request_rate_bps);
        if self.send_rate_bps == 0 {
            self.send_rate_bps = capped;
        }
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The port-bandwidth reservation ledger.
//!
//! Owns one [`PortState`] per provisioned `(dpid, port)` and the admission
//! predicate over it. All mutation happens through a single
//! [`parking_lot::Mutex`]-guarded table; callers never see a lock guard,
//! only these operations, so the critical section per call stays tiny.

use parking_lot::Mutex;
use qosctl_types::{PortKey, PortState, Priority};
use std::collections::HashMap;

/// Why a reservation attempt failed, identifying the first failing port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitReason {
    Ok,
    NoPort(PortKey),
    NoCapacity(PortKey),
}

impl AdmitReason {
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, AdmitReason::Ok)
    }
}

/// Point-in-time view of one port, for observation logging and the
/// `port_reserved_bps{dpid,port,class}` gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSnapshot {
    pub port: PortKey,
    pub capacity_bps: u64,
    pub reserved_bps: u64,
    pub available_bps: u64,
    /// Reserved bits/sec by class, indexed by [`Priority::index`].
    pub reserved_by_priority: [u64; 3],
}

pub struct PortLedger {
    table: Mutex<HashMap<PortKey, PortState>>,
}

impl PortLedger {
    #[must_use]
    pub fn new(initial: impl IntoIterator<Item = (PortKey, u64)>) -> Self {
        let table = initial
            .into_iter()
            .map(|(key, capacity)| (key, PortState::new(capacity)))
            .collect();
        PortLedger {
            table: Mutex::new(table),
        }
    }

    /// `ok` iff every port in `ports` has `reserved_total + bps <= capacity`.
    /// A port absent from the ledger fails closed with [`AdmitReason::NoPort`].
    #[tracing::instrument(level = "trace", skip(self))]
    #[must_use]
    pub fn can_reserve(&self, ports: &[PortKey], bps: u64) -> AdmitReason {
        let table = self.table.lock();
        for &port in ports {
            match table.get(&port) {
                None => return AdmitReason::NoPort(port),
                Some(state) if !state.can_reserve(bps) => return AdmitReason::NoCapacity(port),
                Some(_) => {}
            }
        }
        AdmitReason::Ok
    }

    /// Adds `bps` to every port's total and to `priority`'s subtotal.
    ///
    /// Ports absent from the ledger are silently skipped: callers are
    /// expected to have checked [`Self::can_reserve`] first, at which point
    /// an absent port would already have failed admission.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn reserve(&self, ports: &[PortKey], bps: u64, priority: Priority) {
        let mut table = self.table.lock();
        for &port in ports {
            if let Some(state) = table.get_mut(&port) {
                state.reserve(bps, priority);
            }
        }
    }

    /// Inverse of [`Self::reserve`] over a whole port set.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn release(&self, ports: &[PortKey], bps: u64, priority: Priority) {
        let mut table = self.table.lock();
        for &port in ports {
            if let Some(state) = table.get_mut(&port) {
                state.release(bps, priority);
            }
        }
    }

    /// Single-port release, used by hop-by-hop tail-release.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn release_one(&self, port: PortKey, bps: u64, priority: Priority) {
        let mut table = self.table.lock();
        if let Some(state) = table.get_mut(&port) {
            state.release(bps, priority);
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<PortSnapshot> {
        let table = self.table.lock();
        let mut out: Vec<PortSnapshot> = table
            .iter()
            .map(|(port, state)| PortSnapshot {
                port: *port,
                capacity_bps: state.capacity_bps,
                reserved_bps: state.reserved_total_bps(),
                available_bps: state.available_bps(),
                reserved_by_priority: Priority::ALL.map(|p| state.reserved_bps(p)),
            })
            .collect();
        out.sort_by_key(|s| s.port);
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use qosctl_types::Dpid;

    fn key(dpid: u64, port_no: u32) -> PortKey {
        PortKey::new(Dpid(dpid), port_no)
    }

    #[test]
    fn admits_when_all_ports_have_capacity() {
        let ledger = PortLedger::new([(key(1, 2), 10_000_000), (key(2, 3), 10_000_000)]);
        let ports = [key(1, 2), key(2, 3)];
        assert_eq!(ledger.can_reserve(&ports, 5_000_000), AdmitReason::Ok);
        ledger.reserve(&ports, 5_000_000, Priority::Silver);
        assert_eq!(
            ledger.can_reserve(&ports, 6_000_000),
            AdmitReason::NoCapacity(key(1, 2))
        );
    }

    #[test]
    fn rejects_unknown_port() {
        let ledger = PortLedger::new([(key(1, 2), 10_000_000)]);
        assert_eq!(
            ledger.can_reserve(&[key(9, 9)], 1_000),
            AdmitReason::NoPort(key(9, 9))
        );
    }

    #[test]
    fn release_is_inverse_of_reserve_and_restores_ledger() {
        let ledger = PortLedger::new([(key(1, 2), 10_000_000)]);
        let ports = [key(1, 2)];
        ledger.reserve(&ports, 4_000_000, Priority::Gold);
        let before = ledger.snapshot();
        ledger.release(&ports, 4_000_000, Priority::Gold);
        let empty = ledger.snapshot();
        assert_eq!(empty[0].reserved_bps, 0);
        assert_ne!(before[0].reserved_bps, empty[0].reserved_bps);
    }

    #[test]
    fn double_release_is_a_safe_no_op() {
        let ledger = PortLedger::new([(key(1, 2), 10_000_000)]);
        ledger.reserve(&[key(1, 2)], 3_000_000, Priority::Best);
        ledger.release_one(key(1, 2), 3_000_000, Priority::Best);
        ledger.release_one(key(1, 2), 3_000_000, Priority::Best);
        assert_eq!(ledger.snapshot()[0].reserved_bps, 0);
    }
}

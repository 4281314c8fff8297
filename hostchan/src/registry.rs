// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use parking_lot::Mutex;
use rand::seq::IteratorRandom;
use std::collections::HashMap;
use std::net::Ipv4Addr;

/// A registered host's signalling ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostEntry {
    pub permit_port: u16,
    pub recv_port: u16,
}

/// Registry `host_ip -> (permit_port, recv_port)`, populated at host boot
/// via the REST `register_host` call.
#[derive(Default)]
pub struct HostRegistry {
    hosts: Mutex<HashMap<Ipv4Addr, HostEntry>>,
}

impl HostRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent upsert.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn register(&self, host_ip: Ipv4Addr, permit_port: u16, recv_port: u16) {
        self.hosts.lock().insert(
            host_ip,
            HostEntry {
                permit_port,
                recv_port,
            },
        );
    }

    #[must_use]
    pub fn get(&self, host_ip: Ipv4Addr) -> Option<HostEntry> {
        self.hosts.lock().get(&host_ip).copied()
    }

    /// Uniformly random choice among registered hosts other than `src_ip`.
    #[must_use]
    pub fn pick_destination(&self, src_ip: Ipv4Addr) -> Option<Ipv4Addr> {
        let hosts = self.hosts.lock();
        hosts
            .keys()
            .filter(|&&ip| ip != src_ip)
            .choose(&mut rand::rng())
            .copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hosts.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn register_is_idempotent_upsert() {
        let registry = HostRegistry::new();
        let ip = Ipv4Addr::new(172, 17, 0, 101);
        registry.register(ip, 10_000, 11_000);
        registry.register(ip, 10_000, 12_000);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(ip).unwrap().recv_port, 12_000);
    }

    #[test]
    fn pick_destination_excludes_source_and_empty_registry() {
        let registry = HostRegistry::new();
        let src = Ipv4Addr::new(172, 17, 0, 101);
        assert_eq!(registry.pick_destination(src), None);

        registry.register(src, 10_000, 11_000);
        assert_eq!(registry.pick_destination(src), None);

        let dst = Ipv4Addr::new(172, 17, 0, 102);
        registry.register(dst, 10_000, 11_000);
        assert_eq!(registry.pick_destination(src), Some(dst));
    }
}

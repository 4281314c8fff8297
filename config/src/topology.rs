// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::errors::ConfigError;
use qosctl_types::{Dpid, Hop};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

/// One switch port's provisioned capacity, as loaded from the topology file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PortCapacity {
    pub dpid: u64,
    pub port_no: u32,
    pub capacity_bps: u64,
}

/// A declared path between two hosts.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PathEntry {
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub hops: Vec<RawHop>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RawHop {
    pub dpid: u64,
    pub out_port: u32,
}

impl From<RawHop> for Hop {
    fn from(raw: RawHop) -> Self {
        Hop::new(Dpid(raw.dpid), raw.out_port)
    }
}

/// The `topology.yaml` document: port capacities plus the static path table.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TopologyConfig {
    #[serde(default)]
    pub ports: Vec<PortCapacity>,
    #[serde(default)]
    pub paths: Vec<PathEntry>,
}

impl TopologyConfig {
    /// Loads and validates a topology document from `path`.
    ///
    /// Validation rejects a zero-capacity port and a path entry whose
    /// `src_ip == dst_ip`; everything else is accepted as-is (an empty
    /// `paths` list is a legal, if useless, topology).
    pub fn load(path: impl AsRef<Path>) -> Result<TopologyConfig, ConfigError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config: TopologyConfig =
            serde_yaml_ng::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        config.validate(&path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        for port in &self.ports {
            if port.capacity_bps == 0 {
                return Err(ConfigError::Invalid {
                    path: path.to_path_buf(),
                    reason: format!("port s{}:{} has zero capacity", port.dpid, port.port_no),
                });
            }
        }
        for entry in &self.paths {
            if entry.src_ip == entry.dst_ip {
                return Err(ConfigError::Invalid {
                    path: path.to_path_buf(),
                    reason: format!("path entry {} -> {} is a self-loop", entry.src_ip, entry.dst_ip),
                });
            }
        }
        Ok(())
    }

    /// Builds a [`PathTable`] by indexing every declared path by its
    /// `(src_ip, dst_ip)` key.
    #[must_use]
    pub fn build_path_table(&self) -> PathTable {
        let mut forward = HashMap::new();
        for entry in &self.paths {
            let hops: Vec<Hop> = entry.hops.iter().copied().map(Hop::from).collect();
            forward.insert((entry.src_ip, entry.dst_ip), hops);
        }
        PathTable { forward }
    }

    /// Builds the initial set of `(PortKey, capacity)` pairs for seeding the ledger.
    #[must_use]
    pub fn port_capacities(&self) -> Vec<(qosctl_types::PortKey, u64)> {
        self.ports
            .iter()
            .map(|p| (qosctl_types::PortKey::new(Dpid(p.dpid), p.port_no), p.capacity_bps))
            .collect()
    }
}

/// Static `(src_ip, dst_ip) -> path` lookup.
///
/// Read-only after construction. Falls back to the reverse key with its
/// hop list reversed when the direct key is absent.
#[derive(Debug, Clone)]
pub struct PathTable {
    forward: HashMap<(Ipv4Addr, Ipv4Addr), Vec<Hop>>,
}

impl PathTable {
    #[must_use]
    pub fn lookup(&self, src_ip: Ipv4Addr, dst_ip: Ipv4Addr) -> Vec<Hop> {
        if let Some(hops) = self.forward.get(&(src_ip, dst_ip)) {
            return hops.clone();
        }
        if let Some(hops) = self.forward.get(&(dst_ip, src_ip)) {
            let mut reversed = hops.clone();
            reversed.reverse();
            return reversed;
        }
        Vec::new()
    }
}

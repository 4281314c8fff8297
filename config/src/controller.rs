// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::errors::ConfigError;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_rest_bind() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

const fn default_rest_port() -> u16 {
    8080
}

const fn default_signal_port() -> u16 {
    9000
}

const fn default_host_permit_port() -> u16 {
    10000
}

const fn default_port_base() -> u16 {
    20000
}

const fn default_port_max() -> u16 {
    40000
}

const fn default_t_sched_ms() -> u64 {
    1_000
}

const fn default_t_poll_ms() -> u64 {
    1_000
}

const fn default_t_idle_ms() -> u64 {
    3_000
}

const fn default_t_snapshot_ms() -> u64 {
    3_000
}

const fn default_t_flowmgr_ms() -> u64 {
    10_000
}

const fn default_t_progress_ms() -> u64 {
    5_000
}

fn default_log_root() -> PathBuf {
    PathBuf::from("./logs")
}

/// The `controller.yaml` document: bind addresses, the observation log
/// root, and overridable interval/port-range knobs.
///
/// Every interval has a production default baked in; the file only needs
/// to carry the fields it wants to override, since every field has a
/// `#[serde(default = ...)]`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ControllerConfig {
    #[serde(default = "default_rest_bind")]
    pub rest_bind: Ipv4Addr,
    #[serde(default = "default_rest_port")]
    pub rest_port: u16,

    #[serde(default = "default_rest_bind")]
    pub signal_bind: Ipv4Addr,
    #[serde(default = "default_signal_port")]
    pub signal_port: u16,

    #[serde(default = "default_host_permit_port")]
    pub host_permit_port: u16,

    #[serde(default = "default_port_base")]
    pub port_base: u16,
    #[serde(default = "default_port_max")]
    pub port_max: u16,

    #[serde(default = "default_log_root")]
    pub log_root: PathBuf,

    #[serde(default = "default_t_sched_ms")]
    pub t_sched_ms: u64,
    #[serde(default = "default_t_poll_ms")]
    pub t_poll_ms: u64,
    #[serde(default = "default_t_idle_ms")]
    pub t_idle_ms: u64,
    #[serde(default = "default_t_snapshot_ms")]
    pub t_snapshot_ms: u64,
    #[serde(default = "default_t_flowmgr_ms")]
    pub t_flowmgr_ms: u64,
    #[serde(default = "default_t_progress_ms")]
    pub t_progress_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            rest_bind: default_rest_bind(),
            rest_port: default_rest_port(),
            signal_bind: default_rest_bind(),
            signal_port: default_signal_port(),
            host_permit_port: default_host_permit_port(),
            port_base: default_port_base(),
            port_max: default_port_max(),
            log_root: default_log_root(),
            t_sched_ms: default_t_sched_ms(),
            t_poll_ms: default_t_poll_ms(),
            t_idle_ms: default_t_idle_ms(),
            t_snapshot_ms: default_t_snapshot_ms(),
            t_flowmgr_ms: default_t_flowmgr_ms(),
            t_progress_ms: default_t_progress_ms(),
        }
    }
}

impl ControllerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<ControllerConfig, ConfigError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config: ControllerConfig =
            serde_yaml_ng::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        config.validate(&path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        if self.port_base >= self.port_max {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                reason: format!(
                    "port_base ({}) must be less than port_max ({})",
                    self.port_base, self.port_max
                ),
            });
        }
        Ok(())
    }

    /// The reserved ports the port allocator must skip: the controller's
    /// own REST and signalling ports plus the host PERMIT port.
    #[must_use]
    pub fn reserved_ports(&self) -> [u16; 3] {
        [self.rest_port, self.signal_port, self.host_permit_port]
    }

    #[must_use]
    pub fn t_sched(&self) -> Duration {
        Duration::from_millis(self.t_sched_ms)
    }

    #[must_use]
    pub fn t_poll(&self) -> Duration {
        Duration::from_millis(self.t_poll_ms)
    }

    #[must_use]
    pub fn t_idle(&self) -> Duration {
        Duration::from_millis(self.t_idle_ms)
    }

    #[must_use]
    pub fn t_snapshot(&self) -> Duration {
        Duration::from_millis(self.t_snapshot_ms)
    }

    #[must_use]
    pub fn t_flowmgr(&self) -> Duration {
        Duration::from_millis(self.t_flowmgr_ms)
    }

    #[must_use]
    pub fn t_progress(&self) -> Duration {
        Duration::from_millis(self.t_progress_ms)
    }
}

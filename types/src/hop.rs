// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::fmt;

/// Datapath identifier (OpenFlow `datapath_id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Dpid(pub u64);

impl fmt::Display for Dpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl From<u64> for Dpid {
    fn from(value: u64) -> Self {
        Dpid(value)
    }
}

/// One `(dpid, out_port)` element of a flow's pre-declared path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Hop {
    pub dpid: Dpid,
    pub out_port: u32,
}

impl Hop {
    #[must_use]
    pub const fn new(dpid: Dpid, out_port: u32) -> Self {
        Hop { dpid, out_port }
    }
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dpid, self.out_port)
    }
}

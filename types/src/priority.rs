// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::fmt;

/// Traffic class requested for a flow.
///
/// The three classes are polymorphic in shape: everything that varies
/// between them is a `(dscp, queue_id)` pair and a ledger subtotal, so we
/// index by this enum rather than branching on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Priority {
    Best = 0,
    Silver = 1,
    Gold = 2,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Best, Priority::Silver, Priority::Gold];

    /// Index into a `[T; 3]` keyed by priority, for the ledger's per-class subtotals.
    #[must_use]
    pub const fn index(self) -> usize {
        self as u8 as usize
    }

    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Priority> {
        match value {
            0 => Some(Priority::Best),
            1 => Some(Priority::Silver),
            2 => Some(Priority::Gold),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::Best => "best",
            Priority::Silver => "silver",
            Priority::Gold => "gold",
        };
        f.write_str(name)
    }
}

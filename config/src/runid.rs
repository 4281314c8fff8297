// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use chrono::NaiveDate;
use std::path::Path;

/// Allocates the run identifier for a fresh controller boot: `YYYYMMDD_N`,
/// where `N` is the lowest sequence number not already present as a
/// subdirectory of `log_root` for `date`.
///
/// Missing or unreadable `log_root` is treated as "no prior runs today"
/// rather than an error, since the directory is created lazily on first
/// write.
#[must_use]
pub fn alloc_run_id(log_root: &Path, date: NaiveDate) -> String {
    let prefix = date.format("%Y%m%d").to_string();
    let mut next = 1u32;
    if let Ok(entries) = std::fs::read_dir(log_root) {
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(suffix) = name.strip_prefix(&format!("{prefix}_")) else {
                continue;
            };
            if let Ok(seq) = suffix.parse::<u32>() {
                next = next.max(seq + 1);
            }
        }
    }
    format!("{prefix}_{next}")
}

/// Convenience wrapper around [`alloc_run_id`] using today's local date.
#[must_use]
pub fn alloc_run_id_today(log_root: &Path) -> String {
    alloc_run_id(log_root, chrono::Local::now().date_naive())
}

// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use qosctl_ledger::PortSnapshot;
use qosctl_types::{Flow, FlowId};
use std::fs::OpenOptions;
use std::io::Write;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

/// Per-run observation logging, keyed by the run identifier assigned at
/// boot. Writes are best-effort: a failure is
/// logged at `warn` and otherwise ignored, since these are observability
/// artifacts consumed by external plotting tools, not controller state.
///
/// `FlowManger` is not a typo we introduced: the directory name is
/// preserved verbatim from the tooling this log feeds.
pub struct ObservationLog {
    run_root: PathBuf,
}

impl ObservationLog {
    #[must_use]
    pub fn new(log_root: impl AsRef<Path>, run_id: &str) -> Self {
        ObservationLog {
            run_root: log_root.as_ref().join(run_id),
        }
    }

    fn append_line(&self, relative: impl AsRef<Path>, line: &str) {
        let path = self.run_root.join(relative);
        if let Some(parent) = path.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                tracing::warn!(?path, error = %err, "failed to create observation log directory");
                return;
            }
        }
        let opened = OpenOptions::new().create(true).append(true).open(&path);
        match opened {
            Ok(mut file) => {
                if let Err(err) = writeln!(file, "{line}") {
                    tracing::warn!(?path, error = %err, "failed to append observation log line");
                }
            }
            Err(err) => tracing::warn!(?path, error = %err, "failed to open observation log file"),
        }
    }

    /// Appends one progress record for `flow` to
    /// `FlowProgress/<flow_id>/progress.log`.
    pub fn flow_progress(&self, flow: &Flow) {
        let sent_bytes: u64 = flow.hop_bytes.values().copied().max().unwrap_or(0);
        let line = format!(
            "status={} sent_bytes={} send_rate_bps={} hops={} released={}",
            flow.status(),
            sent_bytes,
            flow.send_rate_bps,
            flow.hop_bytes.len(),
            flow.released_hops.len(),
        );
        self.append_line(
            PathBuf::from("FlowProgress").join(flow.flow_id.to_string()).join("progress.log"),
            &line,
        );
    }

    /// Appends a full ledger dump to `PortSnapshot/port_snapshot.log`.
    pub fn port_snapshot(&self, snapshot: &[PortSnapshot]) {
        let line = snapshot
            .iter()
            .map(|s| format!("{}={}/{}", s.port, s.reserved_bps, s.capacity_bps))
            .collect::<Vec<_>>()
            .join(" ");
        self.append_line("PortSnapshot/port_snapshot.log", &line);
    }

    /// Appends a pending/active/finished summary to
    /// `FlowManger/flow_manager.log`.
    pub fn flow_manager_summary(&self, pending: &[FlowId], active: &[FlowId], finished_count: usize) {
        let line = format!(
            "pending={:?} active={:?} finished_count={finished_count}",
            pending, active
        );
        self.append_line("FlowManger/flow_manager.log", &line);
    }

    /// Reserves the directory layout an external `iperf` harness expects
    /// for one flow's traffic generators; the processes themselves are an
    /// external collaborator, so only empty placeholder logs are created.
    pub fn reserve_iperf_dirs(&self, flow_id: FlowId, src_ip: Ipv4Addr, dst_ip: Ipv4Addr) {
        let dir = self
            .run_root
            .join("iperf")
            .join(format!("{flow_id}:{src_ip}_to_{dst_ip}"));
        if let Err(err) = std::fs::create_dir_all(&dir) {
            tracing::warn!(?dir, error = %err, "failed to reserve iperf directory");
            return;
        }
        for name in ["client.log", "server.log"] {
            let path = dir.join(name);
            if let Err(err) = OpenOptions::new().create(true).append(true).open(&path) {
                tracing::warn!(?path, error = %err, "failed to create iperf placeholder log");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use qosctl_types::Priority;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn tempdir() -> PathBuf {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut dir = std::env::temp_dir();
        dir.push(format!("qosctl-obslog-test-{}-{n}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn flow_progress_creates_per_flow_file() {
        let root = tempdir();
        let log = ObservationLog::new(&root, "20260727_1");
        let flow = Flow::new(
            FlowId(10_000),
            Ipv4Addr::new(10, 0, 1, 1),
            Ipv4Addr::new(10, 0, 3, 1),
            5_000_000,
            1_000_000,
            Priority::Silver,
        );
        log.flow_progress(&flow);
        let path = root.join("20260727_1/FlowProgress/10000/progress.log");
        assert!(path.exists());
    }

    #[test]
    fn flow_manger_directory_name_is_preserved_verbatim() {
        let root = tempdir();
        let log = ObservationLog::new(&root, "20260727_1");
        log.flow_manager_summary(&[], &[], 0);
        assert!(root.join("20260727_1/FlowManger/flow_manager.log").exists());
    }

    #[test]
    fn reserve_iperf_dirs_creates_placeholder_logs() {
        let root = tempdir();
        let log = ObservationLog::new(&root, "20260727_1");
        let src = Ipv4Addr::new(10, 0, 1, 1);
        let dst = Ipv4Addr::new(10, 0, 3, 1);
        log.reserve_iperf_dirs(FlowId(10_000), src, dst);
        let dir = root.join("20260727_1/iperf/10000:10.0.1.1_to_10.0.3.1");
        assert!(dir.join("client.log").exists());
        assert!(dir.join("server.log").exists());
    }
}

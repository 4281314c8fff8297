// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::errors::RequestError;
use crate::tables::FlowTables;
use crate::DatapathRegistry;
use parking_lot::Mutex;
use qosctl_alloc::{queue_for, DscpAllocator, PortAllocator};
use qosctl_config::PathTable;
use qosctl_hostchan::{FlowSignalInfo, HostChannel};
use qosctl_installer::DatapathTransport;
use qosctl_ledger::PortLedger;
use qosctl_stats::StatsSource;
use qosctl_types::{Dpid, Flow, FlowId, FlowStatus, PortKey, Priority};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn host_no_of(src_ip: Ipv4Addr) -> u64 {
    u64::from(src_ip.octets()[3]).saturating_sub(100)
}

fn reason_label(reason: qosctl_ledger::AdmitReason) -> &'static str {
    match reason {
        qosctl_ledger::AdmitReason::Ok => "ok",
        qosctl_ledger::AdmitReason::NoPort(_) => "no_port",
        qosctl_ledger::AdmitReason::NoCapacity(_) => "no_capacity",
    }
}

/// Owns the flow tables, the port ledger, the allocators, the connected
/// datapaths, and the run identifier: the scheduling and resource-
/// management engine the rest of the system is built around.
///
/// Every collaborator here either guards its own state with its own lock
/// (the ledger, the allocators) or is itself cheap to clone (`Arc`), so the
/// one `Mutex` this struct keeps directly — over [`FlowTables`] — is the
/// only lock a caller needs to reason about when mutating `pending`/
/// `active`. Outbound signalling is always performed with that lock
/// released first.
pub struct SchedulerCore {
    pub run_id: String,
    path_table: PathTable,
    ledger: Arc<PortLedger>,
    dscp_alloc: DscpAllocator,
    port_alloc: PortAllocator,
    tables: Mutex<FlowTables>,
    datapaths: DatapathRegistry,
    transport: Arc<dyn DatapathTransport>,
    host_channel: Arc<HostChannel>,
    host_seq: Mutex<HashMap<u64, u64>>,
}

impl SchedulerCore {
    #[must_use]
    pub fn new(
        run_id: String,
        path_table: PathTable,
        ledger: Arc<PortLedger>,
        port_base: u16,
        port_max: u16,
        reserved_ports: impl IntoIterator<Item = u16>,
        transport: Arc<dyn DatapathTransport>,
        host_channel: Arc<HostChannel>,
    ) -> Self {
        SchedulerCore {
            run_id,
            path_table,
            ledger,
            dscp_alloc: DscpAllocator::new(),
            port_alloc: PortAllocator::new(port_base, port_max, reserved_ports),
            tables: Mutex::new(FlowTables::new()),
            datapaths: DatapathRegistry::new(),
            transport,
            host_channel,
            host_seq: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ledger(&self) -> &PortLedger {
        &self.ledger
    }

    #[must_use]
    pub fn host_channel(&self) -> &HostChannel {
        &self.host_channel
    }

    /// Registers a host with the host channel (idempotent upsert).
    pub fn register_host(&self, host_ip: Ipv4Addr, permit_port: u16, recv_port: u16) {
        self.host_channel.registry().register(host_ip, permit_port, recv_port);
    }

    /// The REST front-end's single request handler, minus the HTTP framing:
    /// picks a destination, allocates a flow id, and inserts a `Pending` flow.
    /// Returns the assigned id and destination synchronously; admission
    /// itself happens on the next scheduling tick.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn submit_flow(
        &self,
        src_ip: Ipv4Addr,
        requested_src_port: Option<u16>,
        size_bytes: u64,
        request_rate_bps: u64,
        priority: Priority,
    ) -> Result<(FlowId, Ipv4Addr), RequestError> {
        if size_bytes == 0 {
            return Err(RequestError::NonPositiveSize);
        }
        if request_rate_bps == 0 {
            return Err(RequestError::NonPositiveRate);
        }
        if self.host_channel.registry().get(src_ip).is_none() {
            return Err(RequestError::UnknownSource(src_ip));
        }
        let Some(dst_ip) = self.host_channel.registry().pick_destination(src_ip) else {
            return Err(RequestError::NoPeerHost);
        };

        let seq = {
            let mut seqs = self.host_seq.lock();
            let counter = seqs.entry(host_no_of(src_ip)).or_insert(0);
            *counter += 1;
            *counter
        };
        let flow_id = Flow::id_from_source(src_ip, seq);
        let mut flow = Flow::new(flow_id, src_ip, dst_ip, request_rate_bps, size_bytes, priority);
        flow.requested_src_port = requested_src_port;

        self.tables.lock().insert_pending(flow);
        Ok((flow_id, dst_ip))
    }

    pub fn on_switch_connected(&self, dpid: Dpid) {
        self.datapaths.on_connected(dpid, self.transport.as_ref());
    }

    pub fn on_switch_disconnected(&self, dpid: Dpid) {
        self.datapaths.on_disconnected(dpid);
    }

    #[must_use]
    pub fn connected_datapaths(&self) -> Vec<Dpid> {
        self.datapaths.connected()
    }

    /// One pass of the admission loop: walks `pending` in insertion order,
    /// admitting whatever fits and leaving the rest in place (no aging,
    /// no reservation) for the next tick. Returns the number of flows
    /// admitted this tick.
    ///
    /// Rule install, bandwidth reservation, and the flow-table mutation
    /// all happen under the `FlowTables` lock; `FLOW_PREPARE`/`PERMIT` are
    /// sent afterward, with the lock released, since they block on a TCP
    /// connect.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn tick_admission(&self) -> usize {
        let mut to_signal = Vec::new();

        {
            let mut tables = self.tables.lock();
            let attempts = tables.pending_len();
            for _ in 0..attempts {
                let Some(flow_id) = tables.pop_pending_front() else {
                    break;
                };
                self.try_admit_one(&mut tables, flow_id, &mut to_signal);
            }
        }

        let admitted = to_signal.len();
        for info in to_signal {
            let prepared = self.host_channel.send_flow_prepare(&info, Some(self.run_id.clone())).await;
            if prepared {
                if let Some(flow) = self.tables.lock().get_mut(info.flow_id) {
                    flow.prepared_at = Some(Instant::now());
                }
            }
            let permitted = self.host_channel.send_permit(&info, Some(self.run_id.clone())).await;
            if permitted {
                if let Some(flow) = self.tables.lock().get_mut(info.flow_id) {
                    flow.permitted_at = Some(Instant::now());
                }
            }
        }
        admitted
    }

    fn try_admit_one(&self, tables: &mut FlowTables, flow_id: FlowId, to_signal: &mut Vec<FlowSignalInfo>) {
        let Some(flow) = tables.get(flow_id) else { return };
        let path = self.path_table.lookup(flow.src_ip, flow.dst_ip);
        if path.is_empty() {
            tracing::trace!(%flow_id, "no path for flow, leaving pending");
            tables.requeue_pending(flow_id);
            return;
        }

        let (ok, rate, reason) = crate::admit::can_admit(&self.ledger, flow.request_rate_bps, &path);
        if !ok {
            tracing::trace!(%flow_id, ?reason, "flow not admissible this tick");
            metrics::counter!("flows_rejected_total", "reason" => reason_label(reason)).increment(1);
            tables.requeue_pending(flow_id);
            return;
        }

        let priority = flow.priority;
        let src_ip = flow.src_ip;
        let dst_ip = flow.dst_ip;
        let requested_src_port = flow.requested_src_port;
        let size_bytes = flow.size_bytes;

        let dscp = self.dscp_alloc.allocate(flow_id, priority);
        let queue_id = queue_for(priority);
        let ports: Result<(u16, u16), _> = match requested_src_port {
            Some(src_port) => self
                .port_alloc
                .bind_with_fixed_src(flow_id, src_ip, src_port, dst_ip)
                .map(|dst_port| (src_port, dst_port)),
            None => self.port_alloc.allocate_flow_ports(flow_id, src_ip, dst_ip, None),
        };
        let (src_port, dst_port) = match ports {
            Ok(ports) => ports,
            Err(err) => {
                tracing::warn!(%flow_id, %err, "port allocation failed, leaving pending");
                self.dscp_alloc.free(flow_id);
                tables.requeue_pending(flow_id);
                return;
            }
        };

        qosctl_installer::install_flow(self.transport.as_ref(), &path, flow_id, src_ip, dst_ip, dscp, queue_id);
        let port_keys: Vec<PortKey> = path.iter().map(|hop| PortKey::new(hop.dpid, hop.out_port)).collect();
        self.ledger.reserve(&port_keys, rate, priority);

        let flow = tables.get_mut(flow_id).expect("flow exists: looked up above");
        flow.dscp = Some(dscp);
        flow.queue_id = Some(queue_id);
        flow.src_port = Some(src_port);
        flow.dst_port = Some(dst_port);
        flow.path = path;
        flow.set_send_rate(rate);
        let _ = flow.transition_to(FlowStatus::Allowed);
        flow.allowed_at = Some(Instant::now());
        tables.activate(flow_id);
        metrics::counter!("flows_admitted_total").increment(1);
        metrics::gauge!("flows_active").set(tables.active_ids().len() as f64);

        to_signal.push(FlowSignalInfo {
            flow_id,
            src_ip,
            dst_ip,
            src_port,
            dst_port,
            send_rate_bps: rate,
            size_bytes,
            dscp,
        });
    }

    /// One pass of the stats collector: polls every connected switch,
    /// demultiplexes replies to active flows by cookie (an unknown cookie
    /// is dropped silently), updates per-hop samples, runs staged
    /// tail-release, and checks terminal conditions. Returns the number of
    /// flows that finished this tick.
    #[tracing::instrument(level = "debug", skip(self, stats_source))]
    pub fn tick_stats(&self, stats_source: &dyn StatsSource, t_idle: Duration) -> usize {
        let mut tables = self.tables.lock();
        let now = Instant::now();

        for dpid in self.datapaths.connected() {
            for sample in stats_source.poll_flow_stats(dpid) {
                let flow_id = qosctl_installer::flow_id_of(sample.cookie);
                if !tables.is_active(flow_id) {
                    continue;
                }
                if let Some(flow) = tables.get_mut(flow_id) {
                    qosctl_stats::record_sample(flow, dpid, sample.byte_count, now);
                }
            }
        }

        let mut finished = 0;
        for flow_id in tables.active_ids() {
            let Some(flow) = tables.get_mut(flow_id) else { continue };
            let released_before = flow.released_hops.len();
            qosctl_stats::tail_release(flow, &self.ledger, self.transport.as_ref());
            if flow.released_hops.len() > released_before {
                metrics::counter!("tail_release_events_total")
                    .increment((flow.released_hops.len() - released_before) as u64);
            }
            let is_finished =
                qosctl_stats::check_terminal(flow, &self.ledger, self.transport.as_ref(), &self.dscp_alloc, now, t_idle);
            if is_finished {
                if let (Some(src_port), Some(dst_port)) = (flow.src_port, flow.dst_port) {
                    self.port_alloc.release(flow.src_ip, src_port, flow.dst_ip, dst_port);
                }
                tables.deactivate(flow_id);
                finished += 1;
            }
        }
        if finished > 0 {
            metrics::counter!("flows_finished_total").increment(finished as u64);
            metrics::gauge!("flows_active").set(tables.active_ids().len() as f64);
        }
        finished
    }

    /// Runs `f` against every flow ever admitted, for observation logging.
    pub fn for_each_flow(&self, mut f: impl FnMut(&Flow)) {
        let tables = self.tables.lock();
        for id in tables.all_ids() {
            if let Some(flow) = tables.get(id) {
                f(flow);
            }
        }
    }

    /// `(pending_ids, active_ids, finished_count)`, for the periodic
    /// flow-manager summary log.
    #[must_use]
    pub fn summary(&self) -> (Vec<FlowId>, Vec<FlowId>, usize) {
        let tables = self.tables.lock();
        (tables.pending_ids(), tables.active_ids(), tables.finished_count())
    }

    /// Publishes `port_reserved_bps{dpid,port,class}` from the ledger's
    /// current snapshot. Called from the periodic snapshot tick, not from
    /// the hot admission/stats path.
    pub fn emit_port_metrics(&self) {
        for port in self.ledger.snapshot() {
            let dpid = port.port.dpid.0.to_string();
            let port_no = port.port.port_no.to_string();
            for priority in Priority::ALL {
                metrics::gauge!(
                    "port_reserved_bps",
                    "dpid" => dpid.clone(),
                    "port" => port_no.clone(),
                    "class" => priority.to_string(),
                )
                .set(port.reserved_by_priority[priority.index()] as f64);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use qosctl_config::TopologyConfig;
    use qosctl_installer::InMemoryTransport;
    use std::net::Ipv4Addr;

    fn five_hop_topology() -> (PathTable, Arc<PortLedger>) {
        let src = Ipv4Addr::new(10, 0, 0, 101);
        let dst = Ipv4Addr::new(10, 0, 0, 102);
        let hops = (1..=5)
            .map(|dpid| qosctl_config::RawHop { dpid, out_port: dpid as u32 + 10 })
            .collect::<Vec<_>>();
        let topo = TopologyConfig {
            ports: hops
                .iter()
                .map(|h| qosctl_config::PortCapacity {
                    dpid: h.dpid,
                    port_no: h.out_port,
                    capacity_bps: 10_000_000,
                })
                .collect(),
            paths: vec![qosctl_config::PathEntry {
                src_ip: src,
                dst_ip: dst,
                hops,
            }],
        };
        let ledger = Arc::new(PortLedger::new(topo.port_capacities()));
        (topo.build_path_table(), ledger)
    }

    fn scheduler_with(path_table: PathTable, ledger: Arc<PortLedger>) -> SchedulerCore {
        SchedulerCore::new(
            "20260727_1".to_string(),
            path_table,
            ledger,
            20_000,
            20_100,
            [],
            Arc::new(InMemoryTransport::new()),
            Arc::new(HostChannel::new()),
        )
    }

    #[tokio::test]
    async fn single_flow_admits_reserves_and_installs() {
        let (path_table, ledger) = five_hop_topology();
        let src = Ipv4Addr::new(10, 0, 0, 101);
        let dst = Ipv4Addr::new(10, 0, 0, 102);
        let scheduler = scheduler_with(path_table, ledger);
        scheduler.register_host(src, 1, 2);
        scheduler.register_host(dst, 3, 4);

        let (flow_id, picked_dst) = scheduler
            .submit_flow(src, None, 1_000_000, 5_000_000, Priority::Silver)
            .unwrap();
        assert_eq!(picked_dst, dst);

        let admitted = scheduler.tick_admission().await;
        assert_eq!(admitted, 1);

        let (pending, active, _) = scheduler.summary();
        assert!(pending.is_empty());
        assert_eq!(active, vec![flow_id]);

        let snapshot = scheduler.ledger().snapshot();
        assert!(snapshot.iter().all(|s| s.reserved_bps == 5_000_000));
    }

    #[tokio::test]
    async fn contending_flow_stays_pending_until_capacity_frees() {
        let (path_table, ledger) = five_hop_topology();
        let src = Ipv4Addr::new(10, 0, 0, 101);
        let dst = Ipv4Addr::new(10, 0, 0, 102);
        let scheduler = scheduler_with(path_table, ledger);
        scheduler.register_host(src, 1, 2);
        scheduler.register_host(dst, 3, 4);

        let (flow_a, _) = scheduler.submit_flow(src, None, 1_000_000, 7_000_000, Priority::Gold).unwrap();
        let (flow_b, _) = scheduler.submit_flow(src, None, 1_000_000, 5_000_000, Priority::Silver).unwrap();

        let admitted = scheduler.tick_admission().await;
        assert_eq!(admitted, 1);
        let (pending, active, _) = scheduler.summary();
        assert_eq!(active, vec![flow_a]);
        assert_eq!(pending, vec![flow_b]);

        // Drive flow A to completion via the idle path to free capacity:
        // one zero-byte sample at the last hop starts its idle clock, then
        // a second tick past a tiny `t_idle` declares it finished.
        let source = qosctl_stats::InMemoryStatsSource::new();
        let last_hop_cookie = qosctl_installer::make_cookie(flow_a, 5);
        source.set_byte_count(qosctl_types::Dpid(5), last_hop_cookie, 0);
        scheduler.tick_stats(&source, Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(5)).await;
        let finished = scheduler.tick_stats(&source, Duration::from_millis(1));
        assert_eq!(finished, 1);

        let admitted_again = scheduler.tick_admission().await;
        assert_eq!(admitted_again, 1);
        let (pending, active, _) = scheduler.summary();
        assert_eq!(active, vec![flow_b]);
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn request_with_no_path_stays_pending_forever() {
        let (path_table, ledger) = five_hop_topology();
        let src = Ipv4Addr::new(10, 0, 0, 101);
        let unreachable = Ipv4Addr::new(10, 0, 0, 200);
        let scheduler = scheduler_with(path_table, ledger);
        scheduler.register_host(src, 1, 2);
        scheduler.register_host(unreachable, 3, 4);

        let (flow_id, _) = scheduler.submit_flow(src, None, 1_000_000, 1_000_000, Priority::Best).unwrap();
        for _ in 0..3 {
            scheduler.tick_admission().await;
        }
        let (pending, active, _) = scheduler.summary();
        assert_eq!(pending, vec![flow_id]);
        assert!(active.is_empty());
    }

    #[test]
    fn submit_flow_rejects_unknown_source() {
        let (path_table, ledger) = five_hop_topology();
        let scheduler = scheduler_with(path_table, ledger);
        let err = scheduler
            .submit_flow(Ipv4Addr::new(9, 9, 9, 9), None, 1_000, 1_000, Priority::Best)
            .unwrap_err();
        assert_eq!(err, RequestError::UnknownSource(Ipv4Addr::new(9, 9, 9, 9)));
    }

    #[test]
    fn submit_flow_rejects_when_no_peer_host_registered() {
        let (path_table, ledger) = five_hop_topology();
        let scheduler = scheduler_with(path_table, ledger);
        let src = Ipv4Addr::new(10, 0, 0, 101);
        scheduler.register_host(src, 1, 2);
        let err = scheduler.submit_flow(src, None, 1_000, 1_000, Priority::Best).unwrap_err();
        assert_eq!(err, RequestError::NoPeerHost);
    }
}

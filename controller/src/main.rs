// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all)]

mod args;

use crate::args::CmdArgs;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use qosctl_config::{ControllerConfig, TopologyConfig};
use qosctl_hostchan::HostChannel;
use qosctl_installer::InMemoryTransport;
use qosctl_ledger::PortLedger;
use qosctl_scheduler::SchedulerCore;
use qosctl_stats::{InMemoryStatsSource, ObservationLog};
use qosctl_types::Dpid;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_target(true).with_env_filter(filter).init();
}

/// Bootstraps the default pipeline on every distinct dpid named in the
/// topology. Stands in for a real OpenFlow feature-reply handshake, which
/// is out of scope here: the southbound wire encoding is abstracted
/// behind [`qosctl_installer::DatapathTransport`] and this controller runs
/// against its in-memory dry-run double rather than a live switch.
fn bootstrap_known_datapaths(scheduler: &SchedulerCore, topology: &TopologyConfig) {
    let mut seen = HashSet::new();
    for port in &topology.ports {
        if seen.insert(port.dpid) {
            scheduler.on_switch_connected(Dpid(port.dpid));
        }
    }
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = CmdArgs::parse();
    init_logging(&args.log_level);

    let topology = TopologyConfig::load(&args.topology)?;
    let controller_config = ControllerConfig::load(&args.controller_config)?;
    let run_id = qosctl_config::alloc_run_id_today(&controller_config.log_root);
    info!(run_id, "starting admission controller");

    let ledger = Arc::new(PortLedger::new(topology.port_capacities()));
    let transport = Arc::new(InMemoryTransport::new());
    let host_channel = Arc::new(HostChannel::new());
    let scheduler = Arc::new(SchedulerCore::new(
        run_id.clone(),
        topology.build_path_table(),
        Arc::clone(&ledger),
        controller_config.port_base,
        controller_config.port_max,
        controller_config.reserved_ports(),
        Arc::clone(&transport) as Arc<dyn qosctl_installer::DatapathTransport>,
        Arc::clone(&host_channel),
    ));
    bootstrap_known_datapaths(&scheduler, &topology);

    let metrics_handle = PrometheusBuilder::new().install_recorder()?;
    let ready = Arc::new(AtomicBool::new(false));
    let app_state = Arc::new(qosctl_api::AppState::new(
        Arc::clone(&scheduler),
        metrics_handle,
        Arc::clone(&ready),
    ));
    let router = qosctl_api::build_router(app_state);

    let rest_addr = SocketAddr::from((controller_config.rest_bind, controller_config.rest_port));
    let listener = tokio::net::TcpListener::bind(rest_addr).await?;
    info!(%rest_addr, "REST front-end listening");
    let server = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).await {
            warn!(error = %err, "REST server exited");
        }
    });

    let admission_task = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        let ready = Arc::clone(&ready);
        let interval = controller_config.t_sched();
        async move {
            loop {
                tokio::time::sleep(interval).await;
                let admitted = scheduler.tick_admission().await;
                ready.store(true, Ordering::Release);
                if admitted > 0 {
                    tracing::debug!(admitted, "admission tick");
                }
            }
        }
    });

    let stats_task = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        let interval = controller_config.t_poll();
        let t_idle = controller_config.t_idle();
        let stats_source = Arc::new(InMemoryStatsSource::new());
        async move {
            loop {
                tokio::time::sleep(interval).await;
                let finished = scheduler.tick_stats(stats_source.as_ref(), t_idle);
                if finished > 0 {
                    tracing::debug!(finished, "stats tick");
                }
            }
        }
    });

    let snapshot_task = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        let interval = controller_config.t_snapshot();
        let observation = ObservationLog::new(controller_config.log_root.clone(), &run_id);
        async move {
            loop {
                tokio::time::sleep(interval).await;
                scheduler.emit_port_metrics();
                observation.port_snapshot(&scheduler.ledger().snapshot());
            }
        }
    });

    let flowmgr_task = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        let interval = controller_config.t_flowmgr();
        let observation = ObservationLog::new(controller_config.log_root.clone(), &run_id);
        async move {
            loop {
                tokio::time::sleep(interval).await;
                let (pending, active, finished_count) = scheduler.summary();
                observation.flow_manager_summary(&pending, &active, finished_count);
            }
        }
    });

    let progress_task = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        let interval = controller_config.t_progress();
        let observation = ObservationLog::new(controller_config.log_root.clone(), &run_id);
        async move {
            loop {
                tokio::time::sleep(interval).await;
                scheduler.for_each_flow(|flow| observation.flow_progress(flow));
            }
        }
    });

    wait_for_sigint().await?;
    info!("shutdown signal received, stopping");
    server.abort();
    admission_task.abort();
    stats_task.abort();
    snapshot_task.abort();
    flowmgr_task.abort();
    progress_task.abort();
    Ok(())
}

/// Bridges the `ctrlc` crate's synchronous signal handler into the async
/// runtime via a one-shot channel, so the rest of the program stays
/// `tokio`-native.
async fn wait_for_sigint() -> color_eyre::Result<()> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let tx = std::sync::Mutex::new(Some(tx));
    ctrlc::set_handler(move || {
        if let Some(tx) = tx.lock().unwrap().take() {
            let _ = tx.send(());
        }
    })?;
    rx.await.ok();
    Ok(())
}

// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use metrics_exporter_prometheus::PrometheusHandle;
use qosctl_scheduler::SchedulerCore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// State shared across every request handler.
pub struct AppState {
    pub scheduler: Arc<SchedulerCore>,
    metrics_handle: PrometheusHandle,
    ready: Arc<AtomicBool>,
}

impl AppState {
    #[must_use]
    pub fn new(scheduler: Arc<SchedulerCore>, metrics_handle: PrometheusHandle, ready: Arc<AtomicBool>) -> Self {
        AppState {
            scheduler,
            metrics_handle,
            ready,
        }
    }

    #[must_use]
    pub fn render_metrics(&self) -> String {
        self.metrics_handle.render()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use clap::Parser;
use std::path::PathBuf;

/// Command-line surface for the admission controller: the two
/// declarative config files are the only required inputs, since every
/// bind address and interval already has a default baked into
/// `ControllerConfig`.
#[derive(Parser, Debug)]
#[command(name = "qosctl-controller")]
#[command(about = "SDN QoS admission controller")]
#[command(version)]
pub struct CmdArgs {
    /// Path to the topology document (ports' capacities and the static path table).
    #[arg(long, value_name = "PATH", default_value = "topology.yaml")]
    pub topology: PathBuf,

    /// Path to the controller document (bind addresses, log root, interval overrides).
    #[arg(long, value_name = "PATH", default_value = "controller.yaml")]
    pub controller_config: PathBuf,

    /// Log level for the tracing subscriber.
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub log_level: String,
}

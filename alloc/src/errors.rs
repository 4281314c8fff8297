// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocError {
    #[error("port range [{base}, {max}] is exhausted")]
    PortRangeExhausted { base: u16, max: u16 },

    #[error("4-tuple ({src_ip}, {src_port}, {dst_ip}, {dst_port}) is already bound")]
    DuplicateTuple {
        src_ip: std::net::Ipv4Addr,
        src_port: u16,
        dst_ip: std::net::Ipv4Addr,
        dst_port: u16,
    },
}

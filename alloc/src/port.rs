// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::errors::AllocError;
use parking_lot::Mutex;
use qosctl_types::FlowId;
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FourTuple {
    src_ip: Ipv4Addr,
    src_port: u16,
    dst_ip: Ipv4Addr,
    dst_port: u16,
}

struct State {
    cursor: u16,
    in_use: HashSet<u16>,
    bindings: HashMap<FourTuple, FlowId>,
}

/// Round-robin ephemeral L4 port allocator over `[base, max]`, skipping a
/// fixed reserved set (the controller's own REST/signalling ports and the
/// host PERMIT port). Maintains the injective `(src_ip, src_port, dst_ip,
/// dst_port) -> flow_id` mapping.
pub struct PortAllocator {
    base: u16,
    max: u16,
    reserved: HashSet<u16>,
    state: Mutex<State>,
}

impl PortAllocator {
    #[must_use]
    pub fn new(base: u16, max: u16, reserved: impl IntoIterator<Item = u16>) -> Self {
        PortAllocator {
            base,
            max,
            reserved: reserved.into_iter().collect(),
            state: Mutex::new(State {
                cursor: base,
                in_use: HashSet::new(),
                bindings: HashMap::new(),
            }),
        }
    }

    fn next_free_port(&self, state: &mut State) -> Result<u16, AllocError> {
        let span = u32::from(self.max) - u32::from(self.base) + 1;
        for _ in 0..span {
            let candidate = state.cursor;
            state.cursor = if state.cursor >= self.max {
                self.base
            } else {
                state.cursor + 1
            };
            if self.reserved.contains(&candidate) || state.in_use.contains(&candidate) {
                continue;
            }
            state.in_use.insert(candidate);
            return Ok(candidate);
        }
        Err(AllocError::PortRangeExhausted {
            base: self.base,
            max: self.max,
        })
    }

    /// Allocates a source port for `flow_id` and either accepts
    /// `fixed_dst_port` or allocates a destination port too, then records
    /// the 4-tuple binding. Fails closed on range exhaustion or on a
    /// (practically unreachable, since ports are drawn from a set excluding
    /// already in-use values) tuple collision.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn allocate_flow_ports(
        &self,
        flow_id: FlowId,
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        fixed_dst_port: Option<u16>,
    ) -> Result<(u16, u16), AllocError> {
        let mut state = self.state.lock();
        let src_port = self.next_free_port(&mut state)?;
        let dst_port = match fixed_dst_port {
            Some(port) => port,
            None => match self.next_free_port(&mut state) {
                Ok(port) => port,
                Err(err) => {
                    state.in_use.remove(&src_port);
                    return Err(err);
                }
            },
        };

        let tuple = FourTuple {
            src_ip,
            src_port,
            dst_ip,
            dst_port,
        };
        if state.bindings.contains_key(&tuple) {
            state.in_use.remove(&src_port);
            if fixed_dst_port.is_none() {
                state.in_use.remove(&dst_port);
            }
            return Err(AllocError::DuplicateTuple {
                src_ip,
                src_port,
                dst_ip,
                dst_port,
            });
        }
        state.bindings.insert(tuple, flow_id);
        Ok((src_port, dst_port))
    }

    /// Binds a flow whose source port was declared by the caller rather
    /// than drawn from this pool (the requesting host already knows which
    /// local port its traffic generator will use). Only `dst_port` is
    /// drawn from `[base, max]`; `src_port` is recorded in the 4-tuple
    /// binding for collision/demultiplexing purposes but never added to
    /// `in_use`, since it isn't this allocator's to reclaim.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn bind_with_fixed_src(
        &self,
        flow_id: FlowId,
        src_ip: Ipv4Addr,
        src_port: u16,
        dst_ip: Ipv4Addr,
    ) -> Result<u16, AllocError> {
        let mut state = self.state.lock();
        let dst_port = self.next_free_port(&mut state)?;
        let tuple = FourTuple {
            src_ip,
            src_port,
            dst_ip,
            dst_port,
        };
        if state.bindings.contains_key(&tuple) {
            state.in_use.remove(&dst_port);
            return Err(AllocError::DuplicateTuple {
                src_ip,
                src_port,
                dst_ip,
                dst_port,
            });
        }
        state.bindings.insert(tuple, flow_id);
        Ok(dst_port)
    }

    /// Looks up the flow bound to a 4-tuple, for demultiplexing inbound
    /// signalling replies.
    #[must_use]
    pub fn get_flow_id(
        &self,
        src_ip: Ipv4Addr,
        src_port: u16,
        dst_ip: Ipv4Addr,
        dst_port: u16,
    ) -> Option<FlowId> {
        let tuple = FourTuple {
            src_ip,
            src_port,
            dst_ip,
            dst_port,
        };
        self.state.lock().bindings.get(&tuple).copied()
    }

    /// Returns a previously allocated port (and its tuple binding, if any)
    /// to the pool. Idempotent: releasing an already-free port is a no-op.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn release(&self, src_ip: Ipv4Addr, src_port: u16, dst_ip: Ipv4Addr, dst_port: u16) {
        let mut state = self.state.lock();
        state.in_use.remove(&src_port);
        state.in_use.remove(&dst_port);
        state.bindings.remove(&FourTuple {
            src_ip,
            src_port,
            dst_ip,
            dst_port,
        });
    }
}

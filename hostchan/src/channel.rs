// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::registry::HostRegistry;
use crate::wire::SignalMessage;
use qosctl_types::FlowId;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Parameters needed to signal one flow, gathered by the caller from the
/// flow and its allocation result.
#[derive(Debug, Clone, Copy)]
pub struct FlowSignalInfo {
    pub flow_id: FlowId,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub send_rate_bps: u64,
    pub size_bytes: u64,
    pub dscp: u8,
}

/// Host registry plus outbound signalling socket.
///
/// Both `send_flow_prepare` and `send_permit` are fire-and-forget: any I/O
/// failure is logged at `warn` and never propagated, since a stalled
/// source is reclaimed by the stats collector's idle path regardless.
pub struct HostChannel {
    registry: HostRegistry,
}

impl Default for HostChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl HostChannel {
    #[must_use]
    pub fn new() -> Self {
        HostChannel {
            registry: HostRegistry::new(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &HostRegistry {
        &self.registry
    }

    /// Opens a short-lived connection to `dst_ip:permit_port` and writes a
    /// `FLOW_PREPARE` record. Must complete before [`Self::send_permit`]
    /// for the same flow: the sink has to be listening on the chosen
    /// 4-tuple before the source attempts to open a transport.
    ///
    /// Returns whether the record was actually written, so a caller that
    /// wants to record a `prepared_at` timestamp only does so on success.
    /// Both timestamps may be absent on signalling failure, but if
    /// present must be ordered.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn send_flow_prepare(&self, info: &FlowSignalInfo, run_ts: Option<String>) -> bool {
        let Some(dst) = self.registry.get(info.dst_ip) else {
            tracing::warn!(flow_id = %info.flow_id, dst_ip = %info.dst_ip, "FLOW_PREPARE: destination not registered");
            return false;
        };
        let message = SignalMessage::FlowPrepare {
            flow_id: info.flow_id,
            src_ip: info.src_ip,
            dst_ip: info.dst_ip,
            send_rate_bps: info.send_rate_bps,
            size_bytes: info.size_bytes,
            dscp: info.dscp,
            run_ts,
        };
        self.send(info.dst_ip, dst.permit_port, &message).await
    }

    /// Opens a short-lived connection to `src_ip:permit_port` and writes a
    /// `PERMIT` record, additionally carrying the chosen source and
    /// destination ports. See [`Self::send_flow_prepare`] for the return
    /// value's meaning.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn send_permit(&self, info: &FlowSignalInfo, run_ts: Option<String>) -> bool {
        let Some(src) = self.registry.get(info.src_ip) else {
            tracing::warn!(flow_id = %info.flow_id, src_ip = %info.src_ip, "PERMIT: source not registered");
            return false;
        };
        let message = SignalMessage::Permit {
            flow_id: info.flow_id,
            src_ip: info.src_ip,
            dst_ip: info.dst_ip,
            src_port: info.src_port,
            dst_port: info.dst_port,
            send_rate_bps: info.send_rate_bps,
            size_bytes: info.size_bytes,
            dscp: info.dscp,
            run_ts,
        };
        self.send(info.src_ip, src.permit_port, &message).await
    }

    async fn send(&self, ip: Ipv4Addr, port: u16, message: &SignalMessage) -> bool {
        let addr = (ip, port);
        let connect = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await;
        let mut stream = match connect {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                tracing::warn!(%ip, port, error = %err, "signalling connect failed");
                return false;
            }
            Err(_) => {
                tracing::warn!(%ip, port, "signalling connect timed out");
                return false;
            }
        };

        let mut payload = match serde_json::to_vec(message) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode signalling message");
                return false;
            }
        };
        payload.push(b'\n');
        if let Err(err) = stream.write_all(&payload).await {
            tracing::warn!(%ip, port, error = %err, "signalling write failed");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn send_flow_prepare_writes_one_newline_terminated_record() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let channel = HostChannel::new();
        let dst_ip = Ipv4Addr::new(127, 0, 0, 1);
        channel.registry().register(dst_ip, port, port + 1);

        let info = FlowSignalInfo {
            flow_id: FlowId(10_000),
            src_ip: Ipv4Addr::new(127, 0, 0, 1),
            dst_ip,
            src_port: 20_000,
            dst_port: 20_001,
            send_rate_bps: 5_000_000,
            size_bytes: 1_000_000,
            dscp: 16,
        };

        let accept = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            buf
        });

        channel.send_flow_prepare(&info, Some("20260727_1".to_string())).await;
        drop(channel);

        let received = accept.await.unwrap();
        let text = String::from_utf8(received).unwrap();
        assert!(text.ends_with('\n'));
        assert!(text.contains("FLOW_PREPARE"));
    }

    #[tokio::test]
    async fn send_to_unregistered_host_is_a_silent_no_op() {
        let channel = HostChannel::new();
        let info = FlowSignalInfo {
            flow_id: FlowId(1),
            src_ip: Ipv4Addr::new(10, 0, 0, 1),
            dst_ip: Ipv4Addr::new(10, 0, 0, 2),
            src_port: 1,
            dst_port: 2,
            send_rate_bps: 1,
            size_bytes: 1,
            dscp: 0,
        };
        channel.send_flow_prepare(&info, None).await;
        channel.send_permit(&info, None).await;
    }
}

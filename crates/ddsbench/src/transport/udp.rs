// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP multicast transport.
//!
//! Writers send one datagram per sample to the RTPS user multicast port of
//! the domain (`PB + DG * domain + d2`). Readers bind that port lazily on
//! their first `poll`, join the group and drain datagrams non-blockingly.
//!
//! QoS mapping:
//!
//! | Reliability | Writer socket                         | Full send buffer |
//! |-------------|---------------------------------------|------------------|
//! | RELIABLE    | blocking, `SO_SNDTIMEO = max_blocking`| `WriteTimeout`   |
//! | BEST_EFFORT | non-blocking                          | sample dropped   |
//!
//! Socket buffers are sized from the history depth. UDP offers no
//! retransmission; losses past the socket buffers are what the receiver
//! reports.

use super::frame::{self, FrameKind, MAX_DATAGRAM, MAX_PAYLOAD};
use super::{Endpoint, LifecycleKind, Sample, Transport};
use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::qos::{QosProfile, Reliability};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

/// Bytes budgeted per history slot when sizing socket buffers.
const SAMPLE_BUDGET: usize = 2048;
/// Lower bound for socket buffers.
const MIN_SOCKET_BUFFER: usize = 256 * 1024;
/// Upper bound for socket buffers (the kernel may clamp further).
const MAX_SOCKET_BUFFER: usize = 64 * 1024 * 1024;

fn socket_buffer_for(qos: &QosProfile) -> usize {
    qos.history
        .depth()
        .saturating_mul(SAMPLE_BUDGET)
        .clamp(MIN_SOCKET_BUFFER, MAX_SOCKET_BUFFER)
}

/// UDP multicast transport configured by an explicit [`TransportConfig`].
#[derive(Clone, Debug, Default)]
pub struct UdpTransport {
    config: TransportConfig,
}

impl UdpTransport {
    /// Create a transport; settings are validated here.
    pub fn new(config: TransportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Settings in use.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl Transport for UdpTransport {
    type Endpoint = UdpEndpoint;

    fn connect(&self, domain_id: u32, topic: &str, qos: &QosProfile) -> Result<UdpEndpoint> {
        let port = self.config.user_multicast_port(domain_id)?;
        let dest = SocketAddr::V4(SocketAddrV4::new(self.config.multicast_group, port));
        let buffer = socket_buffer_for(qos);

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_multicast_ttl_v4(self.config.multicast_ttl)?;
        socket.set_multicast_loop_v4(self.config.multicast_loop)?;
        if !self.config.interface.is_unspecified() {
            socket.set_multicast_if_v4(&self.config.interface)?;
        }
        socket.set_send_buffer_size(buffer)?;
        match qos.reliability {
            Reliability::Reliable { max_blocking_time } => {
                socket.set_nonblocking(false)?;
                socket.set_write_timeout(Some(max_blocking_time))?;
            }
            Reliability::BestEffort => socket.set_nonblocking(true)?,
        }
        let bind_addr = SocketAddr::V4(SocketAddrV4::new(self.config.interface, 0));
        socket
            .bind(&bind_addr.into())
            .map_err(|e| Error::BindFailed(format!("{}: {}", bind_addr, e)))?;

        log::debug!(
            "[UDP] connect domain={} topic={} dest={} reliability={:?} sndbuf={}",
            domain_id,
            topic,
            dest,
            qos.reliability,
            socket.send_buffer_size().unwrap_or(0)
        );

        Ok(UdpEndpoint {
            config: self.config.clone(),
            topic: topic.to_string(),
            topic_hash: frame::topic_hash(topic),
            port,
            dest,
            reliability: qos.reliability,
            recv_buffer: buffer,
            tx: socket.into(),
            rx: None,
            sequence: 0,
            frame_buf: Vec::with_capacity(MAX_DATAGRAM),
            recv_buf: Vec::new(),
            dropped: 0,
            unregistered: false,
        })
    }
}

/// Endpoint on a [`UdpTransport`] topic.
pub struct UdpEndpoint {
    config: TransportConfig,
    topic: String,
    topic_hash: u32,
    port: u16,
    dest: SocketAddr,
    reliability: Reliability,
    recv_buffer: usize,
    tx: UdpSocket,
    rx: Option<UdpSocket>,
    sequence: u32,
    frame_buf: Vec<u8>,
    recv_buf: Vec<u8>,
    dropped: u64,
    unregistered: bool,
}

impl UdpEndpoint {
    /// Multicast destination of this endpoint.
    pub fn destination(&self) -> SocketAddr {
        self.dest
    }

    fn open_receiver(&self) -> Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
        if self.config.reuse_port {
            socket.set_reuse_port(true)?;
            log::info!("[UDP] SO_REUSEPORT enabled on port {}", self.port);
        }
        socket.set_recv_buffer_size(self.recv_buffer)?;

        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, self.port));
        socket
            .bind(&bind_addr.into())
            .map_err(|e| Error::BindFailed(format!("{}: {}", bind_addr, e)))?;
        socket
            .join_multicast_v4(&self.config.multicast_group, &self.config.interface)
            .map_err(|e| {
                Error::MulticastJoinFailed(format!(
                    "{} on {}: {}",
                    self.config.multicast_group, self.config.interface, e
                ))
            })?;
        socket.set_nonblocking(true)?;

        log::debug!(
            "[UDP] receiver bound {} group={} rcvbuf={}",
            bind_addr,
            self.config.multicast_group,
            socket.recv_buffer_size().unwrap_or(0)
        );
        Ok(socket.into())
    }

    fn send_frame(&mut self, kind: FrameKind, payload: &[u8]) -> Result<()> {
        frame::encode_into(
            &mut self.frame_buf,
            kind,
            self.topic_hash,
            self.sequence,
            payload,
        );
        self.sequence = self.sequence.wrapping_add(1);

        match self.tx.send_to(&self.frame_buf, self.dest) {
            Ok(_) => Ok(()),
            Err(e) => self.send_error(kind, e),
        }
    }

    /// Map a failed `send_to`. Only data frames count as dropped samples.
    fn send_error(&mut self, kind: FrameKind, e: io::Error) -> Result<()> {
        match (self.reliability, e.kind()) {
            (Reliability::BestEffort, io::ErrorKind::WouldBlock) => {
                if kind == FrameKind::Data {
                    self.dropped += 1;
                }
                log::trace!(
                    "[UDP] topic={} send buffer full, {:?} frame dropped (dropped={})",
                    self.topic,
                    kind,
                    self.dropped
                );
                Ok(())
            }
            (
                Reliability::Reliable { max_blocking_time },
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut,
            ) => Err(Error::WriteTimeout(max_blocking_time)),
            _ => Err(Error::SendFailed(format!("{}: {}", self.dest, e))),
        }
    }
}

impl Endpoint for UdpEndpoint {
    fn send(&mut self, payload: &[u8]) -> Result<()> {
        if self.unregistered {
            return Err(Error::Disconnected(self.topic.clone()));
        }
        if payload.len() > MAX_PAYLOAD {
            return Err(Error::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD,
            });
        }
        self.send_frame(FrameKind::Data, payload)
    }

    fn poll(&mut self, max_batch: usize) -> Result<Vec<Sample>> {
        if self.rx.is_none() {
            self.rx = Some(self.open_receiver()?);
            self.recv_buf.resize(MAX_DATAGRAM, 0);
        }
        let Some(rx) = self.rx.as_ref() else {
            return Ok(Vec::new());
        };

        let mut samples = Vec::new();
        for _ in 0..max_batch {
            let len = match rx.recv(&mut self.recv_buf) {
                Ok(len) => len,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            };
            let Some(frame) = frame::decode(&self.recv_buf[..len]) else {
                log::trace!("[UDP] ignored {} byte non-benchmark datagram", len);
                continue;
            };
            if frame.topic_hash != self.topic_hash {
                continue;
            }
            samples.push(match frame.kind {
                FrameKind::Data => Sample::Data(frame.payload.to_vec()),
                FrameKind::Disposed => Sample::Lifecycle(LifecycleKind::Disposed),
                FrameKind::Unregistered => Sample::Lifecycle(LifecycleKind::Unregistered),
            });
        }
        Ok(samples)
    }

    fn unregister(&mut self) -> Result<()> {
        if self.unregistered {
            return Ok(());
        }
        self.unregistered = true;
        match self.send_frame(FrameKind::Unregistered, &[]) {
            Ok(()) | Err(Error::WriteTimeout(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qos::QosPreset;
    use std::time::{Duration, Instant};

    #[test]
    fn test_socket_buffer_scales_with_history() {
        let reliable = socket_buffer_for(&QosPreset::Reliable.profile());
        let ht = socket_buffer_for(&QosPreset::HighThroughput.profile());
        let be = socket_buffer_for(&QosPreset::BestEffort.profile());
        assert_eq!(reliable, 10_000 * SAMPLE_BUDGET);
        assert_eq!(ht, 1_000 * SAMPLE_BUDGET);
        assert_eq!(be, MIN_SOCKET_BUFFER);
    }

    #[test]
    fn test_connect_targets_user_multicast_port() {
        let transport = UdpTransport::new(TransportConfig::default()).expect("transport");
        let endpoint = transport
            .connect(1, "t", &QosPreset::BestEffort.profile())
            .expect("connect");
        assert_eq!(
            endpoint.destination(),
            SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(239, 255, 0, 1), 7651))
        );
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let transport = UdpTransport::new(TransportConfig::default()).expect("transport");
        let mut endpoint = transport
            .connect(0, "t", &QosPreset::BestEffort.profile())
            .expect("connect");
        let err = endpoint.send(&vec![0u8; MAX_PAYLOAD + 1]).unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { .. }));
    }

    #[test]
    fn test_full_send_buffer_counts_only_data_frames() {
        let transport = UdpTransport::new(TransportConfig::default()).expect("transport");
        let mut endpoint = transport
            .connect(0, "t", &QosPreset::BestEffort.profile())
            .expect("connect");
        let full = || io::Error::from(io::ErrorKind::WouldBlock);

        endpoint
            .send_error(FrameKind::Unregistered, full())
            .expect("best-effort notice loss is silent");
        assert_eq!(endpoint.dropped(), 0);
        endpoint
            .send_error(FrameKind::Data, full())
            .expect("best-effort drop is silent");
        assert_eq!(endpoint.dropped(), 1);
    }

    #[test]
    fn test_reliable_full_send_buffer_is_write_timeout() {
        let transport = UdpTransport::new(TransportConfig::default()).expect("transport");
        let mut endpoint = transport
            .connect(0, "t", &QosPreset::Reliable.profile())
            .expect("connect");
        let err = endpoint
            .send_error(FrameKind::Data, io::Error::from(io::ErrorKind::WouldBlock))
            .unwrap_err();
        assert!(matches!(err, Error::WriteTimeout(_)));
        assert_eq!(endpoint.dropped(), 0);
    }

    #[test]
    fn test_invalid_domain_rejected_before_socket() {
        let transport = UdpTransport::new(TransportConfig::default()).expect("transport");
        let err = transport
            .connect(400, "t", &QosPreset::Reliable.profile())
            .err()
            .expect("invalid domain");
        assert!(matches!(err, Error::InvalidDomainId(400)));
    }

    #[test]
    #[ignore = "requires UDP multicast loopback, flaky in CI"]
    fn test_multicast_roundtrip_filters_topics() {
        let config = TransportConfig {
            port_base: 17_400,
            reuse_port: true,
            ..TransportConfig::default()
        };
        let transport = UdpTransport::new(config).expect("transport");
        let qos = QosPreset::Reliable.profile();
        let mut reader = transport.connect(5, "rt/a", &qos).expect("reader");
        assert!(reader.poll(10).expect("bind").is_empty());

        let mut writer = transport.connect(5, "rt/a", &qos).expect("writer");
        let mut other = transport.connect(5, "rt/b", &qos).expect("other");
        other.send(b"noise").expect("send");
        writer.send(b"hello").expect("send");
        writer.unregister().expect("unregister");

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut got = Vec::new();
        while got.len() < 2 && Instant::now() < deadline {
            got.extend(reader.poll(10).expect("poll"));
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(
            got,
            vec![
                Sample::Data(b"hello".to_vec()),
                Sample::Lifecycle(LifecycleKind::Unregistered)
            ]
        );
    }
}

//! The single-threaded, cooperative event loop (§4.4, §5).
//!
//! One thread, one blocking socket, three duties visited round-robin every
//! time `socket.recv_from` returns or times out: discovery broadcast,
//! receive-and-dispatch, and the keepalive sweep. Shutdown is a closed
//! socket unblocking the pending `recv_from` with an I/O error, not a
//! cancellation flag checked between duties.

use std::net::UdpSocket;
use std::time::Instant;

use crate::config::ServerConfig;
use crate::dispatch::PacketDispatcher;
use crate::discovery::enumerate_broadcast_addresses;
use crate::error::Result;
use crate::host::Host;
use crate::protocol::codec::{write_heartbeat, write_raw_ping, ProtocolCodec};
use crate::registry::SharedRegistry;

/// Maximum owoTrack/SlimeVR datagram size (§1).
const MAX_DATAGRAM_LEN: usize = 512;

fn hex_dump(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Owns the socket, registry, and per-duty scheduling state for one server
/// instance. Construct with [`EventLoop::bind`], then call [`EventLoop::run`]
/// on a dedicated thread.
pub struct EventLoop {
    socket: UdpSocket,
    config: ServerConfig,
    registry: SharedRegistry,
    last_discovery: Instant,
    last_keepalive: Instant,
    recv_buf: [u8; MAX_DATAGRAM_LEN],
    send_buf: [u8; MAX_DATAGRAM_LEN],
}

impl EventLoop {
    /// Binds the UDP socket and puts it in the blocking-with-timeout mode
    /// the receive duty relies on.
    pub fn bind(config: ServerConfig) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", config.port()))?;
        socket.set_broadcast(true)?;
        socket.set_read_timeout(Some(config.receive_timeout()))?;
        let now = Instant::now();
        Ok(Self {
            socket,
            config,
            registry: SharedRegistry::new(),
            last_discovery: now,
            last_keepalive: now,
            recv_buf: [0u8; MAX_DATAGRAM_LEN],
            send_buf: [0u8; MAX_DATAGRAM_LEN],
        })
    }

    /// A handle to the bound socket, e.g. so the caller can close it from
    /// another thread to unblock `run` and shut the loop down.
    pub fn socket(&self) -> &UdpSocket {
        &self.socket
    }

    /// A cloneable handle for read-only enumeration from another thread
    /// (e.g. a UI listing connected devices), per §5's shared-registry model.
    pub fn shared_registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    /// Runs the loop until the socket errors (including a close from
    /// another thread). Returns the I/O error that ended it; a closed
    /// socket is the expected, graceful shutdown path, so callers should
    /// not treat every `Err` here as a fault.
    pub fn run(&mut self, host: &mut dyn Host, codec: &mut dyn ProtocolCodec) -> std::io::Error {
        loop {
            if let Err(err) = self.tick(host, codec) {
                return err;
            }
        }
    }

    /// Runs exactly one receive-timeout cycle in the fixed duty order:
    /// discovery broadcast, then receive-and-dispatch, then the keepalive
    /// sweep.
    fn tick(&mut self, host: &mut dyn Host, codec: &mut dyn ProtocolCodec) -> std::io::Result<()> {
        self.discovery_duty()?;

        match self.socket.recv_from(&mut self.recv_buf) {
            Ok((len, peer)) => self.dispatch_received(len, peer, host, codec),
            Err(err) if matches!(err.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {}
            Err(err) => return Err(err),
        }

        self.keepalive_duty(host)?;
        Ok(())
    }

    fn dispatch_received(
        &mut self,
        len: usize,
        peer: std::net::SocketAddr,
        host: &mut dyn Host,
        codec: &mut dyn ProtocolCodec,
    ) {
        let recv_buf = &self.recv_buf[..len];
        let send_buf = &mut self.send_buf;

        // Acknowledgements are encoded while the registry lock is held but
        // collected as owned bytes, not sent, so the lock is released
        // before any `send_to` (§5).
        let pending = self.registry.with_mut(|registry| {
            let device = registry.lookup_by_address(peer);
            let packets = match codec.parse(recv_buf, device) {
                Ok(packets) => packets,
                Err(err) => {
                    let hex = hex_dump(recv_buf);
                    tracing::warn!(%peer, error = %err, datagram = %hex, "failed to parse datagram");
                    return Vec::new();
                }
            };

            let mut pending = Vec::new();
            for packet in packets {
                if let Some(send) = PacketDispatcher::dispatch(packet, peer, registry, host, codec, send_buf) {
                    pending.push(send);
                }
            }
            pending
        });

        for (addr, bytes) in pending {
            if let Err(err) = self.socket.send_to(&bytes, addr) {
                tracing::warn!(%addr, error = %err, "failed to send acknowledgement");
            }
        }
    }

    /// Broadcasts a discovery heartbeat (`kind=0`) to every interface's
    /// broadcast address at `discovery_interval`, so trackers that have
    /// never connected can find the server. Suppressed once any sensor has
    /// been provisioned: a server with live trackers has nothing left to
    /// discover.
    fn discovery_duty(&mut self) -> std::io::Result<()> {
        if self.last_discovery.elapsed() < self.config.discovery_interval() {
            return Ok(());
        }
        self.last_discovery = Instant::now();

        if self.registry.with(|registry| registry.has_any_sensors()) {
            return Ok(());
        }

        let targets = enumerate_broadcast_addresses(self.config.port());
        let n = write_heartbeat(&mut self.send_buf, 0)
            .expect("heartbeat payload always fits MAX_DATAGRAM_LEN");
        for target in targets {
            if let Err(err) = self.socket.send_to(&self.send_buf[..n], target) {
                tracing::warn!(%target, error = %err, "discovery broadcast failed");
            }
        }
        Ok(())
    }

    /// Sweeps every known device at `keepalive_interval`: sends a keepalive
    /// heartbeat (`kind=1`) to every device, sends a raw ping to devices due
    /// for one, marks silent devices as timed out and disconnects their
    /// trackers, recovers previously-timed-out devices that have resumed
    /// sending, and flushes any due serial buffers.
    fn keepalive_duty(&mut self, host: &mut dyn Host) -> std::io::Result<()> {
        if self.last_keepalive.elapsed() < self.config.keepalive_interval() {
            return Ok(());
        }
        self.last_keepalive = Instant::now();

        let liveness_timeout = self.config.liveness_timeout();
        let ping_interval = self.config.ping_interval();
        let serial_flush_interval = self.config.serial_flush_interval();
        let send_buf = &mut self.send_buf;

        // Datagrams are encoded and queued here, under the lock; the actual
        // `send_to` calls happen below, once the lock has been released (§5).
        let mut pending: Vec<(std::net::SocketAddr, Vec<u8>)> = Vec::new();
        let mut serial_lines: Vec<String> = Vec::new();

        self.registry.with_mut(|registry| {
            registry.for_each_mut(|_index, device| {
                // The reverse transition, timed_out -> alive, happens the instant
                // any packet is dispatched for the device (DeviceRecord::mark_packet_received),
                // not here; by the time the sweep runs it may already be alive again.
                if device.is_silent_for(liveness_timeout) && !device.timed_out() {
                    device.set_timed_out(true);
                    device.disconnect_all_trackers();
                    tracing::warn!(hardware_id = device.hardware_id(), "device timed out");
                }

                match write_heartbeat(send_buf, 1) {
                    Ok(n) => pending.push((device.address(), send_buf[..n].to_vec())),
                    Err(err) => tracing::warn!(error = %err, "failed to encode keepalive heartbeat"),
                }

                if !device.timed_out() && device.due_for_ping(ping_interval) {
                    let ping_id: i32 = rand::random();
                    device.start_ping(ping_id);
                    match write_raw_ping(send_buf, ping_id) {
                        Ok(n) => pending.push((device.address(), send_buf[..n].to_vec())),
                        Err(err) => tracing::warn!(error = %err, "failed to encode ping"),
                    }
                }

                if let Some(flushed) = device.take_serial_buffer_if_due(serial_flush_interval) {
                    serial_lines.push(format!("[{}] {}", device.name(), flushed));
                }
            });
        });

        for (addr, bytes) in pending {
            if let Err(err) = self.socket.send_to(&bytes, addr) {
                tracing::warn!(%addr, error = %err, "keepalive send failed");
            }
        }
        for line in serial_lines {
            host.console_line(&line);
        }

        Ok(())
    }
}

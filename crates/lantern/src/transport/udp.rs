//! Minimal unreliable session transport over a plain UDP socket.
//!
//! Stands in for a full reliability layer: no acks, no retransmits, no
//! fragmentation. Sessions are keyed by peer address, opened by the first
//! session datagram and closed after an idle timeout.
//!
//! Datagram classes, by first byte:
//! - `0x01` unconnected ping, answered with `0x1c` + the advertised name
//! - `< 0x80` offline traffic, raised as a raw event
//! - `>= 0x80` session traffic, raised as an encapsulated event

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;

use super::channel::{ChannelTransport, TransportCommand, TransportWorker};
use super::{EncapsulatedPacket, Reliability, SendPriority, TransportEventSink, TransportHandle};
use crate::logging::TransportLogger;

pub const UNCONNECTED_PING: u8 = 0x01;
pub const UNCONNECTED_PONG: u8 = 0x1c;
pub const SESSION_DATA_MIN: u8 = 0x80;
pub const MAX_DATAGRAM_SIZE: usize = 1500;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct UdpTransportConfig {
    pub session_timeout: Duration,
    pub max_sessions: usize,
    pub poll_interval: Duration,
}

impl Default for UdpTransportConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_sessions: 64,
            poll_interval: Duration::from_millis(1),
        }
    }
}

pub struct UdpTransport {
    handle: ChannelTransport,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl UdpTransport {
    pub fn bind<A: ToSocketAddrs>(
        addr: A,
        config: UdpTransportConfig,
        logger: TransportLogger,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;

        let local_addr = socket.local_addr()?;
        let (handle, channel) = ChannelTransport::pair();

        let worker = UdpWorker {
            socket,
            channel,
            sessions: HashMap::new(),
            config,
            logger,
            advertised_name: String::new(),
            next_client_id: 1,
            recv_buffer: [0u8; MAX_DATAGRAM_SIZE],
        };
        let join = thread::Builder::new()
            .name("udp-transport".to_string())
            .spawn(move || worker.run(local_addr))?;

        Ok(Self {
            handle: handle.with_local_addr(local_addr),
            worker: Mutex::new(Some(join)),
        })
    }

    /// Stops the worker thread and waits for it.
    pub fn shutdown(&self) {
        self.handle.shutdown();
        if let Some(join) = self.worker.lock().take() {
            if join.join().is_err() {
                log::error!("udp transport worker panicked");
            }
        }
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl TransportHandle for UdpTransport {
    fn handle_next_event(&self, sink: &dyn TransportEventSink) -> bool {
        self.handle.handle_next_event(sink)
    }

    fn send_encapsulated(&self, identifier: &str, packet: EncapsulatedPacket, priority: SendPriority) {
        self.handle.send_encapsulated(identifier, packet, priority);
    }

    fn send_option(&self, name: &str, value: &str) {
        self.handle.send_option(name, value);
    }

    fn close_session(&self, identifier: &str, reason: &str) {
        self.handle.close_session(identifier, reason);
    }

    fn is_worker_alive(&self) -> bool {
        self.handle.is_worker_alive()
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.handle.local_addr()
    }
}

#[derive(Debug)]
struct UdpSession {
    identifier: String,
    last_receive_time: Instant,
}

impl UdpSession {
    fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_receive_time.elapsed() > timeout
    }

    fn touch(&mut self) {
        self.last_receive_time = Instant::now();
    }
}

struct UdpWorker {
    socket: UdpSocket,
    channel: TransportWorker,
    sessions: HashMap<SocketAddr, UdpSession>,
    config: UdpTransportConfig,
    logger: TransportLogger,
    advertised_name: String,
    next_client_id: u64,
    recv_buffer: [u8; MAX_DATAGRAM_SIZE],
}

impl UdpWorker {
    fn run(mut self, local_addr: SocketAddr) {
        self.logger.notice(&format!("listening on {}", local_addr));

        loop {
            if !self.process_commands() {
                self.logger.notice("shutting down");
                return;
            }

            if let Err(e) = self.receive() {
                self.channel.exception(&format!("{:?}", e.kind()), &e.to_string());
                self.logger.emergency(&format!("socket failed: {}", e));
                return;
            }

            self.cleanup_timed_out();
            thread::sleep(self.config.poll_interval);
        }
    }

    /// Returns `false` once the worker should stop.
    fn process_commands(&mut self) -> bool {
        while let Some(command) = self.channel.try_command() {
            match command {
                TransportCommand::SendEncapsulated {
                    identifier, packet, ..
                } => self.send_to_session(&identifier, &packet.buffer),
                TransportCommand::SendOption { name, value } => {
                    if name == "name" {
                        self.advertised_name = value;
                    }
                }
                TransportCommand::CloseSession { identifier, reason } => {
                    if let Some(addr) = self.session_addr(&identifier) {
                        self.sessions.remove(&addr);
                        self.logger
                            .debug(&format!("({}) closed by server: {}", identifier, reason));
                    }
                }
                TransportCommand::Shutdown => return false,
            }
        }
        true
    }

    fn receive(&mut self) -> io::Result<()> {
        loop {
            match self.socket.recv_from(&mut self.recv_buffer) {
                Ok((0, _)) => continue,
                Ok((size, addr)) => {
                    let data = Bytes::copy_from_slice(&self.recv_buffer[..size]);
                    self.handle_datagram(addr, data);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::ConnectionReset => {
                    self.channel.exception("ConnectionReset", &e.to_string());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn handle_datagram(&mut self, addr: SocketAddr, data: Bytes) {
        match data[0] {
            UNCONNECTED_PING => {
                let mut pong = Vec::with_capacity(1 + self.advertised_name.len());
                pong.push(UNCONNECTED_PONG);
                pong.extend_from_slice(self.advertised_name.as_bytes());
                self.send_raw(addr, &pong);
            }
            id if id < SESSION_DATA_MIN => {
                self.channel.raw(&addr.ip().to_string(), addr.port(), data);
            }
            _ => {
                if !self.sessions.contains_key(&addr) && !self.open_session(addr) {
                    return;
                }
                if let Some(session) = self.sessions.get_mut(&addr) {
                    session.touch();
                    let packet = EncapsulatedPacket::new(Reliability::Unreliable, data);
                    self.channel.encapsulated(&session.identifier, packet);
                }
            }
        }
    }

    fn open_session(&mut self, addr: SocketAddr) -> bool {
        if self.sessions.len() >= self.config.max_sessions {
            self.logger
                .notice(&format!("session limit reached, ignoring {}", addr));
            return false;
        }

        let identifier = addr.to_string();
        let client_id = self.next_client_id;
        self.next_client_id += 1;

        self.channel
            .open_session(&identifier, &addr.ip().to_string(), addr.port(), client_id);
        self.sessions.insert(
            addr,
            UdpSession {
                identifier,
                last_receive_time: Instant::now(),
            },
        );
        true
    }

    fn cleanup_timed_out(&mut self) {
        let timeout = self.config.session_timeout;
        let timed_out: Vec<SocketAddr> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.is_timed_out(timeout))
            .map(|(&addr, _)| addr)
            .collect();

        for addr in timed_out {
            if let Some(session) = self.sessions.remove(&addr) {
                self.channel.close_session(&session.identifier, "timeout");
            }
        }
    }

    fn session_addr(&self, identifier: &str) -> Option<SocketAddr> {
        let addr = identifier.parse::<SocketAddr>().ok()?;
        self.sessions.contains_key(&addr).then_some(addr)
    }

    fn send_to_session(&mut self, identifier: &str, payload: &[u8]) {
        match self.session_addr(identifier) {
            Some(addr) => self.send_raw(addr, payload),
            None => self
                .logger
                .debug(&format!("({}) no such session, dropping send", identifier)),
        }
    }

    fn send_raw(&mut self, addr: SocketAddr, payload: &[u8]) {
        if payload.len() > MAX_DATAGRAM_SIZE {
            self.logger.critical(&format!(
                "refusing {} byte datagram to {}: exceeds MTU",
                payload.len(),
                addr
            ));
            return;
        }
        if let Err(e) = self.socket.send_to(payload, addr) {
            self.channel.exception(&format!("{:?}", e.kind()), &e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::logging::MemoryLogger;

    fn bind_local(config: UdpTransportConfig) -> UdpTransport {
        let logger = TransportLogger::new(Arc::new(MemoryLogger::new()));
        UdpTransport::bind("127.0.0.1:0", config, logger).unwrap()
    }

    fn client() -> UdpSocket {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(50)))
            .unwrap();
        socket
    }

    #[test]
    fn ping_is_answered_with_advertised_name() {
        let transport = bind_local(UdpTransportConfig::default());
        let server = transport.local_addr().unwrap();
        let client = client();

        transport.send_option("name", "MCPE;Test;27;0.11.0;0;20");

        let mut buf = [0u8; 256];
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut reply = Vec::new();
        while Instant::now() < deadline {
            client.send_to(&[UNCONNECTED_PING], server).unwrap();
            if let Ok((size, _)) = client.recv_from(&mut buf) {
                reply = buf[..size].to_vec();
                if reply.len() > 1 {
                    break;
                }
            }
        }

        assert_eq!(reply[0], UNCONNECTED_PONG);
        assert_eq!(&reply[1..], b"MCPE;Test;27;0.11.0;0;20");
    }

    #[test]
    fn shutdown_stops_the_worker() {
        let transport = bind_local(UdpTransportConfig::default());
        assert!(transport.is_worker_alive());

        transport.shutdown();
        assert!(!transport.is_worker_alive());
    }
}

//! Transport capability the bridge sits on.
//!
//! The transport owns sessions, reliability and its worker thread. It talks
//! to the bridge through two seams: [`TransportEventSink`] (callbacks the
//! bridge implements) and [`TransportHandle`] (commands the bridge issues).

pub mod channel;
pub mod udp;

use std::net::SocketAddr;

use bitflags::bitflags;
use bytes::Bytes;

pub use channel::{ChannelTransport, TransportCommand, TransportEvent, TransportWorker};
pub use udp::{UdpTransport, UdpTransportConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Reliability {
    #[default]
    Unreliable = 0,
    UnreliableSequenced = 1,
    Reliable = 2,
    ReliableOrdered = 3,
    ReliableSequenced = 4,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SendPriority: u8 {
        const NORMAL = 0b0000;
        const IMMEDIATE = 0b0001;
    }
}

/// A transport frame: reliability metadata around an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncapsulatedPacket {
    pub reliability: Reliability,
    pub message_index: u32,
    pub order_channel: u8,
    pub buffer: Bytes,
}

impl EncapsulatedPacket {
    pub fn new(reliability: Reliability, buffer: impl Into<Bytes>) -> Self {
        Self {
            reliability,
            message_index: 0,
            order_channel: 0,
            buffer: buffer.into(),
        }
    }
}

pub trait TransportEventSink {
    fn open_session(&self, identifier: &str, address: &str, port: u16, client_id: u64);
    fn close_session(&self, identifier: &str, reason: &str);
    fn handle_encapsulated(&self, identifier: &str, packet: EncapsulatedPacket, flags: u8);
    fn handle_raw(&self, address: &str, port: u16, payload: Bytes);
    fn notify_ack(&self, identifier: &str, ack_id: u32);
    fn exception_caught(&self, kind: &str, message: &str);
    fn handle_option(&self, name: &str, value: &str);
}

/// Outbound side of the transport. Every call is non-blocking.
pub trait TransportHandle: Send + Sync {
    /// Delivers at most one pending event to `sink`. Returns `false` when
    /// nothing was pending.
    fn handle_next_event(&self, sink: &dyn TransportEventSink) -> bool;

    fn send_encapsulated(&self, identifier: &str, packet: EncapsulatedPacket, priority: SendPriority);

    fn send_option(&self, name: &str, value: &str);

    fn close_session(&self, identifier: &str, reason: &str);

    fn is_worker_alive(&self) -> bool;

    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

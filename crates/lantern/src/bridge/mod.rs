//! Adapter between the transport's event stream and the server tick.
//!
//! Each tick the bridge pumps the transport until no event is pending. The
//! sink callbacks that fire during the pump push payloads onto an unbounded
//! MPSC queue which the protocol layer drains through [`NetworkBridge::read_packet`].

mod session;
mod status;

pub use session::{PlayerStatus, SessionHost, SessionState};
pub use status::{MCPE_PROTOCOL, MCPE_VERSION, broadcast_name};

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::logging::{Logger, LoggerError, LoggerFactory};
use crate::net::{IdentifierAddress, PeerAddress, UniversalPacket};
use crate::ticker::{Scheduler, TaskId};
use crate::transport::{
    EncapsulatedPacket, Reliability, SendPriority, TransportEventSink, TransportHandle,
};
use session::SessionTable;

pub const PLAYER_LEFT_MESSAGE: &str = "multiplayer.player.left";

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("bridge logger setup failed: {0}")]
    Logger(#[from] LoggerError),
}

pub struct NetworkBridge {
    transport: Arc<dyn TransportHandle>,
    host: Arc<dyn SessionHost>,
    scheduler: Arc<dyn Scheduler>,
    logger: Arc<dyn Logger>,
    inbound_tx: Sender<UniversalPacket>,
    inbound_rx: Receiver<UniversalPacket>,
    sessions: Mutex<SessionTable>,
    tick_task: Mutex<Option<TaskId>>,
}

impl NetworkBridge {
    pub const LOGGER_NAME: &'static str = "NetworkBridge";

    /// Builds the bridge and registers its pump with `scheduler` at a period
    /// of one tick. A logger that cannot be created aborts the start.
    pub fn start(
        transport: Arc<dyn TransportHandle>,
        host: Arc<dyn SessionHost>,
        scheduler: Arc<dyn Scheduler>,
        loggers: &dyn LoggerFactory,
    ) -> Result<Arc<Self>, BridgeError> {
        let logger = loggers.create(Self::LOGGER_NAME).map_err(|e| {
            log::error!("{}", e);
            BridgeError::from(e)
        })?;
        logger.debug("Logger created.");

        let (inbound_tx, inbound_rx) = crossbeam_channel::unbounded();
        let bridge = Arc::new(Self {
            transport,
            host,
            scheduler,
            logger,
            inbound_tx,
            inbound_rx,
            sessions: Mutex::new(SessionTable::default()),
            tick_task: Mutex::new(None),
        });

        let weak = Arc::downgrade(&bridge);
        let task = bridge.scheduler.register_repeating(
            1,
            Box::new(move |tick| {
                if let Some(bridge) = weak.upgrade() {
                    bridge.tick(tick);
                }
            }),
        );
        *bridge.tick_task.lock() = Some(task);

        if let Some(addr) = bridge.transport.local_addr() {
            bridge
                .logger
                .info(&format!("MCPE server started on {}", addr));
        }

        Ok(bridge)
    }

    /// Per-tick pump. Drains every pending transport event, then checks
    /// that the transport worker is still alive.
    ///
    /// Closed markers only live until the start of the next tick, which is
    /// long enough to swallow duplicate closes delivered in the same drain.
    pub fn tick(&self, _tick: u64) {
        self.sessions.lock().prune_closed();
        while self.transport.handle_next_event(self) {}

        if !self.transport.is_worker_alive() {
            let task = self.tick_task.lock().take();
            if let Some(task) = task {
                self.scheduler.cancel(task);
                self.logger
                    .fatal("transport worker crashed, PE networking is offline");
            }
        }
    }

    /// `false` once the pump has deregistered itself.
    pub fn is_running(&self) -> bool {
        self.tick_task.lock().is_some()
    }

    /// Non-blocking; `None` when nothing is queued.
    pub fn read_packet(&self) -> Option<UniversalPacket> {
        self.inbound_rx.try_recv().ok()
    }

    pub fn send_packet(&self, packet: UniversalPacket, immediate: bool) {
        let (payload, address) = packet.into_parts();
        let frame = EncapsulatedPacket::new(Reliability::Reliable, payload);
        let identifier = address.to_string();

        self.logger.buffer(
            &format!("({}) PACKET OUT: ", identifier),
            &frame.buffer,
            "",
        );

        let priority = if immediate {
            SendPriority::IMMEDIATE
        } else {
            SendPriority::NORMAL
        };
        self.transport
            .send_encapsulated(&identifier, frame, priority);
    }

    pub fn set_name(&self, name: &str, online: usize, max: usize) {
        self.transport
            .send_option("name", &broadcast_name(name, online, max));
    }

    /// Server-initiated close of a session.
    pub fn close(&self, address: &PeerAddress, reason: &str) {
        if let Some(identifier) = address.as_identifier() {
            self.sessions.lock().close(identifier.clone());
        }
        self.transport.close_session(&address.to_string(), reason);
    }

    pub fn session_state(&self, identifier: &str) -> SessionState {
        self.sessions
            .lock()
            .state(&IdentifierAddress::new(identifier))
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.lock().open_count()
    }

    /// Open sessions plus closed markers not yet pruned.
    pub fn tracked_sessions(&self) -> usize {
        self.sessions.lock().len()
    }

    fn enqueue(&self, packet: UniversalPacket) {
        // The receiver is owned by `self`, so the channel cannot be disconnected.
        let _ = self.inbound_tx.send(packet);
    }
}

impl Drop for NetworkBridge {
    fn drop(&mut self) {
        if let Some(task) = self.tick_task.get_mut().take() {
            self.scheduler.cancel(task);
        }
    }
}

impl TransportEventSink for NetworkBridge {
    fn open_session(&self, identifier: &str, address: &str, port: u16, client_id: u64) {
        self.logger.debug(&format!(
            "({}) session opened from {}:{} (client id {})",
            identifier, address, port, client_id
        ));

        let previous = self
            .sessions
            .lock()
            .open(IdentifierAddress::new(identifier));
        if previous == SessionState::Open {
            self.logger
                .debug(&format!("({}) session was already open", identifier));
        }

        self.host.open_session(identifier);
    }

    fn close_session(&self, identifier: &str, reason: &str) {
        self.logger
            .debug(&format!("({}) session closed: {}", identifier, reason));

        let address = IdentifierAddress::new(identifier);
        let previous = self.sessions.lock().close(address.clone());
        if previous == SessionState::Closed {
            self.logger
                .debug(&format!("({}) session already closed, ignoring", identifier));
            return;
        }

        let peer = PeerAddress::Identifier(address);
        match self.host.find_player(&peer) {
            Some(status) if status.spawned => {
                self.host.close_player(&peer, PLAYER_LEFT_MESSAGE, reason)
            }
            Some(_) => self.host.close_player(&peer, "", reason),
            None => self
                .logger
                .debug(&format!("({}) no player bound to session", identifier)),
        }
    }

    fn handle_encapsulated(&self, identifier: &str, packet: EncapsulatedPacket, _flags: u8) {
        let address = IdentifierAddress::new(identifier);
        if self.sessions.lock().state(&address) != SessionState::Open {
            self.logger.debug(&format!(
                "({}) dropping {} byte payload for a session that is not open",
                identifier,
                packet.buffer.len()
            ));
            return;
        }

        let packet = UniversalPacket::new(packet.buffer, address);
        self.logger.buffer(
            &format!("({}) PACKET IN: ", identifier),
            packet.payload(),
            "",
        );
        self.enqueue(packet);
    }

    fn handle_raw(&self, address: &str, port: u16, payload: Bytes) {
        let ip = match address.parse::<IpAddr>() {
            Ok(ip) => ip,
            Err(_) => {
                // Only IP literals are accepted; hostnames are not resolved here.
                self.logger.debug(&format!(
                    "dropping raw datagram from {}:{}: source is not an IP literal",
                    address, port
                ));
                return;
            }
        };
        self.enqueue(UniversalPacket::new(payload, SocketAddr::new(ip, port)));
    }

    fn notify_ack(&self, identifier: &str, ack_id: u32) {
        log::trace!("({}) ack {}", identifier, ack_id);
    }

    fn exception_caught(&self, kind: &str, message: &str) {
        self.logger.error(&format!(
            "transport caught an exception! {}: {}",
            kind, message
        ));
    }

    fn handle_option(&self, name: &str, value: &str) {
        log::trace!("transport option {} = {}", name, value);
    }
}

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, TryRecvError};

use super::{EncapsulatedPacket, SendPriority, TransportEventSink, TransportHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    OpenSession {
        identifier: String,
        address: String,
        port: u16,
        client_id: u64,
    },
    CloseSession {
        identifier: String,
        reason: String,
    },
    Encapsulated {
        identifier: String,
        packet: EncapsulatedPacket,
        flags: u8,
    },
    Raw {
        address: String,
        port: u16,
        payload: Bytes,
    },
    Ack {
        identifier: String,
        ack_id: u32,
    },
    Exception {
        kind: String,
        message: String,
    },
    OptionChanged {
        name: String,
        value: String,
    },
}

impl TransportEvent {
    pub fn dispatch(self, sink: &dyn TransportEventSink) {
        match self {
            TransportEvent::OpenSession {
                identifier,
                address,
                port,
                client_id,
            } => sink.open_session(&identifier, &address, port, client_id),
            TransportEvent::CloseSession { identifier, reason } => {
                sink.close_session(&identifier, &reason)
            }
            TransportEvent::Encapsulated {
                identifier,
                packet,
                flags,
            } => sink.handle_encapsulated(&identifier, packet, flags),
            TransportEvent::Raw {
                address,
                port,
                payload,
            } => sink.handle_raw(&address, port, payload),
            TransportEvent::Ack { identifier, ack_id } => sink.notify_ack(&identifier, ack_id),
            TransportEvent::Exception { kind, message } => sink.exception_caught(&kind, &message),
            TransportEvent::OptionChanged { name, value } => sink.handle_option(&name, &value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCommand {
    SendEncapsulated {
        identifier: String,
        packet: EncapsulatedPacket,
        priority: SendPriority,
    },
    SendOption {
        name: String,
        value: String,
    },
    CloseSession {
        identifier: String,
        reason: String,
    },
    Shutdown,
}

/// Server-side handle of a transport whose worker runs elsewhere.
///
/// Events and commands cross threads through unbounded channels, so
/// neither side ever blocks the other.
pub struct ChannelTransport {
    events: Receiver<TransportEvent>,
    commands: Sender<TransportCommand>,
    alive: Arc<AtomicBool>,
    local_addr: Option<SocketAddr>,
}

/// Worker-side end of a [`ChannelTransport`]. Dropping it marks the worker
/// as dead, which is how a crashed or stopped worker thread is observed.
pub struct TransportWorker {
    events: Sender<TransportEvent>,
    commands: Receiver<TransportCommand>,
    alive: Arc<AtomicBool>,
}

impl ChannelTransport {
    pub fn pair() -> (ChannelTransport, TransportWorker) {
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let alive = Arc::new(AtomicBool::new(true));

        let handle = ChannelTransport {
            events: event_rx,
            commands: command_tx,
            alive: Arc::clone(&alive),
            local_addr: None,
        };
        let worker = TransportWorker {
            events: event_tx,
            commands: command_rx,
            alive,
        };
        (handle, worker)
    }

    pub fn with_local_addr(mut self, addr: SocketAddr) -> Self {
        self.local_addr = Some(addr);
        self
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(TransportCommand::Shutdown);
    }

    fn command(&self, command: TransportCommand) {
        if self.commands.send(command).is_err() {
            log::debug!("transport worker gone, dropping command");
        }
    }
}

impl TransportHandle for ChannelTransport {
    fn handle_next_event(&self, sink: &dyn TransportEventSink) -> bool {
        match self.events.try_recv() {
            Ok(event) => {
                event.dispatch(sink);
                true
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => false,
        }
    }

    fn send_encapsulated(&self, identifier: &str, packet: EncapsulatedPacket, priority: SendPriority) {
        self.command(TransportCommand::SendEncapsulated {
            identifier: identifier.to_string(),
            packet,
            priority,
        });
    }

    fn send_option(&self, name: &str, value: &str) {
        self.command(TransportCommand::SendOption {
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    fn close_session(&self, identifier: &str, reason: &str) {
        self.command(TransportCommand::CloseSession {
            identifier: identifier.to_string(),
            reason: reason.to_string(),
        });
    }

    fn is_worker_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl TransportWorker {
    /// Queues an event for the server. Returns `false` once the handle is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Next pending command; a dropped handle reads as [`TransportCommand::Shutdown`].
    pub fn try_command(&self) -> Option<TransportCommand> {
        match self.commands.try_recv() {
            Ok(command) => Some(command),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(TransportCommand::Shutdown),
        }
    }

    pub fn open_session(&self, identifier: &str, address: &str, port: u16, client_id: u64) -> bool {
        self.emit(TransportEvent::OpenSession {
            identifier: identifier.to_string(),
            address: address.to_string(),
            port,
            client_id,
        })
    }

    pub fn close_session(&self, identifier: &str, reason: &str) -> bool {
        self.emit(TransportEvent::CloseSession {
            identifier: identifier.to_string(),
            reason: reason.to_string(),
        })
    }

    pub fn encapsulated(&self, identifier: &str, packet: EncapsulatedPacket) -> bool {
        self.emit(TransportEvent::Encapsulated {
            identifier: identifier.to_string(),
            packet,
            flags: SendPriority::NORMAL.bits(),
        })
    }

    pub fn raw(&self, address: &str, port: u16, payload: impl Into<Bytes>) -> bool {
        self.emit(TransportEvent::Raw {
            address: address.to_string(),
            port,
            payload: payload.into(),
        })
    }

    pub fn exception(&self, kind: &str, message: &str) -> bool {
        self.emit(TransportEvent::Exception {
            kind: kind.to_string(),
            message: message.to_string(),
        })
    }
}

impl Drop for TransportWorker {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::transport::Reliability;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl TransportEventSink for Recorder {
        fn open_session(&self, identifier: &str, address: &str, port: u16, client_id: u64) {
            self.calls
                .lock()
                .push(format!("open {identifier} {address}:{port} {client_id}"));
        }

        fn close_session(&self, identifier: &str, reason: &str) {
            self.calls.lock().push(format!("close {identifier} {reason}"));
        }

        fn handle_encapsulated(&self, identifier: &str, packet: EncapsulatedPacket, _flags: u8) {
            self.calls
                .lock()
                .push(format!("data {identifier} {:?}", packet.buffer.as_ref()));
        }

        fn handle_raw(&self, address: &str, port: u16, payload: Bytes) {
            self.calls
                .lock()
                .push(format!("raw {address}:{port} {:?}", payload.as_ref()));
        }

        fn notify_ack(&self, identifier: &str, ack_id: u32) {
            self.calls.lock().push(format!("ack {identifier} {ack_id}"));
        }

        fn exception_caught(&self, kind: &str, message: &str) {
            self.calls.lock().push(format!("exception {kind} {message}"));
        }

        fn handle_option(&self, name: &str, value: &str) {
            self.calls.lock().push(format!("option {name}={value}"));
        }
    }

    #[test]
    fn events_are_delivered_one_at_a_time_in_order() {
        let (handle, worker) = ChannelTransport::pair();
        let sink = Recorder::default();

        worker.open_session("a", "10.0.0.1", 1000, 7);
        worker.encapsulated("a", EncapsulatedPacket::new(Reliability::Reliable, vec![1u8, 2]));
        worker.raw("10.0.0.2", 2000, vec![9u8]);
        worker.close_session("a", "bye");
        assert_eq!(handle.pending_events(), 4);

        assert!(handle.handle_next_event(&sink));
        assert_eq!(sink.calls.lock().len(), 1);
        while handle.handle_next_event(&sink) {}

        assert_eq!(
            *sink.calls.lock(),
            vec![
                "open a 10.0.0.1:1000 7".to_string(),
                "data a [1, 2]".to_string(),
                "raw 10.0.0.2:2000 [9]".to_string(),
                "close a bye".to_string(),
            ]
        );
    }

    #[test]
    fn commands_reach_the_worker() {
        let (handle, worker) = ChannelTransport::pair();

        handle.send_option("name", "MCPE;x");
        handle.close_session("a", "kicked");

        assert_eq!(
            worker.try_command(),
            Some(TransportCommand::SendOption {
                name: "name".to_string(),
                value: "MCPE;x".to_string()
            })
        );
        assert!(matches!(
            worker.try_command(),
            Some(TransportCommand::CloseSession { .. })
        ));
        assert_eq!(worker.try_command(), None);

        drop(handle);
        assert_eq!(worker.try_command(), Some(TransportCommand::Shutdown));
    }

    #[test]
    fn dropping_the_worker_marks_it_dead() {
        let (handle, worker) = ChannelTransport::pair();
        assert!(handle.is_worker_alive());

        drop(worker);
        assert!(!handle.is_worker_alive());
        assert!(!handle.handle_next_event(&Recorder::default()));
    }
}

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use lantern::{
    DataPacket, Difficulty, GamePacket, NetworkBridge, PacketRegistry, PeerAddress, PlayerStatus,
    SessionHost, SetDifficultyPacket, UniversalPacket,
};

use crate::events::{LeaveReason, ServerEvent};

#[derive(Debug, Default)]
struct Player {
    spawned: bool,
}

/// Minimal PE protocol layer: owns the player table and reacts to the
/// packets the bridge queues each tick.
pub struct PeProtocol {
    registry: PacketRegistry,
    players: Mutex<HashMap<PeerAddress, Player>>,
    difficulty: Mutex<Difficulty>,
    pending_events: Mutex<VecDeque<ServerEvent>>,
}

impl PeProtocol {
    pub fn new(difficulty: Difficulty) -> Self {
        Self {
            registry: PacketRegistry::default(),
            players: Mutex::new(HashMap::new()),
            difficulty: Mutex::new(difficulty),
            pending_events: Mutex::new(VecDeque::new()),
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        *self.difficulty.lock()
    }

    pub fn player_count(&self) -> usize {
        self.players.lock().len()
    }

    pub fn addresses(&self) -> Vec<PeerAddress> {
        self.players.lock().keys().cloned().collect()
    }

    pub fn drain_events(&self) -> Vec<ServerEvent> {
        self.pending_events.lock().drain(..).collect()
    }

    /// Drains the bridge's inbound queue. Returns how many packets were read.
    pub fn process(&self, bridge: &NetworkBridge) -> usize {
        let mut count = 0;
        while let Some(packet) = bridge.read_packet() {
            self.handle_packet(bridge, packet);
            count += 1;
        }
        count
    }

    /// Drops a player the server disconnected itself.
    pub fn remove_player(&self, address: &PeerAddress, reason: &str) {
        if self.players.lock().remove(address).is_some() {
            self.push_event(ServerEvent::PlayerLeft {
                address: address.clone(),
                reason: LeaveReason::Kicked(reason.to_string()),
            });
        }
    }

    fn handle_packet(&self, bridge: &NetworkBridge, packet: UniversalPacket) {
        let (payload, address) = packet.into_parts();
        if address.as_identifier().is_none() {
            log::debug!(
                "ignoring {} byte offline datagram from {}",
                payload.len(),
                address
            );
            return;
        }

        match self.registry.decode(&payload) {
            Ok(packet) => {
                self.mark_spawned(&address);
                self.handle_game_packet(bridge, &address, packet);
            }
            Err(e) if e.is_malformed() => {
                log::debug!("({}) dropping malformed packet: {}", address, e);
            }
            Err(e) => {
                log::debug!("({}) dropping packet: {}", address, e);
            }
        }
    }

    fn handle_game_packet(&self, bridge: &NetworkBridge, from: &PeerAddress, packet: GamePacket) {
        match packet {
            GamePacket::SetDifficulty(packet) => {
                // validate() already rejected anything outside the enum
                let Some(difficulty) = packet.difficulty() else {
                    return;
                };
                *self.difficulty.lock() = difficulty;
                self.push_event(ServerEvent::DifficultyChanged {
                    difficulty,
                    by: from.clone(),
                });
                self.broadcast(bridge, &SetDifficultyPacket::new(difficulty));
            }
        }
    }

    fn broadcast<P: DataPacket>(&self, bridge: &NetworkBridge, packet: &P) {
        let payload = packet.encode();
        let targets: Vec<PeerAddress> = self
            .players
            .lock()
            .iter()
            .filter(|(_, player)| player.spawned)
            .map(|(address, _)| address.clone())
            .collect();

        for address in targets {
            bridge.send_packet(UniversalPacket::new(payload.clone(), address), false);
        }
    }

    fn mark_spawned(&self, address: &PeerAddress) {
        let newly_spawned = match self.players.lock().get_mut(address) {
            Some(player) if !player.spawned => {
                player.spawned = true;
                true
            }
            _ => false,
        };
        if newly_spawned {
            self.push_event(ServerEvent::PlayerSpawned {
                address: address.clone(),
            });
        }
    }

    fn push_event(&self, event: ServerEvent) {
        self.pending_events.lock().push_back(event);
    }
}

impl SessionHost for PeProtocol {
    fn open_session(&self, identifier: &str) {
        self.players
            .lock()
            .insert(PeerAddress::session(identifier), Player::default());
        self.push_event(ServerEvent::SessionOpened {
            identifier: identifier.to_string(),
        });
    }

    fn find_player(&self, address: &PeerAddress) -> Option<PlayerStatus> {
        self.players.lock().get(address).map(|player| PlayerStatus {
            spawned: player.spawned,
        })
    }

    fn close_player(&self, address: &PeerAddress, message: &str, reason: &str) {
        if self.players.lock().remove(address).is_none() {
            return;
        }
        if !message.is_empty() {
            log::info!("{} {}", address, message);
        }
        self.push_event(ServerEvent::PlayerLeft {
            address: address.clone(),
            reason: LeaveReason::Disconnected(reason.to_string()),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lantern::transport::TransportCommand;
    use lantern::{
        ChannelTransport, EncapsulatedPacket, MemoryLoggerFactory, Reliability, Ticker,
        TransportWorker,
    };

    use super::*;

    fn setup() -> (Arc<PeProtocol>, Arc<NetworkBridge>, TransportWorker) {
        let (transport, worker) = ChannelTransport::pair();
        let protocol = Arc::new(PeProtocol::new(Difficulty::Easy));
        let bridge = NetworkBridge::start(
            Arc::new(transport),
            protocol.clone(),
            Arc::new(Ticker::new()),
            &MemoryLoggerFactory::new(),
        )
        .unwrap();
        (protocol, bridge, worker)
    }

    fn data(bytes: Vec<u8>) -> EncapsulatedPacket {
        EncapsulatedPacket::new(Reliability::ReliableOrdered, bytes)
    }

    #[test]
    fn difficulty_change_is_applied_and_broadcast() {
        let (protocol, bridge, worker) = setup();

        worker.open_session("id1", "10.0.0.1", 5000, 1);
        worker.encapsulated("id1", data(SetDifficultyPacket { difficulty: 3 }.encode()));
        bridge.tick(1);

        assert_eq!(protocol.process(&bridge), 1);
        assert_eq!(protocol.difficulty(), Difficulty::Hard);
        assert_eq!(
            protocol.find_player(&PeerAddress::session("id1")),
            Some(PlayerStatus { spawned: true })
        );
        assert_eq!(
            protocol.drain_events(),
            vec![
                ServerEvent::SessionOpened {
                    identifier: "id1".to_string()
                },
                ServerEvent::PlayerSpawned {
                    address: PeerAddress::session("id1")
                },
                ServerEvent::DifficultyChanged {
                    difficulty: Difficulty::Hard,
                    by: PeerAddress::session("id1")
                },
            ]
        );

        match worker.try_command() {
            Some(TransportCommand::SendEncapsulated {
                identifier, packet, ..
            }) => {
                assert_eq!(identifier, "id1");
                assert_eq!(packet.buffer.as_ref(), &[0xb0, 0, 0, 0, 3]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn malformed_and_unknown_packets_are_dropped() {
        let (protocol, bridge, worker) = setup();

        worker.open_session("id1", "10.0.0.1", 5000, 1);
        worker.encapsulated("id1", data(vec![0xb0, 0x00]));
        worker.encapsulated("id1", data(vec![0xb0, 0, 0, 0, 9]));
        worker.encapsulated("id1", data(vec![0xfe, 1, 2]));
        bridge.tick(1);

        assert_eq!(protocol.process(&bridge), 3);
        assert_eq!(protocol.difficulty(), Difficulty::Easy);
        assert_eq!(
            protocol.find_player(&PeerAddress::session("id1")),
            Some(PlayerStatus { spawned: false })
        );
        assert_eq!(worker.try_command(), None);
    }

    #[test]
    fn offline_datagrams_are_ignored() {
        let (protocol, bridge, worker) = setup();

        worker.raw("10.0.0.7", 4000, vec![0xb0, 0, 0, 0, 2]);
        bridge.tick(1);

        assert_eq!(protocol.process(&bridge), 1);
        assert_eq!(protocol.difficulty(), Difficulty::Easy);
        assert_eq!(protocol.player_count(), 0);
    }

    #[test]
    fn transport_close_removes_the_player() {
        let (protocol, bridge, worker) = setup();

        worker.open_session("id1", "10.0.0.1", 5000, 1);
        worker.close_session("id1", "timeout");
        bridge.tick(1);

        assert_eq!(protocol.player_count(), 0);
        let events = protocol.drain_events();
        assert_eq!(
            events.last(),
            Some(&ServerEvent::PlayerLeft {
                address: PeerAddress::session("id1"),
                reason: LeaveReason::Disconnected("timeout".to_string()),
            })
        );
    }
}

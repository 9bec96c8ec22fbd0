use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Context;

use lantern::{
    ConsoleLogger, ConsoleLoggerFactory, FixedTimestep, NetworkBridge, PeerAddress, Ticker,
    TransportHandle, TransportLogger, UdpTransport, UdpTransportConfig,
};

use crate::config::ServerConfig;
use crate::events::ServerEvent;
use crate::protocol::PeProtocol;

const SHUTDOWN_REASON: &str = "server shutdown";

pub struct GameServer {
    transport: Arc<UdpTransport>,
    bridge: Arc<NetworkBridge>,
    protocol: Arc<PeProtocol>,
    ticker: Arc<Ticker>,
    timestep: FixedTimestep,
    config: ServerConfig,
    last_tick_time: Instant,
    advertised_players: usize,
    pe_offline: bool,
    running: AtomicBool,
}

impl GameServer {
    pub fn new(bind_addr: &str, config: ServerConfig) -> anyhow::Result<Self> {
        let transport_config = UdpTransportConfig {
            session_timeout: config.session_timeout,
            max_sessions: config.max_players,
            ..UdpTransportConfig::default()
        };
        let transport_logger = TransportLogger::new(Arc::new(ConsoleLogger::new("Transport")));
        let transport = Arc::new(
            UdpTransport::bind(bind_addr, transport_config, transport_logger)
                .with_context(|| format!("failed to bind {}", bind_addr))?,
        );

        let ticker = Arc::new(Ticker::new());
        let protocol = Arc::new(PeProtocol::new(config.difficulty));
        let bridge = NetworkBridge::start(
            transport.clone(),
            protocol.clone(),
            ticker.clone(),
            &ConsoleLoggerFactory,
        )?;
        bridge.set_name(&config.name, 0, config.max_players);

        let timestep = FixedTimestep::new(config.tick_rate);
        log::info!("Ticking at {} Hz", timestep.tick_rate());

        Ok(Self {
            transport,
            bridge,
            protocol,
            ticker,
            timestep,
            config,
            last_tick_time: Instant::now(),
            advertised_players: 0,
            pe_offline: false,
            running: AtomicBool::new(true),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.local_addr()
    }

    pub fn drain_events(&self) -> Vec<ServerEvent> {
        self.protocol.drain_events()
    }

    pub fn run(&mut self) {
        while self.is_running() {
            self.tick_once();
            for event in self.drain_events() {
                log_event(&event);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        self.shutdown_connections();
    }

    pub fn tick_once(&mut self) {
        let now = Instant::now();
        let delta = now - self.last_tick_time;
        self.last_tick_time = now;
        self.timestep.accumulate(delta.as_secs_f32());

        while self.timestep.consume_tick() {
            self.tick();
        }
    }

    fn tick(&mut self) {
        self.ticker.tick();
        self.protocol.process(&self.bridge);

        let online = self.protocol.player_count();
        if online != self.advertised_players {
            self.advertised_players = online;
            self.bridge
                .set_name(&self.config.name, online, self.config.max_players);
        }

        if !self.bridge.is_running() && !self.pe_offline {
            self.pe_offline = true;
            log::error!("PE networking is offline, server keeps running without it");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn kick(&self, address: &PeerAddress, reason: &str) {
        self.bridge.close(address, reason);
        self.protocol.remove_player(address, reason);
    }

    pub fn shutdown_connections(&mut self) {
        for address in self.protocol.addresses() {
            self.kick(&address, SHUTDOWN_REASON);
        }
        for event in self.drain_events() {
            log_event(&event);
        }
        self.transport.shutdown();
    }
}

fn log_event(event: &ServerEvent) {
    match event {
        ServerEvent::SessionOpened { identifier } => {
            log::info!("Session opened: {}", identifier);
        }
        ServerEvent::PlayerSpawned { address } => {
            log::info!("Player {} joined", address);
        }
        ServerEvent::PlayerLeft { address, reason } => {
            log::info!("Player {} left: {}", address, reason.as_str());
        }
        ServerEvent::DifficultyChanged { difficulty, by } => {
            log::info!("Difficulty set to {:?} by {}", difficulty, by);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::UdpSocket;

    use super::*;

    fn local_server() -> GameServer {
        GameServer::new("127.0.0.1:0", ServerConfig::default()).unwrap()
    }

    #[test]
    fn shutdown_stops_the_transport() {
        let mut server = local_server();
        assert!(server.local_addr().is_some());

        server.tick_once();
        server.shutdown_connections();

        assert!(!server.transport.is_worker_alive());
    }

    #[test]
    fn dead_transport_degrades_instead_of_stopping() {
        let mut server = local_server();
        server.transport.shutdown();

        let deadline = Instant::now() + Duration::from_secs(2);
        while server.bridge.is_running() && Instant::now() < deadline {
            server.tick_once();
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(!server.bridge.is_running());
        assert!(server.pe_offline);
        assert!(server.is_running());

        let ticked = server.ticker.current_tick();
        let deadline = Instant::now() + Duration::from_secs(2);
        while server.ticker.current_tick() == ticked && Instant::now() < deadline {
            server.tick_once();
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(server.ticker.current_tick() > ticked);
        assert!(server.is_running());
    }

    #[test]
    fn player_joins_and_is_kicked_on_shutdown() {
        let mut server = local_server();
        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        client
            .send_to(&[0xb0, 0, 0, 0, 2], server.local_addr().unwrap())
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while server.protocol.player_count() == 0 && Instant::now() < deadline {
            server.tick_once();
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(server.protocol.player_count(), 1);
        assert_eq!(server.protocol.difficulty(), lantern::Difficulty::Normal);

        server.shutdown_connections();
        assert_eq!(server.protocol.player_count(), 0);
    }
}

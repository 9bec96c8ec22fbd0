pub mod bridge;
pub mod buffer;
pub mod logging;
pub mod net;
pub mod packet;
pub mod ticker;
pub mod transport;

pub use bridge::{
    BridgeError, MCPE_PROTOCOL, MCPE_VERSION, NetworkBridge, PlayerStatus, SessionHost,
    SessionState,
};
pub use buffer::{BufferError, DynamicByteBuffer};
pub use logging::{
    ConsoleLogger, ConsoleLoggerFactory, LogLevel, Logger, LoggerError, LoggerFactory,
    MemoryLogger, MemoryLoggerFactory, TransportLogger,
};
pub use net::{IdentifierAddress, PeerAddress, UniversalPacket};
pub use packet::{
    DataPacket, Difficulty, GamePacket, PacketError, PacketRegistry, SetDifficultyPacket,
};
pub use ticker::{FixedTimestep, Scheduler, TaskId, Ticker};
pub use transport::{
    ChannelTransport, EncapsulatedPacket, Reliability, SendPriority, TransportEventSink,
    TransportHandle, TransportWorker, UdpTransport, UdpTransportConfig,
};

pub const DEFAULT_PORT: u16 = 19132;
pub const DEFAULT_TICK_RATE: u32 = 20;

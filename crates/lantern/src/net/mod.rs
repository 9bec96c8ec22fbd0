mod address;
mod universal;

pub use address::{IdentifierAddress, PeerAddress};
pub use universal::UniversalPacket;

//! Application packet codec.
//!
//! Wire format of every packet: `[identifier: u8][fields...]`, big-endian,
//! fields in declaration order. Reordering fields is a protocol break.

pub mod ids;
mod registry;
mod set_difficulty;

pub use registry::{GamePacket, PacketRegistry};
pub use set_difficulty::{Difficulty, SetDifficultyPacket};

use crate::buffer::{BufferError, DynamicByteBuffer};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    #[error("empty packet")]
    Empty,
    #[error("packet 0x{id:02x} truncated: {source}")]
    Truncated {
        id: u8,
        #[source]
        source: BufferError,
    },
    #[error("packet 0x{id:02x} has invalid {field}: {reason}")]
    InvalidField {
        id: u8,
        field: &'static str,
        reason: String,
    },
    #[error("expected packet 0x{expected:02x}, found 0x{found:02x}")]
    IdentifierMismatch { expected: u8, found: u8 },
    #[error("unknown packet identifier 0x{0:02x}")]
    UnknownIdentifier(u8),
}

impl PacketError {
    /// Truncated payloads and out-of-range fields; the packet is dropped.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            PacketError::Empty | PacketError::Truncated { .. } | PacketError::InvalidField { .. }
        )
    }
}

pub trait DataPacket: Sized + Default {
    const ID: u8;

    fn identifier(&self) -> u8 {
        Self::ID
    }

    fn encode_body(&self, buf: &mut DynamicByteBuffer);

    fn decode_body(&mut self, buf: &mut DynamicByteBuffer) -> Result<(), BufferError>;

    /// Range checks run after a successful decode.
    fn validate(&self) -> Result<(), PacketError> {
        Ok(())
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = DynamicByteBuffer::new();
        buf.put_u8(Self::ID);
        self.encode_body(&mut buf);
        buf.into_vec()
    }

    fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        let mut buf = DynamicByteBuffer::wrap(bytes);
        let found = buf.get_u8().map_err(|_| PacketError::Empty)?;
        if found != Self::ID {
            return Err(PacketError::IdentifierMismatch {
                expected: Self::ID,
                found,
            });
        }

        let mut packet = Self::default();
        packet
            .decode_body(&mut buf)
            .map_err(|source| PacketError::Truncated {
                id: Self::ID,
                source,
            })?;
        packet.validate()?;
        Ok(packet)
    }
}

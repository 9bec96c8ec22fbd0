use std::collections::HashMap;

use super::{DataPacket, PacketError, SetDifficultyPacket};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GamePacket {
    SetDifficulty(SetDifficultyPacket),
}

impl GamePacket {
    pub fn identifier(&self) -> u8 {
        match self {
            GamePacket::SetDifficulty(packet) => packet.identifier(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            GamePacket::SetDifficulty(packet) => packet.encode(),
        }
    }
}

impl From<SetDifficultyPacket> for GamePacket {
    fn from(packet: SetDifficultyPacket) -> Self {
        GamePacket::SetDifficulty(packet)
    }
}

type DecodeFn = fn(&[u8]) -> Result<GamePacket, PacketError>;

fn decode_as<P>(bytes: &[u8]) -> Result<GamePacket, PacketError>
where
    P: DataPacket + Into<GamePacket>,
{
    P::decode(bytes).map(Into::into)
}

/// Identifier-keyed decoder table.
pub struct PacketRegistry {
    decoders: HashMap<u8, DecodeFn>,
}

impl Default for PacketRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register::<SetDifficultyPacket>();
        registry
    }
}

impl PacketRegistry {
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    pub fn register<P>(&mut self)
    where
        P: DataPacket + Into<GamePacket>,
    {
        if self.is_registered(P::ID) {
            log::warn!("replacing decoder for packet 0x{:02x}", P::ID);
        }
        self.decoders.insert(P::ID, decode_as::<P> as DecodeFn);
    }

    pub fn is_registered(&self, id: u8) -> bool {
        self.decoders.contains_key(&id)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<GamePacket, PacketError> {
        let id = *bytes.first().ok_or(PacketError::Empty)?;
        let decoder = self
            .decoders
            .get(&id)
            .ok_or(PacketError::UnknownIdentifier(id))?;
        decoder(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_by_identifier() {
        let registry = PacketRegistry::default();
        let packet = registry.decode(&[0xb0, 0, 0, 0, 3]).unwrap();

        assert_eq!(
            packet,
            GamePacket::SetDifficulty(SetDifficultyPacket { difficulty: 3 })
        );
        assert_eq!(packet.identifier(), 0xb0);
        assert_eq!(packet.encode(), vec![0xb0, 0, 0, 0, 3]);
    }

    #[test]
    fn unknown_and_empty_input() {
        let registry = PacketRegistry::default();
        assert_eq!(
            registry.decode(&[0x42, 1, 2]),
            Err(PacketError::UnknownIdentifier(0x42))
        );
        assert_eq!(registry.decode(&[]), Err(PacketError::Empty));
    }

    #[test]
    fn empty_registry_knows_nothing() {
        let registry = PacketRegistry::empty();
        assert!(!registry.is_registered(0xb0));
        assert!(matches!(
            registry.decode(&[0xb0, 0, 0, 0, 1]),
            Err(PacketError::UnknownIdentifier(0xb0))
        ));
    }

    #[test]
    fn registering_twice_keeps_one_decoder() {
        let mut registry = PacketRegistry::empty();
        registry.register::<SetDifficultyPacket>();
        registry.register::<SetDifficultyPacket>();

        assert!(registry.is_registered(0xb0));
        assert_eq!(
            registry.decode(&[0xb0, 0, 0, 0, 1]),
            Ok(GamePacket::SetDifficulty(SetDifficultyPacket { difficulty: 1 }))
        );
    }
}

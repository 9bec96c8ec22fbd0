use bytes::Bytes;

use super::PeerAddress;

/// A raw payload paired with the peer it came from or is going to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniversalPacket {
    payload: Bytes,
    address: PeerAddress,
}

impl UniversalPacket {
    pub fn new(payload: impl Into<Bytes>, address: impl Into<PeerAddress>) -> Self {
        Self {
            payload: payload.into(),
            address: address.into(),
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn address(&self) -> &PeerAddress {
        &self.address
    }

    pub fn into_parts(self) -> (Bytes, PeerAddress) {
        (self.payload, self.address)
    }
}

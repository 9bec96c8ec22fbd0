use super::{DataPacket, PacketError, ids};
use crate::buffer::{BufferError, DynamicByteBuffer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Difficulty {
    Peaceful = 0,
    Easy = 1,
    Normal = 2,
    Hard = 3,
}

impl TryFrom<i32> for Difficulty {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Difficulty::Peaceful),
            1 => Ok(Difficulty::Easy),
            2 => Ok(Difficulty::Normal),
            3 => Ok(Difficulty::Hard),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetDifficultyPacket {
    pub difficulty: i32,
}

impl SetDifficultyPacket {
    pub fn new(difficulty: Difficulty) -> Self {
        Self {
            difficulty: difficulty as i32,
        }
    }

    pub fn difficulty(&self) -> Option<Difficulty> {
        Difficulty::try_from(self.difficulty).ok()
    }
}

impl DataPacket for SetDifficultyPacket {
    const ID: u8 = ids::SET_DIFFICULTY_PACKET;

    fn encode_body(&self, buf: &mut DynamicByteBuffer) {
        buf.put_i32(self.difficulty);
    }

    fn decode_body(&mut self, buf: &mut DynamicByteBuffer) -> Result<(), BufferError> {
        self.difficulty = buf.get_i32()?;
        Ok(())
    }

    fn validate(&self) -> Result<(), PacketError> {
        match self.difficulty() {
            Some(_) => Ok(()),
            None => Err(PacketError::InvalidField {
                id: Self::ID,
                field: "difficulty",
                reason: format!("{} is outside 0..=3", self.difficulty),
            }),
        }
    }
}

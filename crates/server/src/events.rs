use lantern::{Difficulty, PeerAddress};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    SessionOpened {
        identifier: String,
    },
    PlayerSpawned {
        address: PeerAddress,
    },
    PlayerLeft {
        address: PeerAddress,
        reason: LeaveReason,
    },
    DifficultyChanged {
        difficulty: Difficulty,
        by: PeerAddress,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveReason {
    Disconnected(String),
    Kicked(String),
}

impl LeaveReason {
    pub fn as_str(&self) -> &str {
        match self {
            LeaveReason::Disconnected(reason) | LeaveReason::Kicked(reason) => reason,
        }
    }
}

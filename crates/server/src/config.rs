use std::time::Duration;

use lantern::Difficulty;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub tick_rate: u32,
    pub max_players: usize,
    pub session_timeout: Duration,
    pub difficulty: Difficulty,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "Lantern Server".to_string(),
            tick_rate: lantern::DEFAULT_TICK_RATE,
            max_players: 20,
            session_timeout: Duration::from_secs(10),
            difficulty: Difficulty::Easy,
        }
    }
}

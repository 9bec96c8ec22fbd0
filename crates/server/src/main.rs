mod config;
mod events;
mod protocol;
mod server;

use std::time::Duration;

use anyhow::{Result, anyhow};
use clap::Parser;

use config::ServerConfig;
use lantern::Difficulty;
use server::GameServer;

#[derive(Parser)]
#[command(name = "lantern-server")]
#[command(about = "Lantern PE server")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = lantern::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value_t = lantern::DEFAULT_TICK_RATE)]
    tick_rate: u32,

    #[arg(short, long, default_value_t = 20)]
    max_players: usize,

    #[arg(short, long, default_value = "Lantern Server")]
    name: String,

    #[arg(long, default_value_t = 10, help = "Idle session timeout in seconds")]
    session_timeout: u64,

    #[arg(long, default_value_t = 1, help = "Initial difficulty (0-3)")]
    difficulty: i32,
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let bind_addr = format!("{}:{}", args.bind, args.port);
    let difficulty = Difficulty::try_from(args.difficulty)
        .map_err(|value| anyhow!("difficulty {} is outside 0..=3", value))?;

    let config = ServerConfig {
        name: args.name,
        tick_rate: args.tick_rate,
        max_players: args.max_players,
        session_timeout: Duration::from_secs(args.session_timeout),
        difficulty,
    };

    let mut server = GameServer::new(&bind_addr, config)?;
    if let Some(addr) = server.local_addr() {
        log::info!("Server started on {}", addr);
    }
    server.run();
    log::info!("Server shutting down");

    Ok(())
}

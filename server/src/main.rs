use clap::Parser;
use log::{error, info};
use server::network::{Server, ServerConfig, ServerMessage};
use std::time::Duration;

/// Authoritative coin collector server
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,
    /// Tick rate (updates per second)
    #[clap(short, long, default_value_t = shared::TICK_RATE)]
    tick_rate: u32,
    /// Simulated one-way latency in milliseconds
    #[clap(short, long, default_value_t = shared::DEFAULT_LATENCY_MS)]
    latency_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        tick_rate: args.tick_rate,
        latency: Duration::from_millis(args.latency_ms),
    };

    info!("Starting coin collector server");
    info!("Tick rate: {} Hz", config.tick_rate);
    info!("Simulated latency: {} ms each way", args.latency_ms);
    info!(
        "Arena {}x{}, sprint target {} coins",
        shared::ARENA_WIDTH,
        shared::ARENA_HEIGHT,
        shared::SPRINT_WIN_SCORE
    );

    let mut server = Server::new(config).await?;
    let shutdown = server.handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            let _ = shutdown.send(ServerMessage::Shutdown);
        }
    });

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}

//! Headless bot for exercising a running server without the graphical client.

use clap::{Parser, ValueEnum};
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use shared::{GameMode, Intent, Packet};
use std::time::Duration;
use tokio::time::{interval, sleep, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Sprint,
    Endless,
}

impl From<ModeArg> for GameMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Sprint => GameMode::Sprint,
            ModeArg::Endless => GameMode::Endless,
        }
    }
}

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// WebSocket URL of the server
    #[clap(short, long, default_value = "ws://127.0.0.1:8765")]
    server: String,
    /// Request this mode as soon as the lobby is ready
    #[clap(short, long, value_enum)]
    mode: Option<ModeArg>,
    /// How long to keep playing before disconnecting
    #[clap(short, long, default_value_t = 10)]
    duration_secs: u64,
}

/// Directions the bot cycles through, one every half second
const PATROL: [Intent; 4] = [
    Intent { dx: 1, dy: 0 },
    Intent { dx: 0, dy: 1 },
    Intent { dx: -1, dy: 0 },
    Intent { dx: 0, dy: -1 },
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    info!("Connecting to {}", args.server);
    let (ws_stream, _) = connect_async(args.server.as_str()).await?;
    let (mut sender, mut receiver) = ws_stream.split();
    info!("Connected");

    let deadline = Instant::now() + Duration::from_secs(args.duration_secs);
    let mut patrol = interval(Duration::from_millis(500));
    let mut step = 0usize;
    let mut my_id: Option<String> = None;
    let mut updates = 0u64;

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                info!("Test duration elapsed");
                break;
            }

            _ = patrol.tick() => {
                if my_id.is_none() {
                    continue;
                }
                let intent = PATROL[step % PATROL.len()];
                step += 1;
                sender.send(Message::Text(Packet::input(intent).to_json()?)).await?;
            }

            message = receiver.next() => {
                let text = match message {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Server closed the connection");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("Connection error: {}", e);
                        break;
                    }
                };

                match Packet::from_json(&text) {
                    Ok(Packet::Welcome { player_id, simulated_latency, player_data }) => {
                        info!(
                            "Joined as {} ({}) at ({}, {}), latency {} ms",
                            player_data.name, player_id, player_data.x, player_data.y, simulated_latency
                        );
                        my_id = Some(player_id);
                    }
                    Ok(Packet::LobbyReady { message }) => {
                        info!("Lobby ready: {}", message);
                        if let Some(mode) = args.mode {
                            let request = Packet::StartGame { mode: mode.into() };
                            sender.send(Message::Text(request.to_json()?)).await?;
                            info!("Requested {} mode", GameMode::from(mode));
                        }
                    }
                    Ok(Packet::GameStart { mode }) => info!("Game started: {}", mode),
                    Ok(Packet::StateUpdate { players, coins, game_started, .. }) => {
                        updates += 1;
                        if updates % 60 == 1 {
                            let scores: Vec<String> = players
                                .iter()
                                .map(|p| format!("{}={}", p.name, p.score))
                                .collect();
                            info!(
                                "State #{}: started={} coins={} scores [{}]",
                                updates,
                                game_started,
                                coins.len(),
                                scores.join(", ")
                            );
                        }
                    }
                    Ok(Packet::GameOver { winner_name, scores, .. }) => {
                        info!("Game over, {} wins", winner_name);
                        for (id, entry) in &scores {
                            info!("  {} ({}): {}", entry.name, id, entry.score);
                        }
                    }
                    Ok(Packet::Rejected { reason }) => {
                        warn!("Rejected by server: {}", reason);
                        break;
                    }
                    Ok(other) => warn!("Unexpected packet: {:?}", other),
                    Err(e) => warn!("Failed to decode message: {}", e),
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
    // Give the close frame time to make it through the server's delay line
    sleep(Duration::from_millis(100)).await;
    info!("Test client finished after {} state updates", updates);

    Ok(())
}

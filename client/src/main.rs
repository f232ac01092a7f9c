use clap::Parser;
use client::game::{ClientGameState, ConnectionStatus};
use client::input::InputManager;
use client::interpolation::Smoothing;
use client::network::{NetworkClient, NetworkEvent};
use client::rendering::{FpsCounter, HudInfo, Renderer, WINDOW_HEIGHT, WINDOW_WIDTH};
use macroquad::prelude::*;
use shared::Packet;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the server
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8765")]
    server: String,

    /// Smooth by a fixed fraction per frame instead of per elapsed time
    #[arg(long)]
    frame_locked_smoothing: bool,
}

fn window_conf() -> Conf {
    Conf {
        window_title: "Coin Collector".to_owned(),
        window_width: WINDOW_WIDTH,
        window_height: WINDOW_HEIGHT,
        window_resizable: false,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    log::info!("Starting client...");
    log::info!("Connecting to: {}", args.server);
    log::info!("Controls: WASD/arrows to move, 1 = Sprint, 2 = Endless, Esc to quit");

    let smoothing = if args.frame_locked_smoothing {
        Smoothing::frame_locked()
    } else {
        Smoothing::time_based()
    };

    let mut network = match NetworkClient::connect(&args.server) {
        Ok(network) => network,
        Err(e) => {
            log::error!("Failed to start network thread: {}", e);
            return;
        }
    };

    let mut state = ClientGameState::new(smoothing);
    let mut input = InputManager::new();
    let mut renderer = Renderer::new();
    let mut fps = FpsCounter::new();

    loop {
        for event in network.poll() {
            match event {
                NetworkEvent::Connected => log::debug!("Transport connected, waiting for welcome"),
                NetworkEvent::Packet(packet) => state.handle_packet(packet),
                NetworkEvent::Disconnected { reason } => {
                    log::warn!("Disconnected: {}", reason);
                    state.mark_disconnected();
                }
            }
        }

        let frame = input.update();
        if frame.quit {
            break;
        }

        let connected = state.status == ConnectionStatus::Connected;
        if let Some(intent) = input.outgoing_intent(frame.held, connected) {
            if !network.send(Packet::input(intent)) {
                input.forget_sent();
            }
        }
        if connected {
            if let Some(mode) = frame.mode_request {
                log::info!("Requesting {} mode", mode);
                network.send(Packet::StartGame { mode });
            }
        }

        state.interpolate(get_frame_time());

        let hud = HudInfo {
            fps: fps.record(get_time()),
            server_url: args.server.clone(),
            frame_locked: args.frame_locked_smoothing,
        };
        renderer.render(&state, &hud);

        next_frame().await;
    }

    log::info!("Client shutting down");
}

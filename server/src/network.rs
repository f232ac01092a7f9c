//! Server network layer: WebSocket connections and the authoritative game loop

use crate::client_manager::{Client, ClientManager};
use crate::game::{GameState, SessionPhase};
use crate::latency::DelayLine;
use futures_util::{Sink, SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{
    GameMode, Intent, Packet, DEFAULT_LATENCY_MS, DEFAULT_PORT, MAX_PLAYERS, TICK_RATE,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Longest a single WebSocket write may take before the client is dropped
pub const SEND_TIMEOUT: Duration = Duration::from_secs(2);
const OUTBOUND_QUEUE: usize = 256;
const INBOUND_QUEUE: usize = 256;

/// Why a connection's writer stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterExit {
    QueueClosed,
    SendFailed,
    TimedOut,
}

/// Wall-clock seconds between two ticks.
///
/// Left uncapped so the coin spawn timer follows real time when ticks are
/// skipped under load.
fn tick_delta(last_tick: Instant, now: Instant) -> f32 {
    now.saturating_duration_since(last_tick).as_secs_f32()
}

/// Writes queued frames to `sink` until the queue closes, a write fails, or
/// a single write takes longer than `send_timeout`.
async fn pump_outbound<S>(
    mut sink: S,
    mut outbound_rx: mpsc::Receiver<String>,
    client_id: &str,
    send_timeout: Duration,
) -> WriterExit
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let mut exit = WriterExit::QueueClosed;
    while let Some(text) = outbound_rx.recv().await {
        match timeout(send_timeout, sink.send(Message::Text(text))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!("Send to {} failed: {}", client_id, e);
                exit = WriterExit::SendFailed;
                break;
            }
            Err(_) => {
                warn!("Send to {} timed out", client_id);
                exit = WriterExit::TimedOut;
                break;
            }
        }
    }
    let _ = timeout(send_timeout, sink.close()).await;
    exit
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub tick_rate: u32,
    /// One-way delay applied to every inbound and outbound message
    pub latency: Duration,
}

impl ServerConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1)))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            tick_rate: TICK_RATE,
            latency: Duration::from_millis(DEFAULT_LATENCY_MS),
        }
    }
}

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    ClientConnected {
        client_id: String,
        addr: SocketAddr,
        outbound: DelayLine<String>,
    },
    PacketReceived {
        client_id: String,
        packet: Packet,
    },
    ClientDisconnected {
        client_id: String,
    },
    Shutdown,
}

/// Main server coordinating connections and the game simulation
///
/// The server loop is the only owner of [`GameState`]; connection tasks
/// talk to it through [`ServerMessage`]s.
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    config: ServerConfig,
    clients: ClientManager,
    game_state: GameState,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_game_state(config, GameState::new()).await
    }

    pub async fn with_game_state(
        config: ServerConfig,
        game_state: GameState,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on ws://{}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            config,
            clients: ClientManager::new(MAX_PLAYERS),
            game_state,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Channel into the server loop. Sending `Shutdown` stops [`Server::run`].
    pub fn handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns the task accepting new TCP connections
    fn spawn_listener(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let server_tx = self.server_tx.clone();
        let latency = self.config.latency;

        tokio::spawn(async move {
            let mut next_connection = 1u64;

            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let client_id = format!("conn-{}", next_connection);
                        next_connection += 1;
                        info!("New connection {} from {}", client_id, addr);

                        tokio::spawn(Self::handle_connection(
                            stream,
                            addr,
                            client_id,
                            server_tx.clone(),
                            latency,
                        ));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }

                if server_tx.is_closed() {
                    break;
                }
            }
        });
    }

    /// Drives one WebSocket connection until either side closes it
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        client_id: String,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
        latency: Duration,
    ) {
        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!("WebSocket handshake with {} failed: {}", addr, e);
                return;
            }
        };
        let (ws_sender, mut ws_receiver) = ws_stream.split();

        let (outbound, outbound_rx) = DelayLine::<String>::spawn(latency, OUTBOUND_QUEUE);
        let (inbound, mut inbound_rx) = DelayLine::<Packet>::spawn(latency, INBOUND_QUEUE);

        if server_tx
            .send(ServerMessage::ClientConnected {
                client_id: client_id.clone(),
                addr,
                outbound,
            })
            .is_err()
        {
            return;
        }

        // Writer: ends when the server drops the outbound queue or a send fails
        let mut writer = {
            let server_tx = server_tx.clone();
            let client_id = client_id.clone();
            tokio::spawn(async move {
                let exit = pump_outbound(ws_sender, outbound_rx, &client_id, SEND_TIMEOUT).await;
                debug!("Writer for {} stopped: {:?}", client_id, exit);
                let _ = server_tx.send(ServerMessage::ClientDisconnected { client_id });
            })
        };

        // Forwards delayed inbound packets to the server loop
        let forwarder = {
            let server_tx = server_tx.clone();
            let client_id = client_id.clone();
            tokio::spawn(async move {
                while let Some(packet) = inbound_rx.recv().await {
                    let message = ServerMessage::PacketReceived {
                        client_id: client_id.clone(),
                        packet,
                    };
                    if server_tx.send(message).is_err() {
                        break;
                    }
                }
            })
        };

        while let Some(message) = ws_receiver.next().await {
            match message {
                Ok(Message::Text(text)) => match Packet::from_json(&text) {
                    Ok(packet) if !packet.is_client_packet() => {
                        warn!("Ignoring server-only packet from {}: {:?}", client_id, packet);
                    }
                    Ok(packet) => {
                        if let Err(e) = inbound.push(packet) {
                            warn!("Dropping {}: inbound queue {}", client_id, e);
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Discarding malformed message from {}: {}", client_id, e);
                    }
                },
                Ok(Message::Binary(_)) => {
                    debug!("Ignoring binary frame from {}", client_id);
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!("WebSocket error for {}: {}", client_id, e);
                    break;
                }
            }
        }

        info!("Connection closed: {}", client_id);
        forwarder.abort();
        let _ = server_tx.send(ServerMessage::ClientDisconnected { client_id });

        // The writer finishes once the server loop drops this client's queue;
        // give it a bounded window to flush, then tear it down.
        if timeout(SEND_TIMEOUT, &mut writer).await.is_err() {
            debug!("Writer for {} did not finish in time", addr);
            writer.abort();
        }
    }

    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::ClientConnected {
                client_id,
                addr,
                outbound,
            } => self.on_client_connected(client_id, addr, outbound),
            ServerMessage::PacketReceived { client_id, packet } => {
                self.handle_packet(&client_id, packet)
            }
            ServerMessage::ClientDisconnected { client_id } => {
                if self.remove_client(&client_id) {
                    self.broadcast_state();
                }
            }
            ServerMessage::Shutdown => {}
        }
    }

    fn on_client_connected(&mut self, client_id: String, addr: SocketAddr, outbound: DelayLine<String>) {
        if self.clients.is_full() {
            self.reject(&client_id, &outbound, "Server full");
            return;
        }

        if let Err(e) = self.game_state.add_player(&client_id) {
            self.reject(&client_id, &outbound, &e.to_string());
            return;
        }

        let client = Client::new(client_id.clone(), addr, outbound);
        if let Err(client) = self.clients.add_client(client) {
            self.game_state.remove_player(&client.id);
            return;
        }

        let latency_ms = self.config.latency.as_millis() as u64;
        if let Some(welcome) = self.game_state.welcome(&client_id, latency_ms) {
            if !self.clients.send_to(&client_id, &welcome) {
                self.remove_client(&client_id);
                self.broadcast_state();
                return;
            }
        }

        if self.game_state.phase() == SessionPhase::LobbyReady {
            info!("Lobby ready with {} players, waiting for mode selection", MAX_PLAYERS);
            let notice = self.game_state.lobby_ready_notice();
            self.broadcast(&notice);
        }

        self.broadcast_state();
    }

    fn reject(&self, client_id: &str, outbound: &DelayLine<String>, reason: &str) {
        warn!("Rejecting {}: {}", client_id, reason);
        let packet = Packet::Rejected {
            reason: reason.to_string(),
        };
        match packet.to_json() {
            Ok(text) => {
                let _ = outbound.push(text);
            }
            Err(e) => error!("Failed to encode rejection: {}", e),
        }
    }

    /// Processes a decoded client packet
    fn handle_packet(&mut self, client_id: &str, packet: Packet) {
        if !self.clients.contains(client_id) {
            return;
        }

        match packet {
            Packet::Input { dx, dy } => {
                self.game_state.set_intent(client_id, Intent::new(dx, dy));
            }
            Packet::StartGame { mode } => self.start_game(client_id, mode),
            other => {
                warn!("Unexpected packet type from {}: {:?}", client_id, other);
            }
        }
    }

    fn start_game(&mut self, client_id: &str, mode: GameMode) {
        if !self.game_state.start_game(mode) {
            debug!(
                "Ignoring start_game from {} in phase {:?}",
                client_id,
                self.game_state.phase()
            );
            return;
        }

        self.broadcast(&Packet::GameStart { mode });
    }

    fn remove_client(&mut self, client_id: &str) -> bool {
        if !self.clients.remove_client(client_id) {
            return false;
        }
        self.game_state.remove_player(client_id);
        true
    }

    /// Broadcasts a packet; unreachable clients are removed and the
    /// remaining ones get a fresh snapshot.
    fn broadcast(&mut self, packet: &Packet) {
        let failed = self.clients.broadcast(packet);
        if failed.is_empty() {
            return;
        }

        for client_id in &failed {
            warn!("Client {} unreachable, treating as disconnected", client_id);
            self.remove_client(client_id);
        }
        self.broadcast_state();
    }

    fn broadcast_state(&mut self) {
        if self.clients.is_empty() {
            return;
        }
        let snapshot = self.game_state.snapshot();
        self.broadcast(&snapshot);
    }

    fn run_tick(&mut self, dt: f32) {
        let outcome = self.game_state.tick(dt);

        if let Some(snapshot) = outcome.snapshot {
            self.broadcast(&snapshot);
        }
        if let Some(game_over) = outcome.game_over {
            self.broadcast(&game_over);
        }
    }

    /// Main server loop coordinating connection events and fixed-rate ticks
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_listener();

        let mut tick_interval = interval(self.config.tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();

        info!(
            "Server started: {} Hz, {} ms simulated latency",
            self.config.tick_rate,
            self.config.latency.as_millis()
        );

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                        Some(message) => self.handle_message(message),
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = tick_delta(last_tick, now);
                    last_tick = now;

                    self.run_tick(dt);
                },
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// A socket whose peer never reads
    struct StalledSink;

    impl Sink<Message> for StalledSink {
        type Error = std::io::Error;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }

        fn start_send(self: Pin<&mut Self>, _item: Message) -> Result<(), Self::Error> {
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }
    }

    async fn test_server() -> Server {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            tick_rate: 60,
            latency: Duration::ZERO,
        };
        Server::with_game_state(config, GameState::with_seed(5))
            .await
            .unwrap()
    }

    fn connect(server: &mut Server, id: &str) -> mpsc::Receiver<String> {
        connect_with_capacity(server, id, 64)
    }

    fn connect_with_capacity(
        server: &mut Server,
        id: &str,
        capacity: usize,
    ) -> mpsc::Receiver<String> {
        let (outbound, ready) = DelayLine::spawn(Duration::ZERO, capacity);
        server.handle_message(ServerMessage::ClientConnected {
            client_id: id.to_string(),
            addr: "127.0.0.1:9000".parse().unwrap(),
            outbound,
        });
        ready
    }

    async fn next_packet(rx: &mut mpsc::Receiver<String>) -> Packet {
        let text = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for packet")
            .expect("channel closed");
        Packet::from_json(&text).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:8765");
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.latency, Duration::from_millis(200));
        assert_eq!(config.tick_duration().as_micros(), 16_666);
    }

    #[tokio::test]
    async fn test_join_sends_welcome_then_lobby_ready() {
        let mut server = test_server().await;

        let mut first = connect(&mut server, "conn-1");
        match next_packet(&mut first).await {
            Packet::Welcome { player_data, .. } => assert_eq!(player_data.name, "Alice"),
            other => panic!("Expected welcome, got {:?}", other),
        }
        assert!(matches!(next_packet(&mut first).await, Packet::StateUpdate { .. }));

        let mut second = connect(&mut server, "conn-2");
        match next_packet(&mut second).await {
            Packet::Welcome { player_id, player_data, simulated_latency } => {
                assert_eq!(player_id, "conn-2");
                assert_eq!(player_data.name, "Bob");
                assert_eq!(simulated_latency, 0);
            }
            other => panic!("Expected welcome, got {:?}", other),
        }
        assert!(matches!(next_packet(&mut second).await, Packet::LobbyReady { .. }));
        assert!(matches!(next_packet(&mut first).await, Packet::LobbyReady { .. }));
        assert_eq!(server.game_state.phase(), SessionPhase::LobbyReady);
    }

    #[tokio::test]
    async fn test_third_connection_rejected() {
        let mut server = test_server().await;
        let _a = connect(&mut server, "conn-1");
        let _b = connect(&mut server, "conn-2");
        let mut third = connect(&mut server, "conn-3");

        match next_packet(&mut third).await {
            Packet::Rejected { reason } => assert_eq!(reason, "Server full"),
            other => panic!("Expected rejection, got {:?}", other),
        }
        // The queue is dropped after the rejection is delivered
        assert!(third.recv().await.is_none());
        assert_eq!(server.clients.len(), 2);
    }

    #[tokio::test]
    async fn test_start_game_broadcasts_and_ticks() {
        let mut server = test_server().await;
        let mut a = connect(&mut server, "conn-1");
        let _b = connect(&mut server, "conn-2");

        server.handle_message(ServerMessage::PacketReceived {
            client_id: "conn-1".to_string(),
            packet: Packet::StartGame {
                mode: GameMode::Sprint,
            },
        });
        assert!(server.game_state.is_started());

        // welcome, state, lobby_ready, state, then game_start
        let mut saw_start = false;
        for _ in 0..5 {
            if let Packet::GameStart { mode } = next_packet(&mut a).await {
                assert_eq!(mode, GameMode::Sprint);
                saw_start = true;
            }
        }
        assert!(saw_start);

        server.run_tick(1.0 / 60.0);
        match next_packet(&mut a).await {
            Packet::StateUpdate { game_started, players, mode, .. } => {
                assert!(game_started);
                assert_eq!(players.len(), 2);
                assert_eq!(mode, GameMode::Sprint);
            }
            other => panic!("Expected state update, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_start_game_with_one_player_ignored() {
        let mut server = test_server().await;
        let _a = connect(&mut server, "conn-1");

        server.handle_message(ServerMessage::PacketReceived {
            client_id: "conn-1".to_string(),
            packet: Packet::StartGame {
                mode: GameMode::Endless,
            },
        });
        assert!(!server.game_state.is_started());
    }

    #[tokio::test]
    async fn test_input_from_unknown_client_ignored() {
        let mut server = test_server().await;
        let _a = connect(&mut server, "conn-1");

        server.handle_message(ServerMessage::PacketReceived {
            client_id: "conn-7".to_string(),
            packet: Packet::Input { dx: 1, dy: 0 },
        });
        server.handle_message(ServerMessage::PacketReceived {
            client_id: "conn-1".to_string(),
            packet: Packet::Input { dx: -4, dy: 1 },
        });

        assert_eq!(server.game_state.velocity("conn-1"), Some(Intent::new(-1, 1)));
    }

    #[tokio::test]
    async fn test_disconnect_broadcasts_reduced_roster() {
        let mut server = test_server().await;
        let mut a = connect(&mut server, "conn-1");
        let _b = connect(&mut server, "conn-2");

        server.handle_message(ServerMessage::ClientDisconnected {
            client_id: "conn-2".to_string(),
        });
        assert_eq!(server.clients.len(), 1);

        let mut last_players = None;
        while let Ok(Some(text)) = timeout(Duration::from_millis(100), a.recv()).await {
            if let Ok(Packet::StateUpdate { players, .. }) = Packet::from_json(&text) {
                last_players = Some(players);
            }
        }
        let players = last_players.expect("no state update after disconnect");
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].id, "conn-1");
    }

    #[tokio::test]
    async fn test_unreachable_client_removed_on_broadcast() {
        let mut server = test_server().await;
        let _a = connect(&mut server, "conn-1");
        let b = connect(&mut server, "conn-2");
        drop(b);

        // Keep broadcasting until the dropped receiver is noticed
        for _ in 0..20 {
            server.broadcast_state();
            tokio::task::yield_now().await;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(!server.clients.contains("conn-2"));
        assert!(server.game_state.player("conn-2").is_none());
        assert!(server.clients.contains("conn-1"));
    }

    #[tokio::test]
    async fn test_stalled_writer_times_out() {
        let (outbound, ready) = DelayLine::spawn(Duration::ZERO, 4);
        outbound.push("hello".to_string()).unwrap();

        let started = Instant::now();
        let exit = pump_outbound(StalledSink, ready, "conn-1", Duration::from_millis(50)).await;

        assert_eq!(exit, WriterExit::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_writer_stops_when_queue_closes() {
        let (outbound, ready) = DelayLine::spawn(Duration::ZERO, 4);
        outbound.push("hello".to_string()).unwrap();
        drop(outbound);

        let sink = futures_util::sink::drain::<Message>();
        let exit = pump_outbound(sink, ready, "conn-1", SEND_TIMEOUT).await;
        assert_eq!(exit, WriterExit::QueueClosed);
    }

    #[tokio::test]
    async fn test_client_that_stops_draining_is_disconnected() {
        let mut server = test_server().await;
        let _a = connect(&mut server, "conn-1");
        // Held but never read, so its queue fills up
        let _stuck = connect_with_capacity(&mut server, "conn-2", 1);

        for _ in 0..20 {
            server.broadcast_state();
            tokio::task::yield_now().await;
            if !server.clients.contains("conn-2") {
                break;
            }
        }

        assert!(!server.clients.contains("conn-2"));
        assert!(server.game_state.player("conn-2").is_none());
        assert!(server.clients.contains("conn-1"));
    }

    #[test]
    fn test_tick_delta_follows_wall_clock() {
        let last = Instant::now();
        let stalled = tick_delta(last, last + Duration::from_secs(3));
        assert!((stalled - 3.0).abs() < 1e-6);
        assert_eq!(tick_delta(last + Duration::from_secs(1), last), 0.0);
    }
}

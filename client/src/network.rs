//! WebSocket connection running on a background thread
//!
//! The render loop is synchronous, so the connection lives on its own thread
//! with a single-threaded Tokio runtime. Packets cross over through unbounded
//! channels: [`NetworkClient::send`] never blocks and [`NetworkClient::poll`]
//! drains whatever has arrived since the last frame.

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::Packet;
use std::thread;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    Connected,
    Packet(Packet),
    Disconnected { reason: String },
}

pub struct NetworkClient {
    outgoing: mpsc::UnboundedSender<Packet>,
    incoming: mpsc::UnboundedReceiver<NetworkEvent>,
}

impl NetworkClient {
    /// Starts connecting in the background. Progress arrives through [`poll`].
    ///
    /// [`poll`]: NetworkClient::poll
    pub fn connect(url: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let url = url.to_string();

        thread::Builder::new()
            .name("network".to_string())
            .spawn(move || {
                runtime.block_on(run_session(url, outgoing_rx, incoming_tx));
            })?;

        Ok(Self {
            outgoing: outgoing_tx,
            incoming: incoming_rx,
        })
    }

    /// Queues a packet. Returns false once the connection is gone.
    pub fn send(&self, packet: Packet) -> bool {
        self.outgoing.send(packet).is_ok()
    }

    /// Everything received since the last call, in arrival order
    pub fn poll(&mut self) -> Vec<NetworkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.incoming.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Drives one connection until either side closes it
pub async fn run_session(
    url: String,
    mut outgoing: mpsc::UnboundedReceiver<Packet>,
    events: mpsc::UnboundedSender<NetworkEvent>,
) {
    info!("Connecting to {}", url);
    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws, _)) => ws,
        Err(e) => {
            error!("Failed to connect to {}: {}", url, e);
            let _ = events.send(NetworkEvent::Disconnected {
                reason: e.to_string(),
            });
            return;
        }
    };
    info!("Connected to {}", url);
    let _ = events.send(NetworkEvent::Connected);

    let (mut sender, mut receiver) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            packet = outgoing.recv() => {
                let Some(packet) = packet else {
                    let _ = sender.send(Message::Close(None)).await;
                    break "client closed".to_string();
                };
                let text = match packet.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Failed to encode packet: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sender.send(Message::Text(text)).await {
                    break e.to_string();
                }
            }

            message = receiver.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => match Packet::from_json(&text) {
                        Ok(packet) => {
                            if events.send(NetworkEvent::Packet(packet)).is_err() {
                                break "client closed".to_string();
                            }
                        }
                        Err(e) => warn!("Discarding malformed message: {}", e),
                    },
                    Some(Ok(Message::Close(_))) | None => break "server closed the connection".to_string(),
                    Some(Ok(_)) => debug!("Ignoring non-text frame"),
                    Some(Err(e)) => break e.to_string(),
                }
            }
        }
    };

    info!("Disconnected: {}", reason);
    let _ = events.send(NetworkEvent::Disconnected { reason });
}

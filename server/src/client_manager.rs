//! Connection registry for the game server
//!
//! This module tracks the live WebSocket connections that own a seat in the
//! session:
//! - Capacity enforcement (two seats)
//! - Point-to-point and broadcast delivery through each connection's delay line
//! - Detection of clients that can no longer be written to
//!
//! Sending never waits. A connection whose outbound queue is full or closed
//! is reported back to the caller, which treats it as a disconnect.

use log::{error, info, warn};
use shared::Packet;
use std::net::SocketAddr;
use std::time::Instant;

use crate::latency::DelayLine;

/// A connected client and its outbound queue
#[derive(Debug)]
pub struct Client {
    /// Opaque connection-scoped identifier
    pub id: String,
    /// Remote address, for logging
    pub addr: SocketAddr,
    pub connected_at: Instant,
    outbound: DelayLine<String>,
}

impl Client {
    pub fn new(id: impl Into<String>, addr: SocketAddr, outbound: DelayLine<String>) -> Self {
        Self {
            id: id.into(),
            addr,
            connected_at: Instant::now(),
            outbound,
        }
    }

    /// Queues already-encoded text. Returns false if the client cannot take it.
    pub fn send_text(&self, text: String) -> bool {
        match self.outbound.push(text) {
            Ok(()) => true,
            Err(e) => {
                warn!("Send to client {} failed: {}", self.id, e);
                false
            }
        }
    }
}

/// Manages all connected clients in join order
pub struct ClientManager {
    clients: Vec<Client>,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: Vec::new(),
            max_clients,
        }
    }

    /// Registers a client. Hands the client back if the server is full.
    pub fn add_client(&mut self, client: Client) -> Result<(), Client> {
        if self.clients.len() >= self.max_clients {
            return Err(client);
        }

        info!("Client {} connected from {}", client.id, client.addr);
        self.clients.push(client);
        Ok(())
    }

    /// Removes a client. Returns false if it was already gone.
    pub fn remove_client(&mut self, client_id: &str) -> bool {
        match self.clients.iter().position(|c| c.id == client_id) {
            Some(index) => {
                let client = self.clients.remove(index);
                info!(
                    "Client {} disconnected after {:.1}s",
                    client.id,
                    client.connected_at.elapsed().as_secs_f32()
                );
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.clients.iter().any(|c| c.id == client_id)
    }

    /// Sends a packet to one client. Returns false if delivery failed.
    pub fn send_to(&self, client_id: &str, packet: &Packet) -> bool {
        let Some(client) = self.clients.iter().find(|c| c.id == client_id) else {
            return false;
        };

        match packet.to_json() {
            Ok(text) => client.send_text(text),
            Err(e) => {
                error!("Failed to encode packet: {}", e);
                true
            }
        }
    }

    /// Sends a packet to every client. Returns the ids that could not be reached.
    pub fn broadcast(&self, packet: &Packet) -> Vec<String> {
        if self.clients.is_empty() {
            return Vec::new();
        }

        let text = match packet.to_json() {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to encode broadcast packet: {}", e);
                return Vec::new();
            }
        };

        self.clients
            .iter()
            .filter(|client| !client.send_text(text.clone()))
            .map(|client| client.id.clone())
            .collect()
    }

    pub fn client_ids(&self) -> Vec<String> {
        self.clients.iter().map(|c| c.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }
}

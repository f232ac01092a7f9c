use log::{debug, info, warn};
use shared::{Coin, GameMode, Packet, Player};
use std::collections::HashMap;

use crate::interpolation::{InterpolatedView, Smoothing};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    /// Terminal: the client never reconnects.
    Disconnected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameOverInfo {
    pub winner_id: String,
    pub winner_name: String,
    /// (name, score), highest score first
    pub scores: Vec<(String, u32)>,
}

/// Everything the client knows about the session, derived from server packets
pub struct ClientGameState {
    pub status: ConnectionStatus,
    pub my_id: Option<String>,
    pub simulated_latency_ms: u64,
    pub players: Vec<Player>,
    pub coins: Vec<Coin>,
    pub game_started: bool,
    pub mode: GameMode,
    pub lobby_message: Option<String>,
    pub game_over: Option<GameOverInfo>,
    pub rejection: Option<String>,

    views: HashMap<String, InterpolatedView>,
    smoothing: Smoothing,
}

impl ClientGameState {
    pub fn new(smoothing: Smoothing) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            my_id: None,
            simulated_latency_ms: 0,
            players: Vec::new(),
            coins: Vec::new(),
            game_started: false,
            mode: GameMode::default(),
            lobby_message: None,
            game_over: None,
            rejection: None,
            views: HashMap::new(),
            smoothing,
        }
    }

    pub fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Welcome {
                player_id,
                simulated_latency,
                player_data,
            } => {
                info!(
                    "Joined as {} ({}), simulated latency {} ms",
                    player_data.name, player_id, simulated_latency
                );
                self.status = ConnectionStatus::Connected;
                self.my_id = Some(player_id);
                self.simulated_latency_ms = simulated_latency;
                self.views
                    .entry(player_data.id.clone())
                    .or_insert_with(|| InterpolatedView::from_player(&player_data));
                if !self.players.iter().any(|p| p.id == player_data.id) {
                    self.players.push(player_data);
                }
            }

            Packet::LobbyReady { message } => {
                info!("Lobby ready: {}", message);
                self.lobby_message = Some(message);
            }

            Packet::GameStart { mode } => {
                info!("Game started in {} mode", mode);
                self.game_started = true;
                self.mode = mode;
                self.game_over = None;
            }

            Packet::StateUpdate {
                players,
                coins,
                game_started,
                mode,
            } => self.apply_snapshot(players, coins, game_started, mode),

            Packet::GameOver {
                winner,
                winner_name,
                scores,
            } => {
                info!("Game over, {} wins", winner_name);
                let mut scores: Vec<(String, u32)> =
                    scores.into_values().map(|s| (s.name, s.score)).collect();
                scores.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

                self.game_started = false;
                self.game_over = Some(GameOverInfo {
                    winner_id: winner,
                    winner_name,
                    scores,
                });
            }

            Packet::Rejected { reason } => {
                warn!("Rejected by server: {}", reason);
                self.rejection = Some(reason);
                self.status = ConnectionStatus::Disconnected;
            }

            other => warn!("Ignoring unexpected packet: {:?}", other),
        }
    }

    /// Replaces the roster and coins. Display positions carry over; players
    /// missing from the snapshot lose their view immediately.
    pub fn apply_snapshot(
        &mut self,
        players: Vec<Player>,
        coins: Vec<Coin>,
        game_started: bool,
        mode: GameMode,
    ) {
        self.views
            .retain(|id, _| players.iter().any(|p| &p.id == id));

        for player in &players {
            match self.views.get_mut(&player.id) {
                Some(view) => view.update_from(player),
                None => {
                    debug!("Tracking new player {} ({})", player.name, player.id);
                    self.views
                        .insert(player.id.clone(), InterpolatedView::from_player(player));
                }
            }
        }

        self.players = players;
        self.coins = coins;
        self.game_started = game_started;
        self.mode = mode;
    }

    /// Advances every display position by one render frame.
    pub fn interpolate(&mut self, dt: f32) {
        let factor = self.smoothing.factor(dt);
        for view in self.views.values_mut() {
            view.step(factor);
        }
    }

    pub fn display_position(&self, player_id: &str) -> Option<(f32, f32)> {
        self.views.get(player_id).map(|view| view.display())
    }

    /// Players in join order with their smoothed positions
    pub fn render_players(&self) -> Vec<(&Player, (f32, f32))> {
        self.players
            .iter()
            .map(|p| {
                let position = self.display_position(&p.id).unwrap_or((p.x, p.y));
                (p, position)
            })
            .collect()
    }

    pub fn my_player(&self) -> Option<&Player> {
        let id = self.my_id.as_deref()?;
        self.players.iter().find(|p| p.id == id)
    }

    pub fn tracked_count(&self) -> usize {
        self.views.len()
    }

    pub fn mark_disconnected(&mut self) {
        if self.status != ConnectionStatus::Disconnected {
            warn!("Connection to server lost");
        }
        self.status = ConnectionStatus::Disconnected;
    }
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new(Smoothing::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::FinalScore;
    use std::collections::BTreeMap;

    fn alice(x: f32, y: f32) -> Player {
        Player::new("conn-1", "Alice", x, y, [255, 100, 100])
    }

    fn bob(x: f32, y: f32) -> Player {
        Player::new("conn-2", "Bob", x, y, [100, 100, 255])
    }

    fn snapshot(players: Vec<Player>) -> Packet {
        Packet::StateUpdate {
            players,
            coins: vec![Coin::new(0, 50.0, 50.0)],
            game_started: true,
            mode: GameMode::Endless,
        }
    }

    #[test]
    fn test_welcome_marks_connected() {
        let mut state = ClientGameState::default();
        assert_eq!(state.status, ConnectionStatus::Connecting);

        state.handle_packet(Packet::Welcome {
            player_id: "conn-1".to_string(),
            simulated_latency: 200,
            player_data: alice(100.0, 100.0),
        });

        assert_eq!(state.status, ConnectionStatus::Connected);
        assert_eq!(state.my_id.as_deref(), Some("conn-1"));
        assert_eq!(state.simulated_latency_ms, 200);
        assert_eq!(state.my_player().map(|p| p.name.as_str()), Some("Alice"));
        assert_eq!(state.display_position("conn-1"), Some((100.0, 100.0)));
    }

    #[test]
    fn test_snapshot_keeps_display_and_moves_target() {
        let mut state = ClientGameState::new(Smoothing::frame_locked());
        state.handle_packet(snapshot(vec![alice(100.0, 100.0)]));
        state.handle_packet(snapshot(vec![alice(200.0, 100.0)]));

        // Not yet smoothed
        assert_eq!(state.display_position("conn-1"), Some((100.0, 100.0)));

        state.interpolate(1.0 / 60.0);
        let (x, y) = state.display_position("conn-1").unwrap();
        assert!((x - 130.0).abs() < 1e-3);
        assert_eq!(y, 100.0);
    }

    #[test]
    fn test_absent_player_view_discarded() {
        let mut state = ClientGameState::default();
        state.handle_packet(snapshot(vec![alice(100.0, 100.0), bob(300.0, 300.0)]));
        assert_eq!(state.tracked_count(), 2);

        state.handle_packet(snapshot(vec![alice(100.0, 100.0)]));
        assert_eq!(state.tracked_count(), 1);
        assert!(state.display_position("conn-2").is_none());
        assert_eq!(state.render_players().len(), 1);
    }

    #[test]
    fn test_game_over_sorts_scores() {
        let mut state = ClientGameState::default();
        state.handle_packet(Packet::GameStart {
            mode: GameMode::Sprint,
        });
        assert!(state.game_started);

        let mut scores = BTreeMap::new();
        scores.insert(
            "conn-1".to_string(),
            FinalScore {
                name: "Alice".to_string(),
                score: 4,
            },
        );
        scores.insert(
            "conn-2".to_string(),
            FinalScore {
                name: "Bob".to_string(),
                score: 10,
            },
        );
        state.handle_packet(Packet::GameOver {
            winner: "conn-2".to_string(),
            winner_name: "Bob".to_string(),
            scores,
        });

        assert!(!state.game_started);
        let info = state.game_over.clone().unwrap();
        assert_eq!(info.winner_name, "Bob");
        assert_eq!(
            info.scores,
            vec![("Bob".to_string(), 10), ("Alice".to_string(), 4)]
        );

        state.handle_packet(Packet::GameStart {
            mode: GameMode::Endless,
        });
        assert!(state.game_over.is_none());
    }

    #[test]
    fn test_rejection_is_terminal() {
        let mut state = ClientGameState::default();
        state.handle_packet(Packet::Rejected {
            reason: "Server full".to_string(),
        });
        assert_eq!(state.status, ConnectionStatus::Disconnected);
        assert_eq!(state.rejection.as_deref(), Some("Server full"));
    }

    #[test]
    fn test_mark_disconnected() {
        let mut state = ClientGameState::default();
        state.mark_disconnected();
        state.mark_disconnected();
        assert_eq!(state.status, ConnectionStatus::Disconnected);
    }
}

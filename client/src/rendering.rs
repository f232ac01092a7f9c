use macroquad::prelude::*;
use shared::{Coin, Player, ARENA_HEIGHT, ARENA_WIDTH, COIN_SIZE, PLAYER_SIZE, SPRINT_WIN_SCORE};
use std::collections::VecDeque;

use crate::game::{ClientGameState, ConnectionStatus, GameOverInfo};

pub const WINDOW_WIDTH: i32 = 800;
pub const WINDOW_HEIGHT: i32 = 600;
const ARENA_OFFSET_X: f32 = (WINDOW_WIDTH as f32 - ARENA_WIDTH) / 2.0;
const ARENA_OFFSET_Y: f32 = 100.0;

/// Counts frames rendered during the last second
#[derive(Debug, Default)]
pub struct FpsCounter {
    frames: VecDeque<f64>,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a frame at `now` (seconds) and returns the current FPS.
    pub fn record(&mut self, now: f64) -> usize {
        self.frames.push_back(now);
        while let Some(&oldest) = self.frames.front() {
            if now - oldest > 1.0 {
                self.frames.pop_front();
            } else {
                break;
            }
        }
        self.frames.len()
    }

    pub fn fps(&self) -> usize {
        self.frames.len()
    }
}

#[derive(Debug, Clone)]
pub struct HudInfo {
    pub fps: usize,
    pub server_url: String,
    pub frame_locked: bool,
}

pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            width: WINDOW_WIDTH as f32,
            height: WINDOW_HEIGHT as f32,
        }
    }

    pub fn render(&mut self, state: &ClientGameState, hud: &HudInfo) {
        clear_background(Color::from_rgba(26, 26, 26, 255));

        match state.status {
            ConnectionStatus::Connecting => {
                self.draw_centered("Connecting...", self.height / 2.0, 32.0, WHITE);
                self.draw_hud(state, hud);
                return;
            }
            ConnectionStatus::Disconnected => {
                let title = if state.rejection.is_some() {
                    "Connection Refused"
                } else {
                    "Connection Lost"
                };
                self.draw_centered(title, self.height / 2.0 - 20.0, 40.0, RED);
                if let Some(reason) = &state.rejection {
                    self.draw_centered(reason, self.height / 2.0 + 20.0, 24.0, WHITE);
                }
                self.draw_hud(state, hud);
                return;
            }
            ConnectionStatus::Connected => {}
        }

        self.draw_arena();

        for coin in &state.coins {
            self.draw_coin(coin);
        }

        let my_id = state.my_id.as_deref();
        for (player, (x, y)) in state.render_players() {
            self.draw_player(player, x, y, Some(player.id.as_str()) == my_id);
        }

        self.draw_scores(state);

        if let Some(info) = &state.game_over {
            self.draw_game_over(info);
        } else if !state.game_started {
            self.draw_lobby(state);
        }

        self.draw_hud(state, hud);
    }

    fn draw_arena(&mut self) {
        draw_rectangle(
            ARENA_OFFSET_X,
            ARENA_OFFSET_Y,
            ARENA_WIDTH,
            ARENA_HEIGHT,
            Color::from_rgba(40, 44, 52, 255),
        );
        draw_rectangle_lines(
            ARENA_OFFSET_X,
            ARENA_OFFSET_Y,
            ARENA_WIDTH,
            ARENA_HEIGHT,
            2.0,
            Color::from_rgba(136, 136, 136, 255),
        );
    }

    fn draw_coin(&mut self, coin: &Coin) {
        let x = ARENA_OFFSET_X + coin.x;
        let y = ARENA_OFFSET_Y + coin.y;
        draw_circle(x, y, COIN_SIZE / 2.0, GOLD);
        draw_circle_lines(x, y, COIN_SIZE / 2.0, 1.5, ORANGE);
    }

    /// Positions are centers; the square is drawn from its top-left corner.
    fn draw_player(&mut self, player: &Player, x: f32, y: f32, is_local_player: bool) {
        let [r, g, b] = player.color;
        let left = ARENA_OFFSET_X + x - PLAYER_SIZE / 2.0;
        let top = ARENA_OFFSET_Y + y - PLAYER_SIZE / 2.0;

        draw_rectangle(left, top, PLAYER_SIZE, PLAYER_SIZE, Color::from_rgba(r, g, b, 255));

        let outline = if is_local_player { YELLOW } else { WHITE };
        draw_rectangle_lines(left, top, PLAYER_SIZE, PLAYER_SIZE, 2.0, outline);

        let label = if is_local_player {
            format!("{} (you)", player.name)
        } else {
            player.name.clone()
        };
        let size = measure_text(&label, None, 16, 1.0);
        draw_text(&label, left + PLAYER_SIZE / 2.0 - size.width / 2.0, top - 6.0, 16.0, WHITE);
    }

    fn draw_scores(&mut self, state: &ClientGameState) {
        let mut x = ARENA_OFFSET_X;
        for player in &state.players {
            let [r, g, b] = player.color;
            let text = format!("{}: {}", player.name, player.score);
            draw_text(&text, x, ARENA_OFFSET_Y - 16.0, 24.0, Color::from_rgba(r, g, b, 255));
            x += measure_text(&text, None, 24, 1.0).width + 30.0;
        }

        if state.game_started {
            let mode = if state.mode.has_win_condition() {
                format!("{} - first to {}", state.mode.label(), SPRINT_WIN_SCORE)
            } else {
                state.mode.label().to_string()
            };
            let size = measure_text(&mode, None, 20, 1.0);
            draw_text(
                &mode,
                ARENA_OFFSET_X + ARENA_WIDTH - size.width,
                ARENA_OFFSET_Y - 16.0,
                20.0,
                LIGHTGRAY,
            );
        }
    }

    fn draw_lobby(&mut self, state: &ClientGameState) {
        self.draw_overlay();

        if state.players.len() < 2 {
            self.draw_centered("Waiting for another player...", self.height / 2.0, 28.0, WHITE);
            return;
        }

        let message = state
            .lobby_message
            .as_deref()
            .unwrap_or("Press 1 for Sprint Mode or 2 for Endless Mode");
        self.draw_centered("Both players connected", self.height / 2.0 - 24.0, 32.0, GREEN);
        self.draw_centered(message, self.height / 2.0 + 16.0, 20.0, WHITE);
    }

    fn draw_game_over(&mut self, info: &GameOverInfo) {
        self.draw_overlay();

        let title = format!("{} wins!", info.winner_name);
        self.draw_centered(&title, self.height / 2.0 - 60.0, 40.0, GOLD);

        let mut y = self.height / 2.0 - 10.0;
        for (name, score) in &info.scores {
            self.draw_centered(&format!("{}: {}", name, score), y, 24.0, WHITE);
            y += 30.0;
        }

        self.draw_centered(
            "Press 1 for Sprint or 2 for Endless to play again",
            y + 20.0,
            18.0,
            LIGHTGRAY,
        );
    }

    fn draw_hud(&mut self, state: &ClientGameState, hud: &HudInfo) {
        let y = self.height - 20.0;
        let status_color = match state.status {
            ConnectionStatus::Connected => GREEN,
            ConnectionStatus::Connecting => YELLOW,
            ConnectionStatus::Disconnected => RED,
        };
        draw_rectangle(10.0, y - 8.0, 8.0, 8.0, status_color);

        let smoothing = if hud.frame_locked { "per-frame" } else { "time-based" };
        let text = format!(
            "{}  |  {} FPS  |  latency {} ms each way  |  {} players  |  smoothing {}",
            hud.server_url,
            hud.fps,
            state.simulated_latency_ms,
            state.players.len(),
            smoothing
        );
        draw_text(&text, 24.0, y, 16.0, LIGHTGRAY);
    }

    fn draw_overlay(&mut self) {
        draw_rectangle(
            ARENA_OFFSET_X,
            ARENA_OFFSET_Y,
            ARENA_WIDTH,
            ARENA_HEIGHT,
            Color::from_rgba(0, 0, 0, 160),
        );
    }

    fn draw_centered(&self, text: &str, y: f32, font_size: f32, color: Color) {
        let size = measure_text(text, None, font_size as u16, 1.0);
        draw_text(text, self.width / 2.0 - size.width / 2.0, y, font_size, color);
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

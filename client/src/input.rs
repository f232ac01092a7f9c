//! Keyboard input with edge-triggered intent and mode selection

use macroquad::prelude::*;
use shared::{GameMode, Intent};

/// Result of sampling the keyboard for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputFrame {
    /// Direction currently held, whether or not it still needs sending.
    pub held: Intent,
    pub mode_request: Option<GameMode>,
    pub quit: bool,
}

/// Turns held keys into the packets worth sending
pub struct InputManager {
    last_sent: Intent,

    // Previous frame key states for edge detection
    prev_key_1: bool,
    prev_key_2: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            last_sent: Intent::IDLE,
            prev_key_1: false,
            prev_key_2: false,
        }
    }

    /// Returns the intent if it changed since the last call that returned one.
    pub fn register_intent(&mut self, intent: Intent) -> Option<Intent> {
        if intent == self.last_sent {
            return None;
        }
        self.last_sent = intent;
        Some(intent)
    }

    /// Intent to put on the wire this frame, if any.
    ///
    /// Nothing is recorded while disconnected, so a direction held through
    /// the handshake goes out on the first connected frame.
    pub fn outgoing_intent(&mut self, held: Intent, connected: bool) -> Option<Intent> {
        if !connected {
            return None;
        }
        self.register_intent(held)
    }

    /// Forgets the last sent intent after a send that never left the client.
    pub fn forget_sent(&mut self) {
        self.last_sent = Intent::IDLE;
    }

    /// Maps the mode keys to a request on the frame they go down.
    pub fn mode_request(&mut self, key_1: bool, key_2: bool) -> Option<GameMode> {
        let sprint = key_1 && !self.prev_key_1;
        let endless = key_2 && !self.prev_key_2;
        self.prev_key_1 = key_1;
        self.prev_key_2 = key_2;

        if sprint {
            Some(GameMode::Sprint)
        } else if endless {
            Some(GameMode::Endless)
        } else {
            None
        }
    }

    /// Samples the keyboard (WASD or arrows, 1/2 for mode, Escape to quit).
    pub fn update(&mut self) -> InputFrame {
        let left = is_key_down(KeyCode::A) || is_key_down(KeyCode::Left);
        let right = is_key_down(KeyCode::D) || is_key_down(KeyCode::Right);
        let up = is_key_down(KeyCode::W) || is_key_down(KeyCode::Up);
        let down = is_key_down(KeyCode::S) || is_key_down(KeyCode::Down);

        let key_1 = is_key_down(KeyCode::Key1);
        let key_2 = is_key_down(KeyCode::Key2);

        InputFrame {
            held: Intent::from_keys(left, right, up, down),
            mode_request: self.mode_request(key_1, key_2),
            quit: is_key_pressed(KeyCode::Escape),
        }
    }

    pub fn last_sent(&self) -> Intent {
        self.last_sent
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

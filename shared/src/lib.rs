use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const ARENA_WIDTH: f32 = 600.0;
pub const ARENA_HEIGHT: f32 = 400.0;
pub const PLAYER_SIZE: f32 = 30.0;
pub const COIN_SIZE: f32 = 20.0;
/// Distance covered per tick along each axis with a non-zero intent.
pub const PLAYER_SPEED: f32 = 5.0;
pub const COLLISION_DISTANCE: f32 = (PLAYER_SIZE + COIN_SIZE) / 2.0;
pub const COIN_SPAWN_INTERVAL_SECS: f32 = 2.5;
pub const MIN_COINS: usize = 3;
pub const MAX_COINS: usize = 5;
pub const SPRINT_WIN_SCORE: u32 = 10;
pub const MAX_PLAYERS: usize = 2;
pub const TICK_RATE: u32 = 60;
pub const DEFAULT_LATENCY_MS: u64 = 200;
pub const DEFAULT_PORT: u16 = 8765;

pub type Color = [u8; 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// First player to `SPRINT_WIN_SCORE` coins wins.
    Sprint,
    /// No win condition.
    #[default]
    Endless,
}

impl GameMode {
    pub fn has_win_condition(self) -> bool {
        matches!(self, GameMode::Sprint)
    }

    pub fn label(self) -> &'static str {
        match self {
            GameMode::Sprint => "Sprint",
            GameMode::Endless => "Endless",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameMode::Sprint => write!(f, "sprint"),
            GameMode::Endless => write!(f, "endless"),
        }
    }
}

/// Authoritative player state as it crosses the wire.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub score: u32,
    pub color: Color,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>, x: f32, y: f32, color: Color) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            x,
            y,
            score: 0,
            color,
        }
    }

    pub fn distance_to(&self, coin: &Coin) -> f32 {
        let dx = self.x - coin.x;
        let dy = self.y - coin.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn overlaps(&self, coin: &Coin) -> bool {
        self.distance_to(coin) < COLLISION_DISTANCE
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Coin {
    pub id: u64,
    pub x: f32,
    pub y: f32,
}

impl Coin {
    pub fn new(id: u64, x: f32, y: f32) -> Self {
        Self { id, x, y }
    }
}

/// Clamps a center point so a box of `size` stays inside the arena.
pub fn clamp_to_arena(x: f32, y: f32, size: f32) -> (f32, f32) {
    let half = size / 2.0;
    (
        x.clamp(half, ARENA_WIDTH - half),
        y.clamp(half, ARENA_HEIGHT - half),
    )
}

/// Movement intent. Each axis is always one of -1, 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Intent {
    pub dx: i8,
    pub dy: i8,
}

impl Intent {
    pub const IDLE: Intent = Intent { dx: 0, dy: 0 };

    pub fn new(dx: i8, dy: i8) -> Self {
        Self {
            dx: dx.signum(),
            dy: dy.signum(),
        }
    }

    /// Opposing keys cancel out.
    pub fn from_keys(left: bool, right: bool, up: bool, down: bool) -> Self {
        let dx = right as i8 - left as i8;
        let dy = down as i8 - up as i8;
        Self { dx, dy }
    }

    pub fn is_idle(&self) -> bool {
        self.dx == 0 && self.dy == 0
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FinalScore {
    pub name: String,
    pub score: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Packet {
    Input {
        dx: i8,
        dy: i8,
    },
    StartGame {
        mode: GameMode,
    },

    Welcome {
        player_id: String,
        /// One-way artificial delay in milliseconds.
        simulated_latency: u64,
        player_data: Player,
    },
    LobbyReady {
        message: String,
    },
    GameStart {
        mode: GameMode,
    },
    StateUpdate {
        players: Vec<Player>,
        coins: Vec<Coin>,
        game_started: bool,
        mode: GameMode,
    },
    GameOver {
        winner: String,
        winner_name: String,
        scores: BTreeMap<String, FinalScore>,
    },
    Rejected {
        reason: String,
    },
}

impl Packet {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// True for the packet types a client is allowed to send.
    pub fn is_client_packet(&self) -> bool {
        matches!(self, Packet::Input { .. } | Packet::StartGame { .. })
    }

    pub fn input(intent: Intent) -> Self {
        Packet::Input {
            dx: intent.dx,
            dy: intent.dy,
        }
    }
}

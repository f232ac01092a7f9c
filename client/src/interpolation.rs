//! Exponential smoothing of render positions toward server snapshots
//!
//! Each tracked player has a target (the last authoritative position) and a
//! display position. Every frame the display moves a fraction of the
//! remaining distance toward the target, independently per axis.

use shared::Player;

/// Per-frame smoothing constant
pub const SMOOTHING_ALPHA: f32 = 0.3;
/// Frame rate at which the time-based factor equals [`SMOOTHING_ALPHA`]
pub const REFERENCE_FRAME_RATE: f32 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Smoothing {
    /// Fixed fraction per rendered frame, whatever the frame time.
    PerFrame { alpha: f32 },
    /// `1 - e^(-rate * dt)`, independent of frame rate.
    TimeBased { rate: f32 },
}

impl Smoothing {
    pub fn frame_locked() -> Self {
        Smoothing::PerFrame {
            alpha: SMOOTHING_ALPHA,
        }
    }

    /// Time-based smoothing calibrated to match `SMOOTHING_ALPHA` at 60 FPS
    pub fn time_based() -> Self {
        Smoothing::TimeBased {
            rate: -(1.0 - SMOOTHING_ALPHA).ln() * REFERENCE_FRAME_RATE,
        }
    }

    /// Fraction of the remaining distance to cover this frame.
    pub fn factor(&self, dt: f32) -> f32 {
        match *self {
            Smoothing::PerFrame { alpha } => alpha.clamp(0.0, 1.0),
            Smoothing::TimeBased { rate } => {
                if dt <= 0.0 {
                    0.0
                } else {
                    1.0 - (-rate * dt).exp()
                }
            }
        }
    }
}

impl Default for Smoothing {
    fn default() -> Self {
        Self::time_based()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterpolatedView {
    target: (f32, f32),
    display: (f32, f32),
}

impl InterpolatedView {
    /// A newly seen player is drawn at its authoritative position straight away.
    pub fn from_player(player: &Player) -> Self {
        Self {
            target: (player.x, player.y),
            display: (player.x, player.y),
        }
    }

    pub fn update_from(&mut self, player: &Player) {
        self.target = (player.x, player.y);
    }

    pub fn step(&mut self, factor: f32) {
        self.display.0 += (self.target.0 - self.display.0) * factor;
        self.display.1 += (self.target.1 - self.display.1) * factor;
    }

    pub fn display(&self) -> (f32, f32) {
        self.display
    }

    pub fn target(&self) -> (f32, f32) {
        self.target
    }

    pub fn distance_to_target(&self) -> f32 {
        let dx = self.target.0 - self.display.0;
        let dy = self.target.1 - self.display.1;
        (dx * dx + dy * dy).sqrt()
    }
}

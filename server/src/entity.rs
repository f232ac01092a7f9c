use rand::Rng;
use shared::{
    clamp_to_arena, Coin, Intent, Player, ARENA_HEIGHT, ARENA_WIDTH, COIN_SIZE, PLAYER_SIZE,
    PLAYER_SPEED,
};

use crate::identity::Identity;

/// A player as the server tracks it: the wire state plus the stored velocity.
///
/// The velocity never crosses the wire. It is replaced by every `input`
/// message and only read by the simulation tick.
#[derive(Debug, Clone)]
pub struct PlayerEntity {
    pub state: Player,
    pub velocity: Intent,
}

impl PlayerEntity {
    pub fn new(state: Player) -> Self {
        Self {
            state,
            velocity: Intent::IDLE,
        }
    }

    /// Creates a player at a random spot at least one hit-box away from the walls.
    pub fn spawn<R: Rng + ?Sized>(id: &str, identity: Identity, rng: &mut R) -> Self {
        let x = random_coordinate(rng, ARENA_WIDTH, PLAYER_SIZE);
        let y = random_coordinate(rng, ARENA_HEIGHT, PLAYER_SIZE);
        Self::new(Player::new(id, identity.name, x, y, identity.color))
    }

    pub fn id(&self) -> &str {
        &self.state.id
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Moves one tick along the stored velocity and clamps to the arena.
    /// Returns true if the position changed.
    pub fn advance(&mut self) -> bool {
        let (x, y) = clamp_to_arena(
            self.state.x + f32::from(self.velocity.dx) * PLAYER_SPEED,
            self.state.y + f32::from(self.velocity.dy) * PLAYER_SPEED,
            PLAYER_SIZE,
        );

        let moved = x != self.state.x || y != self.state.y;
        self.state.x = x;
        self.state.y = y;
        moved
    }
}

/// Creates a coin at a random spot at least one coin-size away from the walls.
pub fn random_coin<R: Rng + ?Sized>(id: u64, rng: &mut R) -> Coin {
    let x = random_coordinate(rng, ARENA_WIDTH, COIN_SIZE);
    let y = random_coordinate(rng, ARENA_HEIGHT, COIN_SIZE);
    Coin::new(id, x, y)
}

fn random_coordinate<R: Rng + ?Sized>(rng: &mut R, extent: f32, margin: f32) -> f32 {
    rng.gen_range(margin as i32..=(extent - margin) as i32) as f32
}

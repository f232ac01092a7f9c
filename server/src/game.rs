//! Authoritative session state: roster, coins, mode and the per-tick simulation
//!
//! `GameState` is owned by a single task (the server loop). Connection tasks
//! never touch it directly; they send events that the loop applies between
//! ticks, so a tick always runs against one consistent set of velocities.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    Coin, FinalScore, GameMode, Intent, Packet, Player, COIN_SPAWN_INTERVAL_SECS, MAX_COINS,
    MAX_PLAYERS, MIN_COINS,
};
use std::collections::BTreeMap;

use crate::entity::{random_coin, PlayerEntity};
use crate::identity::{IdentityPool, RosterPool};
use crate::physics::{advance_players, resolve_pickups, Pickup};

pub const LOBBY_READY_MESSAGE: &str =
    "Press 1 for Sprint Mode (first to 10) or 2 for Endless Mode";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Empty,
    WaitingForSecondPlayer,
    /// Two players connected, mode not chosen yet.
    LobbyReady,
    Playing,
    /// A winner was found this tick; resolved before the tick returns.
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    SessionFull,
}

impl std::fmt::Display for JoinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinError::SessionFull => write!(f, "Server full"),
        }
    }
}

impl std::error::Error for JoinError {}

/// What a single tick produced, in broadcast order
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub snapshot: Option<Packet>,
    pub game_over: Option<Packet>,
    pub pickups: Vec<Pickup>,
    pub spawned: Vec<u64>,
}

pub struct GameState {
    pub tick: u32,
    players: Vec<PlayerEntity>,
    coins: BTreeMap<u64, Coin>,
    next_coin_id: u64,
    mode: GameMode,
    phase: SessionPhase,
    winner: Option<String>,
    since_last_spawn: f32,
    identities: Box<dyn IdentityPool>,
    rng: StdRng,
}

impl GameState {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic spawn positions and coin counts, for tests and replays.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self::with_identities(Box::new(RosterPool::two_slot()), rng)
    }

    pub fn with_identities(identities: Box<dyn IdentityPool>, rng: StdRng) -> Self {
        Self {
            tick: 0,
            players: Vec::new(),
            coins: BTreeMap::new(),
            next_coin_id: 0,
            mode: GameMode::default(),
            phase: SessionPhase::Empty,
            winner: None,
            since_last_spawn: 0.0,
            identities,
            rng,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_started(&self) -> bool {
        self.phase == SessionPhase::Playing
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Players in join order
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().map(|p| &p.state)
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id() == id).map(|p| &p.state)
    }

    pub fn velocity(&self, id: &str) -> Option<Intent> {
        self.players.iter().find(|p| p.id() == id).map(|p| p.velocity)
    }

    pub fn coins(&self) -> impl Iterator<Item = &Coin> {
        self.coins.values()
    }

    pub fn coin_count(&self) -> usize {
        self.coins.len()
    }

    /// Adds a player with the next free identity.
    pub fn add_player(&mut self, id: &str) -> Result<Player, JoinError> {
        if self.players.len() >= MAX_PLAYERS {
            return Err(JoinError::SessionFull);
        }

        let in_use: Vec<&str> = self.players.iter().map(|p| p.name()).collect();
        let identity = self
            .identities
            .assign(&in_use)
            .ok_or(JoinError::SessionFull)?;

        let player = PlayerEntity::spawn(id, identity, &mut self.rng);
        info!(
            "Added player {} ({}) at ({}, {})",
            player.name(),
            id,
            player.state.x,
            player.state.y
        );

        let state = player.state.clone();
        self.players.push(player);

        if !self.is_started() {
            self.phase = self.roster_phase();
        }

        Ok(state)
    }

    /// Removes a player. A running game keeps running with whoever is left.
    pub fn remove_player(&mut self, id: &str) -> Option<Player> {
        let index = self.players.iter().position(|p| p.id() == id)?;
        let removed = self.players.remove(index);
        info!("Removed player {} ({})", removed.name(), id);

        if self.players.is_empty() && self.is_started() {
            info!("Last player left, abandoning {} game", self.mode);
            self.coins.clear();
            self.winner = None;
            self.phase = SessionPhase::Empty;
        } else if !self.is_started() {
            self.phase = self.roster_phase();
        }

        Some(removed.state)
    }

    /// Replaces the player's velocity. Accepted in any phase.
    pub fn set_intent(&mut self, id: &str, intent: Intent) -> bool {
        match self.players.iter_mut().find(|p| p.id() == id) {
            Some(player) => {
                player.velocity = intent;
                if !intent.is_idle() {
                    debug!(
                        "{} sent movement intent dx={} dy={}",
                        player.name(),
                        intent.dx,
                        intent.dy
                    );
                }
                true
            }
            None => false,
        }
    }

    /// Starts a game if the lobby is ready. Returns false if the request was ignored.
    pub fn start_game(&mut self, mode: GameMode) -> bool {
        if self.phase != SessionPhase::LobbyReady || self.players.len() != MAX_PLAYERS {
            return false;
        }

        self.mode = mode;
        self.phase = SessionPhase::Playing;
        self.winner = None;
        self.since_last_spawn = 0.0;
        self.coins.clear();
        for player in &mut self.players {
            player.state.score = 0;
        }

        let initial = self.rng.gen_range(MIN_COINS..=MAX_COINS);
        for _ in 0..initial {
            self.spawn_coin();
        }

        info!("Game started in {} mode with {} coins", mode, initial);
        true
    }

    /// Runs one simulation step. Does nothing but count the tick unless playing.
    pub fn tick(&mut self, dt: f32) -> TickOutcome {
        self.tick = self.tick.wrapping_add(1);
        let mut outcome = TickOutcome::default();

        if !self.is_started() {
            return outcome;
        }

        advance_players(&mut self.players);
        if self.tick % 60 == 0 {
            for player in &self.players {
                debug!(
                    "Player {} at ({:.1}, {:.1})",
                    player.name(),
                    player.state.x,
                    player.state.y
                );
            }
        }

        let report = resolve_pickups(&mut self.players, &mut self.coins, self.mode);
        outcome.pickups = report.pickups;
        if let Some(winner) = report.winner {
            self.winner = Some(winner);
            self.phase = SessionPhase::GameOver;
        }

        if self.phase == SessionPhase::Playing {
            outcome.spawned = self.maintain_coins(dt);
        }

        outcome.snapshot = Some(self.snapshot());

        if self.phase == SessionPhase::GameOver {
            outcome.game_over = self.game_over_packet();
            self.reset_after_game_over();
        }

        outcome
    }

    /// Full state broadcast to every client
    pub fn snapshot(&self) -> Packet {
        Packet::StateUpdate {
            players: self.players().cloned().collect(),
            coins: self.coins().cloned().collect(),
            game_started: self.is_started(),
            mode: self.mode,
        }
    }

    pub fn welcome(&self, id: &str, simulated_latency_ms: u64) -> Option<Packet> {
        self.player(id).map(|player| Packet::Welcome {
            player_id: id.to_string(),
            simulated_latency: simulated_latency_ms,
            player_data: player.clone(),
        })
    }

    pub fn lobby_ready_notice(&self) -> Packet {
        Packet::LobbyReady {
            message: LOBBY_READY_MESSAGE.to_string(),
        }
    }

    fn game_over_packet(&self) -> Option<Packet> {
        let winner = self.winner.as_deref()?;
        // The winner is still present: removal happens between ticks
        let winner_name = self.player(winner)?.name.clone();

        let scores = self
            .players()
            .map(|p| {
                (
                    p.id.clone(),
                    FinalScore {
                        name: p.name.clone(),
                        score: p.score,
                    },
                )
            })
            .collect();

        Some(Packet::GameOver {
            winner: winner.to_string(),
            winner_name,
            scores,
        })
    }

    fn reset_after_game_over(&mut self) {
        self.winner = None;
        self.coins.clear();
        for player in &mut self.players {
            player.state.score = 0;
        }
        self.phase = self.roster_phase();
        info!("Session reset, waiting for mode selection");
    }

    fn maintain_coins(&mut self, dt: f32) -> Vec<u64> {
        self.since_last_spawn += dt;
        if self.since_last_spawn <= COIN_SPAWN_INTERVAL_SECS {
            return Vec::new();
        }
        self.since_last_spawn = 0.0;

        let mut spawned = Vec::new();
        if self.coins.len() < MAX_COINS {
            let batch = self.rng.gen_range(1..=2);
            for _ in 0..batch {
                if self.coins.len() < MAX_COINS {
                    spawned.push(self.spawn_coin());
                }
            }
        }

        for id in &spawned {
            info!("Spawned coin {}", id);
        }
        spawned
    }

    fn spawn_coin(&mut self) -> u64 {
        let id = self.next_coin_id;
        self.next_coin_id += 1;
        let coin = random_coin(id, &mut self.rng);
        self.coins.insert(id, coin);
        id
    }

    fn roster_phase(&self) -> SessionPhase {
        match self.players.len() {
            0 => SessionPhase::Empty,
            1 => SessionPhase::WaitingForSecondPlayer,
            _ => SessionPhase::LobbyReady,
        }
    }

    #[cfg(test)]
    fn place_player(&mut self, id: &str, x: f32, y: f32) {
        if let Some(player) = self.players.iter_mut().find(|p| p.id() == id) {
            player.state.x = x;
            player.state.y = y;
        }
    }

    #[cfg(test)]
    fn place_coin(&mut self, x: f32, y: f32) -> u64 {
        let id = self.spawn_coin();
        if let Some(coin) = self.coins.get_mut(&id) {
            coin.x = x;
            coin.y = y;
        }
        id
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

//! Movement and coin pickup resolution for one simulation tick

use log::info;
use shared::{Coin, GameMode, COLLISION_DISTANCE, SPRINT_WIN_SCORE};
use std::collections::BTreeMap;

use crate::entity::PlayerEntity;

/// A coin claimed by a player during a tick
#[derive(Debug, Clone, PartialEq)]
pub struct Pickup {
    pub player_id: String,
    pub coin_id: u64,
    pub distance: f32,
    pub new_score: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionReport {
    pub pickups: Vec<Pickup>,
    /// Set only in sprint mode, for the first player to reach the win score.
    pub winner: Option<String>,
}

/// Advances every player one tick. Returns the number of players that moved.
pub fn advance_players(players: &mut [PlayerEntity]) -> usize {
    players
        .iter_mut()
        .map(|player| player.advance())
        .filter(|moved| *moved)
        .count()
}

/// Awards overlapping coins and removes them from the coin set.
///
/// Coins are scanned in id order and players in join order, so a coin
/// reachable by both players goes to the earlier joiner. Each coin is
/// claimed at most once. In sprint mode the scan stops as soon as one
/// player reaches the win score.
pub fn resolve_pickups(
    players: &mut [PlayerEntity],
    coins: &mut BTreeMap<u64, Coin>,
    mode: GameMode,
) -> CollisionReport {
    let mut report = CollisionReport::default();

    if players.is_empty() || coins.is_empty() {
        return report;
    }

    'coins: for coin in coins.values() {
        for player in players.iter_mut() {
            let distance = player.state.distance_to(coin);
            if distance >= COLLISION_DISTANCE {
                continue;
            }

            player.state.score += 1;
            info!(
                "{} collected coin {} at ({:.1}, {:.1}), distance {:.1} < {:.1}, score {} -> {}",
                player.name(),
                coin.id,
                coin.x,
                coin.y,
                distance,
                COLLISION_DISTANCE,
                player.state.score - 1,
                player.state.score
            );

            report.pickups.push(Pickup {
                player_id: player.id().to_string(),
                coin_id: coin.id,
                distance,
                new_score: player.state.score,
            });

            if mode.has_win_condition() && player.state.score >= SPRINT_WIN_SCORE {
                info!("Winner determined: {}", player.name());
                report.winner = Some(player.id().to_string());
                break 'coins;
            }

            continue 'coins;
        }
    }

    for pickup in &report.pickups {
        coins.remove(&pickup.coin_id);
    }

    report
}

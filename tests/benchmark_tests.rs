//! Performance benchmarks for critical game systems

use client::game::ClientGameState;
use client::interpolation::Smoothing;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use server::entity::PlayerEntity;
use server::game::GameState;
use server::latency::DelayLine;
use server::physics::{advance_players, resolve_pickups};
use shared::{Coin, GameMode, Intent, Packet, Player, ARENA_HEIGHT, ARENA_WIDTH};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Benchmarks coin pickup resolution
#[test]
fn benchmark_pickup_resolution() {
    let mut rng = StdRng::seed_from_u64(42);
    let iterations = 20_000;
    let start = Instant::now();

    let mut total_pickups = 0;
    for _ in 0..iterations {
        let mut players = vec![
            PlayerEntity::new(Player::new("conn-1", "Alice", 100.0, 100.0, [255, 100, 100])),
            PlayerEntity::new(Player::new("conn-2", "Bob", 400.0, 300.0, [100, 100, 255])),
        ];
        let mut coins: BTreeMap<u64, Coin> = (0..5)
            .map(|id| {
                let x = rng.gen_range(10.0..ARENA_WIDTH - 10.0);
                let y = rng.gen_range(10.0..ARENA_HEIGHT - 10.0);
                (id, Coin::new(id, x, y))
            })
            .collect();

        total_pickups += resolve_pickups(&mut players, &mut coins, GameMode::Endless)
            .pickups
            .len();
    }

    let duration = start.elapsed();
    println!(
        "Pickup resolution: {} iterations in {:?} ({:.2} ns/iter), {} pickups",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64,
        total_pickups
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks player movement with clamping
#[test]
fn benchmark_movement() {
    let mut players = vec![
        PlayerEntity::new(Player::new("conn-1", "Alice", 300.0, 200.0, [255, 100, 100])),
        PlayerEntity::new(Player::new("conn-2", "Bob", 300.0, 200.0, [100, 100, 255])),
    ];
    players[0].velocity = Intent::new(1, -1);
    players[1].velocity = Intent::new(-1, 1);

    let iterations = 200_000;
    let start = Instant::now();

    for _ in 0..iterations {
        advance_players(&mut players);
    }

    let duration = start.elapsed();
    println!(
        "Movement: {} ticks in {:?} ({:.2} ns/tick)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1000);
}

/// A full server tick must fit comfortably inside a 60 Hz frame
#[test]
fn benchmark_server_tick() {
    let mut state = GameState::with_seed(7);
    state.add_player("conn-1").unwrap();
    state.add_player("conn-2").unwrap();
    state.start_game(GameMode::Endless);
    state.set_intent("conn-1", Intent::new(1, 1));
    state.set_intent("conn-2", Intent::new(-1, 1));

    let ticks = 60 * 60;
    let start = Instant::now();

    for _ in 0..ticks {
        let outcome = state.tick(1.0 / 60.0);
        if let Some(snapshot) = outcome.snapshot {
            let _ = snapshot.to_json().unwrap();
        }
    }

    let duration = start.elapsed();
    let per_tick = duration / ticks;
    println!("Server tick: {} ticks in {:?} ({:?}/tick)", ticks, duration, per_tick);

    assert!(per_tick < Duration::from_millis(1));
}

/// Benchmarks snapshot encoding and decoding
#[test]
fn benchmark_snapshot_serialization() {
    let packet = Packet::StateUpdate {
        players: vec![
            Player::new("conn-1", "Alice", 120.0, 80.0, [255, 100, 100]),
            Player::new("conn-2", "Bob", 480.0, 320.0, [100, 100, 255]),
        ],
        coins: (0..5).map(|id| Coin::new(id, 50.0 * id as f32, 40.0)).collect(),
        game_started: true,
        mode: GameMode::Sprint,
    };

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let json = packet.to_json().unwrap();
        let decoded = Packet::from_json(&json).unwrap();
        assert!(matches!(decoded, Packet::StateUpdate { .. }));
    }

    let duration = start.elapsed();
    println!(
        "Snapshot serialization: {} round trips in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks client-side interpolation across many frames
#[test]
fn benchmark_client_interpolation() {
    let mut state = ClientGameState::new(Smoothing::time_based());
    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        if i % 4 == 0 {
            let x = (i % 570) as f32 + 15.0;
            state.apply_snapshot(
                vec![
                    Player::new("conn-1", "Alice", x, 100.0, [255, 100, 100]),
                    Player::new("conn-2", "Bob", 600.0 - x, 300.0, [100, 100, 255]),
                ],
                Vec::new(),
                true,
                GameMode::Endless,
            );
        }
        state.interpolate(1.0 / 144.0);
    }

    let duration = start.elapsed();
    println!(
        "Client interpolation: {} frames in {:?} ({:.2} ns/frame)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(state.tracked_count(), 2);
    assert!(duration.as_millis() < 1000);
}

/// Stress test: many messages through a delay line keep their order
#[test]
fn stress_test_delay_line_throughput() {
    tokio_test::block_on(async {
        let (line, mut ready) = DelayLine::spawn(Duration::from_millis(5), 1024);
        let messages = 1000;
        let start = Instant::now();

        let producer = tokio::spawn(async move {
            for i in 0..messages {
                while line.push(i).is_err() {
                    tokio::task::yield_now().await;
                }
            }
        });

        for expected in 0..messages {
            assert_eq!(ready.recv().await, Some(expected));
        }
        producer.await.unwrap();

        let duration = start.elapsed();
        println!("Delay line: {} messages in {:?}", messages, duration);
        assert!(duration < Duration::from_secs(2));
    });
}

//! Basic demonstration of the Emberdeep simulation core.
//!
//! Run with: cargo run --example basic_demo

use emberdeep_sim::{EnemyKind, GameEvent, Sim};
use glam::Vec2;

fn main() {
    env_logger::init();

    println!("=== Emberdeep - Simulation Demo ===\n");

    let mut sim = Sim::new();

    // A small arena: the player in the middle, enemies around it, walls on
    // two sides.
    let player = sim.spawn_player(0.0, 0.0);
    sim.spawn_enemy(EnemyKind::Slime, 120.0, 0.0);
    sim.spawn_enemy(EnemyKind::Archer, -150.0, 80.0);
    sim.spawn_enemy(EnemyKind::Brute, 0.0, 180.0);
    sim.spawn_patrolling_enemy(
        EnemyKind::Skeleton,
        -200.0,
        -200.0,
        vec![Vec2::new(-200.0, -200.0), Vec2::new(200.0, -200.0)],
    );
    sim.spawn_wall(0.0, 260.0, 600.0, 20.0);
    sim.spawn_wall(0.0, -260.0, 600.0, 20.0);

    sim.subscribe(|event| match event {
        GameEvent::DamageDealt { amount, .. } => println!("  hit for {amount:.1}"),
        GameEvent::EnemyKilled { kind, experience_reward, .. } => {
            println!("  {} down, +{} xp", kind.as_str(), experience_reward)
        }
        GameEvent::PlayerLevelUp { new_level, .. } => println!("  LEVEL UP -> {new_level}"),
        GameEvent::GameOver { .. } => println!("  game over"),
        _ => {}
    });

    // Run ten simulated seconds; the player swings at whatever is closest
    // every frame, like a held-down attack button.
    println!("Running 10 seconds of simulation...\n");
    for frame in 0..600 {
        if let Some(target) = nearest_enemy(&sim, player) {
            sim.world_mut().request_attack(player, target);
        }
        sim.step(1.0 / 60.0);

        if (frame + 1) % 120 == 0 {
            print_state(&sim);
        }
    }

    println!("\n=== Final State (JSON) ===\n");
    println!("{}", sim.snapshot().to_json_pretty().unwrap());
}

/// Closest living enemy, scanned through the snapshot-facing query API.
fn nearest_enemy(
    sim: &Sim,
    player: emberdeep_sim::EntityId,
) -> Option<emberdeep_sim::EntityId> {
    use emberdeep_sim::ComponentKind;

    let world = sim.world();
    let player_pos = world.transform(player)?.position;
    world
        .query(&[ComponentKind::Enemy, ComponentKind::Transform])
        .into_iter()
        .min_by(|&a, &b| {
            let da = world
                .transform(a)
                .map(|t| t.position.distance_squared(player_pos))
                .unwrap_or(f32::MAX);
            let db = world
                .transform(b)
                .map(|t| t.position.distance_squared(player_pos))
                .unwrap_or(f32::MAX);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
}

fn print_state(sim: &Sim) {
    let snapshot = sim.snapshot();
    println!(
        "--- tick {} (t={:.1}s), {} actors ---",
        snapshot.tick,
        snapshot.time,
        snapshot.actors.len()
    );
    for actor in &snapshot.actors {
        println!(
            "  {:<10} pos=({:>7.1}, {:>7.1}) hp={:>5.1}/{:<5.1} [{}]",
            actor.kind, actor.x, actor.y, actor.health, actor.health_max, actor.state
        );
    }
    if let Some(player) = &snapshot.player {
        println!(
            "  player: level {} xp {}/{} kills {}",
            player.level, player.experience, player.experience_to_next, player.kills
        );
    }
}

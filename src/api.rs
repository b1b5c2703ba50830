//! Public facade for the simulation.
//!
//! [`Sim`] wires the four core systems into a [`World`] and drives it with
//! a fixed timestep: callers hand in frame time, the accumulator runs as
//! many fixed updates as fit. It also carries the entity factory helpers
//! used by demos and tests, and snapshot extraction for external consumers
//! (UI, renderer).

use glam::Vec2;

use crate::components::{
    layers, Ai, AiBehavior, Collider, Combat, Component, Enemy, EnemyKind, Health, Movement,
    Player, Sprite, Transform,
};
use crate::config::SimConfig;
use crate::events::{GameEvent, ListenerId};
use crate::systems::{AiSystem, CollisionSystem, CombatSystem, MovementSystem};
use crate::terrain::Walkability;
use crate::world::{EntityId, Snapshot, World};

/// The main simulation container.
pub struct Sim {
    world: World,
    accumulator: f32,
}

impl Sim {
    /// Create a simulation with the default configuration and the standard
    /// system stack (movement, collision, AI, combat).
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    pub fn with_config(config: SimConfig) -> Self {
        let mut world = World::with_config(config);
        world.add_system(Box::new(MovementSystem));
        world.add_system(Box::new(CollisionSystem::new()));
        world.add_system(Box::new(AiSystem));
        world.add_system(Box::new(CombatSystem::new()));
        Self {
            world,
            accumulator: 0.0,
        }
    }

    /// Advance the simulation by `dt` seconds of frame time. Runs zero or
    /// more fixed updates depending on the accumulator, so behavior is
    /// identical regardless of the caller's frame rate.
    pub fn step(&mut self, dt: f32) {
        let fixed_dt = self.world.config().fixed_timestep;
        self.accumulator += dt;
        while self.accumulator >= fixed_dt {
            self.world.update(fixed_dt);
            self.accumulator -= fixed_dt;
        }
    }

    pub fn current_tick(&self) -> u64 {
        self.world.tick()
    }

    pub fn current_time(&self) -> f32 {
        self.world.time()
    }

    // ------------------------------------------------------------------
    // Entity factory helpers
    // ------------------------------------------------------------------

    /// Spawn the player character. Visible to systems from the next tick.
    pub fn spawn_player(&mut self, x: f32, y: f32) -> EntityId {
        let id = self.world.spawn();
        self.world
            .add_component(id, Component::Transform(Transform::new(x, y)));
        self.world
            .add_component(id, Component::Health(Health::new(100.0)));
        self.world
            .add_component(id, Component::Combat(Combat::new(10.0, 2.0, 40.0, 0.4)));
        self.world
            .add_component(id, Component::Movement(Movement::new(160.0, 220.0)));
        self.world.add_component(
            id,
            Component::Collider(Collider::circle(
                12.0,
                layers::PLAYER,
                layers::ENEMY | layers::WALL | layers::PICKUP,
            )),
        );
        self.world.add_component(id, Component::Player(Player::new()));
        self.world
            .add_component(id, Component::Sprite(Sprite::new("player", 24.0, 24.0)));
        id
    }

    /// Spawn an enemy of the given archetype.
    pub fn spawn_enemy(&mut self, kind: EnemyKind, x: f32, y: f32) -> EntityId {
        let spec = EnemySpec::of(kind);
        let id = self.world.spawn();
        self.world
            .add_component(id, Component::Transform(Transform::new(x, y)));
        self.world
            .add_component(id, Component::Health(Health::new(spec.health)));
        self.world.add_component(
            id,
            Component::Combat(Combat::new(
                spec.strength,
                spec.defense,
                spec.attack_range,
                spec.cooldown,
            )),
        );
        self.world.add_component(
            id,
            Component::Movement(Movement::new(spec.speed, spec.speed * 1.5)),
        );
        self.world.add_component(
            id,
            Component::Collider(Collider::circle(
                spec.radius,
                layers::ENEMY,
                layers::PLAYER | layers::ENEMY | layers::WALL,
            )),
        );
        self.world.add_component(
            id,
            Component::Ai(Ai::new(spec.behavior, spec.aggro_range, spec.attack_range)),
        );
        self.world.add_component(
            id,
            Component::Enemy(Enemy::new(kind, spec.experience_reward)),
        );
        self.world.add_component(
            id,
            Component::Sprite(Sprite::new(kind.as_str(), spec.radius * 2.0, spec.radius * 2.0)),
        );
        id
    }

    /// Spawn an enemy that patrols `waypoints` until the player gets close.
    pub fn spawn_patrolling_enemy(
        &mut self,
        kind: EnemyKind,
        x: f32,
        y: f32,
        waypoints: Vec<Vec2>,
    ) -> EntityId {
        let id = self.spawn_enemy(kind, x, y);
        if let Some(ai) = self.world.ai_mut(id) {
            ai.behavior = AiBehavior::Patrol;
            ai.patrol_points = waypoints;
            ai.patrol_index = 0;
        }
        id
    }

    /// Spawn a static wall segment centered at (x, y).
    pub fn spawn_wall(&mut self, x: f32, y: f32, width: f32, height: f32) -> EntityId {
        let id = self.world.spawn();
        self.world
            .add_component(id, Component::Transform(Transform::new(x, y)));
        self.world.add_component(
            id,
            Component::Collider(
                Collider::rect(width, height, layers::WALL, layers::PLAYER | layers::ENEMY)
                    .as_static(),
            ),
        );
        id
    }

    // ------------------------------------------------------------------
    // External interfaces
    // ------------------------------------------------------------------

    /// Subscribe to simulation events.
    pub fn subscribe(&mut self, listener: impl FnMut(&GameEvent) + 'static) -> ListenerId {
        self.world.subscribe(listener)
    }

    /// Install the dungeon walkability query.
    pub fn set_walkability(&mut self, walkability: Box<dyn Walkability>) {
        self.world.set_walkability(walkability);
    }

    /// Capture the current simulation state for the UI/renderer.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_world(&self.world)
    }

    /// Snapshot as a JSON string; `{}` if serialization fails.
    pub fn snapshot_json(&self) -> String {
        self.snapshot()
            .to_json()
            .unwrap_or_else(|_| "{}".to_string())
    }

    /// Direct access to the world, for advanced callers.
    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

impl Default for Sim {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-archetype stat block.
struct EnemySpec {
    behavior: AiBehavior,
    health: f32,
    strength: f32,
    defense: f32,
    attack_range: f32,
    cooldown: f32,
    speed: f32,
    aggro_range: f32,
    radius: f32,
    experience_reward: u32,
}

impl EnemySpec {
    fn of(kind: EnemyKind) -> Self {
        match kind {
            EnemyKind::Slime => Self {
                behavior: AiBehavior::Aggressive,
                health: 30.0,
                strength: 6.0,
                defense: 0.0,
                attack_range: 25.0,
                cooldown: 1.0,
                speed: 60.0,
                aggro_range: 150.0,
                radius: 10.0,
                experience_reward: 15,
            },
            EnemyKind::Skeleton => Self {
                behavior: AiBehavior::Aggressive,
                health: 45.0,
                strength: 9.0,
                defense: 2.0,
                attack_range: 30.0,
                cooldown: 0.8,
                speed: 80.0,
                aggro_range: 180.0,
                radius: 11.0,
                experience_reward: 25,
            },
            EnemyKind::Archer => Self {
                behavior: AiBehavior::Ranged,
                health: 35.0,
                strength: 8.0,
                defense: 1.0,
                attack_range: 120.0,
                cooldown: 1.2,
                speed: 90.0,
                aggro_range: 220.0,
                radius: 10.0,
                experience_reward: 30,
            },
            EnemyKind::Brute => Self {
                behavior: AiBehavior::Aggressive,
                health: 90.0,
                strength: 15.0,
                defense: 4.0,
                attack_range: 35.0,
                cooldown: 1.5,
                speed: 50.0,
                aggro_range: 160.0,
                radius: 16.0,
                experience_reward: 60,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::AiState;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn new_sim_starts_at_tick_zero() {
        let sim = Sim::new();
        assert_eq!(sim.current_tick(), 0);
        assert_eq!(sim.current_time(), 0.0);
    }

    #[test]
    fn step_accumulates_fixed_updates() {
        // Binary-exact timestep so the accumulator math is exact.
        let config = SimConfig {
            fixed_timestep: 1.0 / 64.0,
            ..Default::default()
        };
        let mut sim = Sim::with_config(config);

        sim.step(0.0625); // exactly 4 fixed updates
        assert_eq!(sim.current_tick(), 4);

        // A short step is accumulated, not dropped.
        sim.step(0.0078125);
        assert_eq!(sim.current_tick(), 4);
        sim.step(0.0078125);
        assert_eq!(sim.current_tick(), 5);
    }

    #[test]
    fn snapshot_reports_spawned_actors() {
        let mut sim = Sim::new();
        sim.spawn_player(0.0, 0.0);
        sim.spawn_enemy(EnemyKind::Slime, 100.0, 0.0);
        sim.spawn_enemy(EnemyKind::Archer, -100.0, 50.0);
        sim.spawn_wall(0.0, 200.0, 400.0, 20.0);
        sim.step(0.05);

        let snapshot = sim.snapshot();
        // Walls carry no health, so only the three actors appear.
        assert_eq!(snapshot.actors.len(), 3);
        assert!(snapshot.player.is_some());
        assert!(snapshot.actors.iter().any(|a| a.kind == "player"));
        assert!(snapshot.actors.iter().any(|a| a.kind == "slime"));

        let json = sim.snapshot_json();
        assert!(json.contains("slime"));
        assert!(json.contains("archer"));
    }

    #[test]
    fn slime_chases_and_wounds_the_player() {
        let mut sim = Sim::new();
        let player = sim.spawn_player(0.0, 0.0);
        let slime = sim.spawn_enemy(EnemyKind::Slime, 100.0, 0.0);

        // Two seconds is plenty to cross 100 units at speed 60 and land a
        // hit or two.
        for _ in 0..120 {
            sim.step(1.0 / 60.0);
        }

        assert!(sim.world().health(player).unwrap().current < 100.0);
        let slime_pos = sim.world().transform(slime).unwrap().position;
        assert!(slime_pos.x < 100.0, "slime should have closed in");
    }

    #[test]
    fn killing_an_enemy_awards_experience_through_the_full_stack() {
        let mut sim = Sim::new();
        let kills = Rc::new(RefCell::new(0));
        let sink = kills.clone();
        sim.subscribe(move |event| {
            if matches!(event, GameEvent::EnemyKilled { .. }) {
                *sink.borrow_mut() += 1;
            }
        });

        let player = sim.spawn_player(0.0, 0.0);
        let slime = sim.spawn_enemy(EnemyKind::Slime, 30.0, 0.0);
        sim.step(1.0 / 60.0);

        // Swing until the slime (30 hp, ~10-15 damage per hit) is gone.
        for _ in 0..240 {
            if !sim.world().is_active(slime) {
                break;
            }
            sim.world_mut().request_attack(player, slime);
            sim.step(1.0 / 60.0);
        }

        assert!(!sim.world().is_active(slime));
        assert_eq!(*kills.borrow(), 1);
        let progress = sim.world().player(player).unwrap();
        assert_eq!(progress.kills, 1);
        assert_eq!(progress.experience, 15);
    }

    #[test]
    fn archers_hold_their_distance() {
        let mut sim = Sim::new();
        sim.spawn_player(0.0, 0.0);
        let archer = sim.spawn_enemy(EnemyKind::Archer, 100.0, 0.0);

        for _ in 0..60 {
            sim.step(1.0 / 60.0);
        }

        // 100 units is inside the [96, 120] firing band: hold and shoot.
        assert_eq!(sim.world().ai(archer).unwrap().state, AiState::Attack);
    }

    #[test]
    fn walls_keep_the_player_out() {
        let mut sim = Sim::new();
        let player = sim.spawn_player(0.0, 0.0);
        sim.spawn_wall(40.0, 0.0, 20.0, 200.0);
        sim.step(1.0 / 60.0);

        // Shove the player into the wall repeatedly; collision response
        // must keep pushing it back out of the slab.
        for _ in 0..60 {
            if let Some(movement) = sim.world_mut().movement_mut(player) {
                movement.set_velocity(Vec2::new(200.0, 0.0));
            }
            sim.step(1.0 / 60.0);
        }

        let x = sim.world().transform(player).unwrap().position.x;
        // Wall face is at 30, player radius 12: resting contact near 18.
        assert!(x < 19.0, "player ended up inside the wall: x={x}");
    }

    #[test]
    fn walkability_blocks_the_map_edge() {
        use crate::terrain::TileMap;

        let mut sim = Sim::new();
        // 4x4 tiles of 50 units: world ends at 200.
        sim.set_walkability(Box::new(TileMap::new(4, 4, 50.0)));
        let player = sim.spawn_player(180.0, 100.0);
        sim.step(1.0 / 60.0);

        for _ in 0..120 {
            if let Some(movement) = sim.world_mut().movement_mut(player) {
                movement.set_velocity(Vec2::new(220.0, 0.0));
            }
            sim.step(1.0 / 60.0);
        }

        let position = sim.world().transform(player).unwrap().position;
        assert!(position.x < 200.0, "player escaped the map: {position}");
    }
}

//! AI system - per-entity decision loop driving enemy movement and attack
//! requests.
//!
//! Each AI entity carries a static `behavior` (the decision procedure) and
//! a dynamic `state` (what it is doing right now). The player is the sole
//! aggro target; its id is looked up fresh every frame and cached targets
//! are revalidated through the World, never dereferenced blindly.
//!
//! Runs after collision (decisions see post-collision positions) and
//! before combat (attack requests resolve the same tick).

use glam::Vec2;

use crate::components::{AiState, ComponentKind};
use crate::systems::System;
use crate::world::{EntityId, World};

pub const AI_PRIORITY: i32 = 25;

/// Waypoint arrival radius for patrol routes.
const PATROL_ARRIVAL_RADIUS: f32 = 10.0;
/// Preferred standoff distance for ranged behavior, as a fraction of
/// attack range.
const RANGED_STANDOFF_FRACTION: f32 = 0.8;
/// Flee behavior reacts within this multiple of aggro range.
const FLEE_RADIUS_FACTOR: f32 = 1.5;

const REQUIRED: &[ComponentKind] = &[
    ComponentKind::Transform,
    ComponentKind::Ai,
    ComponentKind::Movement,
];

/// Four-behavior AI: aggressive, ranged, patrol, flee.
pub struct AiSystem;

impl System for AiSystem {
    fn name(&self) -> &'static str {
        "ai"
    }

    fn priority(&self) -> i32 {
        AI_PRIORITY
    }

    fn required(&self) -> &'static [ComponentKind] {
        REQUIRED
    }

    fn update(&mut self, world: &mut World, entities: &[EntityId], _dt: f32) {
        let now = world.time();
        let player = world
            .query(&[ComponentKind::Player, ComponentKind::Transform])
            .into_iter()
            .next();

        for &id in entities {
            if !world.is_active(id) {
                continue;
            }
            // Dead entities never run behavior logic.
            let Some(ai) = world.ai(id) else {
                continue;
            };
            if ai.state == AiState::Dead {
                continue;
            }
            let behavior = ai.behavior;
            let aggro_range = ai.aggro_range;

            // With no player in the world every AI goes idle until one
            // reappears.
            let Some(player_id) = player else {
                go_idle(world, id, now);
                continue;
            };
            let (Some(my_pos), Some(player_pos)) = (
                world.transform(id).map(|t| t.position),
                world.transform(player_id).map(|t| t.position),
            ) else {
                go_idle(world, id, now);
                continue;
            };
            let distance = my_pos.distance(player_pos);

            use crate::components::AiBehavior::*;
            match behavior {
                Aggressive => {
                    aggressive(world, id, player_id, my_pos, player_pos, distance, now);
                }
                Ranged => {
                    ranged(world, id, player_id, my_pos, player_pos, distance, now);
                }
                Patrol => {
                    // Patrol is pre-empted by aggression while the player is
                    // in aggro range; it is not a separate state machine.
                    if distance <= aggro_range {
                        aggressive(world, id, player_id, my_pos, player_pos, distance, now);
                    } else {
                        patrol_route(world, id, my_pos, now);
                    }
                }
                Flee => {
                    flee(world, id, player_id, my_pos, player_pos, distance, now);
                }
            }
        }
    }
}

/// Close-and-melee behavior: acquire inside aggro range, attack inside
/// attack range, chase in between.
fn aggressive(
    world: &mut World,
    id: EntityId,
    player_id: EntityId,
    my_pos: Vec2,
    player_pos: Vec2,
    distance: f32,
    now: f32,
) {
    let Some((aggro_range, attack_range)) =
        world.ai(id).map(|ai| (ai.aggro_range, ai.attack_range))
    else {
        return;
    };

    if distance > aggro_range {
        go_idle(world, id, now);
        return;
    }
    if let Some(ai) = world.ai_mut(id) {
        ai.target = Some(player_id);
    }

    if distance <= attack_range {
        enter_state(world, id, AiState::Attack, now);
        stop_movement(world, id);
        face(world, id, player_pos - my_pos);
        let ready = world.combat(id).map(|c| c.can_attack(now)).unwrap_or(false);
        if ready {
            world.request_attack(id, player_id);
        }
    } else {
        let direction = (player_pos - my_pos).normalize_or_zero();
        enter_state(world, id, AiState::Chase, now);
        steer(world, id, direction);
    }
}

/// Standoff behavior: keep to the band between the preferred standoff
/// distance and attack range, firing on cooldown while inside it.
fn ranged(
    world: &mut World,
    id: EntityId,
    player_id: EntityId,
    my_pos: Vec2,
    player_pos: Vec2,
    distance: f32,
    now: f32,
) {
    let Some((aggro_range, attack_range)) =
        world.ai(id).map(|ai| (ai.aggro_range, ai.attack_range))
    else {
        return;
    };

    if distance > aggro_range {
        go_idle(world, id, now);
        return;
    }
    if let Some(ai) = world.ai_mut(id) {
        ai.target = Some(player_id);
    }

    let standoff = attack_range * RANGED_STANDOFF_FRACTION;
    if distance < standoff {
        // Too close: back away.
        enter_state(world, id, AiState::Flee, now);
        steer(world, id, (my_pos - player_pos).normalize_or_zero());
    } else if distance > attack_range {
        enter_state(world, id, AiState::Chase, now);
        steer(world, id, (player_pos - my_pos).normalize_or_zero());
    } else {
        enter_state(world, id, AiState::Attack, now);
        stop_movement(world, id);
        face(world, id, player_pos - my_pos);
        let ready = world.combat(id).map(|c| c.can_attack(now)).unwrap_or(false);
        if ready {
            world.request_attack(id, player_id);
        }
    }
}

/// Cycle through the configured waypoints, advancing on arrival and
/// looping back to the first after the last.
fn patrol_route(world: &mut World, id: EntityId, my_pos: Vec2, now: f32) {
    if let Some(ai) = world.ai_mut(id) {
        ai.target = None;
    }
    enter_state(world, id, AiState::Patrol, now);

    let Some(waypoint) = world.ai(id).and_then(|ai| ai.current_waypoint()) else {
        stop_movement(world, id);
        return;
    };
    let waypoint = if my_pos.distance(waypoint) <= PATROL_ARRIVAL_RADIUS {
        if let Some(ai) = world.ai_mut(id) {
            ai.advance_waypoint();
        }
        world
            .ai(id)
            .and_then(|ai| ai.current_waypoint())
            .unwrap_or(waypoint)
    } else {
        waypoint
    };

    steer(world, id, (waypoint - my_pos).normalize_or_zero());
}

/// Run directly away while the player is anywhere near.
fn flee(
    world: &mut World,
    id: EntityId,
    player_id: EntityId,
    my_pos: Vec2,
    player_pos: Vec2,
    distance: f32,
    now: f32,
) {
    let Some(aggro_range) = world.ai(id).map(|ai| ai.aggro_range) else {
        return;
    };

    if distance <= aggro_range * FLEE_RADIUS_FACTOR {
        if let Some(ai) = world.ai_mut(id) {
            ai.target = Some(player_id);
        }
        enter_state(world, id, AiState::Flee, now);
        steer(world, id, (my_pos - player_pos).normalize_or_zero());
    } else {
        go_idle(world, id, now);
    }
}

fn go_idle(world: &mut World, id: EntityId, now: f32) {
    if let Some(ai) = world.ai_mut(id) {
        ai.target = None;
        ai.enter_state(AiState::Idle, now);
    }
    stop_movement(world, id);
}

fn enter_state(world: &mut World, id: EntityId, state: AiState, now: f32) {
    if let Some(ai) = world.ai_mut(id) {
        ai.enter_state(state, now);
    }
}

fn stop_movement(world: &mut World, id: EntityId) {
    if let Some(movement) = world.movement_mut(id) {
        movement.stop();
    }
}

/// Move at cruise speed in `direction`, facing the movement direction.
fn steer(world: &mut World, id: EntityId, direction: Vec2) {
    if let Some(movement) = world.movement_mut(id) {
        movement.move_in_direction(direction);
    }
    face(world, id, direction);
}

fn face(world: &mut World, id: EntityId, direction: Vec2) {
    if let Some(transform) = world.transform_mut(id) {
        transform.face(direction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{
        Ai, AiBehavior, Combat, Health, Movement, Player, Transform,
    };
    use crate::events::GameEvent;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ai_world() -> World {
        let mut world = World::new();
        world.add_system(Box::new(AiSystem));
        world
    }

    fn spawn_player_at(world: &mut World, x: f32, y: f32) -> EntityId {
        let id = world.spawn();
        world.add_transform(id, Transform::new(x, y));
        world.add_health(id, Health::new(100.0));
        world.add_player(id, Player::new());
        id
    }

    fn spawn_ai(world: &mut World, ai: Ai) -> EntityId {
        let id = world.spawn();
        world.add_transform(id, Transform::new(0.0, 0.0));
        world.add_movement(id, Movement::new(80.0, 120.0));
        world.add_combat(id, Combat::new(10.0, 0.0, 50.0, 0.5));
        world.add_ai(id, ai);
        id
    }

    fn move_entity(world: &mut World, id: EntityId, x: f32, y: f32) {
        world.transform_mut(id).unwrap().position = Vec2::new(x, y);
    }

    #[test]
    fn aggressive_idle_chase_attack_transitions() {
        let mut world = ai_world();
        let attack_events = Rc::new(RefCell::new(0));
        let sink = attack_events.clone();
        world.subscribe(move |event| {
            if matches!(event, GameEvent::AttackRequested { .. }) {
                *sink.borrow_mut() += 1;
            }
        });

        let enemy = spawn_ai(
            &mut world,
            Ai::new(AiBehavior::Aggressive, 200.0, 50.0),
        );
        let player = spawn_player_at(&mut world, 300.0, 0.0);

        // Player out of aggro range: idle, no target, stopped.
        world.update(0.016);
        let ai = world.ai(enemy).unwrap();
        assert_eq!(ai.state, AiState::Idle);
        assert_eq!(ai.target, None);
        assert_eq!(world.movement(enemy).unwrap().velocity, Vec2::ZERO);

        // Player inside aggro range: chase toward it.
        move_entity(&mut world, player, 150.0, 0.0);
        world.update(0.016);
        let ai = world.ai(enemy).unwrap();
        assert_eq!(ai.state, AiState::Chase);
        assert_eq!(ai.target, Some(player));
        assert!(world.movement(enemy).unwrap().velocity.x > 0.0);

        // Player inside attack range: stop and request an attack.
        move_entity(&mut world, enemy, 0.0, 0.0);
        move_entity(&mut world, player, 40.0, 0.0);
        world.update(0.016);
        let ai = world.ai(enemy).unwrap();
        assert_eq!(ai.state, AiState::Attack);
        assert_eq!(world.movement(enemy).unwrap().velocity, Vec2::ZERO);
        assert_eq!(*attack_events.borrow(), 1);
    }

    #[test]
    fn chase_faces_the_movement_direction() {
        let mut world = ai_world();
        let enemy = spawn_ai(
            &mut world,
            Ai::new(AiBehavior::Aggressive, 200.0, 20.0),
        );
        spawn_player_at(&mut world, -100.0, 0.0);

        world.update(0.016);

        // Moving toward -x means facing pi.
        let rotation = world.transform(enemy).unwrap().rotation;
        assert!((rotation.abs() - std::f32::consts::PI).abs() < 1e-3);
    }

    #[test]
    fn ranged_keeps_its_standoff_band() {
        let mut world = ai_world();
        let enemy = spawn_ai(
            &mut world,
            Ai::new(AiBehavior::Ranged, 200.0, 100.0),
        );
        let player = spawn_player_at(&mut world, 50.0, 0.0);

        // Inside the 80-unit standoff: back away.
        world.update(0.016);
        assert_eq!(world.ai(enemy).unwrap().state, AiState::Flee);
        assert!(world.movement(enemy).unwrap().velocity.x < 0.0);

        // In the firing band: hold and attack.
        move_entity(&mut world, enemy, 0.0, 0.0);
        move_entity(&mut world, player, 90.0, 0.0);
        world.update(0.016);
        assert_eq!(world.ai(enemy).unwrap().state, AiState::Attack);
        assert_eq!(world.movement(enemy).unwrap().velocity, Vec2::ZERO);

        // Beyond attack range but inside aggro: close in.
        move_entity(&mut world, enemy, 0.0, 0.0);
        move_entity(&mut world, player, 150.0, 0.0);
        world.update(0.016);
        assert_eq!(world.ai(enemy).unwrap().state, AiState::Chase);
        assert!(world.movement(enemy).unwrap().velocity.x > 0.0);

        // Outside aggro range: idle.
        move_entity(&mut world, enemy, 0.0, 0.0);
        move_entity(&mut world, player, 300.0, 0.0);
        world.update(0.016);
        assert_eq!(world.ai(enemy).unwrap().state, AiState::Idle);
    }

    #[test]
    fn patrol_cycles_waypoints_and_is_preempted_by_aggro() {
        let mut world = ai_world();
        let enemy = spawn_ai(
            &mut world,
            Ai::new(AiBehavior::Patrol, 100.0, 30.0).with_patrol_points(vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(100.0, 0.0),
            ]),
        );
        spawn_player_at(&mut world, 1000.0, 0.0);

        // Standing on the first waypoint: advance to the second and head
        // toward it.
        world.update(0.016);
        let ai = world.ai(enemy).unwrap();
        assert_eq!(ai.state, AiState::Patrol);
        assert_eq!(ai.patrol_index, 1);
        assert!(world.movement(enemy).unwrap().velocity.x > 0.0);

        // Player steps into aggro range: aggression takes over this frame.
        let player = world.query(&[ComponentKind::Player])[0];
        move_entity(&mut world, player, 80.0, 0.0);
        world.update(0.016);
        assert_eq!(world.ai(enemy).unwrap().state, AiState::Chase);
        assert_eq!(world.ai(enemy).unwrap().target, Some(player));
    }

    #[test]
    fn flee_runs_away_within_one_and_a_half_aggro() {
        let mut world = ai_world();
        let enemy = spawn_ai(
            &mut world,
            Ai::new(AiBehavior::Flee, 100.0, 30.0),
        );
        let player = spawn_player_at(&mut world, 120.0, 0.0);

        // 120 < 150 = 1.5 x aggro: run directly away.
        world.update(0.016);
        assert_eq!(world.ai(enemy).unwrap().state, AiState::Flee);
        assert!(world.movement(enemy).unwrap().velocity.x < 0.0);

        // Beyond the reaction radius: settle down.
        move_entity(&mut world, enemy, 0.0, 0.0);
        move_entity(&mut world, player, 200.0, 0.0);
        world.update(0.016);
        assert_eq!(world.ai(enemy).unwrap().state, AiState::Idle);
        assert_eq!(world.movement(enemy).unwrap().velocity, Vec2::ZERO);
    }

    #[test]
    fn dead_entities_never_run_behavior() {
        let mut world = ai_world();
        let enemy = spawn_ai(
            &mut world,
            Ai::new(AiBehavior::Aggressive, 200.0, 50.0),
        );
        spawn_player_at(&mut world, 10.0, 0.0);
        world.ai_mut(enemy).unwrap().state = AiState::Dead;
        world
            .movement_mut(enemy)
            .unwrap()
            .set_velocity(Vec2::new(5.0, 0.0));

        world.update(0.016);

        assert_eq!(world.ai(enemy).unwrap().state, AiState::Dead);
        assert_eq!(world.ai(enemy).unwrap().target, None);
        assert_eq!(
            world.movement(enemy).unwrap().velocity,
            Vec2::new(5.0, 0.0)
        );
    }

    #[test]
    fn no_player_means_idle_every_frame() {
        let mut world = ai_world();
        let enemy = spawn_ai(
            &mut world,
            Ai::new(AiBehavior::Aggressive, 200.0, 50.0),
        );
        world
            .movement_mut(enemy)
            .unwrap()
            .set_velocity(Vec2::new(50.0, 0.0));

        world.update(0.016);

        assert_eq!(world.ai(enemy).unwrap().state, AiState::Idle);
        assert_eq!(world.movement(enemy).unwrap().velocity, Vec2::ZERO);
    }

    #[test]
    fn attack_waits_for_the_combat_cooldown() {
        let mut world = ai_world();
        let requests = Rc::new(RefCell::new(0));
        let sink = requests.clone();
        world.subscribe(move |event| {
            if matches!(event, GameEvent::AttackRequested { .. }) {
                *sink.borrow_mut() += 1;
            }
        });

        let enemy = spawn_ai(
            &mut world,
            Ai::new(AiBehavior::Aggressive, 200.0, 50.0),
        );
        spawn_player_at(&mut world, 30.0, 0.0);

        // First frame requests; the cooldown has not elapsed on the next
        // frame, so no second request fires.
        world.update(0.016);
        world.combat_mut(enemy).unwrap().last_attack_at = world.time();
        world.update(0.016);

        assert_eq!(*requests.borrow(), 1);
    }
}

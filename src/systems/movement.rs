//! Movement system - integrates velocity into position.
//!
//! No bounds-checking or collision resolution happens here; the collision
//! system runs afterwards and separates whatever this pass overlapped.

use glam::Vec2;

use crate::components::ComponentKind;
use crate::systems::System;
use crate::world::{EntityId, World};

/// Integrates `position += velocity * dt`, then applies exponential
/// friction decay, snapping to exact zero below a small epsilon so idle
/// entities do not drift forever on denormal velocities.
pub struct MovementSystem;

pub const MOVEMENT_PRIORITY: i32 = 10;

const REQUIRED: &[ComponentKind] = &[ComponentKind::Transform, ComponentKind::Movement];

impl System for MovementSystem {
    fn name(&self) -> &'static str {
        "movement"
    }

    fn priority(&self) -> i32 {
        MOVEMENT_PRIORITY
    }

    fn required(&self) -> &'static [ComponentKind] {
        REQUIRED
    }

    fn update(&mut self, world: &mut World, entities: &[EntityId], dt: f32) {
        let epsilon = world.config().velocity_epsilon;

        for &id in entities {
            if !world.is_active(id) {
                continue;
            }
            let Some(movement) = world.movement(id) else {
                continue;
            };
            let velocity = movement.velocity;
            let friction = movement.friction;

            if velocity != Vec2::ZERO {
                let Some(position) = world.transform(id).map(|t| t.position) else {
                    continue;
                };
                let next = position + velocity * dt;

                // Traversal gate: without a map this is an open field.
                let blocked = world
                    .walkability()
                    .map(|map| !map.is_walkable(next.x, next.y))
                    .unwrap_or(false);

                if blocked {
                    if let Some(movement) = world.movement_mut(id) {
                        movement.stop();
                    }
                    continue;
                }
                if let Some(transform) = world.transform_mut(id) {
                    transform.position = next;
                }
            }

            if let Some(movement) = world.movement_mut(id) {
                let decayed = movement.velocity * friction.powf(dt);
                movement.velocity = if decayed.length() < epsilon {
                    Vec2::ZERO
                } else {
                    decayed
                };
            }
        }
    }
}

//! Collision system - two-phase broad/narrow detection plus separation.
//!
//! Broad phase: every collidable entity is inserted into a uniform spatial
//! grid rebuilt from scratch each frame, and candidate pairs come from the
//! 3x3 cell block around each entity. Narrow phase: exact shape overlap
//! tests on the shortlisted pairs only.
//!
//! A collision event fires for every detected overlap - trigger or not,
//! static or not - before any resolution, so listeners (pickups, hazards)
//! must not assume the pair has been separated yet.

use std::collections::HashSet;

use glam::Vec2;
use log::debug;

use crate::components::{ColliderShape, ComponentKind};
use crate::events::GameEvent;
use crate::spatial::SpatialGrid;
use crate::systems::System;
use crate::world::{EntityId, World};

pub const COLLISION_PRIORITY: i32 = 20;

const REQUIRED: &[ComponentKind] = &[ComponentKind::Transform, ComponentKind::Collider];

/// Broad/narrow phase collision detection and positional separation.
pub struct CollisionSystem {
    grid: SpatialGrid,
}

impl CollisionSystem {
    pub fn new() -> Self {
        Self {
            grid: SpatialGrid::default(),
        }
    }
}

impl Default for CollisionSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for CollisionSystem {
    fn name(&self) -> &'static str {
        "collision"
    }

    fn priority(&self) -> i32 {
        COLLISION_PRIORITY
    }

    fn required(&self) -> &'static [ComponentKind] {
        REQUIRED
    }

    fn init(&mut self, world: &mut World) {
        self.grid = SpatialGrid::new(world.config().grid_cell_size);
    }

    fn update(&mut self, world: &mut World, entities: &[EntityId], _dt: f32) {
        // Broad phase: full rebuild, then candidate pairs from neighboring
        // cells, deduplicated by ordered pair.
        self.grid.clear();
        for &id in entities {
            if !world.is_active(id) {
                continue;
            }
            if let Some(transform) = world.transform(id) {
                self.grid.insert(id, transform.position);
            }
        }

        let mut seen: HashSet<(EntityId, EntityId)> = HashSet::new();
        let mut contacts: Vec<(EntityId, EntityId, f32)> = Vec::new();

        for &a in entities {
            if !world.is_active(a) {
                continue;
            }
            let Some(position_a) = world.transform(a).map(|t| t.position) else {
                continue;
            };
            for b in self.grid.neighbors_of(a, position_a) {
                let pair = if a < b { (a, b) } else { (b, a) };
                if !seen.insert(pair) {
                    continue;
                }
                if let Some(depth) = test_pair(world, pair.0, pair.1) {
                    contacts.push((pair.0, pair.1, depth));
                }
            }
        }

        // Events first, for every overlap, regardless of what resolution
        // will do with the pair.
        for &(a, b, _) in &contacts {
            let (Some(pa), Some(pb)) = (
                world.transform(a).map(|t| t.position),
                world.transform(b).map(|t| t.position),
            ) else {
                continue;
            };
            world.events_mut().emit(GameEvent::Collision {
                entity_a: a,
                entity_b: b,
                position: (pa + pb) * 0.5,
            });
        }

        for (a, b, depth) in contacts {
            resolve_contact(world, a, b, depth);
        }
    }
}

/// Narrow-phase test for one candidate pair: layer filtering, then exact
/// shape overlap. Returns the penetration depth on overlap.
fn test_pair(world: &World, a: EntityId, b: EntityId) -> Option<f32> {
    let collider_a = world.collider(a)?;
    let collider_b = world.collider(b)?;

    // Filtering is a bidirectional AND: each side's mask must include the
    // other's layer bit.
    if !collider_a.can_collide_with(collider_b.layer)
        || !collider_b.can_collide_with(collider_a.layer)
    {
        return None;
    }

    let position_a = world.transform(a)?.position;
    let position_b = world.transform(b)?.position;
    overlap_depth(position_a, collider_a.shape, position_b, collider_b.shape)
}

/// Penetration depth of two shapes at the given centers, if they overlap.
///
/// Circle tests compare squared distances to avoid square roots on the
/// (common) non-overlapping path; mixed circle/rect dispatch is symmetric.
pub fn overlap_depth(
    position_a: Vec2,
    shape_a: ColliderShape,
    position_b: Vec2,
    shape_b: ColliderShape,
) -> Option<f32> {
    use ColliderShape::{Circle, Rect};
    match (shape_a, shape_b) {
        (Circle { radius: ra }, Circle { radius: rb }) => {
            let sum = ra + rb;
            let distance_sq = position_a.distance_squared(position_b);
            (distance_sq < sum * sum).then(|| sum - distance_sq.sqrt())
        }
        (Rect { half_extents: ha }, Rect { half_extents: hb }) => {
            let delta = position_b - position_a;
            let overlap_x = ha.x + hb.x - delta.x.abs();
            let overlap_y = ha.y + hb.y - delta.y.abs();
            (overlap_x > 0.0 && overlap_y > 0.0).then(|| overlap_x.min(overlap_y))
        }
        (Circle { radius }, Rect { half_extents }) => {
            circle_rect_depth(position_a, radius, position_b, half_extents)
        }
        (Rect { half_extents }, Circle { radius }) => {
            circle_rect_depth(position_b, radius, position_a, half_extents)
        }
    }
}

fn circle_rect_depth(
    center: Vec2,
    radius: f32,
    rect_center: Vec2,
    half_extents: Vec2,
) -> Option<f32> {
    let closest = center.clamp(rect_center - half_extents, rect_center + half_extents);
    let distance_sq = center.distance_squared(closest);
    (distance_sq < radius * radius).then(|| radius - distance_sq.sqrt())
}

/// Push an overlapping pair apart along the vector connecting their
/// centers, scaled by penetration depth. Triggers never separate; a fully
/// static pair is skipped; a half-static pair moves only the dynamic side
/// by the full depth; a dynamic pair splits the separation 50/50.
fn resolve_contact(world: &mut World, a: EntityId, b: EntityId, depth: f32) {
    let (Some(collider_a), Some(collider_b)) =
        (world.collider(a).copied(), world.collider(b).copied())
    else {
        return;
    };
    if collider_a.is_trigger || collider_b.is_trigger {
        return;
    }
    if collider_a.is_static && collider_b.is_static {
        return;
    }
    let (Some(position_a), Some(position_b)) = (
        world.transform(a).map(|t| t.position),
        world.transform(b).map(|t| t.position),
    ) else {
        return;
    };

    let delta = position_b - position_a;
    let distance = delta.length();
    if distance <= f32::EPSILON {
        // Exactly coincident centers: the separation direction is
        // undefined, so this overlap stays unresolved.
        debug!("unresolvable zero-distance overlap: {:?} / {:?}", a, b);
        return;
    }
    let separation = (delta / distance) * depth;

    if collider_a.is_static {
        if let Some(transform) = world.transform_mut(b) {
            transform.position += separation;
        }
    } else if collider_b.is_static {
        if let Some(transform) = world.transform_mut(a) {
            transform.position -= separation;
        }
    } else {
        if let Some(transform) = world.transform_mut(a) {
            transform.position -= separation * 0.5;
        }
        if let Some(transform) = world.transform_mut(b) {
            transform.position += separation * 0.5;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{layers, Collider, Transform};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn collision_world() -> World {
        let mut world = World::new();
        world.add_system(Box::new(CollisionSystem::new()));
        world
    }

    fn spawn_circle(world: &mut World, x: f32, y: f32, radius: f32, collider_mods: impl Fn(Collider) -> Collider) -> EntityId {
        let id = world.spawn();
        world.add_transform(id, Transform::new(x, y));
        world.add_collider(
            id,
            collider_mods(Collider::circle(radius, layers::ENEMY, layers::ENEMY | layers::WALL)),
        );
        id
    }

    fn collect_collisions(world: &mut World) -> Rc<RefCell<Vec<GameEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        world.subscribe(move |event| {
            if matches!(event, GameEvent::Collision { .. }) {
                sink.borrow_mut().push(event.clone());
            }
        });
        seen
    }

    #[test]
    fn overlap_depth_is_symmetric_across_shapes() {
        let circle = ColliderShape::Circle { radius: 10.0 };
        let rect = ColliderShape::Rect {
            half_extents: Vec2::new(8.0, 6.0),
        };
        let pa = Vec2::new(0.0, 0.0);
        let pb = Vec2::new(12.0, 3.0);

        for (sa, sb) in [(circle, circle), (rect, rect), (circle, rect), (rect, circle)] {
            assert_eq!(
                overlap_depth(pa, sa, pb, sb),
                overlap_depth(pb, sb, pa, sa),
            );
        }
    }

    #[test]
    fn touching_circles_do_not_collide() {
        let circle = ColliderShape::Circle { radius: 10.0 };
        // Distance exactly equals the radius sum.
        assert_eq!(
            overlap_depth(Vec2::ZERO, circle, Vec2::new(20.0, 0.0), circle),
            None
        );
    }

    #[test]
    fn overlapping_circles_separate_to_contact_distance() {
        let mut world = collision_world();
        let a = spawn_circle(&mut world, 0.0, 0.0, 10.0, |c| c);
        let b = spawn_circle(&mut world, 15.0, 0.0, 10.0, |c| c);
        let seen = collect_collisions(&mut world);

        world.update(0.016);

        assert_eq!(seen.borrow().len(), 1);
        let pa = world.transform(a).unwrap().position;
        let pb = world.transform(b).unwrap().position;
        assert!((pa.distance(pb) - 20.0).abs() < 1e-3);
    }

    #[test]
    fn fully_static_pairs_never_move() {
        let mut world = collision_world();
        let a = spawn_circle(&mut world, 0.0, 0.0, 10.0, |c| c.as_static());
        let b = spawn_circle(&mut world, 5.0, 0.0, 10.0, |c| c.as_static());
        let seen = collect_collisions(&mut world);

        world.update(0.016);

        // The overlap is still reported, just not resolved.
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(world.transform(a).unwrap().position, Vec2::new(0.0, 0.0));
        assert_eq!(world.transform(b).unwrap().position, Vec2::new(5.0, 0.0));
    }

    #[test]
    fn dynamic_side_takes_the_full_separation_against_a_static() {
        let mut world = collision_world();
        let wall = spawn_circle(&mut world, 0.0, 0.0, 10.0, |c| c.as_static());
        let mover = spawn_circle(&mut world, 15.0, 0.0, 10.0, |c| c);

        world.update(0.016);

        assert_eq!(world.transform(wall).unwrap().position, Vec2::new(0.0, 0.0));
        let moved = world.transform(mover).unwrap().position;
        assert!((moved.x - 20.0).abs() < 1e-3);
    }

    #[test]
    fn triggers_report_but_do_not_separate() {
        let mut world = collision_world();
        let zone = spawn_circle(&mut world, 0.0, 0.0, 10.0, |c| c.as_trigger());
        let mover = spawn_circle(&mut world, 5.0, 0.0, 10.0, |c| c);
        let seen = collect_collisions(&mut world);

        world.update(0.016);

        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(world.transform(zone).unwrap().position, Vec2::new(0.0, 0.0));
        assert_eq!(world.transform(mover).unwrap().position, Vec2::new(5.0, 0.0));
    }

    #[test]
    fn layer_filtering_requires_both_masks() {
        let mut world = collision_world();
        let a = world.spawn();
        world.add_transform(a, Transform::new(0.0, 0.0));
        // a can hit ENEMY, but b's mask does not include ENEMY.
        world.add_collider(a, Collider::circle(10.0, layers::ENEMY, layers::ENEMY));
        let b = world.spawn();
        world.add_transform(b, Transform::new(5.0, 0.0));
        world.add_collider(b, Collider::circle(10.0, layers::ENEMY, layers::WALL));
        let seen = collect_collisions(&mut world);

        world.update(0.016);

        assert!(seen.borrow().is_empty());
        assert_eq!(world.transform(a).unwrap().position, Vec2::new(0.0, 0.0));
    }

    #[test]
    fn coincident_centers_are_reported_but_unresolved() {
        let mut world = collision_world();
        let a = spawn_circle(&mut world, 7.0, 7.0, 10.0, |c| c);
        let b = spawn_circle(&mut world, 7.0, 7.0, 10.0, |c| c);
        let seen = collect_collisions(&mut world);

        world.update(0.016);

        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(world.transform(a).unwrap().position, Vec2::new(7.0, 7.0));
        assert_eq!(world.transform(b).unwrap().position, Vec2::new(7.0, 7.0));
    }

    #[test]
    fn circle_and_rect_overlap_detected() {
        let circle = ColliderShape::Circle { radius: 5.0 };
        let rect = ColliderShape::Rect {
            half_extents: Vec2::new(10.0, 10.0),
        };
        // Circle just left of the rect's left face, overlapping by 2.
        let depth = overlap_depth(Vec2::new(-13.0, 0.0), circle, Vec2::ZERO, rect);
        assert!(depth.is_some());
        assert!((depth.unwrap() - 2.0).abs() < 1e-3);

        // Far away: no overlap.
        assert_eq!(
            overlap_depth(Vec2::new(-20.0, 0.0), circle, Vec2::ZERO, rect),
            None
        );
    }

    #[test]
    fn distant_entities_produce_no_candidate_pairs() {
        let mut world = collision_world();
        spawn_circle(&mut world, 0.0, 0.0, 10.0, |c| c);
        spawn_circle(&mut world, 500.0, 500.0, 10.0, |c| c);
        let seen = collect_collisions(&mut world);

        world.update(0.016);
        assert!(seen.borrow().is_empty());
    }
}

//! Systems for the Emberdeep simulation.
//!
//! Systems are stateless-between-frames logic units run once per frame in
//! ascending priority order. The ordering is semantic, not cosmetic:
//!
//! 1. `MovementSystem` (10) - integrates velocity into position
//! 2. `CollisionSystem` (20) - broad/narrow phase detection and separation
//! 3. `AiSystem` (25) - decisions over post-collision positions
//! 4. `CombatSystem` (30) - attack resolution, then the death sweep, so
//!    damage requested by AI this frame is already applied
//!
//! Execution is strictly single-threaded; each system runs to completion
//! before the next starts.

pub mod ai;
pub mod collision;
pub mod combat;
pub mod movement;

pub use ai::AiSystem;
pub use collision::CollisionSystem;
pub use combat::CombatSystem;
pub use movement::MovementSystem;

use crate::components::ComponentKind;
use crate::world::{EntityId, World};

/// A unit of per-frame logic.
///
/// `required` declares the component kinds an entity must carry for the
/// system to receive it (the iterating form); an empty slice means the
/// system is handed every active entity. The list a system receives is the
/// frame-start snapshot: entities destroyed earlier in the same frame are
/// still present and must be skipped via [`World::is_active`].
pub trait System {
    fn name(&self) -> &'static str;

    /// Lower priorities run first.
    fn priority(&self) -> i32;

    fn required(&self) -> &'static [ComponentKind] {
        &[]
    }

    /// One-time hook invoked when the system is registered.
    fn init(&mut self, _world: &mut World) {}

    fn update(&mut self, world: &mut World, entities: &[EntityId], dt: f32);
}

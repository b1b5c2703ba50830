//! Emberdeep - Simulation Core
//!
//! A deterministic, frame-stepped ECS simulation core for a top-down action
//! RPG: a hand-rolled entity/component registry plus the gameplay systems
//! built on it (movement, collision, AI, combat). Rendering, input, UI and
//! data loading live outside this crate and talk to it through the entity
//! factory helpers, the walkability trait, the event bus, and snapshots.

pub mod api;
pub mod components;
pub mod config;
pub mod events;
pub mod profiler;
pub mod spatial;
pub mod systems;
pub mod terrain;
pub mod world;

pub use api::Sim;
pub use components::*;
pub use config::SimConfig;
pub use events::{EventBus, GameEvent, GameOverReason, GameOverStats, ListenerId};
pub use spatial::SpatialGrid;
pub use systems::{AiSystem, CollisionSystem, CombatSystem, MovementSystem, System};
pub use terrain::{OpenField, TileMap, Walkability};
pub use world::{AttackRequest, EntityId, Snapshot, World};

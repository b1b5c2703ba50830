//! Entity/component registry and the per-frame update protocol.
//!
//! The `World` owns every entity and component, the event bus, and the
//! registered systems. One `update(dt)` call is one simulation frame:
//! pending entity mutations are flushed, the active-entity snapshot is
//! taken, systems run in ascending priority order, and pending mutations
//! are flushed again. Entities are never deleted mid-frame; destruction
//! clears the active flag immediately and defers physical removal to the
//! next flush point so the snapshot stays stable while systems iterate.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use slotmap::{Key, SecondaryMap, SlotMap};

use crate::components::{
    Ai, Collider, Combat, Component, ComponentKind, Enemy, Health, Movement, Player, Sprite,
    Transform,
};
use crate::config::SimConfig;
use crate::events::{EventBus, GameEvent, ListenerId};
#[cfg(feature = "profile")]
use crate::profiler::Profiler;
use crate::systems::System;
use crate::terrain::Walkability;

slotmap::new_key_type! {
    /// Generational entity id. A stale id held across frames (a cached AI
    /// target, an event payload) fails lookup instead of aliasing a
    /// recycled slot.
    pub struct EntityId;
}

impl EntityId {
    /// Stable numeric form for snapshots and logs.
    pub fn to_bits(self) -> u64 {
        self.data().as_ffi()
    }
}

/// Per-entity book-keeping.
///
/// `pending` entities have been spawned but not yet flushed into the
/// queryable set; inactive entities are logically destroyed and waiting for
/// physical removal.
#[derive(Debug, Clone, Copy)]
struct EntityMeta {
    active: bool,
    pending: bool,
}

/// An attack to be resolved by the combat system later in the same tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackRequest {
    pub attacker: EntityId,
    pub target: EntityId,
}

/// One secondary map per component type. Typed access everywhere; the
/// `ComponentKind` tag is only consulted at the World boundary.
#[derive(Default)]
struct Stores {
    transforms: SecondaryMap<EntityId, Transform>,
    healths: SecondaryMap<EntityId, Health>,
    combats: SecondaryMap<EntityId, Combat>,
    movements: SecondaryMap<EntityId, Movement>,
    ais: SecondaryMap<EntityId, Ai>,
    colliders: SecondaryMap<EntityId, Collider>,
    players: SecondaryMap<EntityId, Player>,
    enemies: SecondaryMap<EntityId, Enemy>,
    sprites: SecondaryMap<EntityId, Sprite>,
}

impl Stores {
    fn remove_all(&mut self, id: EntityId) {
        self.transforms.remove(id);
        self.healths.remove(id);
        self.combats.remove(id);
        self.movements.remove(id);
        self.ais.remove(id);
        self.colliders.remove(id);
        self.players.remove(id);
        self.enemies.remove(id);
        self.sprites.remove(id);
    }

    fn has(&self, id: EntityId, kind: ComponentKind) -> bool {
        match kind {
            ComponentKind::Transform => self.transforms.contains_key(id),
            ComponentKind::Health => self.healths.contains_key(id),
            ComponentKind::Combat => self.combats.contains_key(id),
            ComponentKind::Movement => self.movements.contains_key(id),
            ComponentKind::Ai => self.ais.contains_key(id),
            ComponentKind::Collider => self.colliders.contains_key(id),
            ComponentKind::Player => self.players.contains_key(id),
            ComponentKind::Enemy => self.enemies.contains_key(id),
            ComponentKind::Sprite => self.sprites.contains_key(id),
        }
    }

    fn remove(&mut self, id: EntityId, kind: ComponentKind) -> bool {
        match kind {
            ComponentKind::Transform => self.transforms.remove(id).is_some(),
            ComponentKind::Health => self.healths.remove(id).is_some(),
            ComponentKind::Combat => self.combats.remove(id).is_some(),
            ComponentKind::Movement => self.movements.remove(id).is_some(),
            ComponentKind::Ai => self.ais.remove(id).is_some(),
            ComponentKind::Collider => self.colliders.remove(id).is_some(),
            ComponentKind::Player => self.players.remove(id).is_some(),
            ComponentKind::Enemy => self.enemies.remove(id).is_some(),
            ComponentKind::Sprite => self.sprites.remove(id).is_some(),
        }
    }
}

/// All component kinds, for `component_kinds`.
const ALL_KINDS: [ComponentKind; 9] = [
    ComponentKind::Transform,
    ComponentKind::Health,
    ComponentKind::Combat,
    ComponentKind::Movement,
    ComponentKind::Ai,
    ComponentKind::Collider,
    ComponentKind::Player,
    ComponentKind::Enemy,
    ComponentKind::Sprite,
];

macro_rules! component_accessors {
    ($field:ident, $ty:ty, $get:ident, $get_mut:ident, $add:ident) => {
        pub fn $get(&self, id: EntityId) -> Option<&$ty> {
            self.stores.$field.get(id)
        }

        pub fn $get_mut(&mut self, id: EntityId) -> Option<&mut $ty> {
            self.stores.$field.get_mut(id)
        }

        /// Attach the component, replacing any existing instance.
        pub fn $add(&mut self, id: EntityId, value: $ty) {
            if !self.entities.contains_key(id) {
                warn!(
                    concat!(stringify!($add), ": unknown or removed entity {:?}"),
                    id
                );
                return;
            }
            self.stores.$field.insert(id, value);
        }
    };
}

/// The entity/component registry and frame scheduler.
pub struct World {
    entities: SlotMap<EntityId, EntityMeta>,
    stores: Stores,
    pending_removal: Vec<EntityId>,
    systems: Vec<Box<dyn System>>,
    events: EventBus,
    attack_requests: Vec<AttackRequest>,
    walkability: Option<Box<dyn Walkability>>,
    config: SimConfig,
    time: f32,
    tick: u64,
    #[cfg(feature = "profile")]
    profiler: Profiler,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    pub fn with_config(config: SimConfig) -> Self {
        Self {
            entities: SlotMap::with_key(),
            stores: Stores::default(),
            pending_removal: Vec::new(),
            systems: Vec::new(),
            events: EventBus::new(),
            attack_requests: Vec::new(),
            walkability: None,
            config,
            time: 0.0,
            tick: 0,
            #[cfg(feature = "profile")]
            profiler: Profiler::new(),
        }
    }

    // ------------------------------------------------------------------
    // Entity lifecycle
    // ------------------------------------------------------------------

    /// Create a new entity. It is visible to queries only after the next
    /// flush point (the start of the next `update`), so a factory can
    /// attach its full component set before any system sees it.
    pub fn spawn(&mut self) -> EntityId {
        self.entities.insert(EntityMeta {
            active: true,
            pending: true,
        })
    }

    /// Queue an entity for removal at the next flush point. The entity
    /// stays visible (and active) for the rest of the current frame.
    pub fn despawn(&mut self, id: EntityId) {
        if !self.entities.contains_key(id) {
            warn!("despawn: unknown or removed entity {:?}", id);
            return;
        }
        if !self.pending_removal.contains(&id) {
            self.pending_removal.push(id);
        }
    }

    /// Logically destroy an entity now and queue its physical removal.
    /// Systems later in the current frame skip it via `is_active`. Calling
    /// this on an already-dead entity is a no-op.
    pub fn kill(&mut self, id: EntityId) {
        match self.entities.get_mut(id) {
            Some(meta) => {
                meta.active = false;
                if !self.pending_removal.contains(&id) {
                    self.pending_removal.push(id);
                }
            }
            None => warn!("kill: unknown or removed entity {:?}", id),
        }
    }

    /// Whether the id refers to a live slot (possibly inactive or pending).
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Whether the entity participates in queries and system passes.
    pub fn is_active(&self, id: EntityId) -> bool {
        self.entities
            .get(id)
            .map(|meta| meta.active && !meta.pending)
            .unwrap_or(false)
    }

    /// Number of live entity slots, including pending and inactive ones.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    // ------------------------------------------------------------------
    // Component access
    // ------------------------------------------------------------------

    component_accessors!(transforms, Transform, transform, transform_mut, add_transform);
    component_accessors!(healths, Health, health, health_mut, add_health);
    component_accessors!(combats, Combat, combat, combat_mut, add_combat);
    component_accessors!(movements, Movement, movement, movement_mut, add_movement);
    component_accessors!(ais, Ai, ai, ai_mut, add_ai);
    component_accessors!(colliders, Collider, collider, collider_mut, add_collider);
    component_accessors!(players, Player, player, player_mut, add_player);
    component_accessors!(enemies, Enemy, enemy, enemy_mut, add_enemy);
    component_accessors!(sprites, Sprite, sprite, sprite_mut, add_sprite);

    /// Attach a component through the tag-level boundary API.
    pub fn add_component(&mut self, id: EntityId, component: Component) {
        match component {
            Component::Transform(value) => self.add_transform(id, value),
            Component::Health(value) => self.add_health(id, value),
            Component::Combat(value) => self.add_combat(id, value),
            Component::Movement(value) => self.add_movement(id, value),
            Component::Ai(value) => self.add_ai(id, value),
            Component::Collider(value) => self.add_collider(id, value),
            Component::Player(value) => self.add_player(id, value),
            Component::Enemy(value) => self.add_enemy(id, value),
            Component::Sprite(value) => self.add_sprite(id, value),
        }
    }

    pub fn has_component(&self, id: EntityId, kind: ComponentKind) -> bool {
        self.stores.has(id, kind)
    }

    /// Detach a component. Returns false (with a debug log) when the entity
    /// did not carry one; callers frequently probe optional components.
    pub fn remove_component(&mut self, id: EntityId, kind: ComponentKind) -> bool {
        let removed = self.stores.remove(id, kind);
        if !removed {
            debug!("remove_component: {:?} had no {:?}", id, kind);
        }
        removed
    }

    /// Kinds currently attached to the entity.
    pub fn component_kinds(&self, id: EntityId) -> Vec<ComponentKind> {
        ALL_KINDS
            .iter()
            .copied()
            .filter(|&kind| self.stores.has(id, kind))
            .collect()
    }

    /// Active entities carrying all of `kinds`, in storage order. The order
    /// is not guaranteed stable across frames once entities churn.
    pub fn query(&self, kinds: &[ComponentKind]) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|(_, meta)| meta.active && !meta.pending)
            .map(|(id, _)| id)
            .filter(|&id| kinds.iter().all(|&kind| self.stores.has(id, kind)))
            .collect()
    }

    // ------------------------------------------------------------------
    // Systems and the frame protocol
    // ------------------------------------------------------------------

    /// Register a system, keeping the list sorted by ascending priority
    /// (lower runs first). The system's one-time `init` hook runs here.
    pub fn add_system(&mut self, mut system: Box<dyn System>) {
        system.init(self);
        self.systems.push(system);
        self.systems.sort_by_key(|system| system.priority());
    }

    /// Advance the simulation by one frame.
    pub fn update(&mut self, dt: f32) {
        self.flush_pending();
        self.time += dt;
        self.tick += 1;

        // Snapshot of entities active at the start of the frame. Entities
        // killed mid-frame stay in it; systems skip them via `is_active`.
        let snapshot: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, meta)| meta.active && !meta.pending)
            .map(|(id, _)| id)
            .collect();

        let mut systems = std::mem::take(&mut self.systems);
        for system in &mut systems {
            let required = system.required();
            let matched: Vec<EntityId> = if required.is_empty() {
                snapshot.clone()
            } else {
                snapshot
                    .iter()
                    .copied()
                    .filter(|&id| required.iter().all(|&kind| self.stores.has(id, kind)))
                    .collect()
            };
            #[cfg(feature = "profile")]
            self.profiler.begin_section(system.name());
            system.update(self, &matched, dt);
            #[cfg(feature = "profile")]
            self.profiler.end_section();
        }
        // Systems registered from inside a system land in `self.systems`;
        // fold them back in and restore priority order.
        systems.append(&mut self.systems);
        systems.sort_by_key(|system| system.priority());
        self.systems = systems;

        if !self.attack_requests.is_empty() {
            debug!(
                "{} attack requests left unresolved this frame",
                self.attack_requests.len()
            );
            self.attack_requests.clear();
        }
        self.flush_pending();
    }

    fn flush_pending(&mut self) {
        for (_, meta) in self.entities.iter_mut() {
            meta.pending = false;
        }
        for id in std::mem::take(&mut self.pending_removal) {
            if self.entities.remove(id).is_some() {
                self.stores.remove_all(id);
            }
        }
    }

    // ------------------------------------------------------------------
    // Events and the attack-request queue
    // ------------------------------------------------------------------

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Convenience passthrough to [`EventBus::subscribe`].
    pub fn subscribe(&mut self, listener: impl FnMut(&GameEvent) + 'static) -> ListenerId {
        self.events.subscribe(listener)
    }

    /// Ask for an attack to be resolved this tick. The combat system drains
    /// the queue during its pass; an `AttackRequested` event is published
    /// immediately for observers.
    pub fn request_attack(&mut self, attacker: EntityId, target: EntityId) {
        self.attack_requests.push(AttackRequest { attacker, target });
        self.events
            .emit(GameEvent::AttackRequested { attacker, target });
    }

    /// Take ownership of all pending attack requests.
    pub fn take_attack_requests(&mut self) -> Vec<AttackRequest> {
        std::mem::take(&mut self.attack_requests)
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Install the traversal query. Without one the world is an open field.
    pub fn set_walkability(&mut self, walkability: Box<dyn Walkability>) {
        self.walkability = Some(walkability);
    }

    pub fn walkability(&self) -> Option<&dyn Walkability> {
        self.walkability.as_deref()
    }

    /// Simulation time in seconds, advanced by `update`.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    #[cfg(feature = "profile")]
    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SNAPSHOTS
// ============================================================================

/// Serializable view of one living actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorSnapshot {
    pub id: u64,
    pub kind: String,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub health: f32,
    pub health_max: f32,
    /// AI state name, or "-" for entities without AI.
    pub state: String,
    /// Texture key from the sprite component, when one is attached.
    pub texture: Option<String>,
}

/// Serializable view of player progression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub level: u32,
    pub experience: u32,
    pub experience_to_next: u32,
    pub kills: u32,
}

/// Complete simulation state snapshot for the UI/renderer layers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub time: f32,
    pub actors: Vec<ActorSnapshot>,
    pub player: Option<PlayerSnapshot>,
}

impl Snapshot {
    /// Capture every active entity with a transform and health.
    pub fn from_world(world: &World) -> Self {
        let mut actors = Vec::new();
        let mut player = None;

        for id in world.query(&[ComponentKind::Transform, ComponentKind::Health]) {
            let (Some(transform), Some(health)) = (world.transform(id), world.health(id)) else {
                continue;
            };
            let kind = if world.player(id).is_some() {
                "player".to_string()
            } else if let Some(enemy) = world.enemy(id) {
                enemy.kind.as_str().to_string()
            } else {
                "other".to_string()
            };
            let state = world
                .ai(id)
                .map(|ai| ai.state.as_str().to_string())
                .unwrap_or_else(|| "-".to_string());

            actors.push(ActorSnapshot {
                id: id.to_bits(),
                kind,
                x: transform.position.x,
                y: transform.position.y,
                rotation: transform.rotation,
                health: health.current,
                health_max: health.max,
                state,
                texture: world.sprite(id).map(|sprite| sprite.texture.clone()),
            });

            if let Some(progress) = world.player(id) {
                player = Some(PlayerSnapshot {
                    level: progress.level,
                    experience: progress.experience,
                    experience_to_next: progress.experience_to_next,
                    kills: progress.kills,
                });
            }
        }

        Self {
            tick: world.tick(),
            time: world.time(),
            actors,
            player,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

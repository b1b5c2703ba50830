//! Components for the Emberdeep simulation.
//!
//! Components are pure data attached to entities. All game logic lives in
//! systems; the methods here are clamping conveniences on the data itself,
//! and no system assumes they are the only way to mutate a component.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::world::EntityId;

// ============================================================================
// COMPONENT TAGS
// ============================================================================

/// Stable type tag for every component kind.
///
/// Systems declare their required kinds with these tags, and the tag-level
/// World API (`has_component`, `remove_component`) is keyed by them. Typed
/// access stays compile-checked; the tags exist only at the World boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Transform,
    Health,
    Combat,
    Movement,
    Ai,
    Collider,
    Player,
    Enemy,
    Sprite,
}

/// A component value paired with its kind.
///
/// The closed set lets entity factories attach components through one
/// uniform call (`World::add_component`) without giving up the typed stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Component {
    Transform(Transform),
    Health(Health),
    Combat(Combat),
    Movement(Movement),
    Ai(Ai),
    Collider(Collider),
    Player(Player),
    Enemy(Enemy),
    Sprite(Sprite),
}

impl Component {
    /// The tag matching this value's variant.
    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::Transform(_) => ComponentKind::Transform,
            Component::Health(_) => ComponentKind::Health,
            Component::Combat(_) => ComponentKind::Combat,
            Component::Movement(_) => ComponentKind::Movement,
            Component::Ai(_) => ComponentKind::Ai,
            Component::Collider(_) => ComponentKind::Collider,
            Component::Player(_) => ComponentKind::Player,
            Component::Enemy(_) => ComponentKind::Enemy,
            Component::Sprite(_) => ComponentKind::Sprite,
        }
    }
}

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// World-space placement: position, facing angle (radians), scale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
}

impl Transform {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            rotation: 0.0,
            scale: Vec2::ONE,
        }
    }

    /// Unit vector the entity is facing.
    pub fn facing(&self) -> Vec2 {
        Vec2::from_angle(self.rotation)
    }

    /// Turn to face `direction`. Zero-length directions leave rotation as-is.
    pub fn face(&mut self, direction: Vec2) {
        if direction.length_squared() > f32::EPSILON {
            self.rotation = direction.y.atan2(direction.x);
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Velocity state and movement tuning for a mobile entity.
///
/// `velocity` never exceeds `max_speed` after any mutation through the
/// methods below; `friction` is the per-second fraction of velocity kept.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Movement {
    pub velocity: Vec2,
    /// Cruise speed used when steering toward a direction.
    pub speed: f32,
    pub max_speed: f32,
    pub acceleration: f32,
    /// Per-second velocity retention, in [0, 1]. 1.0 = frictionless.
    pub friction: f32,
}

impl Movement {
    pub fn new(speed: f32, max_speed: f32) -> Self {
        Self {
            velocity: Vec2::ZERO,
            speed,
            max_speed,
            acceleration: max_speed * 4.0,
            friction: 0.2,
        }
    }

    /// Replace the velocity, clamped to `max_speed`.
    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity.clamp_length_max(self.max_speed);
    }

    /// Add to the velocity, clamped to `max_speed`.
    pub fn add_velocity(&mut self, delta: Vec2) {
        self.velocity = (self.velocity + delta).clamp_length_max(self.max_speed);
    }

    /// Steer at cruise speed in `direction` (need not be normalized).
    pub fn move_in_direction(&mut self, direction: Vec2) {
        self.set_velocity(direction.normalize_or_zero() * self.speed);
    }

    /// Ramp velocity toward `direction` at the acceleration rate.
    pub fn accelerate(&mut self, direction: Vec2, dt: f32) {
        self.add_velocity(direction.normalize_or_zero() * self.acceleration * dt);
    }

    pub fn stop(&mut self) {
        self.velocity = Vec2::ZERO;
    }

    pub fn is_moving(&self) -> bool {
        self.velocity != Vec2::ZERO
    }
}

impl Default for Movement {
    fn default() -> Self {
        Self::new(100.0, 150.0)
    }
}

// ============================================================================
// COMBAT COMPONENTS
// ============================================================================

/// Hit points. `current` stays within [0, max] through `take_damage`/`heal`
/// for any input, including negative or huge amounts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Health {
    pub current: f32,
    pub max: f32,
    pub invulnerable: bool,
    /// Simulation time of the last damage actually applied.
    pub last_damage_at: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self {
            current: max,
            max,
            invulnerable: false,
            last_damage_at: f32::NEG_INFINITY,
        }
    }

    /// Apply damage at simulation time `now`. Returns the amount actually
    /// removed (0 when invulnerable or the amount is non-positive).
    pub fn take_damage(&mut self, amount: f32, now: f32) -> f32 {
        if self.invulnerable {
            return 0.0;
        }
        let amount = amount.max(0.0);
        let applied = amount.min(self.current);
        self.current -= applied;
        if applied > 0.0 {
            self.last_damage_at = now;
        }
        applied
    }

    /// Restore hit points, capped at `max`. Negative amounts are ignored.
    pub fn heal(&mut self, amount: f32) {
        self.current = (self.current + amount.max(0.0)).min(self.max);
    }

    pub fn restore_full(&mut self) {
        self.current = self.max;
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }

    pub fn fraction(&self) -> f32 {
        if self.max <= 0.0 {
            0.0
        } else {
            (self.current / self.max).clamp(0.0, 1.0)
        }
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::new(100.0)
    }
}

/// Offensive stats and the attack cooldown gate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Combat {
    pub strength: f32,
    pub defense: f32,
    pub attack_range: f32,
    /// Minimum seconds between attacks.
    pub cooldown: f32,
    pub last_attack_at: f32,
}

impl Combat {
    pub fn new(strength: f32, defense: f32, attack_range: f32, cooldown: f32) -> Self {
        Self {
            strength,
            defense,
            attack_range,
            cooldown,
            last_attack_at: f32::NEG_INFINITY,
        }
    }

    /// Whether the cooldown has elapsed at simulation time `now`.
    pub fn can_attack(&self, now: f32) -> bool {
        now - self.last_attack_at >= self.cooldown
    }
}

impl Default for Combat {
    fn default() -> Self {
        Self::new(10.0, 0.0, 40.0, 0.5)
    }
}

// ============================================================================
// AI COMPONENTS
// ============================================================================

/// Static per-entity trait selecting the decision procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiBehavior {
    Aggressive,
    Ranged,
    Patrol,
    Flee,
}

/// Dynamic AI state. `Dead` is terminal and imposed from outside the AI
/// system by whatever detects health reaching zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiState {
    Idle,
    Patrol,
    Chase,
    Attack,
    Flee,
    Dead,
}

impl AiState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiState::Idle => "idle",
            AiState::Patrol => "patrol",
            AiState::Chase => "chase",
            AiState::Attack => "attack",
            AiState::Flee => "flee",
            AiState::Dead => "dead",
        }
    }
}

/// Decision-loop state for an AI-driven entity.
///
/// `target` is a weak reference: the entity it names may have been destroyed
/// since last frame, so every use goes through a World lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ai {
    pub behavior: AiBehavior,
    pub state: AiState,
    pub target: Option<EntityId>,
    pub aggro_range: f32,
    pub attack_range: f32,
    pub patrol_points: Vec<Vec2>,
    pub patrol_index: usize,
    /// Simulation time of the last actual state change.
    pub state_changed_at: f32,
}

impl Ai {
    pub fn new(behavior: AiBehavior, aggro_range: f32, attack_range: f32) -> Self {
        Self {
            behavior,
            state: AiState::Idle,
            target: None,
            aggro_range,
            attack_range,
            patrol_points: Vec::new(),
            patrol_index: 0,
            state_changed_at: 0.0,
        }
    }

    pub fn with_patrol_points(mut self, points: Vec<Vec2>) -> Self {
        self.patrol_points = points;
        self
    }

    /// Transition to `state`. Re-entering the current state does not reset
    /// the state timer; only an actual change updates the baseline.
    pub fn enter_state(&mut self, state: AiState, now: f32) {
        if self.state != state {
            self.state = state;
            self.state_changed_at = now;
        }
    }

    pub fn time_in_state(&self, now: f32) -> f32 {
        now - self.state_changed_at
    }

    /// Current patrol waypoint, if any are configured.
    pub fn current_waypoint(&self) -> Option<Vec2> {
        self.patrol_points.get(self.patrol_index).copied()
    }

    /// Advance to the next waypoint, looping back to the first after the last.
    pub fn advance_waypoint(&mut self) {
        if !self.patrol_points.is_empty() {
            self.patrol_index = (self.patrol_index + 1) % self.patrol_points.len();
        }
    }
}

// ============================================================================
// COLLISION COMPONENTS
// ============================================================================

/// Collision layer bits. An entity occupies one `layer` and collides with
/// the layers named in its `mask`.
pub mod layers {
    pub const PLAYER: u32 = 1 << 0;
    pub const ENEMY: u32 = 1 << 1;
    pub const WALL: u32 = 1 << 2;
    pub const PICKUP: u32 = 1 << 3;
}

/// Collision shape, centered on the entity's position. Rects are
/// axis-aligned.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum ColliderShape {
    Circle { radius: f32 },
    Rect { half_extents: Vec2 },
}

/// Collision participation: shape, layer/mask filtering, trigger and static
/// flags. Triggers report overlaps but are never physically separated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Collider {
    pub shape: ColliderShape,
    pub layer: u32,
    pub mask: u32,
    pub is_trigger: bool,
    pub is_static: bool,
}

impl Collider {
    pub fn circle(radius: f32, layer: u32, mask: u32) -> Self {
        Self {
            shape: ColliderShape::Circle { radius },
            layer,
            mask,
            is_trigger: false,
            is_static: false,
        }
    }

    pub fn rect(width: f32, height: f32, layer: u32, mask: u32) -> Self {
        Self {
            shape: ColliderShape::Rect {
                half_extents: Vec2::new(width * 0.5, height * 0.5),
            },
            layer,
            mask,
            is_trigger: false,
            is_static: false,
        }
    }

    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn as_trigger(mut self) -> Self {
        self.is_trigger = true;
        self
    }

    /// Whether this collider's mask includes `layer`.
    pub fn can_collide_with(&self, layer: u32) -> bool {
        self.mask & layer != 0
    }
}

// ============================================================================
// IDENTITY COMPONENTS
// ============================================================================

/// Player progression. Crossing `experience_to_next` triggers the level-up
/// cascade in the combat system.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Player {
    pub level: u32,
    pub experience: u32,
    pub experience_to_next: u32,
    pub kills: u32,
}

impl Player {
    pub fn new() -> Self {
        Self {
            level: 1,
            experience: 0,
            experience_to_next: 100,
            kills: 0,
        }
    }

    pub fn ready_to_level(&self) -> bool {
        self.experience >= self.experience_to_next
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

/// Enemy archetype identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyKind {
    Slime,
    Skeleton,
    Archer,
    Brute,
}

impl EnemyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnemyKind::Slime => "slime",
            EnemyKind::Skeleton => "skeleton",
            EnemyKind::Archer => "archer",
            EnemyKind::Brute => "brute",
        }
    }
}

/// Enemy tag: archetype plus the experience awarded on death.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Enemy {
    pub kind: EnemyKind,
    pub experience_reward: u32,
}

impl Enemy {
    pub fn new(kind: EnemyKind, experience_reward: u32) -> Self {
        Self {
            kind,
            experience_reward,
        }
    }
}

// ============================================================================
// PRESENTATION DATA
// ============================================================================

/// Render data consumed by the external renderer. The simulation core only
/// stores it; nothing here reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sprite {
    pub texture: String,
    pub size: Vec2,
    /// Draw-order layer, higher draws on top.
    pub z_index: i32,
    pub visible: bool,
}

impl Sprite {
    pub fn new(texture: impl Into<String>, width: f32, height: f32) -> Self {
        Self {
            texture: texture.into(),
            size: Vec2::new(width, height),
            z_index: 0,
            visible: true,
        }
    }
}

//! Combat system - attack resolution and the death sweep.
//!
//! Two entry contracts:
//!
//! 1. **Attack requests**, queued on the World (by AI or any external
//!    caller) and drained at the start of this system's pass, so a request
//!    made earlier in the same tick is resolved before the death sweep
//!    below ever runs.
//! 2. **Per-frame death sweep** over every entity with health: anything at
//!    zero goes through the one-shot death path (death event, experience
//!    award, level-up cascade, game-over, deferred destruction).
//!
//! Hit-testing is range plus a facing cone, not real hitbox geometry; the
//! cone check is the observable combat behavior and stays that way.

use glam::Vec2;
use log::debug;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::components::ComponentKind;
use crate::events::{GameEvent, GameOverReason, GameOverStats};
use crate::systems::System;
use crate::world::{AttackRequest, EntityId, World};

pub const COMBAT_PRIORITY: i32 = 30;

/// Uniform damage variance added to strength, in [0, 5).
const DAMAGE_VARIANCE: f32 = 5.0;
/// Damage is never mitigated below this floor.
const MIN_DAMAGE: f32 = 1.0;
/// Half-angle of the attack swing arc.
const ATTACK_CONE_HALF_ANGLE: f32 = std::f32::consts::FRAC_PI_3;

const REQUIRED: &[ComponentKind] = &[ComponentKind::Health];

/// Resolves attacks and runs the death path.
pub struct CombatSystem {
    rng: SmallRng,
}

impl CombatSystem {
    pub fn new() -> Self {
        Self {
            rng: SmallRng::seed_from_u64(0),
        }
    }

    fn resolve_attack(&mut self, world: &mut World, request: AttackRequest, now: f32) {
        let AttackRequest { attacker, target } = request;
        if !world.is_active(attacker) || !world.is_active(target) {
            debug!("attack dropped, stale participant: {:?} -> {:?}", attacker, target);
            return;
        }
        let Some(combat) = world.combat(attacker).copied() else {
            debug!("attack dropped, {:?} has no combat stats", attacker);
            return;
        };
        if !combat.can_attack(now) {
            return;
        }
        let (Some(attacker_transform), Some(target_position)) = (
            world.transform(attacker).copied(),
            world.transform(target).map(|t| t.position),
        ) else {
            return;
        };

        // Range + facing-cone hit test.
        let to_target = target_position - attacker_transform.position;
        let distance = to_target.length();
        if distance > combat.attack_range {
            return;
        }
        if distance > f32::EPSILON {
            let aim = attacker_transform.facing().dot(to_target / distance);
            if aim < ATTACK_CONE_HALF_ANGLE.cos() {
                return;
            }
        }

        // Attacks land on nothing without a health pool to damage.
        if world.health(target).is_none() {
            return;
        }

        let raw = combat.strength + self.rng.random_range(0.0..DAMAGE_VARIANCE);
        let defense = world.combat(target).map(|c| c.defense).unwrap_or(0.0);
        let amount = calculate_damage_received(raw, defense);

        let applied = match world.health_mut(target) {
            Some(health) => health.take_damage(amount, now),
            None => return,
        };
        if let Some(combat) = world.combat_mut(attacker) {
            combat.last_attack_at = now;
        }
        world.events_mut().emit(GameEvent::DamageDealt {
            attacker,
            target,
            amount: applied,
        });
    }

    /// One-shot death path. The caller has already checked `is_active`, and
    /// `World::kill` flips the flag, so re-triggering is impossible within
    /// or across frames.
    fn handle_death(&mut self, world: &mut World, id: EntityId) {
        let position = world
            .transform(id)
            .map(|t| t.position)
            .unwrap_or(Vec2::ZERO);
        world
            .events_mut()
            .emit(GameEvent::EntityDied { entity: id, position });

        if let Some(enemy) = world.enemy(id).copied() {
            world.events_mut().emit(GameEvent::EnemyKilled {
                entity: id,
                kind: enemy.kind,
                experience_reward: enemy.experience_reward,
            });
            let slayer = world
                .query(&[ComponentKind::Player])
                .into_iter()
                .next();
            if let Some(player_id) = slayer {
                if let Some(player) = world.player_mut(player_id) {
                    player.kills += 1;
                }
                award_experience(world, player_id, enemy.experience_reward);
            }
        }

        if let Some(player) = world.player(id).copied() {
            world.events_mut().emit(GameEvent::GameOver {
                reason: GameOverReason::PlayerDied,
                stats: GameOverStats {
                    level: player.level,
                    experience: player.experience,
                    kills: player.kills,
                },
            });
        }

        world.kill(id);
    }
}

impl Default for CombatSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for CombatSystem {
    fn name(&self) -> &'static str {
        "combat"
    }

    fn priority(&self) -> i32 {
        COMBAT_PRIORITY
    }

    fn required(&self) -> &'static [ComponentKind] {
        REQUIRED
    }

    fn init(&mut self, world: &mut World) {
        self.rng = SmallRng::seed_from_u64(world.config().rng_seed);
    }

    fn update(&mut self, world: &mut World, entities: &[EntityId], _dt: f32) {
        let now = world.time();

        for request in world.take_attack_requests() {
            self.resolve_attack(world, request, now);
        }

        for &id in entities {
            if !world.is_active(id) {
                continue;
            }
            let dead = world.health(id).map(|h| !h.is_alive()).unwrap_or(false);
            if dead {
                self.handle_death(world, id);
            }
        }
    }
}

/// Mitigated damage: `max(1, raw - defense)`. Defense can never reduce a
/// hit below 1.
pub fn calculate_damage_received(raw: f32, defense: f32) -> f32 {
    (raw - defense).max(MIN_DAMAGE)
}

/// Grant experience, firing `ExperienceGained` and running the level-up
/// cascade while the threshold keeps being crossed (the remainder carries).
fn award_experience(world: &mut World, player_id: EntityId, amount: u32) {
    let Some(player) = world.player_mut(player_id) else {
        return;
    };
    player.experience = player.experience.saturating_add(amount);
    let (current, to_next) = (player.experience, player.experience_to_next);
    world.events_mut().emit(GameEvent::ExperienceGained {
        amount,
        current,
        to_next,
    });

    while world
        .player(player_id)
        .map(|p| p.ready_to_level())
        .unwrap_or(false)
    {
        level_up(world, player_id);
    }
}

/// Apply one level: carry the experience remainder, scale the threshold by
/// the configured growth (floored), add flat stat gains, and fully restore
/// health - the full heal is intentional level-up behavior, not healing
/// logic.
fn level_up(world: &mut World, player_id: EntityId) {
    let config = world.config();
    let xp_growth = config.xp_growth;
    let strength_gain = config.levelup_strength_gain;
    let defense_gain = config.levelup_defense_gain;
    let max_health_gain = config.levelup_max_health_gain;
    let stat_points = config.levelup_stat_points;

    let Some(player) = world.player_mut(player_id) else {
        return;
    };
    player.level += 1;
    player.experience -= player.experience_to_next;
    player.experience_to_next = (player.experience_to_next as f32 * xp_growth).floor() as u32;
    let new_level = player.level;

    if let Some(combat) = world.combat_mut(player_id) {
        combat.strength += strength_gain;
        combat.defense += defense_gain;
    }
    if let Some(health) = world.health_mut(player_id) {
        health.max += max_health_gain;
        health.restore_full();
    }

    world.events_mut().emit(GameEvent::PlayerLevelUp {
        new_level,
        stat_points,
    });
}

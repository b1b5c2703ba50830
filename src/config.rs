//! Simulation tuning knobs.

use serde::{Deserialize, Serialize};

/// Configuration for the simulation core.
///
/// Constructed by the caller and handed to `World::with_config` or
/// `Sim::with_config`; there are no globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Fixed timestep in seconds used by the `Sim` facade (1/60 = 60 Hz).
    pub fixed_timestep: f32,
    /// Broad-phase grid cell size in world units.
    pub grid_cell_size: f32,
    /// Speed below which friction snaps velocity to exact zero.
    pub velocity_epsilon: f32,
    /// Seed for the combat RNG. Same seed + same inputs = same battle.
    pub rng_seed: u64,
    /// Experience-to-next multiplier applied on level-up (floored to int).
    pub xp_growth: f32,
    /// Flat strength gained per level.
    pub levelup_strength_gain: f32,
    /// Flat defense gained per level.
    pub levelup_defense_gain: f32,
    /// Flat max-health gained per level (health is fully restored too).
    pub levelup_max_health_gain: f32,
    /// Stat points reported to the UI per level-up.
    pub levelup_stat_points: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 60.0,
            grid_cell_size: 100.0,
            velocity_epsilon: 0.5,
            rng_seed: 0x_E3B0_C442,
            xp_growth: 1.5,
            levelup_strength_gain: 2.0,
            levelup_defense_gain: 1.0,
            levelup_max_health_gain: 10.0,
            levelup_stat_points: 3,
        }
    }
}

//! Gull Toss - a first-person island game
//!
//! Core modules:
//! - `sim`: Real-time simulation (flight paths, physics world, projectiles, hit resolution)
//! - `assets`: Asynchronous asset completions with placeholder hot-swapping
//! - `controls`: Pointer-lock style camera controller
//! - `settings`: Data-driven game configuration
//! - `records`: Best clear-time leaderboard

pub mod assets;
pub mod controls;
pub mod records;
pub mod settings;
pub mod sim;

pub use records::BestTimes;
pub use settings::{GameConfig, QualityPreset};

use glam::Vec3;

/// Game configuration constants
pub mod consts {
    /// Fixed physics timestep (60 Hz)
    pub const FIXED_DT: f32 = 1.0 / 60.0;
    /// Maximum physics steps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 3;
    /// Solver iterations per physics step
    pub const SOLVER_ITERATIONS: u32 = 4;
    /// Longest frame fed to the simulation (seconds)
    pub const MAX_FRAME_DT: f32 = 0.1;
    /// Gravity (m/s², applied along -Y)
    pub const GRAVITY: f32 = 9.82;

    /// Number of seagulls per round
    pub const SEAGULL_COUNT: u32 = 5;
    /// Seagull path speed range (loops per second)
    pub const SEAGULL_MIN_SPEED: f32 = 0.02;
    pub const SEAGULL_MAX_SPEED: f32 = 0.05;
    /// Collider radius attached to each seagull
    pub const SEAGULL_RADIUS: f32 = 1.5;
    /// Flight paths use between 5 and 7 control points
    pub const PATH_MIN_POINTS: usize = 5;
    pub const PATH_MAX_POINTS: usize = 7;
    /// Orientation lookahead along the path (fraction of a loop)
    pub const PATH_LOOKAHEAD: f32 = 0.05;
    /// Roll per unit of lateral direction (banks opposite the turn)
    pub const BANK_FACTOR: f32 = 0.5;
    /// Pitch per unit of vertical direction
    pub const PITCH_FACTOR: f32 = 0.3;
    /// Below this lookahead distance the orientation is left untouched
    pub const DIRECTION_EPSILON: f32 = 1e-4;

    /// Ball defaults
    pub const BALL_RADIUS: f32 = 0.2;
    pub const BALL_MASS: f32 = 1.0;
    pub const BALL_LIFETIME_MS: f64 = 5000.0;
    pub const THROW_SPEED: f32 = 25.0;
    /// Extra upward velocity added to camera throws
    pub const THROW_LIFT: f32 = 2.0;

    /// Fraction of velocity kept on a bounce
    pub const BOUNCE_FACTOR: f32 = 0.6;
    /// Horizontal velocity kept on a ground bounce
    pub const GROUND_FRICTION: f32 = 0.95;
    /// Vertical speeds below this after a ground bounce are zeroed
    pub const BOUNCE_SQUELCH: f32 = 0.5;
    /// Squared speed below which a ball comes to rest
    pub const REST_SPEED_SQ: f32 = 1e-3;
    /// Surfaces whose normal has at least this much +Y can hold a resting ball
    pub const FLOOR_NORMAL_Y: f32 = 0.7;
    /// Offset along the surface normal after a bounce
    pub const SURFACE_OFFSET: f32 = 0.01;

    /// Collidable set rebuild interval
    pub const COLLIDABLE_REFRESH_MS: f64 = 500.0;
    /// Objects beyond this distance from the camera are culled
    pub const CULL_DISTANCE: f32 = 200.0;
}

/// Wrap a path parameter into [0, 1)
#[inline]
pub fn wrap_unit(t: f32) -> f32 {
    let wrapped = t.rem_euclid(1.0);
    // rem_euclid can round up to exactly 1.0 for tiny negative inputs
    if wrapped >= 1.0 { 0.0 } else { wrapped }
}

/// Reflect a velocity about a unit surface normal
#[inline]
pub fn reflect(vel: Vec3, normal: Vec3) -> Vec3 {
    vel - 2.0 * vel.dot(normal) * normal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_unit() {
        assert_eq!(wrap_unit(0.25), 0.25);
        assert!((wrap_unit(1.25) - 0.25).abs() < 1e-6);
        assert!((wrap_unit(-0.25) - 0.75).abs() < 1e-6);
        assert_eq!(wrap_unit(1.0), 0.0);
        assert!(wrap_unit(-1e-9) < 1.0);
    }

    #[test]
    fn test_reflect_floor() {
        let out = reflect(Vec3::new(1.0, -1.0, 0.0), Vec3::Y);
        assert!((out - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-6);
    }
}

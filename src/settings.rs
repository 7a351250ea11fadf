//! Game configuration
//!
//! Persisted in LocalStorage on the web; natively the defaults are used
//! unless a JSON document is supplied.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::*;
use crate::sim::flight_path::FlightBounds;
use crate::sim::hit_resolver::BounceParams;
use crate::sim::physics::PhysicsConfig;
use crate::sim::projectile::{CollisionMode, ProjectileSpec};

/// Configuration problems
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Quality preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "Low",
            QualityPreset::Medium => "Medium",
            QualityPreset::High => "High",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(QualityPreset::Low),
            "medium" | "med" => Some(QualityPreset::Medium),
            "high" => Some(QualityPreset::High),
            _ => None,
        }
    }

    /// Cull distance multiplier
    pub fn view_distance_scale(&self) -> f32 {
        match self {
            QualityPreset::Low => 0.5,
            QualityPreset::Medium => 1.0,
            QualityPreset::High => 1.5,
        }
    }
}

/// Every gameplay tunable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// RNG seed for flight paths and speeds
    pub seed: u64,
    pub quality: QualityPreset,

    // === Seagulls ===
    pub seagull_count: u32,
    pub seagull_min_speed: f32,
    pub seagull_max_speed: f32,
    pub flight_bounds: FlightBounds,
    pub seagull_model_url: String,

    // === Projectiles ===
    pub throw_speed: f32,
    pub throw_mode: CollisionMode,
    pub projectile: ProjectileSpec,
    pub bounce: BounceParams,
    pub collidable_refresh_ms: f64,

    // === World ===
    pub physics: PhysicsConfig,
    pub cull_distance: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EA6_0115,
            quality: QualityPreset::Medium,

            seagull_count: SEAGULL_COUNT,
            seagull_min_speed: SEAGULL_MIN_SPEED,
            seagull_max_speed: SEAGULL_MAX_SPEED,
            flight_bounds: FlightBounds::default(),
            seagull_model_url: "assets/seagull.json".to_string(),

            throw_speed: THROW_SPEED,
            throw_mode: CollisionMode::Raycast,
            projectile: ProjectileSpec::default(),
            bounce: BounceParams::default(),
            collidable_refresh_ms: COLLIDABLE_REFRESH_MS,

            physics: PhysicsConfig::default(),
            cull_distance: CULL_DISTANCE,
        }
    }
}

impl GameConfig {
    /// LocalStorage key
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "gull_toss_config";

    /// Parse and validate a JSON config; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.seagull_count == 0 {
            return Err(ConfigError::Invalid("seagull_count must be at least 1".into()));
        }
        if !(self.seagull_min_speed >= 0.0 && self.seagull_min_speed <= self.seagull_max_speed) {
            return Err(ConfigError::Invalid(format!(
                "seagull speed range {}..{} is empty",
                self.seagull_min_speed, self.seagull_max_speed
            )));
        }
        if !(self.projectile.lifetime_ms > 0.0) {
            return Err(ConfigError::Invalid("projectile lifetime must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.bounce.bounce_factor) {
            return Err(ConfigError::Invalid("bounce_factor must be within [0, 1]".into()));
        }
        if self.physics.max_substeps == 0 || !(self.physics.fixed_dt > 0.0) {
            return Err(ConfigError::Invalid(
                "physics needs a positive fixed_dt and at least one substep".into(),
            ));
        }
        Ok(())
    }

    /// Cull distance after the quality preset is applied, squared
    pub fn cull_distance_sq(&self) -> f32 {
        let d = self.cull_distance * self.quality.view_distance_scale();
        d * d
    }

    /// Load config from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match Self::from_json(&json) {
                    Ok(config) => {
                        log::info!("Loaded config from LocalStorage");
                        return config;
                    }
                    Err(e) => log::warn!("Ignoring stored config: {}", e),
                }
            }
        }

        log::info!("Using default config");
        Self::default()
    }

    /// Save config to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            match self.to_json() {
                Ok(json) => {
                    let _ = storage.set_item(Self::STORAGE_KEY, &json);
                    log::info!("Config saved");
                }
                Err(e) => log::warn!("Config not saved: {}", e),
            }
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}

//! Simulation configuration.
//!
//! Loaded from a TOML file; a missing or invalid file falls back to defaults.

use ballista_gameplay::config::ProtocolConfig;
use ballista_gameplay::stats::ProjectileStats;
use ballista_kernel::dispersion::{DispersionData, DispersionDistribution};
use ballista_kernel::projectile::FlightConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "ballista.toml";

/// A fixed turret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurretConfig {
    /// Muzzle position.
    pub position: [f64; 3],
    /// Launch speed.
    pub speed: f64,
    /// Yaw error, degrees either side.
    pub dispersion_yaw_degrees: f64,
    /// Pitch error, degrees either side.
    pub dispersion_pitch_degrees: f64,
    /// Error sampling shape.
    pub distribution: DispersionDistribution,
    /// Fire every this many ticks.
    pub fire_interval_ticks: u32,
    /// Rounds loaded.
    pub ammo: u32,
    /// Ammo item id.
    pub ammo_item: u32,
    /// Damage multiplier for every shot.
    pub damage_multiplier: f32,
}

impl Default for TurretConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 2.0, 0.0],
            speed: 35.0,
            dispersion_yaw_degrees: 1.5,
            dispersion_pitch_degrees: 1.0,
            distribution: DispersionDistribution::Gaussian,
            fire_interval_ticks: 10,
            ammo: 20,
            ammo_item: 1,
            damage_multiplier: 1.0,
        }
    }
}

impl TurretConfig {
    /// Aim error as dispersion bounds.
    #[must_use]
    pub fn dispersion(&self) -> DispersionData {
        DispersionData::symmetric_degrees(
            self.dispersion_yaw_degrees,
            self.dispersion_pitch_degrees,
            self.distribution,
        )
    }
}

/// A creature placed in the arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreatureConfig {
    /// Centre of the bounding box.
    pub position: [f64; 3],
    /// Constant velocity.
    pub velocity: [f64; 3],
    /// Bounding box half extents.
    pub half_extents: [f64; 3],
    /// Starting health.
    pub health: f32,
}

impl Default for CreatureConfig {
    fn default() -> Self {
        Self {
            position: [25.0, 1.0, 0.0],
            velocity: [0.0, 0.0, 0.0],
            half_extents: [0.4, 1.0, 0.4],
            health: 40.0,
        }
    }
}

/// Simulation configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // === Run Settings ===
    /// Default tracing filter directive
    pub log_directive: String,
    /// RNG seed
    pub seed: u64,
    /// Number of ticks to run
    pub ticks: u32,
    /// Ticks per second
    pub tick_rate: f64,
    /// Seconds before a projectile is despawned (0 = never)
    pub projectile_lifetime: f64,

    // === Arena Settings ===
    /// Blocks with `y` below this are solid
    pub ground_level: i32,
    /// The turret
    pub turret: TurretConfig,
    /// Creatures to shoot at
    pub creatures: Vec<CreatureConfig>,

    // === Projectile Settings ===
    /// Stats of the turret's ammo
    pub projectile: ProjectileStats,
    /// Flight tuning
    pub flight: FlightConfig,
    /// Protocol tuning
    pub protocol: ProtocolConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            log_directive: "ballista=info".to_string(),
            seed: 42,
            ticks: 400,
            tick_rate: 20.0,
            projectile_lifetime: 10.0,

            ground_level: 0,
            turret: TurretConfig::default(),
            creatures: vec![
                CreatureConfig::default(),
                CreatureConfig {
                    position: [30.0, 1.0, -10.0],
                    velocity: [0.0, 0.0, 2.0],
                    ..CreatureConfig::default()
                },
                CreatureConfig {
                    position: [18.0, 1.0, 12.0],
                    velocity: [-1.0, 0.0, 0.0],
                    health: 60.0,
                    ..CreatureConfig::default()
                },
            ],

            projectile: ProjectileStats::default(),
            flight: FlightConfig::default(),
            protocol: ProtocolConfig::default(),
        }
    }
}

impl SimConfig {
    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }

                match toml::from_str(&contents) {
                    Ok(config) => {
                        info!("Loaded config from {}", path.display());
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse config file: {e}");
                        Self::default()
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Clamp values to sensible ranges.
    pub fn validate(&mut self) {
        self.tick_rate = self.tick_rate.clamp(1.0, 1000.0);
        self.turret.fire_interval_ticks = self.turret.fire_interval_ticks.max(1);
        self.turret.speed = self.turret.speed.max(0.1);
        self.projectile_lifetime = self.projectile_lifetime.max(0.0);
    }

    /// Seconds per tick.
    #[must_use]
    pub fn dt(&self) -> f64 {
        1.0 / self.tick_rate
    }
}

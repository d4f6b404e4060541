//! Episode configuration.
//!
//! Every tunable of the simulation lives here so nothing is hard coded in the
//! tick path: world geometry, kinematics, gate geometry and cadence, the
//! reward scheme, and the training loop parameters. Documents are JSON and
//! merge field by field over the defaults, which mirror the classic
//! 500x760-pixel corridor.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

/// Rejected configuration values.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("world dimensions must be positive, got {width}x{height}")]
    EmptyWorld { width: u32, height: u32 },
    #[error("bird footprint must be positive, got {width}x{height}")]
    EmptyBirdFootprint { width: u32, height: u32 },
    #[error("bird spawn x must be positive, got {0}")]
    NonPositiveSpawnX(f64),
    #[error("pipe footprint must be positive, got {width}x{height}")]
    EmptyPipeFootprint { width: u32, height: u32 },
    #[error("pipe speed must be positive, got {0}")]
    NonPositivePipeSpeed(f64),
    #[error("floor speed must not be negative, got {0}")]
    NegativeFloorSpeed(f64),
    #[error("floor panel width must be positive, got {0}")]
    NonPositiveFloorPanel(f64),
    #[error("gate range is empty: min {min}, max {max}")]
    EmptyGateRange { min: f64, max: f64 },
    #[error("gate gap must be positive, got {0}")]
    NonPositiveGap(f64),
    #[error("gate band cannot fit the gap above the floor: {max} + {gap} exceeds {floor}")]
    GateBandTooLow { max: f64, gap: f64, floor: f64 },
    #[error("jump threshold must lie in [0, 1], got {0}")]
    JumpThresholdOutOfRange(f64),
}

/// Rendering bounds reported on every frame.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 500,
            height: 760,
        }
    }
}

/// Scrolling floor strip at the bottom of the corridor.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct FloorConfig {
    /// Height of the kill line; an agent dies when its footprint crosses it.
    pub y: f64,
    pub speed: f64,
    /// Width of one floor panel; the scroll offset wraps at this value.
    pub panel_width: f64,
}

impl Default for FloorConfig {
    fn default() -> Self {
        Self {
            y: 730.0,
            speed: 5.0,
            panel_width: 672.0,
        }
    }
}

/// Agent spawn point, footprint, and kinematics.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct BirdConfig {
    pub spawn_x: f64,
    pub spawn_y: f64,
    pub width: u32,
    pub height: u32,
    /// Quadratic coefficient of the displacement curve.
    pub gravity: f64,
    /// Velocity set by a jump; negative is up.
    pub jump_impulse: f64,
    /// Largest downward displacement per tick.
    pub terminal_velocity: f64,
    /// Extra displacement applied to any upward move.
    pub rise_adjust: f64,
    pub max_tilt: f64,
    pub tilt_step: f64,
    /// Band above the launch height within which the climb tilt holds.
    pub climb_window: f64,
}

impl Default for BirdConfig {
    fn default() -> Self {
        Self {
            spawn_x: 230.0,
            spawn_y: 350.0,
            width: 68,
            height: 48,
            gravity: 1.5,
            jump_impulse: -10.5,
            terminal_velocity: 16.0,
            rise_adjust: 2.0,
            max_tilt: 25.0,
            tilt_step: 20.0,
            climb_window: 50.0,
        }
    }
}

/// Gate geometry and cadence.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipeConfig {
    pub width: u32,
    /// Height of one gate footprint sprite.
    pub height: u32,
    /// Rows of the full-width cap lip at the gap end of each footprint.
    pub cap_height: u32,
    /// Cells the shaft is inset from each side relative to the cap.
    pub shaft_inset: u32,
    pub speed: f64,
    /// Vertical opening between the two footprints.
    pub gap: f64,
    /// Sampling range for the gap's top edge.
    pub gate_min: f64,
    pub gate_max: f64,
    /// X of the gate seeded at episode start.
    pub initial_x: f64,
    /// X where replacement gates enter after a pass.
    pub spawn_x: f64,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            width: 104,
            height: 640,
            cap_height: 40,
            shaft_inset: 4,
            speed: 12.0,
            gap: 200.0,
            gate_min: 50.0,
            gate_max: 450.0,
            initial_x: 700.0,
            spawn_x: 600.0,
        }
    }
}

/// Reward scheme applied by the fitness ledger.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct FitnessConfig {
    /// Credited to every live agent every tick.
    pub survival_reward: f64,
    /// Credited to every live agent when the cohort clears a gate.
    pub pass_reward: f64,
    /// Deducted once when an agent is eliminated.
    pub elimination_penalty: f64,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            survival_reward: 0.1,
            pass_reward: 5.0,
            elimination_penalty: 1.0,
        }
    }
}

/// Training-loop parameters.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    pub population: usize,
    pub max_generations: u32,
    /// Policy outputs above this trigger a jump.
    pub jump_threshold: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            population: 50,
            max_generations: 50,
            jump_threshold: 0.5,
        }
    }
}

/// Root configuration document.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlockConfig {
    pub world: WorldConfig,
    pub floor: FloorConfig,
    pub bird: BirdConfig,
    pub pipe: PipeConfig,
    pub fitness: FitnessConfig,
    pub training: TrainingConfig,
    pub seed: u64,
}

impl FlockConfig {
    /// Load a config JSON document from disk and validate it.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed to open config file {:?}", path))?;
        Self::from_reader(BufReader::new(file))
    }

    /// Deserialize and validate a config document from an arbitrary reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let config: Self = serde_json::from_reader(reader).context("invalid config json")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject documents no episode could run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world.width == 0 || self.world.height == 0 {
            return Err(ConfigError::EmptyWorld {
                width: self.world.width,
                height: self.world.height,
            });
        }
        if self.bird.width == 0 || self.bird.height == 0 {
            return Err(ConfigError::EmptyBirdFootprint {
                width: self.bird.width,
                height: self.bird.height,
            });
        }
        if !(self.bird.spawn_x > 0.0) {
            return Err(ConfigError::NonPositiveSpawnX(self.bird.spawn_x));
        }
        if self.pipe.width == 0 || self.pipe.height == 0 {
            return Err(ConfigError::EmptyPipeFootprint {
                width: self.pipe.width,
                height: self.pipe.height,
            });
        }
        if !(self.pipe.speed > 0.0) {
            return Err(ConfigError::NonPositivePipeSpeed(self.pipe.speed));
        }
        if !(self.floor.speed >= 0.0) {
            return Err(ConfigError::NegativeFloorSpeed(self.floor.speed));
        }
        if !(self.floor.panel_width > 0.0) {
            return Err(ConfigError::NonPositiveFloorPanel(self.floor.panel_width));
        }
        if !(self.pipe.gate_min < self.pipe.gate_max) {
            return Err(ConfigError::EmptyGateRange {
                min: self.pipe.gate_min,
                max: self.pipe.gate_max,
            });
        }
        if !(self.pipe.gap > 0.0) {
            return Err(ConfigError::NonPositiveGap(self.pipe.gap));
        }
        if !(self.pipe.gate_max + self.pipe.gap <= self.floor.y) {
            return Err(ConfigError::GateBandTooLow {
                max: self.pipe.gate_max,
                gap: self.pipe.gap,
                floor: self.floor.y,
            });
        }
        if !(0.0..=1.0).contains(&self.training.jump_threshold) {
            return Err(ConfigError::JumpThresholdOutOfRange(
                self.training.jump_threshold,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use proptest::prelude::*;

    use super::{ConfigError, FlockConfig};

    #[test]
    fn defaults_validate() {
        assert_eq!(FlockConfig::default().validate(), Ok(()));
    }

    #[test]
    fn empty_document_means_all_defaults() {
        let config = FlockConfig::from_reader("{}".as_bytes()).expect("defaults load");
        assert_eq!(config, FlockConfig::default());
    }

    #[test]
    fn partial_sections_merge_over_defaults() {
        let json = r#"{
            "floor": {"y": 1200.0},
            "pipe": {"speed": 9.0},
            "seed": 7
        }"#;
        let config = FlockConfig::from_reader(json.as_bytes()).expect("partial config loads");
        assert_eq!(config.floor.y, 1200.0);
        assert_eq!(config.floor.speed, 5.0);
        assert_eq!(config.pipe.speed, 9.0);
        assert_eq!(config.pipe.gap, 200.0);
        assert_eq!(config.seed, 7);
    }

    #[test]
    fn repository_configs_deserialize() {
        let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let config_dir = manifest_dir.join("../../testdata/config");
        for name in ["default.json", "tall_corridor.json"] {
            let path = config_dir.join(name);
            let config = FlockConfig::load_from_path(&path)
                .unwrap_or_else(|err| panic!("failed to load {:?}: {}", path, err));
            assert_eq!(config.validate(), Ok(()), "config {:?} must validate", path);
        }
    }

    #[test]
    fn inverted_gate_range_is_rejected() {
        let mut config = FlockConfig::default();
        config.pipe.gate_min = 450.0;
        config.pipe.gate_max = 50.0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::EmptyGateRange {
                min: 450.0,
                max: 50.0
            })
        );
    }

    #[test]
    fn gate_band_must_leave_room_for_the_gap() {
        let mut config = FlockConfig::default();
        config.pipe.gate_max = 600.0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::GateBandTooLow {
                max: 600.0,
                gap: 200.0,
                floor: 730.0
            })
        );
    }

    #[test]
    fn zero_speed_is_rejected() {
        let mut config = FlockConfig::default();
        config.pipe.speed = 0.0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositivePipeSpeed(0.0))
        );
    }

    #[test]
    fn zero_footprints_are_rejected() {
        let mut config = FlockConfig::default();
        config.bird.width = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyBirdFootprint { .. })
        ));

        let mut config = FlockConfig::default();
        config.pipe.height = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyPipeFootprint { .. })
        ));
    }

    // a bird on or left of the world edge could watch the last gate retire
    // without ever passing it, leaving the corridor empty mid-episode
    #[test]
    fn spawn_on_the_left_boundary_is_rejected() {
        let mut config = FlockConfig::default();
        config.bird.spawn_x = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveSpawnX(0.0)));

        config.bird.spawn_x = -3.0;
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveSpawnX(-3.0)));
    }

    proptest! {
        #[test]
        fn validation_tracks_the_speed_and_threshold_predicates(
            pipe_speed in -20.0f64..20.0,
            threshold in -1.0f64..2.0,
        ) {
            let mut config = FlockConfig::default();
            config.pipe.speed = pipe_speed;
            config.training.jump_threshold = threshold;
            let verdict = config.validate();
            if pipe_speed > 0.0 && (0.0..=1.0).contains(&threshold) {
                prop_assert_eq!(verdict, Ok(()));
            } else {
                prop_assert!(verdict.is_err());
            }
        }
    }
}

//! Rack configuration
//!
//! This module provides:
//! - Engine and rack configuration with TOML serialization
//! - Built-in factory racks selectable by name
//! - Validation of values the processors cannot repair on their own

use crate::domain::chain::{ProcessorChain, ProcessorKind};
use crate::domain::dsp::params::{MIX_MAX, MIX_MIN, PCT_MAX, PCT_MIN, POT_MAX, POT_MIN};
use crate::domain::dsp::{
    AnalogClipperParameters, AnalogToneParameters, AutoQParameters, DelayAlgorithm,
    DelayUpdateType, DigitalDelayParameters, DuckingParameters, PhaserParameters,
    SideChainParameters,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// File name looked up under the user config directory
pub const CONFIG_FILE_NAME: &str = "rack.toml";

/// Right/left delay ratio used by the `reliq` rack (%)
pub const GOLDEN_RATIO_PCT: f64 = 61.8;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Preset not found: {0}")]
    PresetNotFound(String),
}

/// Stream settings the rack is built for
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per processing block
    pub block_size: u32,
    /// Delay line length allocated for every delay in the chain
    pub max_delay_ms: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
            block_size: 512,
            max_delay_ms: 2000.0,
        }
    }
}

/// Complete rack configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RackConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub chain: ProcessorChain,
}

impl RackConfig {
    /// Names accepted by `preset`
    pub const PRESET_NAMES: [&'static str; 6] =
        ["auto_q", "phaser", "reliq", "memento", "howler", "factory_default"];

    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        debug!(processors = config.chain.len(), "Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    /// Load `path`, or the factory default if it does not exist
    #[instrument(skip(path))]
    pub async fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await? {
            Self::load_from_file(path).await
        } else {
            info!(path = %path.display(), "Config file not found, using factory default");
            Ok(Self::factory_default())
        }
    }

    /// `rack.toml` under the platform config directory
    ///
    /// Returns `~/.config/pedalboard/rack.toml` on Linux
    pub fn default_config_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("pedalboard").join(CONFIG_FILE_NAME))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    /// Reject values no processor can run with
    pub fn validate(&self) -> Result<()> {
        let engine = &self.engine;
        if engine.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".to_string()));
        }
        if engine.channels == 0 {
            return Err(ConfigError::Invalid("channels must be positive".to_string()));
        }
        if engine.block_size == 0 {
            return Err(ConfigError::Invalid("block_size must be positive".to_string()));
        }
        if !engine.max_delay_ms.is_finite() || engine.max_delay_ms <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "max_delay_ms must be positive and finite, got {}",
                engine.max_delay_ms
            )));
        }

        for (index, kind) in self.chain.kinds().iter().enumerate() {
            validate_kind(kind, engine.max_delay_ms)
                .map_err(|reason| ConfigError::Invalid(format!("processor {index} ({}): {reason}", kind.name())))?;
        }
        Ok(())
    }

    /// Built-in rack by name
    pub fn preset(name: &str) -> Result<Self> {
        let mut chain = ProcessorChain::new();
        match name {
            "auto_q" => chain.add(ProcessorKind::AutoQ(AutoQParameters::default())),
            "phaser" => chain.add(ProcessorKind::Phaser(PhaserParameters {
                lfo_rate_hz: 0.2,
                lfo_depth_pct: 50.0,
                intensity_pct: 75.0,
                ..Default::default()
            })),
            "reliq" => chain.add(ProcessorKind::DigitalDelay(DigitalDelayParameters {
                algorithm: DelayAlgorithm::PingPong,
                update_type: DelayUpdateType::LeftPlusRatio,
                left_delay_ms: 250.0,
                delay_ratio_pct: GOLDEN_RATIO_PCT,
                feedback_pct: 50.0,
                ..Default::default()
            })),
            "memento" => chain.add(ProcessorKind::DigitalDelay(DigitalDelayParameters {
                left_delay_ms: 375.0,
                right_delay_ms: 375.0,
                feedback_pct: 40.0,
                emulate_analog: true,
                side_chain: SideChainParameters::Ducking(DuckingParameters::default()),
                ..Default::default()
            })),
            "howler" | "factory_default" => return Ok(Self::factory_default()),
            other => {
                warn!(name = other, "Unknown preset requested");
                return Err(ConfigError::PresetNotFound(other.to_string()));
            }
        }

        Ok(Self {
            engine: EngineConfig::default(),
            chain,
        })
    }

    /// Factory default rack: tone stack into diode clipper
    pub fn factory_default() -> Self {
        let mut chain = ProcessorChain::new();
        chain.add(ProcessorKind::AnalogTone(AnalogToneParameters {
            tone: 0.5,
            level: 1.0,
        }));
        chain.add(ProcessorKind::AnalogClipper(AnalogClipperParameters { drive: 0.5 }));
        Self {
            engine: EngineConfig::default(),
            chain,
        }
    }
}

fn in_range(value: f64, min: f64, max: f64) -> bool {
    (min..=max).contains(&value)
}

fn validate_kind(kind: &ProcessorKind, max_delay_ms: f64) -> std::result::Result<(), String> {
    match kind {
        ProcessorKind::DigitalDelay(p) => {
            if !in_range(p.mix, MIX_MIN, MIX_MAX) {
                return Err(format!("mix {} outside [{MIX_MIN}, {MIX_MAX}]", p.mix));
            }
            let longest = p.left_delay_ms.max(p.right_delay_ms);
            if !longest.is_finite() || p.left_delay_ms < 0.0 || p.right_delay_ms < 0.0 {
                return Err("delay times must be finite and non-negative".to_string());
            }
            if longest > max_delay_ms {
                return Err(format!("delay {longest} ms exceeds max_delay_ms {max_delay_ms}"));
            }
        }
        ProcessorKind::Phaser(p) => {
            if !in_range(p.lfo_depth_pct, PCT_MIN, PCT_MAX) || !in_range(p.intensity_pct, PCT_MIN, PCT_MAX) {
                return Err("depth and intensity must be percentages".to_string());
            }
        }
        ProcessorKind::AnalogTone(p) => {
            if !in_range(p.tone, POT_MIN, POT_MAX) || !in_range(p.level, POT_MIN, POT_MAX) {
                return Err("tone and level must be within [0, 1]".to_string());
            }
        }
        ProcessorKind::AnalogClipper(p) => {
            if !in_range(p.drive, POT_MIN, POT_MAX) {
                return Err(format!("drive {} outside [0, 1]", p.drive));
            }
        }
        ProcessorKind::Filter(_)
        | ProcessorKind::Biquad(_)
        | ProcessorKind::Detector(_)
        | ProcessorKind::AutoQ(_) => {}
    }
    Ok(())
}

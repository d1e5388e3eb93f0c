use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use softpwm_core::{ChannelId, EngineConfig, IdleStrategy, Pin};
use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub pwm: PwmSettings,
    pub sink: SinkSettings,
    pub fade: FadeSettings,
    pub channels: Vec<ChannelSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PwmSettings {
    pub frequency_hz: u32,
    pub idle_park_us: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinkSettings {
    pub spin_threshold_us: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FadeSettings {
    pub range: u32,
    pub step_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelSettings {
    pub id: ChannelId,
    pub pins: Vec<Pin>,
}

impl PwmSettings {
    pub fn engine_config(&self) -> EngineConfig {
        let idle = match self.idle_park_us {
            0 => IdleStrategy::Spin,
            us => IdleStrategy::Park(Duration::from_micros(us)),
        };
        EngineConfig {
            frequency_hz: self.frequency_hz,
            idle,
        }
    }
}

impl Settings {
    /// Every pin used by any channel, in configuration order.
    pub fn all_pins(&self) -> Vec<Pin> {
        self.channels
            .iter()
            .flat_map(|channel| channel.pins.iter().copied())
            .collect()
    }
}

/// Loads `config/default.toml`, then applies `SOFTPWM_*` environment overrides.
pub fn load_config() -> Result<Settings, ConfigError> {
    info!("Attempting to load configuration from {}", DEFAULT_CONFIG_PATH);

    let settings: Result<Settings, ConfigError> = Config::builder()
        .add_source(File::new(DEFAULT_CONFIG_PATH, FileFormat::Toml).required(true))
        .add_source(
            Environment::with_prefix("SOFTPWM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .and_then(|config| config.try_deserialize());

    match settings {
        Ok(settings) => {
            info!("Successfully loaded configuration: {:?}", settings);
            Ok(settings)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

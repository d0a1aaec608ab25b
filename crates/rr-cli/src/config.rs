//! Configuration loading and management.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use rr_core::types::CircuitId;
use rr_core::{CautionConfig, EngineConfig, PlaybackConfig, ReconstructConfig};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the pit-decision service; advisories are disabled
    /// without it.
    pub classifier_url: Option<String>,

    /// Circuit the loaded logs were recorded on.
    pub circuit: String,

    /// Circuit-name to classifier-code lookup, as published by the
    /// classifier's training pipeline.
    pub circuits: HashMap<String, i64>,

    /// Engine tuning knobs.
    pub engine: EngineSettings,
}

/// Engine thresholds exposed through the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Windowed mean speed below this opens a caution.
    pub caution_speed_threshold: f64,
    /// Caution averaging window, seconds.
    pub caution_window_secs: i64,
    /// Cautions shorter than this are discarded, seconds.
    pub caution_min_duration_secs: i64,
    /// A `lap_distance` drop larger than this counts as a lap reset.
    pub lap_reset_threshold: f64,
    /// Trailing readings kept per signal for condition estimates.
    pub trailing_window: usize,
    /// Distance-to-time ratio for gap estimates, meters per second.
    pub gap_meters_per_second: f64,
    /// Events revealed per tick at rate 1.
    pub base_increment: usize,
    /// Highest accepted playback rate.
    pub max_rate: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let caution = CautionConfig::default();
        let reconstruct = ReconstructConfig::default();
        let playback = PlaybackConfig::default();
        Self {
            caution_speed_threshold: caution.speed_threshold,
            caution_window_secs: caution.window_secs,
            caution_min_duration_secs: caution.min_duration_secs,
            lap_reset_threshold: reconstruct.lap_reset_threshold,
            trailing_window: reconstruct.trailing_window,
            gap_meters_per_second: reconstruct.gap_meters_per_second,
            base_increment: playback.base_increment,
            max_rate: playback.max_rate,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        // Codes follow the classifier's label encoding: alphabetical over
        // the circuits it was trained on.
        let circuits = HashMap::from([
            ("barber".to_string(), 0),
            ("indianapolis".to_string(), 1),
            ("road_america".to_string(), 2),
        ]);
        Self {
            classifier_url: None,
            circuit: "indianapolis".to_string(),
            circuits,
            engine: EngineSettings::default(),
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (RR_*)
        figment = figment.merge(Env::prefixed("RR_"));

        figment.extract()
    }

    /// The engine configuration assembled from the settings.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            caution: CautionConfig {
                speed_threshold: self.engine.caution_speed_threshold,
                window_secs: self.engine.caution_window_secs,
                min_duration_secs: self.engine.caution_min_duration_secs,
            },
            playback: PlaybackConfig {
                base_increment: self.engine.base_increment,
                max_rate: self.engine.max_rate,
            },
            reconstruct: ReconstructConfig {
                lap_reset_threshold: self.engine.lap_reset_threshold,
                trailing_window: self.engine.trailing_window,
                gap_meters_per_second: self.engine.gap_meters_per_second,
            },
        }
    }

    /// The configured circuit as a validated ID.
    pub fn circuit_id(&self) -> Result<CircuitId, rr_core::ValidationError> {
        CircuitId::new(self.circuit.clone())
    }

    /// Classifier code for the configured circuit; unknown circuits fall
    /// back to 0 with a warning.
    #[must_use]
    pub fn circuit_code(&self) -> i64 {
        self.circuits.get(&self.circuit).copied().unwrap_or_else(|| {
            tracing::warn!(circuit = %self.circuit, "circuit missing from lookup table, using code 0");
            0
        })
    }
}

/// Returns the platform-specific config directory for rr.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("rr"))
}

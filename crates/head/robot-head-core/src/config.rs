//! Session configuration.
//!
//! Built once at program start (defaults, a JSON file, CLI overrides) and
//! passed by reference to whatever needs it. Every field has a default, so a
//! partial file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::mapper::MapperConfig;
use crate::speech::SpeechTiming;

/// Top-level configuration for a head session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadConfig {
    pub transport: TransportConfig,
    pub playback: PlaybackConfig,
    pub mapper: MapperConfig,
    pub speech: SpeechTiming,
}

impl HeadConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}

/// Which transport variant the session drives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Simulation: commands are logged, nothing leaves the process.
    Logging {
        #[serde(default = "default_logging_label")]
        label: String,
    },
    /// A serial device node.
    Serial {
        path: PathBuf,
        #[serde(default = "default_baud")]
        baud: u32,
    },
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Logging {
            label: default_logging_label(),
        }
    }
}

fn default_logging_label() -> String {
    "mock".to_string()
}

fn default_baud() -> u32 {
    9600
}

/// Playback pacing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Delay applied to frames whose source carries no timing.
    pub default_frame_delay_ms: u64,
}

impl PlaybackConfig {
    #[inline]
    pub fn default_frame_delay(&self) -> Duration {
        Duration::from_millis(self.default_frame_delay_ms)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_frame_delay_ms: 300,
        }
    }
}

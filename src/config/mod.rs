// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! Configuration module

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, Level};

use crate::alerting::HazardPolicy;
use crate::capture::SimulatedScene;
use crate::streaming::StreamingConfig;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application name, shown in the startup banner
    pub app_name: String,

    /// Log level used when no verbosity flag is given
    pub log_level: String,

    /// Replace every camera with a simulated one
    pub demo_mode: bool,

    /// Camera watched for fire and smoke
    pub hazard_camera: SourceConfig,

    /// Camera watched for faces at the front door
    pub identity_camera: SourceConfig,

    /// Hazard alerting
    pub hazard: HazardConfig,

    /// Face identification
    pub identity: IdentityConfig,

    /// Loop timing
    pub pacing: PacingConfig,

    /// Viewer and subscriber transports
    pub streaming: StreamingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "HomeWatch".to_string(),
            log_level: "info".to_string(),
            demo_mode: false,
            hazard_camera: SourceConfig {
                enabled: true,
                index: 0,
                kind: SourceKind::Simulated {
                    scene: SimulatedScene::Kitchen,
                },
            },
            identity_camera: SourceConfig {
                enabled: true,
                index: 1,
                kind: SourceKind::Simulated {
                    scene: SimulatedScene::FrontDoor,
                },
            },
            hazard: HazardConfig::default(),
            identity: IdentityConfig::default(),
            pacing: PacingConfig::default(),
            streaming: StreamingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Reject settings the pipelines cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pacing.target_fps == 0 {
            return Err(anyhow!("pacing.target_fps must be at least 1"));
        }
        if self.pacing.read_timeout_ms == 0 {
            return Err(anyhow!("pacing.read_timeout_ms must be at least 1"));
        }
        if self.log_level().is_none() {
            return Err(anyhow!("log_level {:?} is not a tracing level", self.log_level));
        }
        if !(self.identity.window_secs > 0.0 && self.identity.window_secs.is_finite()) {
            return Err(anyhow!("identity.window_secs must be positive"));
        }
        if !(self.identity.frame_resizing > 0.0 && self.identity.frame_resizing <= 1.0) {
            return Err(anyhow!("identity.frame_resizing must be in (0, 1]"));
        }
        if let HazardPolicy::Cooldown { cooldown_secs } = self.hazard.policy {
            if !(cooldown_secs >= 0.0 && cooldown_secs.is_finite()) {
                return Err(anyhow!("hazard cooldown must be a finite, non-negative number"));
            }
        }
        if !(1..=100).contains(&self.streaming.jpeg_quality) {
            return Err(anyhow!("streaming.jpeg_quality must be in 1..=100"));
        }
        Ok(())
    }

    /// Parsed `log_level`; `None` when it names no level
    pub fn log_level(&self) -> Option<Level> {
        self.log_level.trim().parse().ok()
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("homewatch"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

/// One video input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Run this pipeline at all
    pub enabled: bool,

    /// Source index, used as the camera identity in logs
    pub index: u32,

    /// Where frames come from
    pub kind: SourceKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceKind {
    /// Synthetic scene, no hardware needed
    Simulated { scene: SimulatedScene },

    /// Replays the image files of a directory in name order
    Directory { path: PathBuf },

    /// Polls a camera that answers every GET with one JPEG
    HttpSnapshot { url: String, timeout_ms: u64 },
}

/// Hazard detection and alert policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HazardConfig {
    /// Edge-triggered or cooldown-gated alerts
    pub policy: HazardPolicy,

    /// Share of flame-coloured pixels that counts as fire
    pub fire_pixel_ratio: f32,

    /// Share of smoke-grey pixels that counts as smoke
    pub smoke_pixel_ratio: f32,
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            policy: HazardPolicy::EdgeTriggered,
            fire_pixel_ratio: 0.02,
            smoke_pixel_ratio: 0.35,
        }
    }
}

/// Face identification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Directory holding one reference image per person
    pub images_dir: PathBuf,

    /// Dedup window in seconds
    pub window_secs: f64,

    /// Maximum encoding distance for a match
    pub tolerance: f32,

    /// Downscale factor applied before locating faces
    pub frame_resizing: f32,
}

impl IdentityConfig {
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds((self.window_secs * 1000.0) as i64)
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("./images"),
            window_secs: 5.0,
            tolerance: 0.75,
            frame_resizing: 0.25,
        }
    }
}

/// Capture loop timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Frames per second the loops aim for
    pub target_fps: u32,

    /// Wait before retrying a camera that failed to open
    pub open_backoff_ms: u64,

    /// Wait before retrying a failed frame read
    pub read_backoff_ms: u64,

    /// A read taking longer than this counts as a stalled source
    pub read_timeout_ms: u64,

    /// Yield after every frame even when over budget
    pub min_yield_ms: u64,
}

impl PacingConfig {
    pub fn open_backoff(&self) -> Duration {
        Duration::from_millis(self.open_backoff_ms)
    }

    pub fn read_backoff(&self) -> Duration {
        Duration::from_millis(self.read_backoff_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            target_fps: 30,
            open_backoff_ms: 5000,
            read_backoff_ms: 500,
            read_timeout_ms: 5000,
            min_yield_ms: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let created = Config::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created.pacing.target_fps, 30);

        let loaded = Config::load_or_create(&path).unwrap();
        assert_eq!(loaded.identity.window_secs, 5.0);
        assert_eq!(loaded.hazard.policy, HazardPolicy::EdgeTriggered);
        assert_eq!(loaded.identity_camera.index, 1);
    }

    #[test]
    fn test_cooldown_policy_from_toml() {
        let mut config = Config::default();
        config.hazard.policy = HazardPolicy::Cooldown { cooldown_secs: 10.0 };
        config.hazard_camera.kind = SourceKind::HttpSnapshot {
            url: "http://192.168.1.40/capture".into(),
            timeout_ms: 2000,
        };

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();

        assert_eq!(parsed.hazard.policy, HazardPolicy::Cooldown { cooldown_secs: 10.0 });
        assert_eq!(parsed.hazard_camera.kind, config.hazard_camera.kind);
    }

    #[test]
    fn test_validate_rejects_zero_fps() {
        let mut config = Config::default();
        config.pacing.target_fps = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.identity.frame_resizing = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_durations() {
        let mut config = Config::default();
        config.identity.window_secs = f64::NAN;
        assert!(config.validate().is_err());

        config.identity.window_secs = f64::INFINITY;
        assert!(config.validate().is_err());

        for cooldown_secs in [f64::NAN, f64::INFINITY, -1.0] {
            let mut config = Config::default();
            config.hazard.policy = HazardPolicy::Cooldown { cooldown_secs };
            assert!(config.validate().is_err(), "{cooldown_secs} accepted");
        }

        let mut config = Config::default();
        config.hazard.policy = HazardPolicy::Cooldown { cooldown_secs: 0.0 };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_level_is_parsed() {
        let mut config = Config::default();
        assert_eq!(config.log_level(), Some(Level::INFO));

        config.log_level = "debug".into();
        assert_eq!(config.log_level(), Some(Level::DEBUG));

        config.log_level = "chatty".into();
        assert_eq!(config.log_level(), None);
        assert!(config.validate().is_err());
    }
}

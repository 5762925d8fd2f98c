// Global configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::context::TrialSettings;
use crate::engine::decision::PlanOverrides;
use crate::engine::sample::DEFAULT_SAMPLE_URL;

const APP_DIR: &str = "ffcaps";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub probe: ProbeConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Wall-clock limit for each trial encode and decode probe
    #[serde(default = "default_trial_timeout_secs")]
    pub trial_timeout_secs: u64,

    /// Length of the synthetic trial clip
    #[serde(default = "default_trial_duration_secs")]
    pub trial_duration_secs: u32,

    /// Trial clip size as WIDTHxHEIGHT
    #[serde(default = "default_trial_size")]
    pub trial_size: String,

    #[serde(default = "default_trial_rate")]
    pub trial_rate: u32,

    /// Reference 10-bit HEVC clip for the decode probe
    #[serde(default = "default_sample_url")]
    pub sample_url: String,

    #[serde(default = "default_sample_timeout_secs")]
    pub sample_timeout_secs: u64,

    #[serde(default = "default_prober_timeout_secs")]
    pub prober_timeout_secs: u64,
}

/// Plan overrides applied when the command line leaves them unset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub accelerator: Option<String>,

    #[serde(default)]
    pub codec: Option<String>,

    #[serde(default)]
    pub allow_10bit: Option<bool>,

    #[serde(default)]
    pub allow_hdr: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Capability cache and reference sample location (defaults to the user cache dir)
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_trial_timeout_secs() -> u64 {
    30
}

fn default_trial_duration_secs() -> u32 {
    5
}

fn default_trial_size() -> String {
    "1920x1080".to_string()
}

fn default_trial_rate() -> u32 {
    30
}

fn default_sample_url() -> String {
    DEFAULT_SAMPLE_URL.to_string()
}

fn default_sample_timeout_secs() -> u64 {
    120
}

fn default_prober_timeout_secs() -> u64 {
    30
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            trial_timeout_secs: default_trial_timeout_secs(),
            trial_duration_secs: default_trial_duration_secs(),
            trial_size: default_trial_size(),
            trial_rate: default_trial_rate(),
            sample_url: default_sample_url(),
            sample_timeout_secs: default_sample_timeout_secs(),
            prober_timeout_secs: default_prober_timeout_secs(),
        }
    }
}

impl ProbeConfig {
    /// Trial settings; a malformed `trial_size` is rejected rather than guessed
    pub fn trial_settings(&self) -> Result<TrialSettings> {
        let (width, height) = parse_size(&self.trial_size)
            .with_context(|| format!("Invalid trial_size '{}', expected WIDTHxHEIGHT", self.trial_size))?;
        if self.trial_rate == 0 || self.trial_duration_secs == 0 {
            anyhow::bail!("trial_rate and trial_duration_secs must be positive");
        }
        Ok(TrialSettings {
            timeout: Duration::from_secs(self.trial_timeout_secs),
            duration_secs: self.trial_duration_secs,
            width,
            height,
            rate: self.trial_rate,
        })
    }

    pub fn sample_timeout(&self) -> Duration {
        Duration::from_secs(self.sample_timeout_secs)
    }

    pub fn prober_timeout(&self) -> Duration {
        Duration::from_secs(self.prober_timeout_secs)
    }
}

fn parse_size(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.trim().split_once(['x', 'X'])?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

impl DefaultsConfig {
    pub fn overrides(&self) -> PlanOverrides {
        PlanOverrides {
            codec: self.codec.clone(),
            accelerator: self.accelerator.clone(),
            allow_10bit: self.allow_10bit,
            allow_hdr: self.allow_hdr,
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "macos") {
            dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".config")
                .join(APP_DIR)
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join(APP_DIR)
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Capability cache directory: `[paths] cache_dir`, else `<cache_dir>/ffcaps`
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.paths.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(dirs::cache_dir()
                .context("Could not determine cache directory")?
                .join(APP_DIR)),
        }
    }

    /// Load config from disk, or create default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;

            Self::from_toml(&contents).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })
        } else {
            let config = Config::default();

            // Not fatal: the directory may not be writable
            if let Err(e) = config.save() {
                tracing::warn!(error = %e, "Could not create default config file");
                tracing::warn!("Using built-in defaults. Run 'ffcaps init-config' to create a config file.");
            }

            Ok(config)
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Invalid config TOML")
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }
}

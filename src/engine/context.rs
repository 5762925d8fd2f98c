//! Immutable state threaded through one invocation.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::core::CancelFlag;
use crate::engine::decision::PlanOverrides;
use crate::engine::hardware::HardwareFingerprint;
use crate::engine::sample::SampleHandle;

/// Synthetic trial clip and per-trial bounds
#[derive(Debug, Clone, PartialEq)]
pub struct TrialSettings {
    pub timeout: Duration,
    pub duration_secs: u32,
    pub width: u32,
    pub height: u32,
    pub rate: u32,
}

impl Default for TrialSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            duration_secs: 5,
            width: 1920,
            height: 1080,
            rate: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProbeContext {
    pub fingerprint: HardwareFingerprint,
    /// Encoders compiled into the transcoding engine
    pub encoders: BTreeSet<String>,
    pub sample: Option<SampleHandle>,
    pub overrides: PlanOverrides,
    pub ffmpeg: PathBuf,
    pub ffmpeg_version: Option<String>,
    pub vaapi_device: PathBuf,
    pub trial: TrialSettings,
    pub cancel: CancelFlag,
}

impl ProbeContext {
    pub fn new(fingerprint: HardwareFingerprint, encoders: BTreeSet<String>) -> Self {
        Self {
            fingerprint,
            encoders,
            sample: None,
            overrides: PlanOverrides::default(),
            ffmpeg: PathBuf::from("ffmpeg"),
            ffmpeg_version: None,
            vaapi_device: PathBuf::from(crate::engine::hardware::DEFAULT_VAAPI_DEVICE),
            trial: TrialSettings::default(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_sample(mut self, sample: Option<SampleHandle>) -> Self {
        self.sample = sample;
        self
    }

    pub fn with_overrides(mut self, overrides: PlanOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_ffmpeg(mut self, ffmpeg: PathBuf, version: Option<String>) -> Self {
        self.ffmpeg = ffmpeg;
        self.ffmpeg_version = version;
        self
    }

    pub fn with_vaapi_device(mut self, device: PathBuf) -> Self {
        self.vaapi_device = device;
        self
    }

    pub fn with_trial(mut self, trial: TrialSettings) -> Self {
        self.trial = trial;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn has_encoder(&self, name: &str) -> bool {
        self.encoders.contains(name)
    }
}

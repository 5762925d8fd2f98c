#![allow(dead_code)]

use ffcaps::engine::core::CancelFlag;
use ffcaps::engine::hardware::{DeviceId, HardwareFingerprint, PLATFORM_LINUX};
use ffcaps::engine::sample::{self, SampleHandle, SampleProvider};
use ffcaps::engine::{
    Accelerator, Codec, PowerMode, ProbeContext, TrialFailure, TrialRunner, TrialSpec, profile,
};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tempfile::TempDir;

/// Convert a Command to a string for testing/assertions
pub fn cmd_to_string(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().to_string()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().to_string()));
    parts.join(" ")
}

/// Every encoder named by the capability table
pub fn all_encoders() -> BTreeSet<String> {
    Accelerator::ALL
        .into_iter()
        .flat_map(|a| Codec::ALL.into_iter().map(move |c| profile(a).encoder_name(c)))
        .map(str::to_string)
        .collect()
}

pub fn encoders(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

pub fn intel_arc() -> HardwareFingerprint {
    HardwareFingerprint::new(PLATFORM_LINUX, vec![DeviceId::new("8086", "56a0")])
}

pub fn context(encoders: BTreeSet<String>) -> ProbeContext {
    ProbeContext::new(intel_arc(), encoders)
        .with_vaapi_device(PathBuf::from("/dev/dri/renderD128"))
}

/// Verified sample handle backed by a throwaway file in `dir`
pub fn fake_sample(dir: &Path) -> SampleHandle {
    let provider = SampleProvider::new(dir, sample::DEFAULT_SAMPLE_URL, Duration::from_secs(1))
        .with_downloader(None);
    fs::write(provider.sample_path(), b"not really hevc").unwrap();
    sample::record_checksum(&provider.sample_path()).unwrap();
    provider
        .ensure_sample(&CancelFlag::new())
        .handle()
        .cloned()
        .unwrap()
}

/// Sample provider that can never download
pub fn offline_samples(dir: &Path) -> SampleProvider {
    SampleProvider::new(dir, sample::DEFAULT_SAMPLE_URL, Duration::from_secs(1)).with_downloader(None)
}

/// Minimal `/sys` tree for DRM and V4L2 discovery
pub struct FakeSysfs {
    temp: TempDir,
}

impl FakeSysfs {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn add_card(&self, card: &str, vendor: &str, device: &str) -> &Self {
        let dir = self.root().join("class/drm").join(card).join("device");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("vendor"), format!("{}\n", vendor)).unwrap();
        fs::write(dir.join("device"), format!("{}\n", device)).unwrap();
        self
    }

    /// Node without PCI ids (connectors, render nodes)
    pub fn add_bare_node(&self, name: &str) -> &Self {
        fs::create_dir_all(self.root().join("class/drm").join(name)).unwrap();
        self
    }

    pub fn add_video4linux(&self, node: &str, name: &str) -> &Self {
        let dir = self.root().join("class/video4linux").join(node);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("name"), format!("{}\n", name)).unwrap();
        self
    }
}

type TrialKey = (Accelerator, Codec, PowerMode, bool);

/// Scripted stand-in for ffmpeg. Unscripted trials fail to spawn.
#[derive(Default)]
pub struct ScriptedRunner {
    trials: HashMap<TrialKey, Result<f64, TrialFailure>>,
    decodes: BTreeSet<Accelerator>,
    cancel_after: Option<(usize, CancelFlag)>,
    pub calls: RefCell<Vec<TrialSpec>>,
    pub decode_calls: RefCell<Vec<Accelerator>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn speed(mut self, accel: Accelerator, codec: Codec, mode: PowerMode, speed: f64) -> Self {
        self.trials.insert((accel, codec, mode, false), Ok(speed));
        self
    }

    pub fn ten_bit(mut self, accel: Accelerator, codec: Codec, mode: PowerMode, speed: f64) -> Self {
        self.trials.insert((accel, codec, mode, true), Ok(speed));
        self
    }

    pub fn fail(mut self, accel: Accelerator, codec: Codec, mode: PowerMode, why: TrialFailure) -> Self {
        self.trials.insert((accel, codec, mode, false), Err(why));
        self
    }

    pub fn decodes(mut self, accel: Accelerator) -> Self {
        self.decodes.insert(accel);
        self
    }

    /// Trip `flag` once `n` encode trials have run
    pub fn cancel_after(mut self, n: usize, flag: CancelFlag) -> Self {
        self.cancel_after = Some((n, flag));
        self
    }

    pub fn encode_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn ran(&self, accel: Accelerator, codec: Codec, mode: PowerMode, ten_bit: bool) -> bool {
        self.calls.borrow().iter().any(|t| {
            t.candidate.accelerator == accel
                && t.candidate.codec == codec
                && t.candidate.power_mode == mode
                && t.ten_bit == ten_bit
        })
    }
}

impl TrialRunner for ScriptedRunner {
    fn decode_10bit(&self, _ctx: &ProbeContext, accel: Accelerator, _sample: &SampleHandle) -> bool {
        self.decode_calls.borrow_mut().push(accel);
        self.decodes.contains(&accel)
    }

    fn encode(&self, _ctx: &ProbeContext, trial: &TrialSpec) -> Result<f64, TrialFailure> {
        self.calls.borrow_mut().push(trial.clone());
        if let Some((n, flag)) = &self.cancel_after {
            if self.calls.borrow().len() >= *n {
                flag.cancel();
            }
        }
        let c = trial.candidate;
        self.trials
            .get(&(c.accelerator, c.codec, c.power_mode, trial.ten_bit))
            .cloned()
            .unwrap_or_else(|| Err(TrialFailure::SpawnFailed("not scripted".to_string())))
    }
}

/// Runner borrowed by the benchmark so the test can inspect calls afterwards
impl TrialRunner for &ScriptedRunner {
    fn decode_10bit(&self, ctx: &ProbeContext, accel: Accelerator, sample: &SampleHandle) -> bool {
        (**self).decode_10bit(ctx, accel, sample)
    }

    fn encode(&self, ctx: &ProbeContext, trial: &TrialSpec) -> Result<f64, TrialFailure> {
        (**self).encode(ctx, trial)
    }
}

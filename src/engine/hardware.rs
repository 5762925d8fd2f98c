//! Accelerator discovery and hardware fingerprinting.
//!
//! The fingerprint is the cache validity key. It is recomputed on every run
//! from what the host exposes: DRM sysfs vendor/device ids on Linux,
//! `nvidia-smi` names when only the proprietary driver is visible, and
//! display model strings from `system_profiler` on macOS.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::debug;

use crate::engine::core::{Accelerator, CancelFlag, RunOutcome, run_bounded};

/// Evaluation order of accelerators. Earlier entries win speed ties.
pub const ACCELERATOR_PRIORITY: [Accelerator; 6] = [
    Accelerator::Nvenc,
    Accelerator::Qsv,
    Accelerator::Vaapi,
    Accelerator::V4l2m2m,
    Accelerator::Videotoolbox,
    Accelerator::Software,
];

/// Environment variable naming the VAAPI/QSV render node
pub const VAAPI_DEVICE_ENV: &str = "VAAPI_DEVICE";
pub const DEFAULT_VAAPI_DEVICE: &str = "/dev/dri/renderD128";

pub const PLATFORM_DARWIN: &str = "darwin";
pub const PLATFORM_LINUX: &str = "linux";
pub const PLATFORM_NVIDIA: &str = "nvidia";
pub const PLATFORM_SOFTWARE: &str = "software";

const PCI_VENDOR_INTEL: &str = "8086";
const PCI_VENDOR_NVIDIA: &str = "10de";
const PCI_VENDOR_AMD: &str = "1002";

const TOOL_TIMEOUT: Duration = Duration::from_secs(10);

/// Detected GPU vendor for hardware encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum GpuVendor {
    #[default]
    Unknown,
    Intel,
    Nvidia,
    Amd,
    Apple,
}

impl GpuVendor {
    pub fn from_vendor_id(id: &str) -> Self {
        match normalize_hex(id).as_str() {
            PCI_VENDOR_INTEL => Self::Intel,
            PCI_VENDOR_NVIDIA => Self::Nvidia,
            PCI_VENDOR_AMD => Self::Amd,
            other => {
                let lower = other.to_lowercase();
                if lower.contains("intel") {
                    Self::Intel
                } else if lower.contains("nvidia") {
                    Self::Nvidia
                } else if lower.contains("amd") || lower.contains("radeon") {
                    Self::Amd
                } else if lower.contains("apple") {
                    Self::Apple
                } else {
                    Self::Unknown
                }
            }
        }
    }
}

/// One accelerator device as `(vendor_id, device_id)`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DeviceId {
    pub vendor_id: String,
    pub device_id: String,
}

impl DeviceId {
    pub fn new(vendor_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            vendor_id: vendor_id.into(),
            device_id: device_id.into(),
        }
    }
}

/// Canonical identity of the installed accelerator set
#[derive(Debug, Clone)]
pub struct HardwareFingerprint {
    platform: String,
    devices: Vec<DeviceId>,
}

impl HardwareFingerprint {
    /// Build a fingerprint; devices are sorted so enumeration order never matters.
    /// An empty device list yields the software sentinel.
    pub fn new(platform: impl Into<String>, mut devices: Vec<DeviceId>) -> Self {
        if devices.is_empty() {
            return Self::software();
        }
        devices.sort();
        Self {
            platform: platform.into(),
            devices,
        }
    }

    pub fn software() -> Self {
        Self {
            platform: PLATFORM_SOFTWARE.to_string(),
            devices: Vec::new(),
        }
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn devices(&self) -> &[DeviceId] {
        &self.devices
    }

    pub fn is_software(&self) -> bool {
        self.devices.is_empty()
    }

    /// `<platform>|<vendor>:<device>,...`, or `software` for the sentinel
    pub fn canonical(&self) -> String {
        if self.devices.is_empty() {
            return PLATFORM_SOFTWARE.to_string();
        }
        let devices = self
            .devices
            .iter()
            .map(|d| format!("{}:{}", d.vendor_id, d.device_id))
            .collect::<Vec<_>>()
            .join(",");
        format!("{}|{}", self.platform, devices)
    }

    pub fn vendors(&self) -> BTreeSet<GpuVendor> {
        self.devices
            .iter()
            .map(|d| GpuVendor::from_vendor_id(&d.vendor_id))
            .collect()
    }
}

impl PartialEq for HardwareFingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for HardwareFingerprint {}

impl fmt::Display for HardwareFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Fingerprint the current host
pub fn fingerprint() -> HardwareFingerprint {
    if cfg!(target_os = "macos") {
        return HardwareFingerprint::new(PLATFORM_DARWIN, detect_display_models());
    }

    let drm = fingerprint_from_sysfs(Path::new("/sys"));
    if !drm.is_software() {
        return drm;
    }

    let nvidia: Vec<DeviceId> = detect_nvidia_gpus()
        .into_iter()
        .map(|name| DeviceId::new(PCI_VENDOR_NVIDIA, name))
        .collect();
    HardwareFingerprint::new(PLATFORM_NVIDIA, nvidia)
}

/// Fingerprint from DRM card nodes under `<sys_root>/class/drm`
pub fn fingerprint_from_sysfs(sys_root: &Path) -> HardwareFingerprint {
    HardwareFingerprint::new(PLATFORM_LINUX, drm_devices(sys_root))
}

fn drm_devices(sys_root: &Path) -> Vec<DeviceId> {
    let drm = sys_root.join("class").join("drm");
    let Ok(entries) = fs::read_dir(&drm) else {
        return Vec::new();
    };

    let mut devices = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        // card0, card1 ... but not connector nodes like card0-HDMI-A-1
        let is_card = name
            .strip_prefix("card")
            .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
        if !is_card {
            continue;
        }

        let device_dir = entry.path().join("device");
        let vendor = fs::read_to_string(device_dir.join("vendor"));
        let device = fs::read_to_string(device_dir.join("device"));
        if let (Ok(vendor), Ok(device)) = (vendor, device) {
            debug!(card = name, vendor = vendor.trim(), device = device.trim(), "DRM device");
            devices.push(DeviceId::new(normalize_hex(&vendor), normalize_hex(&device)));
        }
    }
    devices
}

/// "0x8086\n" -> "8086"
fn normalize_hex(raw: &str) -> String {
    let trimmed = raw.trim().to_lowercase();
    trimmed
        .strip_prefix("0x")
        .map(str::to_string)
        .unwrap_or(trimmed)
}

/// Whether a V4L2 memory-to-memory codec node is present
pub fn has_m2m_device(sys_root: &Path) -> bool {
    let v4l = sys_root.join("class").join("video4linux");
    let Ok(entries) = fs::read_dir(&v4l) else {
        return false;
    };
    entries.flatten().any(|entry| {
        fs::read_to_string(entry.path().join("name"))
            .map(|n| {
                let lower = n.to_lowercase();
                lower.contains("m2m") || lower.contains("codec") || lower.contains("enc")
            })
            .unwrap_or(false)
    })
}

/// Detect NVIDIA GPU names using nvidia-smi
pub fn detect_nvidia_gpus() -> Vec<String> {
    let mut cmd = Command::new("nvidia-smi");
    cmd.args(["--query-gpu=name", "--format=csv,noheader"]);
    match run_bounded(cmd, TOOL_TIMEOUT, &CancelFlag::new()) {
        RunOutcome::Exited {
            success: true,
            stdout,
            ..
        } => parse_nvidia_smi_names(&stdout),
        _ => Vec::new(),
    }
}

pub fn parse_nvidia_smi_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Deserialize)]
struct SystemProfiler {
    #[serde(rename = "SPDisplaysDataType", default)]
    displays: Vec<DisplayEntry>,
}

#[derive(Debug, Deserialize)]
struct DisplayEntry {
    sppci_model: Option<String>,
    spdisplays_vendor: Option<String>,
}

fn detect_display_models() -> Vec<DeviceId> {
    let mut cmd = Command::new("system_profiler");
    cmd.args(["SPDisplaysDataType", "-json"]);
    match run_bounded(cmd, TOOL_TIMEOUT, &CancelFlag::new()) {
        RunOutcome::Exited {
            success: true,
            stdout,
            ..
        } => parse_system_profiler(&stdout),
        _ => Vec::new(),
    }
}

/// Display models from `system_profiler SPDisplaysDataType -json`
pub fn parse_system_profiler(json: &str) -> Vec<DeviceId> {
    let Ok(parsed) = serde_json::from_str::<SystemProfiler>(json) else {
        return Vec::new();
    };
    parsed
        .displays
        .into_iter()
        .filter_map(|d| {
            let model = d.sppci_model?;
            let vendor = d
                .spdisplays_vendor
                .map(|v| v.trim_start_matches("sppci_vendor_").to_lowercase())
                .unwrap_or_else(|| "apple".to_string());
            Some(DeviceId::new(vendor, model))
        })
        .collect()
}

/// Platform-specific accelerators worth benchmarking, in priority order.
/// `software` is always last.
pub fn accelerator_shortlist(fp: &HardwareFingerprint, has_m2m: bool) -> Vec<Accelerator> {
    let mut wanted = BTreeSet::new();
    wanted.insert(Accelerator::Software);

    if fp.platform() == PLATFORM_DARWIN {
        wanted.insert(Accelerator::Videotoolbox);
    } else {
        for vendor in fp.vendors() {
            match vendor {
                GpuVendor::Nvidia => {
                    wanted.insert(Accelerator::Nvenc);
                }
                GpuVendor::Intel => {
                    wanted.insert(Accelerator::Qsv);
                    wanted.insert(Accelerator::Vaapi);
                }
                GpuVendor::Amd => {
                    wanted.insert(Accelerator::Vaapi);
                }
                GpuVendor::Apple | GpuVendor::Unknown => {}
            }
        }
        if has_m2m {
            wanted.insert(Accelerator::V4l2m2m);
        }
    }

    ACCELERATOR_PRIORITY
        .into_iter()
        .filter(|a| wanted.contains(a))
        .collect()
}

/// Render node for VAAPI/QSV, from `VAAPI_DEVICE` or the fixed default
pub fn vaapi_device() -> PathBuf {
    vaapi_device_from(std::env::var_os(VAAPI_DEVICE_ENV).map(PathBuf::from))
}

pub fn vaapi_device_from(env_value: Option<PathBuf>) -> PathBuf {
    env_value
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_VAAPI_DEVICE))
}

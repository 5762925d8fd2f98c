//! Persistent capability cache keyed by hardware fingerprint.
//!
//! One JSON record per installation directory. Writers go through a temp
//! file and a rename so readers never see a half-written record; `save` and
//! `invalidate` additionally serialize on an advisory `flock`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::benchmark::{EncoderBenchmark, TrialRunner};
use crate::engine::context::ProbeContext;
use crate::engine::core::{Accelerator, CapabilitySnapshot};
use crate::engine::error::CacheMiss;
use crate::engine::hardware::HardwareFingerprint;
use crate::engine::sample::SampleProvider;

pub const SCHEMA_VERSION: u32 = 1;

const CACHE_FILE: &str = "capabilities.json";
const LOCK_FILE: &str = "capabilities.lock";

/// On-disk form of a cached probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub schema_version: u32,
    pub hardware_fingerprint: String,
    pub probed_at: DateTime<Utc>,
    #[serde(default)]
    pub ffmpeg_version: Option<String>,
    pub snapshot: CapabilitySnapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(CapabilitySnapshot),
    Miss(CacheMiss),
}

#[derive(Debug, Clone)]
pub struct CapabilityCache {
    dir: PathBuf,
}

impl CapabilityCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(CACHE_FILE)
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    /// Read and validate the record without comparing fingerprints
    pub fn load_record(&self) -> Result<CacheRecord, CacheMiss> {
        let text = match fs::read_to_string(self.path()) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(CacheMiss::Absent),
            Err(e) => return Err(CacheMiss::Unreadable(e.to_string())),
        };

        let record: CacheRecord =
            serde_json::from_str(&text).map_err(|e| CacheMiss::Invalid(e.to_string()))?;

        if record.schema_version != SCHEMA_VERSION {
            return Err(CacheMiss::Invalid(format!(
                "schema version {} (expected {})",
                record.schema_version, SCHEMA_VERSION
            )));
        }
        if record.snapshot.hardware_fingerprint != record.hardware_fingerprint {
            return Err(CacheMiss::Invalid(
                "snapshot fingerprint disagrees with record".to_string(),
            ));
        }
        Ok(record)
    }

    /// Serve the cached snapshot only for an exact fingerprint match
    pub fn load(&self, current: &HardwareFingerprint) -> CacheLookup {
        let record = match self.load_record() {
            Ok(record) => record,
            Err(miss) => return CacheLookup::Miss(miss),
        };

        let current = current.canonical();
        if record.hardware_fingerprint != current {
            return CacheLookup::Miss(CacheMiss::FingerprintMismatch {
                cached: record.hardware_fingerprint,
                current,
            });
        }
        CacheLookup::Hit(record.snapshot)
    }

    /// Replace the persisted record with `snapshot`
    pub fn save(&self, snapshot: &CapabilitySnapshot, ffmpeg_version: Option<&str>) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create cache directory {}", self.dir.display())
        })?;
        let _lock = CacheLock::acquire(&self.lock_path())?;

        let record = CacheRecord {
            schema_version: SCHEMA_VERSION,
            hardware_fingerprint: snapshot.hardware_fingerprint.clone(),
            probed_at: Utc::now(),
            ffmpeg_version: ffmpeg_version.map(str::to_string),
            snapshot: snapshot.clone(),
        };
        let json = serde_json::to_string_pretty(&record).context("Failed to serialize capability cache")?;

        let target = self.path();
        let tmp = self.dir.join(format!(".{}.{}.tmp", CACHE_FILE, Uuid::new_v4()));
        let written = (|| -> Result<()> {
            let mut file = File::create(&tmp).context("Failed to create temporary cache file")?;
            file.write_all(json.as_bytes())
                .context("Failed to write temporary cache file")?;
            file.sync_all().context("Failed to sync temporary cache file")?;
            fs::rename(&tmp, &target).context("Failed to move cache file into place")?;
            Ok(())
        })();

        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        written?;

        debug!(path = %target.display(), "Capability cache written");
        Ok(target)
    }

    /// Drop the record; returns whether one existed
    pub fn invalidate(&self) -> Result<bool> {
        if !self.dir.exists() {
            return Ok(false);
        }
        let _lock = CacheLock::acquire(&self.lock_path())?;
        match fs::remove_file(self.path()) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).context("Failed to remove capability cache"),
        }
    }
}

/// Exclusive advisory lock held for the guard's lifetime
struct CacheLock {
    file: File,
}

impl CacheLock {
    fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open cache lock {}", path.display()))?;
        lock_exclusive(&file).context("Failed to lock capability cache")?;
        Ok(Self { file })
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        unlock(&self.file);
    }
}

#[cfg(unix)]
fn lock_exclusive(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    // SAFETY: flock only operates on the descriptor, which `file` keeps open.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(unix)]
fn unlock(file: &File) {
    use std::os::unix::io::AsRawFd;
    // SAFETY: as above; closing the file would release the lock anyway.
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

#[cfg(not(unix))]
fn lock_exclusive(_file: &File) -> io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn unlock(_file: &File) {}

/// Cached snapshot for the current hardware, probing on a miss or when forced.
///
/// The reference sample is only fetched when a probe actually runs. A cache
/// write failure is logged and the fresh snapshot is still returned. A probe
/// interrupted by cancellation is returned but not persisted.
pub fn resolve_capabilities<R: TrialRunner>(
    cache: &CapabilityCache,
    ctx: &ProbeContext,
    samples: &SampleProvider,
    benchmark: &EncoderBenchmark<R>,
    accelerators: &[Accelerator],
    force: bool,
) -> CapabilitySnapshot {
    if force {
        info!("Forced re-probe requested; bypassing capability cache");
    } else {
        match cache.load(&ctx.fingerprint) {
            CacheLookup::Hit(snapshot) => {
                info!(
                    fingerprint = %ctx.fingerprint,
                    best_accelerator = %snapshot.best_accelerator,
                    best_codec = %snapshot.best_codec,
                    "Capability cache hit"
                );
                return snapshot;
            }
            CacheLookup::Miss(reason) => {
                info!(%reason, "Capability cache miss; probing");
            }
        }
    }

    let probe_ctx = if ctx.sample.is_some() {
        ctx.clone()
    } else {
        let status = samples.ensure_sample(&ctx.cancel);
        ctx.clone().with_sample(status.handle().cloned())
    };

    let snapshot = benchmark.probe(&probe_ctx, accelerators);

    if ctx.cancel.is_cancelled() {
        warn!("Probe was cancelled; result not cached");
    } else if let Err(e) = cache.save(&snapshot, ctx.ffmpeg_version.as_deref()) {
        warn!(error = %format!("{:#}", e), "Failed to write capability cache");
    }

    snapshot
}

//! Reference clip for the 10-bit decode probe.
//!
//! The clip is fetched once into the cache directory and guarded by a CRC32
//! sidecar. Any failure yields `Unavailable`; benchmarking then runs on
//! synthetic test patterns only.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::core::{CancelFlag, RunOutcome, run_bounded};
use crate::engine::error::SampleUnavailable;

pub const DEFAULT_SAMPLE_URL: &str =
    "https://repo.jellyfin.org/jellyfish/media/jellyfish-3-mbps-hd-hevc-10bit.mkv";

const SAMPLE_FILE_NAME: &str = "capability-sample-hevc-10bit.mkv";
const CHECKSUM_SUFFIX: &str = "crc32";

/// A present, verified reference clip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleHandle {
    path: PathBuf,
}

impl SampleHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleStatus {
    Ready(SampleHandle),
    Unavailable(SampleUnavailable),
}

impl SampleStatus {
    pub fn handle(&self) -> Option<&SampleHandle> {
        match self {
            Self::Ready(h) => Some(h),
            Self::Unavailable(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SampleProvider {
    dir: PathBuf,
    url: String,
    timeout: Duration,
    downloader: Option<PathBuf>,
}

impl SampleProvider {
    pub fn new(dir: impl Into<PathBuf>, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            url: url.into(),
            timeout,
            downloader: which::which("curl").ok(),
        }
    }

    /// Override the downloader binary (`None` disables downloading)
    pub fn with_downloader(mut self, downloader: Option<PathBuf>) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn sample_path(&self) -> PathBuf {
        self.dir.join(SAMPLE_FILE_NAME)
    }

    fn checksum_path(&self) -> PathBuf {
        checksum_path_for(&self.sample_path())
    }

    /// Sample exists and matches its recorded checksum
    pub fn is_intact(&self) -> bool {
        let path = self.sample_path();
        let Ok(recorded) = fs::read_to_string(self.checksum_path()) else {
            return false;
        };
        match file_crc32(&path) {
            Ok(actual) => recorded.trim() == format!("{:08x}", actual),
            Err(_) => false,
        }
    }

    /// Fetch the sample unless an intact copy is already present
    pub fn ensure_sample(&self, cancel: &CancelFlag) -> SampleStatus {
        if self.is_intact() {
            debug!(path = %self.sample_path().display(), "Reference sample already present");
            return SampleStatus::Ready(SampleHandle {
                path: self.sample_path(),
            });
        }

        match self.download(cancel) {
            Ok(handle) => {
                info!(path = %handle.path.display(), "Reference sample downloaded");
                SampleStatus::Ready(handle)
            }
            Err(reason) => {
                warn!(%reason, "Reference sample unavailable; 10-bit decode test will be skipped");
                SampleStatus::Unavailable(reason)
            }
        }
    }

    fn download(&self, cancel: &CancelFlag) -> Result<SampleHandle, SampleUnavailable> {
        let curl = self
            .downloader
            .as_ref()
            .ok_or(SampleUnavailable::DownloaderMissing)?;

        fs::create_dir_all(&self.dir).map_err(|e| SampleUnavailable::Io(e.to_string()))?;

        let target = self.sample_path();
        let tmp = self
            .dir
            .join(format!(".{}.{}.part", SAMPLE_FILE_NAME, Uuid::new_v4()));

        let mut cmd = Command::new(curl);
        cmd.args(["-fsSL", "--retry", "2", "--max-time"])
            .arg(self.timeout.as_secs().max(1).to_string())
            .arg("-o")
            .arg(&tmp)
            .arg(&self.url);

        let outcome = run_bounded(cmd, self.timeout + Duration::from_secs(5), cancel);
        let result = match outcome {
            RunOutcome::Exited { success: true, .. } => self.install(&tmp, &target),
            RunOutcome::Exited {
                code, stderr_tail, ..
            } => Err(SampleUnavailable::DownloadFailed(format!(
                "curl exited with status {}: {}",
                code.unwrap_or(-1),
                stderr_tail.trim()
            ))),
            RunOutcome::TimedOut => Err(SampleUnavailable::TimedOut),
            RunOutcome::Cancelled => Err(SampleUnavailable::Cancelled),
            RunOutcome::SpawnFailed(e) => Err(SampleUnavailable::DownloadFailed(e)),
        };

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }

    fn install(&self, tmp: &Path, target: &Path) -> Result<SampleHandle, SampleUnavailable> {
        let len = fs::metadata(tmp)
            .map(|m| m.len())
            .map_err(|e| SampleUnavailable::Io(e.to_string()))?;
        if len == 0 {
            return Err(SampleUnavailable::DownloadFailed(
                "downloaded file is empty".to_string(),
            ));
        }

        fs::rename(tmp, target).map_err(|e| SampleUnavailable::Io(e.to_string()))?;
        record_checksum(target).map_err(|e| SampleUnavailable::Io(e.to_string()))?;

        Ok(SampleHandle {
            path: target.to_path_buf(),
        })
    }
}

fn checksum_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(CHECKSUM_SUFFIX);
    path.with_file_name(name)
}

/// Write the CRC32 sidecar for `path`
pub fn record_checksum(path: &Path) -> io::Result<()> {
    let crc = file_crc32(path)?;
    fs::write(checksum_path_for(path), format!("{:08x}\n", crc))
}

fn file_crc32(path: &Path) -> io::Result<u32> {
    let mut file = File::open(path)?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

//! Error taxonomy for planning and probing.
//!
//! Only `PlanError` and `ProbeError` ever reach a caller. Trial failures,
//! cache misses and a missing reference sample are data: they narrow the
//! encoder choice but never abort a run.

use std::fmt;
use thiserror::Error;

/// Fatal: the request cannot produce an `EncodingPlan`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("no usable video stream in input")]
    NoVideoStream,

    #[error("unknown accelerator '{0}' (expected qsv, vaapi, nvenc, v4l2m2m, videotoolbox or software)")]
    UnknownAccelerator(String),

    #[error("unknown codec '{0}' (expected h264 or hevc)")]
    UnknownCodec(String),

    #[error("encoder '{0}' is not compiled into this ffmpeg build")]
    EncoderUnavailable(String),
}

/// Failure of the external stream prober
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to run ffprobe: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("ffprobe exited with status {status}: {stderr}")]
    Failed { status: i32, stderr: String },

    #[error("ffprobe did not finish within {0}s")]
    TimedOut(u64),

    #[error("failed to parse ffprobe JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// Why a trial scored zero. Logged, never propagated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrialFailure {
    SpawnFailed(String),
    TimedOut,
    Cancelled,
    NonZeroExit(i32),
    NoSpeed,
    Truncated,
}

impl fmt::Display for TrialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpawnFailed(e) => write!(f, "spawn failed: {}", e),
            Self::TimedOut => f.write_str("timed out"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::NonZeroExit(code) => write!(f, "exited with status {}", code),
            Self::NoSpeed => f.write_str("no speed reported"),
            Self::Truncated => f.write_str("progress output ended early"),
        }
    }
}

/// Why the cache could not serve a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheMiss {
    Absent,
    Unreadable(String),
    Invalid(String),
    FingerprintMismatch { cached: String, current: String },
}

impl fmt::Display for CacheMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("no cached capabilities"),
            Self::Unreadable(e) => write!(f, "cache unreadable: {}", e),
            Self::Invalid(e) => write!(f, "cache invalid: {}", e),
            Self::FingerprintMismatch { cached, current } => {
                write!(f, "hardware changed ({} -> {})", cached, current)
            }
        }
    }
}

/// Why the reference sample could not be provided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleUnavailable {
    DownloaderMissing,
    DownloadFailed(String),
    TimedOut,
    Cancelled,
    Io(String),
}

impl fmt::Display for SampleUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DownloaderMissing => f.write_str("curl not found in PATH"),
            Self::DownloadFailed(e) => write!(f, "download failed: {}", e),
            Self::TimedOut => f.write_str("download timed out"),
            Self::Cancelled => f.write_str("download cancelled"),
            Self::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

// Input probing using ffprobe

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use tracing::debug;

use crate::engine::core::{CancelFlag, Rational, RunOutcome, run_bounded};
use crate::engine::error::{PlanError, ProbeError};

const HDR_TRANSFERS: [&str; 2] = ["smpte2084", "arib-std-b67"];
const TEN_BIT_MARKERS: [&str; 3] = ["p010", "10le", "10be"];

/// Normalized view of an input's primary video and audio streams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamProfile {
    pub video_codec: String,
    pub width: u32,
    pub height: u32,
    pub pixel_format: String,
    pub color_transfer: Option<String>,
    /// `None` when ffprobe reported nothing parseable as `int/int`
    pub frame_rate: Option<Rational>,
    pub audio_bitrate: Option<u64>,
    pub audio_channels: Option<u32>,
}

impl StreamProfile {
    pub fn is_hdr(&self) -> bool {
        self.color_transfer
            .as_deref()
            .is_some_and(|t| HDR_TRANSFERS.contains(&t))
    }

    pub fn is_10bit(&self) -> bool {
        let fmt = self.pixel_format.to_ascii_lowercase();
        TEN_BIT_MARKERS.iter().any(|m| fmt.contains(m))
    }

    pub fn is_uhd(&self) -> bool {
        self.width >= 3840 || self.height >= 2160
    }
}

/// Build a `StreamProfile` from ffprobe `-show_streams` JSON.
///
/// Picks the first video stream that is not attached cover art and the first
/// audio stream. A missing audio stream is not an error.
pub fn normalize(raw: &Value) -> Result<StreamProfile, PlanError> {
    let streams = raw["streams"].as_array().map(Vec::as_slice).unwrap_or(&[]);

    let video = streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("video") && !is_attached_pic(s))
        .ok_or(PlanError::NoVideoStream)?;

    let video_codec = video["codec_name"]
        .as_str()
        .map(str::trim)
        .filter(|c| is_recognized_codec(c))
        .ok_or(PlanError::NoVideoStream)?
        .to_string();

    let frame_rate = video["r_frame_rate"]
        .as_str()
        .and_then(Rational::parse)
        .or_else(|| video["avg_frame_rate"].as_str().and_then(Rational::parse));

    let audio = streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("audio"));

    let (audio_bitrate, audio_channels) = match audio {
        Some(a) => (
            lenient_u64(&a["bit_rate"]),
            lenient_u64(&a["channels"])
                .filter(|c| *c > 0)
                .and_then(|c| u32::try_from(c).ok()),
        ),
        None => (None, None),
    };

    Ok(StreamProfile {
        video_codec,
        width: dimension(&video["width"]),
        height: dimension(&video["height"]),
        pixel_format: video["pix_fmt"].as_str().unwrap_or_default().to_string(),
        color_transfer: video["color_transfer"]
            .as_str()
            .filter(|t| !t.is_empty())
            .map(str::to_string),
        frame_rate,
        audio_bitrate,
        audio_channels,
    })
}

/// Oversized values saturate so they still read as UHD
fn dimension(v: &Value) -> u32 {
    lenient_u64(v).map_or(0, |d| u32::try_from(d).unwrap_or(u32::MAX))
}

fn is_attached_pic(stream: &Value) -> bool {
    lenient_u64(&stream["disposition"]["attached_pic"]).unwrap_or(0) != 0
}

fn is_recognized_codec(codec: &str) -> bool {
    !codec.is_empty() && !codec.eq_ignore_ascii_case("none") && !codec.eq_ignore_ascii_case("unknown")
}

/// ffprobe emits most numbers as JSON strings ("bit_rate": "128000")
fn lenient_u64(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Invokes ffprobe against a path or URL
#[derive(Debug, Clone)]
pub struct StreamProber {
    ffprobe: PathBuf,
    timeout: Duration,
}

impl StreamProber {
    pub fn new(ffprobe: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffprobe: ffprobe.into(),
            timeout,
        }
    }

    pub fn command(&self, source: &str, user_agent: Option<&str>, headers: &[String]) -> Command {
        let mut cmd = Command::new(&self.ffprobe);
        cmd.args(["-v", "error", "-print_format", "json", "-show_streams"]);

        if is_network_source(source) {
            if let Some(ua) = user_agent {
                cmd.arg("-user_agent").arg(ua);
            }
            if !headers.is_empty() {
                // ffprobe expects CRLF-terminated "Key: Value" lines
                let mut joined = headers.join("\r\n");
                joined.push_str("\r\n");
                cmd.arg("-headers").arg(joined);
            }
        }

        cmd.arg(source);
        cmd
    }

    /// Probe `source` and normalize its primary streams
    pub fn probe_stream(
        &self,
        source: &str,
        user_agent: Option<&str>,
        headers: &[String],
    ) -> Result<StreamProfile, ProbeError> {
        let cmd = self.command(source, user_agent, headers);
        debug!(source, "Running ffprobe");

        match run_bounded(cmd, self.timeout, &CancelFlag::new()) {
            RunOutcome::Exited {
                success: true,
                stdout,
                ..
            } => {
                let json: Value = serde_json::from_str(&stdout)?;
                Ok(normalize(&json)?)
            }
            RunOutcome::Exited {
                code, stderr_tail, ..
            } => Err(ProbeError::Failed {
                status: code.unwrap_or(-1),
                stderr: stderr_tail.trim().to_string(),
            }),
            RunOutcome::TimedOut | RunOutcome::Cancelled => {
                Err(ProbeError::TimedOut(self.timeout.as_secs()))
            }
            RunOutcome::SpawnFailed(e) => Err(ProbeError::Spawn(io::Error::other(e))),
        }
    }
}

fn is_network_source(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

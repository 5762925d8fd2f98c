use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::engine::error::PlanError;

/// Hardware (or software) encode backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accelerator {
    Qsv,
    Vaapi,
    Nvenc,
    V4l2m2m,
    Videotoolbox,
    Software,
}

impl Accelerator {
    pub const ALL: [Accelerator; 6] = [
        Self::Qsv,
        Self::Vaapi,
        Self::Nvenc,
        Self::V4l2m2m,
        Self::Videotoolbox,
        Self::Software,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qsv => "qsv",
            Self::Vaapi => "vaapi",
            Self::Nvenc => "nvenc",
            Self::V4l2m2m => "v4l2m2m",
            Self::Videotoolbox => "videotoolbox",
            Self::Software => "software",
        }
    }

    pub fn is_hardware(&self) -> bool {
        !matches!(self, Self::Software)
    }
}

impl fmt::Display for Accelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Accelerator {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == lower)
            .ok_or_else(|| PlanError::UnknownAccelerator(s.to_string()))
    }
}

/// Output video codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    H264,
    Hevc,
}

impl Codec {
    pub const ALL: [Codec; 2] = [Self::H264, Self::Hevc];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::Hevc => "hevc",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Codec {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h264" => Ok(Self::H264),
            "hevc" => Ok(Self::Hevc),
            _ => Err(PlanError::UnknownCodec(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerMode {
    Normal,
    LowPower,
}

/// One point of the benchmark matrix. Generated per probe, never persisted on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncoderCandidate {
    pub accelerator: Accelerator,
    pub codec: Codec,
    pub power_mode: PowerMode,
}

impl EncoderCandidate {
    pub fn new(accelerator: Accelerator, codec: Codec, power_mode: PowerMode) -> Self {
        Self {
            accelerator,
            codec,
            power_mode,
        }
    }
}

impl fmt::Display for EncoderCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.accelerator, self.codec)?;
        if self.power_mode == PowerMode::LowPower {
            f.write_str("/low_power")?;
        }
        Ok(())
    }
}

/// Measured outcome for one candidate. `speed_multiplier == 0.0` means unusable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub candidate: EncoderCandidate,
    pub speed_multiplier: f64,
    pub supports_10bit_decode: bool,
    pub supports_10bit_encode: bool,
}

impl BenchmarkResult {
    pub fn is_usable(&self) -> bool {
        self.speed_multiplier > 0.0
    }
}

/// Cacheable aggregate of one probe run on one hardware fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySnapshot {
    pub hardware_fingerprint: String,
    pub best_accelerator: Accelerator,
    pub best_codec: Codec,
    pub best_uses_low_power: bool,
    pub supports_10bit_decode: bool,
    pub supports_10bit_encode: bool,
    #[serde(default)]
    pub results: Vec<BenchmarkResult>,
}

impl CapabilitySnapshot {
    /// Conservative snapshot used when nothing could be measured
    pub fn software_default(hardware_fingerprint: impl Into<String>) -> Self {
        Self {
            hardware_fingerprint: hardware_fingerprint.into(),
            best_accelerator: Accelerator::Software,
            best_codec: Codec::H264,
            best_uses_low_power: false,
            supports_10bit_decode: false,
            supports_10bit_encode: false,
            results: Vec::new(),
        }
    }

    pub fn speed_of(&self, candidate: EncoderCandidate) -> Option<f64> {
        self.results
            .iter()
            .find(|r| r.candidate == candidate)
            .map(|r| r.speed_multiplier)
    }

    /// Whether the low-power path should be used for `accelerator`/`codec`.
    ///
    /// Answers from the best-candidate flag when asked about the best
    /// candidate, otherwise compares the recorded trial speeds.
    pub fn prefers_low_power(&self, accelerator: Accelerator, codec: Codec) -> bool {
        if accelerator == self.best_accelerator && codec == self.best_codec {
            return self.best_uses_low_power;
        }
        let normal = self
            .speed_of(EncoderCandidate::new(accelerator, codec, PowerMode::Normal))
            .unwrap_or(0.0);
        let low_power = self
            .speed_of(EncoderCandidate::new(accelerator, codec, PowerMode::LowPower))
            .unwrap_or(0.0);
        low_power > normal
    }
}

/// Rational frame rate as reported by ffprobe (`30000/1001`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rational {
    pub num: u64,
    pub den: u64,
}

impl Rational {
    pub const fn new(num: u64, den: u64) -> Self {
        Self { num, den }
    }

    /// Parse strictly as `int/int`
    pub fn parse(s: &str) -> Option<Self> {
        let (num, den) = s.trim().split_once('/')?;
        Some(Self {
            num: num.trim().parse().ok()?,
            den: den.trim().parse().ok()?,
        })
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Parser for ffmpeg progress output (key=value format)
#[derive(Debug, Default, Clone)]
pub struct ProgressParser {
    pub speed: Option<f64>,
    pub is_complete: bool,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a single line of ffmpeg progress output
    pub fn parse_line(&mut self, line: &str) {
        if let Some((key, value)) = line.split_once('=') {
            match key.trim() {
                "speed" => {
                    // Speed is in format "1.23x", strip the 'x'; "N/A" is ignored
                    let speed_str = value.trim().trim_end_matches('x');
                    if let Ok(s) = speed_str.trim().parse::<f64>() {
                        if s.is_finite() && s >= 0.0 {
                            self.speed = Some(s);
                        }
                    }
                }
                "progress" => {
                    if value.trim() == "end" {
                        self.is_complete = true;
                    }
                }
                _ => {}
            }
        }
    }

    pub fn parse_output(output: &str) -> Self {
        let mut parser = Self::new();
        for line in output.lines() {
            parser.parse_line(line);
        }
        parser
    }
}

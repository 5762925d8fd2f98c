//! Decision engine.
//!
//! Turns a `StreamProfile` and a `CapabilitySnapshot` into an `EncodingPlan`.
//! Pure and deterministic: identical inputs always give an identical plan,
//! and every fatal error is raised before any part of a plan is built.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::engine::context::ProbeContext;
use crate::engine::core::{
    Accelerator, CapabilitySnapshot, Codec, Rational, SOFTWARE_PIXEL_FORMAT_FILTER, profile,
};
use crate::engine::error::PlanError;
use crate::engine::probe::StreamProfile;

const REFERENCE_BITRATE: u64 = 8_000_000;
const REFERENCE_PIXELS: u64 = 1920 * 1080;
const MIN_VIDEO_BITRATE: u64 = 2_000_000;

const FALLBACK_GOP: u64 = 50;
const FALLBACK_FRAME_RATE: Rational = Rational::new(25, 1);

const MIN_SOURCE_AUDIO_BITRATE: u64 = 60_000;
const MAX_SOURCE_AUDIO_BITRATE: u64 = 500_000;
const AUDIO_BITRATE_PER_CHANNEL: u64 = 64_000;
const DEFAULT_AUDIO_CHANNELS: u64 = 2;

const DEFAULT_B_FRAMES: u32 = 2;

/// User-facing overrides; `None` means "use the capability snapshot"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOverrides {
    pub codec: Option<String>,
    pub accelerator: Option<String>,
    pub allow_10bit: Option<bool>,
    pub allow_hdr: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassthroughReason {
    Uhd,
    TenBit,
    Hdr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelLayout {
    #[serde(rename = "mono")]
    Mono,
    #[serde(rename = "stereo")]
    Stereo,
    #[serde(rename = "5.1")]
    Surround51,
    #[serde(rename = "7.1")]
    Surround71,
}

impl ChannelLayout {
    pub fn from_channels(channels: u32) -> Option<Self> {
        match channels {
            1 => Some(Self::Mono),
            2 => Some(Self::Stereo),
            6 => Some(Self::Surround51),
            8 => Some(Self::Surround71),
            _ => None,
        }
    }

    pub fn channels(&self) -> u32 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
            Self::Surround51 => 6,
            Self::Surround71 => 8,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mono => "mono",
            Self::Stereo => "stereo",
            Self::Surround51 => "5.1",
            Self::Surround71 => "7.1",
        }
    }
}

/// Non-fatal adjustments made while building a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Frame rate unparseable or too low to yield a GOP
    FrameRateFallback,
    ChannelLayoutForced { channels: Option<u32> },
    AudioBitrateSynthesized,
}

/// BT.2020 tags plus the source transfer characteristic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdrMetadata {
    pub color_primaries: String,
    pub colorspace: String,
    pub color_transfer: String,
}

impl HdrMetadata {
    fn bt2020(color_transfer: &str) -> Self {
        Self {
            color_primaries: "bt2020".to_string(),
            colorspace: "bt2020nc".to_string(),
            color_transfer: color_transfer.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodePlan {
    pub encoder: String,
    pub accelerator: Accelerator,
    pub codec: Codec,
    pub low_power: bool,
    /// 10-bit source kept at 10 bits (hevc only)
    pub ten_bit_output: bool,
    pub video_bitrate: u64,
    pub max_bitrate: u64,
    pub buffer_size: u64,
    pub gop: u64,
    pub b_frames: u32,
    pub frame_rate: Rational,
    pub audio_bitrate: u64,
    pub channel_layout: ChannelLayout,
    pub hdr: Option<HdrMetadata>,
    pub pixel_format_filter: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl TranscodePlan {
    pub fn has_diagnostic(&self, diagnostic: &Diagnostic) -> bool {
        self.diagnostics.contains(diagnostic)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "plan", rename_all = "snake_case")]
pub enum EncodingPlan {
    Passthrough(PassthroughReason),
    Transcode(TranscodePlan),
}

/// Overrides parsed against the closed enumerations
struct EffectiveChoice {
    accelerator: Accelerator,
    codec: Codec,
    allow_10bit: bool,
    allow_hdr: bool,
}

fn resolve_overrides(
    caps: &CapabilitySnapshot,
    overrides: &PlanOverrides,
) -> Result<EffectiveChoice, PlanError> {
    let accelerator = match overrides.accelerator.as_deref() {
        Some(name) => name.parse::<Accelerator>()?,
        None => caps.best_accelerator,
    };
    let codec = match overrides.codec.as_deref() {
        Some(name) => name.parse::<Codec>()?,
        None => caps.best_codec,
    };
    // HDR allowance follows 10-bit encode support but is overridden on its own
    Ok(EffectiveChoice {
        accelerator,
        codec,
        allow_10bit: overrides.allow_10bit.unwrap_or(caps.supports_10bit_encode),
        allow_hdr: overrides.allow_hdr.unwrap_or(caps.supports_10bit_encode),
    })
}

/// Decide how to handle one input stream.
///
/// Precedence is fixed: UHD, then 10-bit, then HDR passthrough, otherwise
/// transcode. `encoders` is the set compiled into the transcoding engine.
pub fn decide(
    profile_in: &StreamProfile,
    caps: &CapabilitySnapshot,
    overrides: &PlanOverrides,
    encoders: &BTreeSet<String>,
) -> Result<EncodingPlan, PlanError> {
    let choice = resolve_overrides(caps, overrides)?;

    if profile_in.is_uhd() {
        return Ok(EncodingPlan::Passthrough(PassthroughReason::Uhd));
    }
    if profile_in.is_10bit() && !choice.allow_10bit {
        return Ok(EncodingPlan::Passthrough(PassthroughReason::TenBit));
    }
    if profile_in.is_hdr() && !choice.allow_hdr {
        return Ok(EncodingPlan::Passthrough(PassthroughReason::Hdr));
    }

    let table = profile(choice.accelerator);
    let encoder = table.encoder_name(choice.codec);
    if !encoders.contains(encoder) {
        return Err(PlanError::EncoderUnavailable(encoder.to_string()));
    }

    let mut diagnostics = Vec::new();

    let video_bitrate = video_bitrate(profile_in.width, profile_in.height);

    let (gop, frame_rate) = match gop_for(profile_in.frame_rate) {
        Some(gop) => (gop, profile_in.frame_rate.unwrap_or(FALLBACK_FRAME_RATE)),
        None => {
            warn!(
                frame_rate = ?profile_in.frame_rate,
                "Unusable frame rate; using GOP {} at {}", FALLBACK_GOP, FALLBACK_FRAME_RATE
            );
            diagnostics.push(Diagnostic::FrameRateFallback);
            (FALLBACK_GOP, FALLBACK_FRAME_RATE)
        }
    };

    let audio_bitrate = match source_audio_bitrate(profile_in.audio_bitrate) {
        Some(bitrate) => bitrate,
        None => {
            diagnostics.push(Diagnostic::AudioBitrateSynthesized);
            synthesized_audio_bitrate(profile_in.audio_channels)
        }
    };

    let channel_layout = match profile_in.audio_channels.and_then(ChannelLayout::from_channels) {
        Some(layout) => layout,
        None => {
            warn!(channels = ?profile_in.audio_channels, "Unsupported channel count; forcing stereo");
            diagnostics.push(Diagnostic::ChannelLayoutForced {
                channels: profile_in.audio_channels,
            });
            ChannelLayout::Stereo
        }
    };

    let pixel_format_filter = (profile_in.is_10bit() && choice.codec == Codec::H264).then(|| {
        match table.pixel_format_filter {
            Some(gpu) if choice.accelerator.is_hardware() => gpu.to_string(),
            _ => SOFTWARE_PIXEL_FORMAT_FILTER.to_string(),
        }
    });

    let hdr = match (&profile_in.color_transfer, profile_in.is_hdr()) {
        (Some(transfer), true) if choice.codec == Codec::Hevc && choice.allow_hdr => {
            Some(HdrMetadata::bt2020(transfer))
        }
        _ => None,
    };

    let low_power = table.supports_low_power && caps.prefers_low_power(choice.accelerator, choice.codec);
    let b_frames = if table.forbids_b_frames(low_power) {
        0
    } else {
        DEFAULT_B_FRAMES
    };

    info!(
        encoder,
        video_bitrate,
        gop,
        low_power,
        "Transcode plan selected"
    );

    Ok(EncodingPlan::Transcode(TranscodePlan {
        encoder: encoder.to_string(),
        accelerator: choice.accelerator,
        codec: choice.codec,
        low_power,
        ten_bit_output: profile_in.is_10bit() && choice.codec == Codec::Hevc,
        video_bitrate,
        max_bitrate: video_bitrate * 5 / 4,
        buffer_size: video_bitrate * 2,
        gop,
        b_frames,
        frame_rate,
        audio_bitrate,
        channel_layout,
        hdr,
        pixel_format_filter,
        diagnostics,
    }))
}

/// `decide` with the overrides and encoder list carried by `ctx`
pub fn decide_in(
    ctx: &ProbeContext,
    profile_in: &StreamProfile,
    caps: &CapabilitySnapshot,
) -> Result<EncodingPlan, PlanError> {
    decide(profile_in, caps, &ctx.overrides, &ctx.encoders)
}

/// 8 Mbps at 1080p scaled by pixel count, floored at 2 Mbps
pub fn video_bitrate(width: u32, height: u32) -> u64 {
    let pixels = u128::from(width) * u128::from(height);
    let scaled = u128::from(REFERENCE_BITRATE) * pixels / u128::from(REFERENCE_PIXELS);
    u64::try_from(scaled).unwrap_or(u64::MAX).max(MIN_VIDEO_BITRATE)
}

/// Round-half-up GOP from the frame rate; `None` selects the fallback.
/// Rates that round to zero frames are as unusable as a zero denominator.
pub fn gop_for(rate: Option<Rational>) -> Option<u64> {
    let rate = rate?;
    if rate.den == 0 {
        return None;
    }
    let gop = rate.num.checked_add(rate.den / 2)? / rate.den;
    (gop > 0).then_some(gop)
}

fn source_audio_bitrate(bitrate: Option<u64>) -> Option<u64> {
    bitrate.filter(|b| (MIN_SOURCE_AUDIO_BITRATE..=MAX_SOURCE_AUDIO_BITRATE).contains(b))
}

fn synthesized_audio_bitrate(channels: Option<u32>) -> u64 {
    AUDIO_BITRATE_PER_CHANNEL * channels.map(u64::from).unwrap_or(DEFAULT_AUDIO_CHANNELS)
}

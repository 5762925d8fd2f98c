// ffprobe JSON -> StreamProfile -> EncodingPlan

use crate::common::all_encoders;
use ffcaps::engine::decision::{ChannelLayout, Diagnostic};
use ffcaps::engine::{
    Accelerator, CapabilitySnapshot, Codec, EncodingPlan, PassthroughReason, PlanError,
    PlanOverrides, Rational, decide, normalize,
};
use serde_json::{Value, json};

fn caps(accel: Accelerator, codec: Codec, tenbit: bool) -> CapabilitySnapshot {
    CapabilitySnapshot {
        best_accelerator: accel,
        best_codec: codec,
        supports_10bit_decode: tenbit,
        supports_10bit_encode: tenbit,
        ..CapabilitySnapshot::software_default("linux|8086:56a0")
    }
}

fn ffprobe(width: u32, height: u32, pix_fmt: &str, transfer: &str, rate: &str) -> Value {
    json!({
        "streams": [
            {"index": 0, "codec_type": "video", "codec_name": "hevc", "width": width, "height": height,
             "pix_fmt": pix_fmt, "color_transfer": transfer, "r_frame_rate": rate},
            {"index": 1, "codec_type": "audio", "codec_name": "aac", "channels": 2, "bit_rate": "128000"}
        ]
    })
}

fn plan_for(raw: &Value, caps: &CapabilitySnapshot, overrides: &PlanOverrides) -> Result<EncodingPlan, PlanError> {
    let profile = normalize(raw)?;
    decide(&profile, caps, overrides, &all_encoders())
}

#[test]
fn test_uhd_hdr_resolves_to_uhd() {
    let raw = ffprobe(3840, 2160, "yuv420p10le", "smpte2084", "24000/1001");
    for tenbit in [false, true] {
        assert_eq!(
            plan_for(&raw, &caps(Accelerator::Vaapi, Codec::Hevc, tenbit), &PlanOverrides::default()),
            Ok(EncodingPlan::Passthrough(PassthroughReason::Uhd))
        );
    }
}

#[test]
fn test_10bit_checked_before_hdr() {
    let raw = ffprobe(1920, 1080, "yuv420p10le", "smpte2084", "25/1");
    assert_eq!(
        plan_for(&raw, &caps(Accelerator::Vaapi, Codec::Hevc, false), &PlanOverrides::default()),
        Ok(EncodingPlan::Passthrough(PassthroughReason::TenBit))
    );
}

#[test]
fn test_hdr_passthrough_for_8bit_hdr_without_support() {
    // 8-bit HLG: not 10-bit, so the HDR rule decides
    let raw = ffprobe(1920, 1080, "yuv420p", "arib-std-b67", "25/1");
    assert_eq!(
        plan_for(&raw, &caps(Accelerator::Software, Codec::Hevc, false), &PlanOverrides::default()),
        Ok(EncodingPlan::Passthrough(PassthroughReason::Hdr))
    );
}

#[test]
fn test_overrides_unlock_hdr_transcode() {
    let raw = ffprobe(1920, 1080, "yuv420p10le", "smpte2084", "24000/1001");
    let overrides = PlanOverrides {
        allow_10bit: Some(true),
        allow_hdr: Some(true),
        ..Default::default()
    };
    let Ok(EncodingPlan::Transcode(t)) = plan_for(&raw, &caps(Accelerator::Software, Codec::Hevc, false), &overrides)
    else {
        panic!("expected transcode");
    };
    assert_eq!(t.encoder, "libx265");
    assert_eq!(t.gop, 24);
    assert_eq!(t.frame_rate, Rational::new(24000, 1001));
    assert_eq!(t.hdr.map(|h| h.color_transfer), Some("smpte2084".to_string()));
}

#[test]
fn test_hdr_dropped_for_h264_output() {
    let raw = ffprobe(1920, 1080, "yuv420p10le", "smpte2084", "25/1");
    let overrides = PlanOverrides {
        codec: Some("h264".to_string()),
        ..Default::default()
    };
    let Ok(EncodingPlan::Transcode(t)) = plan_for(&raw, &caps(Accelerator::Nvenc, Codec::Hevc, true), &overrides)
    else {
        panic!("expected transcode");
    };
    assert_eq!(t.encoder, "h264_nvenc");
    assert_eq!(t.hdr, None);
    assert_eq!(t.pixel_format_filter.as_deref(), Some("scale_cuda=format=yuv420p"));
}

#[test]
fn test_720p_parameters() {
    let raw = ffprobe(1280, 720, "yuv420p", "bt709", "30/1");
    let Ok(EncodingPlan::Transcode(t)) =
        plan_for(&raw, &caps(Accelerator::Software, Codec::H264, false), &PlanOverrides::default())
    else {
        panic!("expected transcode");
    };
    assert_eq!(t.video_bitrate, 3_555_555);
    assert_eq!(t.max_bitrate, 4_444_443);
    assert_eq!(t.buffer_size, 7_111_110);
    assert_eq!(t.gop, 30);
    assert_eq!(t.audio_bitrate, 128_000);
    assert_eq!(t.channel_layout, ChannelLayout::Stereo);
    assert!(t.diagnostics.is_empty());
}

#[test]
fn test_audio_less_input_still_plans() {
    let raw = json!({
        "streams": [{"codec_type": "video", "codec_name": "h264", "width": 320, "height": 240,
                     "pix_fmt": "yuv420p", "r_frame_rate": "0/0"}]
    });
    let Ok(EncodingPlan::Transcode(t)) =
        plan_for(&raw, &caps(Accelerator::Software, Codec::H264, false), &PlanOverrides::default())
    else {
        panic!("expected transcode");
    };
    assert_eq!(t.video_bitrate, 2_000_000);
    assert_eq!(t.gop, 50);
    assert_eq!(t.frame_rate, Rational::new(25, 1));
    assert_eq!(t.audio_bitrate, 128_000);
    assert_eq!(
        t.diagnostics,
        vec![
            Diagnostic::FrameRateFallback,
            Diagnostic::AudioBitrateSynthesized,
            Diagnostic::ChannelLayoutForced { channels: None },
        ]
    );
}

#[test]
fn test_no_video_is_fatal() {
    let raw = json!({"streams": [{"codec_type": "audio", "codec_name": "flac", "channels": 2}]});
    assert_eq!(
        plan_for(&raw, &caps(Accelerator::Software, Codec::H264, false), &PlanOverrides::default()),
        Err(PlanError::NoVideoStream)
    );
}

#[test]
fn test_unavailable_encoder_is_fatal() {
    let raw = ffprobe(1920, 1080, "yuv420p", "bt709", "25/1");
    let profile = normalize(&raw).unwrap();
    let only_x264 = ["libx264".to_string()].into_iter().collect();
    assert_eq!(
        decide(&profile, &caps(Accelerator::Vaapi, Codec::Hevc, false), &PlanOverrides::default(), &only_x264),
        Err(PlanError::EncoderUnavailable("hevc_vaapi".to_string()))
    );
}

#[test]
fn test_plan_json_shape() {
    let plan = EncodingPlan::Passthrough(PassthroughReason::TenBit);
    assert_eq!(
        serde_json::to_value(&plan).unwrap(),
        json!({"mode": "passthrough", "plan": "ten_bit"})
    );
}

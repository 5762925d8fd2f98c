// Rendered ffmpeg arguments for representative plans and trials

use crate::common::{all_encoders, cmd_to_string, context};
use ffcaps::engine::{
    Accelerator, CapabilitySnapshot, Codec, EncoderCandidate, FfmpegTrialRunner, PlanOverrides,
    PowerMode, Rational, StreamProfile, TrialSpec, decide, render,
};
use insta::assert_snapshot;
use std::path::Path;

const DEVICE: &str = "/dev/dri/renderD128";

fn rendered(profile: &StreamProfile, caps: &CapabilitySnapshot, overrides: &PlanOverrides, input: &str) -> String {
    let plan = decide(profile, caps, overrides, &all_encoders()).unwrap();
    let mut words = vec!["ffmpeg".to_string()];
    words.extend(render(&plan, Path::new(DEVICE)).args(input, "OUTPUT"));
    words.join(" ")
}

fn caps(accel: Accelerator, codec: Codec) -> CapabilitySnapshot {
    CapabilitySnapshot {
        best_accelerator: accel,
        best_codec: codec,
        ..CapabilitySnapshot::software_default("linux|8086:56a0")
    }
}

fn sdr_1080p() -> StreamProfile {
    StreamProfile {
        video_codec: "h264".to_string(),
        width: 1920,
        height: 1080,
        pixel_format: "yuv420p".to_string(),
        color_transfer: Some("bt709".to_string()),
        frame_rate: Some(Rational::new(30000, 1001)),
        audio_bitrate: Some(192_000),
        audio_channels: Some(2),
    }
}

#[test]
fn snapshot_software_h264() {
    let cmd = rendered(&sdr_1080p(), &caps(Accelerator::Software, Codec::H264), &PlanOverrides::default(), "/media/in.mkv");
    assert_snapshot!(cmd, @"ffmpeg -i /media/in.mkv -c:v libx264 -preset veryfast -b:v 8000000 -maxrate 10000000 -bufsize 16000000 -g 30 -bf 2 -c:a aac -b:a 192000 -ac 2 OUTPUT");
}

#[test]
fn snapshot_vaapi_low_power_hdr10() {
    let profile = StreamProfile {
        video_codec: "hevc".to_string(),
        pixel_format: "yuv420p10le".to_string(),
        color_transfer: Some("smpte2084".to_string()),
        frame_rate: Some(Rational::new(24000, 1001)),
        audio_bitrate: Some(640_000),
        audio_channels: Some(6),
        ..sdr_1080p()
    };
    let caps = CapabilitySnapshot {
        best_uses_low_power: true,
        supports_10bit_encode: true,
        ..caps(Accelerator::Vaapi, Codec::Hevc)
    };
    let cmd = rendered(&profile, &caps, &PlanOverrides::default(), "/media/hdr.mkv");
    assert_snapshot!(cmd, @"ffmpeg -init_hw_device vaapi=va:/dev/dri/renderD128 -hwaccel vaapi -hwaccel_output_format vaapi -filter_hw_device va -i /media/hdr.mkv -c:v hevc_vaapi -rc_mode VBR -b:v 8000000 -maxrate 10000000 -bufsize 16000000 -g 24 -bf 0 -low_power 1 -profile:v main10 -color_primaries bt2020 -colorspace bt2020nc -color_trc smpte2084 -c:a aac -b:a 384000 -ac 6 OUTPUT");
}

#[test]
fn snapshot_nvenc_10bit_to_h264_fallback_rate() {
    let profile = StreamProfile {
        width: 1280,
        height: 720,
        pixel_format: "yuv420p10le".to_string(),
        frame_rate: None,
        audio_bitrate: None,
        audio_channels: None,
        ..sdr_1080p()
    };
    let overrides = PlanOverrides {
        allow_10bit: Some(true),
        ..Default::default()
    };
    let cmd = rendered(&profile, &caps(Accelerator::Nvenc, Codec::H264), &overrides, "/media/clip.ts");
    assert_snapshot!(cmd, @"ffmpeg -hwaccel cuda -hwaccel_output_format cuda -i /media/clip.ts -c:v h264_nvenc -preset p4 -rc vbr -b:v 3555555 -maxrate 4444443 -bufsize 7111110 -g 50 -bf 2 -r 25/1 -vf scale_cuda=format=yuv420p -c:a aac -b:a 128000 -ac 2 OUTPUT");
}

#[test]
fn snapshot_qsv_low_power_trial() {
    let trial = TrialSpec {
        candidate: EncoderCandidate::new(Accelerator::Qsv, Codec::Hevc, PowerMode::LowPower),
        encoder: "hevc_qsv",
        ten_bit: false,
    };
    let cmd = FfmpegTrialRunner::encode_command(&context(all_encoders()), &trial);
    assert_snapshot!(cmd_to_string(&cmd), @"ffmpeg -hide_banner -nostdin -loglevel error -y -init_hw_device qsv=qs:/dev/dri/renderD128 -filter_hw_device qs -f lavfi -i testsrc2=size=1920x1080:rate=30:duration=5 -an -vf format=nv12,hwupload=extra_hw_frames=64,format=qsv -c:v hevc_qsv -preset veryfast -look_ahead 0 -b:v 8M -maxrate 10M -bufsize 16M -g 60 -low_power 1 -bf 0 -progress pipe:1 -nostats -f null -");
}

#[test]
fn snapshot_software_10bit_trial() {
    let trial = TrialSpec {
        candidate: EncoderCandidate::new(Accelerator::Software, Codec::Hevc, PowerMode::Normal),
        encoder: "libx265",
        ten_bit: true,
    };
    let cmd = FfmpegTrialRunner::encode_command(&context(all_encoders()), &trial);
    assert_snapshot!(cmd_to_string(&cmd), @"ffmpeg -hide_banner -nostdin -loglevel error -y -f lavfi -i testsrc2=size=1920x1080:rate=30:duration=5 -an -pix_fmt yuv420p10le -c:v libx265 -preset veryfast -b:v 8M -maxrate 10M -bufsize 16M -g 60 -profile:v main10 -progress pipe:1 -nostats -f null -");
}

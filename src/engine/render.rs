//! Flatten an `EncodingPlan` into transcoding-engine arguments.

use serde::Serialize;
use std::path::Path;

use crate::engine::core::{expand_args, profile};
use crate::engine::decision::{Diagnostic, EncodingPlan, TranscodePlan};

const AUDIO_ENCODER: &str = "aac";

/// ffmpeg arguments split around the `-i <input>` position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedPlan {
    pub input_args: Vec<String>,
    pub output_args: Vec<String>,
}

impl RenderedPlan {
    /// Full argument vector for `input` and `output`
    pub fn args(&self, input: &str, output: &str) -> Vec<String> {
        let mut args = self.input_args.clone();
        args.push("-i".to_string());
        args.push(input.to_string());
        args.extend(self.output_args.iter().cloned());
        args.push(output.to_string());
        args
    }

    /// Shell-quoted command line for display
    pub fn preview(&self, ffmpeg: &str, input: &str, output: &str) -> String {
        let mut words = vec![ffmpeg.to_string()];
        words.extend(self.args(input, output));
        shlex::try_join(words.iter().map(String::as_str)).unwrap_or_else(|_| words.join(" "))
    }
}

/// Render `plan`; `device` fills `{device}` in hwaccel setup
pub fn render(plan: &EncodingPlan, device: &Path) -> RenderedPlan {
    match plan {
        EncodingPlan::Passthrough(_) => RenderedPlan {
            input_args: Vec::new(),
            output_args: ["-c:v", "copy", "-c:a", "copy"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        },
        EncodingPlan::Transcode(t) => render_transcode(t, device),
    }
}

fn render_transcode(t: &TranscodePlan, device: &Path) -> RenderedPlan {
    let table = profile(t.accelerator);

    let mut out: Vec<String> = vec!["-c:v".to_string(), t.encoder.clone()];
    out.extend(table.rate_control_args.iter().map(|a| a.to_string()));
    out.extend([
        "-b:v".to_string(),
        t.video_bitrate.to_string(),
        "-maxrate".to_string(),
        t.max_bitrate.to_string(),
        "-bufsize".to_string(),
        t.buffer_size.to_string(),
        "-g".to_string(),
        t.gop.to_string(),
        "-bf".to_string(),
        t.b_frames.to_string(),
    ]);

    if t.low_power {
        out.extend(table.low_power_args.iter().map(|a| a.to_string()));
    }
    if t.ten_bit_output {
        out.extend(table.hevc_10bit_args.iter().map(|a| a.to_string()));
    }
    if t.diagnostics.contains(&Diagnostic::FrameRateFallback) {
        out.push("-r".to_string());
        out.push(t.frame_rate.to_string());
    }
    if let Some(filter) = &t.pixel_format_filter {
        out.push("-vf".to_string());
        out.push(filter.clone());
    }
    if let Some(hdr) = &t.hdr {
        out.extend([
            "-color_primaries".to_string(),
            hdr.color_primaries.clone(),
            "-colorspace".to_string(),
            hdr.colorspace.clone(),
            "-color_trc".to_string(),
            hdr.color_transfer.clone(),
        ]);
    }

    out.extend([
        "-c:a".to_string(),
        AUDIO_ENCODER.to_string(),
        "-b:a".to_string(),
        t.audio_bitrate.to_string(),
        "-ac".to_string(),
        t.channel_layout.channels().to_string(),
    ]);

    RenderedPlan {
        input_args: expand_args(table.hwaccel_args, device),
        output_args: out,
    }
}

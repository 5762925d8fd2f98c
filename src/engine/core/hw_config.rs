//! Accelerator capability table.
//!
//! One record per accelerator: ffmpeg encoder names, hwaccel setup, trial
//! rate control, low-power switches and the GPU scaler used for 10-bit to
//! 8-bit conversion. `{device}` in any argument expands to the VAAPI render
//! node at use time.

use std::path::Path;

use super::types::{Accelerator, Codec};

#[derive(Debug)]
pub struct AccelProfile {
    pub accelerator: Accelerator,
    pub h264_encoder: &'static str,
    pub hevc_encoder: &'static str,
    /// Input-side args for transcoding with hardware decode
    pub hwaccel_args: &'static [&'static str],
    /// Input-side args for the 10-bit decode probe; must fail rather than fall back to software
    pub decode_probe_args: &'static [&'static str],
    /// Decoder forced for the decode probe (M2M devices have no `-hwaccel`)
    pub hevc_decoder: Option<&'static str>,
    /// Device setup for encoding software frames (trial clips)
    pub encode_device_args: &'static [&'static str],
    /// Filter uploading software frames to the encoder; `{fmt}` is the surface format
    pub upload_filter: Option<&'static str>,
    pub sw_format_8bit: &'static str,
    pub sw_format_10bit: &'static str,
    pub rate_control_args: &'static [&'static str],
    pub low_power_args: &'static [&'static str],
    pub hevc_10bit_args: &'static [&'static str],
    pub supports_low_power: bool,
    pub b_frames_in_low_power: bool,
    /// qsv 10-bit encode is never trusted, whatever a trial measures
    pub trusts_10bit_encode: bool,
    /// GPU-side 10-bit to 8-bit conversion; software filter is used when absent
    pub pixel_format_filter: Option<&'static str>,
}

/// Generic CPU pixel-format conversion for h264 output
pub const SOFTWARE_PIXEL_FORMAT_FILTER: &str = "format=yuv420p";

static ACCEL_TABLE: [AccelProfile; 6] = [
    AccelProfile {
        accelerator: Accelerator::Qsv,
        h264_encoder: "h264_qsv",
        hevc_encoder: "hevc_qsv",
        hwaccel_args: &[
            "-init_hw_device",
            "qsv=qs:{device}",
            "-hwaccel",
            "qsv",
            "-hwaccel_output_format",
            "qsv",
            "-filter_hw_device",
            "qs",
        ],
        decode_probe_args: &[
            "-init_hw_device",
            "qsv=qs:{device}",
            "-hwaccel",
            "qsv",
            "-hwaccel_output_format",
            "qsv",
        ],
        hevc_decoder: None,
        encode_device_args: &["-init_hw_device", "qsv=qs:{device}", "-filter_hw_device", "qs"],
        upload_filter: Some("format={fmt},hwupload=extra_hw_frames=64,format=qsv"),
        sw_format_8bit: "nv12",
        sw_format_10bit: "p010le",
        rate_control_args: &["-preset", "veryfast", "-look_ahead", "0"],
        low_power_args: &["-low_power", "1"],
        hevc_10bit_args: &["-profile:v", "main10"],
        supports_low_power: true,
        b_frames_in_low_power: false,
        trusts_10bit_encode: false,
        pixel_format_filter: Some("vpp_qsv=format=nv12"),
    },
    AccelProfile {
        accelerator: Accelerator::Vaapi,
        h264_encoder: "h264_vaapi",
        hevc_encoder: "hevc_vaapi",
        hwaccel_args: &[
            "-init_hw_device",
            "vaapi=va:{device}",
            "-hwaccel",
            "vaapi",
            "-hwaccel_output_format",
            "vaapi",
            "-filter_hw_device",
            "va",
        ],
        decode_probe_args: &[
            "-init_hw_device",
            "vaapi=va:{device}",
            "-hwaccel",
            "vaapi",
            "-hwaccel_output_format",
            "vaapi",
        ],
        hevc_decoder: None,
        encode_device_args: &["-init_hw_device", "vaapi=va:{device}", "-filter_hw_device", "va"],
        upload_filter: Some("format={fmt},hwupload"),
        sw_format_8bit: "nv12",
        sw_format_10bit: "p010le",
        rate_control_args: &["-rc_mode", "VBR"],
        low_power_args: &["-low_power", "1"],
        hevc_10bit_args: &["-profile:v", "main10"],
        supports_low_power: true,
        b_frames_in_low_power: false,
        trusts_10bit_encode: true,
        pixel_format_filter: Some("scale_vaapi=format=nv12"),
    },
    AccelProfile {
        accelerator: Accelerator::Nvenc,
        h264_encoder: "h264_nvenc",
        hevc_encoder: "hevc_nvenc",
        hwaccel_args: &["-hwaccel", "cuda", "-hwaccel_output_format", "cuda"],
        decode_probe_args: &["-hwaccel", "cuda", "-hwaccel_output_format", "cuda"],
        hevc_decoder: None,
        encode_device_args: &[],
        upload_filter: None,
        sw_format_8bit: "yuv420p",
        sw_format_10bit: "p010le",
        rate_control_args: &["-preset", "p4", "-rc", "vbr"],
        low_power_args: &[],
        hevc_10bit_args: &["-profile:v", "main10"],
        supports_low_power: false,
        b_frames_in_low_power: true,
        trusts_10bit_encode: true,
        pixel_format_filter: Some("scale_cuda=format=yuv420p"),
    },
    AccelProfile {
        accelerator: Accelerator::V4l2m2m,
        h264_encoder: "h264_v4l2m2m",
        hevc_encoder: "hevc_v4l2m2m",
        hwaccel_args: &[],
        decode_probe_args: &[],
        hevc_decoder: Some("hevc_v4l2m2m"),
        encode_device_args: &[],
        upload_filter: None,
        sw_format_8bit: "yuv420p",
        sw_format_10bit: "p010le",
        rate_control_args: &["-num_output_buffers", "32", "-num_capture_buffers", "16"],
        low_power_args: &[],
        hevc_10bit_args: &[],
        supports_low_power: false,
        b_frames_in_low_power: true,
        trusts_10bit_encode: true,
        pixel_format_filter: None,
    },
    AccelProfile {
        accelerator: Accelerator::Videotoolbox,
        h264_encoder: "h264_videotoolbox",
        hevc_encoder: "hevc_videotoolbox",
        hwaccel_args: &["-hwaccel", "videotoolbox"],
        decode_probe_args: &[
            "-hwaccel",
            "videotoolbox",
            "-hwaccel_output_format",
            "videotoolbox_vld",
        ],
        hevc_decoder: None,
        encode_device_args: &[],
        upload_filter: None,
        sw_format_8bit: "nv12",
        sw_format_10bit: "p010le",
        rate_control_args: &["-realtime", "0", "-allow_sw", "0"],
        low_power_args: &[],
        hevc_10bit_args: &["-profile:v", "main10"],
        supports_low_power: false,
        b_frames_in_low_power: true,
        trusts_10bit_encode: true,
        pixel_format_filter: None,
    },
    AccelProfile {
        accelerator: Accelerator::Software,
        h264_encoder: "libx264",
        hevc_encoder: "libx265",
        hwaccel_args: &[],
        decode_probe_args: &[],
        hevc_decoder: None,
        encode_device_args: &[],
        upload_filter: None,
        sw_format_8bit: "yuv420p",
        sw_format_10bit: "yuv420p10le",
        rate_control_args: &["-preset", "veryfast"],
        low_power_args: &[],
        hevc_10bit_args: &["-profile:v", "main10"],
        supports_low_power: false,
        b_frames_in_low_power: true,
        trusts_10bit_encode: true,
        pixel_format_filter: None,
    },
];

/// Look up the table entry for `accelerator`
pub fn profile(accelerator: Accelerator) -> &'static AccelProfile {
    match accelerator {
        Accelerator::Qsv => &ACCEL_TABLE[0],
        Accelerator::Vaapi => &ACCEL_TABLE[1],
        Accelerator::Nvenc => &ACCEL_TABLE[2],
        Accelerator::V4l2m2m => &ACCEL_TABLE[3],
        Accelerator::Videotoolbox => &ACCEL_TABLE[4],
        Accelerator::Software => &ACCEL_TABLE[5],
    }
}

impl AccelProfile {
    /// Concrete ffmpeg encoder id for `codec`
    pub fn encoder_name(&self, codec: Codec) -> &'static str {
        match codec {
            Codec::H264 => self.h264_encoder,
            Codec::Hevc => self.hevc_encoder,
        }
    }

    pub fn sw_format(&self, ten_bit: bool) -> &'static str {
        if ten_bit {
            self.sw_format_10bit
        } else {
            self.sw_format_8bit
        }
    }

    /// Upload filter with the surface format filled in
    pub fn upload_chain(&self, ten_bit: bool) -> Option<String> {
        self.upload_filter
            .map(|f| f.replace("{fmt}", self.sw_format(ten_bit)))
    }

    /// Whether B-frames must be disabled for the given power mode
    pub fn forbids_b_frames(&self, low_power: bool) -> bool {
        low_power && self.supports_low_power && !self.b_frames_in_low_power
    }
}

/// Expand `{device}` placeholders into owned arguments
pub fn expand_args(args: &[&str], device: &Path) -> Vec<String> {
    let device = device.to_string_lossy();
    args.iter().map(|a| a.replace("{device}", &device)).collect()
}

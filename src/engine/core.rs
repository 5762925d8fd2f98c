pub mod ffmpeg_info;
pub mod hw_config;
pub mod process;
mod types;

pub use ffmpeg_info::{available_encoders, ffmpeg_version, ffprobe_version, parse_encoder_list};
pub use hw_config::{AccelProfile, SOFTWARE_PIXEL_FORMAT_FILTER, expand_args, profile};
pub use process::{CancelFlag, RunOutcome, run_bounded};
pub use types::{
    Accelerator, BenchmarkResult, CapabilitySnapshot, Codec, EncoderCandidate, PowerMode,
    ProgressParser, Rational,
};

// Capability negotiation engine - independent of the CLI

pub mod benchmark;
pub mod cache;
pub mod context;
pub mod core;
pub mod decision;
pub mod error;
pub mod hardware;
pub mod probe;
pub mod render;
pub mod sample;

pub use benchmark::{EncoderBenchmark, FfmpegTrialRunner, TrialRunner, TrialSpec};
pub use cache::{CacheLookup, CacheRecord, CapabilityCache, resolve_capabilities};
pub use context::{ProbeContext, TrialSettings};
pub use self::core::*;
pub use decision::{EncodingPlan, PassthroughReason, PlanOverrides, TranscodePlan, decide};
pub use error::{CacheMiss, PlanError, ProbeError, SampleUnavailable, TrialFailure};
pub use hardware::{HardwareFingerprint, fingerprint};
pub use probe::{StreamProber, StreamProfile, normalize};
pub use render::{RenderedPlan, render};
pub use sample::{SampleHandle, SampleProvider, SampleStatus};

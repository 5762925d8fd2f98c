//! Benchmark-driven capability probe.
//!
//! Runs short, bounded trial encodes over {accelerator, codec, power mode},
//! scores each by ffmpeg's reported realtime multiple and folds the results
//! into a `CapabilitySnapshot`. A failed trial is a zero score, never an
//! error. Trials run strictly one after another so no two contend for the
//! same GPU encoder.

use std::process::Command;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::engine::context::ProbeContext;
use crate::engine::core::{
    Accelerator, BenchmarkResult, CapabilitySnapshot, Codec, EncoderCandidate, PowerMode,
    ProgressParser, RunOutcome, expand_args, profile, run_bounded,
};
use crate::engine::error::TrialFailure;
use crate::engine::hardware::ACCELERATOR_PRIORITY;
use crate::engine::sample::SampleHandle;

/// Trial bitrate settings, representative of production 1080p output
const TRIAL_BITRATE: &str = "8M";
const TRIAL_MAXRATE: &str = "10M";
const TRIAL_BUFSIZE: &str = "16M";
const DECODE_PROBE_FRAMES: &str = "60";

/// One trial encode to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialSpec {
    pub candidate: EncoderCandidate,
    pub encoder: &'static str,
    pub ten_bit: bool,
}

/// Seam between the probe algorithm and whatever actually runs trials
pub trait TrialRunner {
    /// Whether `accel` can hardware-decode the 10-bit reference sample
    fn decode_10bit(&self, ctx: &ProbeContext, accel: Accelerator, sample: &SampleHandle) -> bool;

    /// Run one trial encode and return its speed multiplier
    fn encode(&self, ctx: &ProbeContext, trial: &TrialSpec) -> Result<f64, TrialFailure>;
}

pub struct EncoderBenchmark<R> {
    runner: R,
}

impl<R: TrialRunner> EncoderBenchmark<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Benchmark `accelerators` and assemble a snapshot.
    ///
    /// Accelerators are evaluated in `ACCELERATOR_PRIORITY` order whatever
    /// order they are passed in, so speed ties resolve deterministically.
    /// `software` is always evaluated.
    pub fn probe(&self, ctx: &ProbeContext, accelerators: &[Accelerator]) -> CapabilitySnapshot {
        let start = Instant::now();
        let ordered: Vec<Accelerator> = ACCELERATOR_PRIORITY
            .into_iter()
            .filter(|a| *a == Accelerator::Software || accelerators.contains(a))
            .collect();

        info!(
            fingerprint = %ctx.fingerprint,
            accelerators = ?ordered,
            "Starting capability probe"
        );

        let mut results = Vec::new();
        let mut any_10bit_decode = false;
        let mut any_10bit_encode = false;
        let mut best: Option<(Accelerator, Codec, bool)> = None;
        let mut best_score = 0.0_f64;

        'accelerators: for accel in ordered {
            let table = profile(accel);

            let decode_10bit = if ctx.cancel.is_cancelled() {
                false
            } else if !accel.is_hardware() {
                false
            } else if let Some(sample) = &ctx.sample {
                let ok = self.runner.decode_10bit(ctx, accel, sample);
                debug!(%accel, ok, "10-bit decode probe");
                ok
            } else {
                false
            };
            any_10bit_decode |= decode_10bit;

            for codec in Codec::ALL {
                if ctx.cancel.is_cancelled() {
                    warn!("Capability probe cancelled; remaining trials skipped");
                    break 'accelerators;
                }

                let encoder = table.encoder_name(codec);
                if !ctx.has_encoder(encoder) {
                    debug!(encoder, "Encoder not compiled into ffmpeg, skipping");
                    continue;
                }

                let normal = EncoderCandidate::new(accel, codec, PowerMode::Normal);
                let normal_speed = self.score(ctx, normal, encoder, false);

                let low_power = EncoderCandidate::new(accel, codec, PowerMode::LowPower);
                let low_power_speed = if table.supports_low_power {
                    Some(self.score(ctx, low_power, encoder, false))
                } else {
                    None
                };

                let lp_speed = low_power_speed.unwrap_or(0.0);
                let effective = normal_speed.max(lp_speed);
                let uses_low_power = lp_speed > normal_speed;

                let encode_10bit = codec == Codec::Hevc
                    && table.trusts_10bit_encode
                    && effective > 0.0
                    && {
                        let candidate = if uses_low_power { low_power } else { normal };
                        self.score(ctx, candidate, encoder, true) > 0.0
                    };
                any_10bit_encode |= encode_10bit;

                results.push(BenchmarkResult {
                    candidate: normal,
                    speed_multiplier: normal_speed,
                    supports_10bit_decode: decode_10bit,
                    supports_10bit_encode: encode_10bit,
                });
                if let Some(speed) = low_power_speed {
                    results.push(BenchmarkResult {
                        candidate: low_power,
                        speed_multiplier: speed,
                        supports_10bit_decode: decode_10bit,
                        supports_10bit_encode: encode_10bit,
                    });
                }

                // Strict comparison: the first candidate to reach a score keeps it
                if effective > best_score {
                    best_score = effective;
                    best = Some((accel, codec, uses_low_power));
                }
            }
        }

        let snapshot = match best {
            Some((accel, codec, uses_low_power)) => CapabilitySnapshot {
                hardware_fingerprint: ctx.fingerprint.canonical(),
                best_accelerator: accel,
                best_codec: codec,
                best_uses_low_power: uses_low_power,
                supports_10bit_decode: any_10bit_decode,
                supports_10bit_encode: any_10bit_encode,
                results,
            },
            None => {
                warn!("No encoder candidate succeeded; falling back to software/h264");
                CapabilitySnapshot {
                    results,
                    ..CapabilitySnapshot::software_default(ctx.fingerprint.canonical())
                }
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            best_accelerator = %snapshot.best_accelerator,
            best_codec = %snapshot.best_codec,
            low_power = snapshot.best_uses_low_power,
            speed = best_score,
            tenbit_decode = snapshot.supports_10bit_decode,
            tenbit_encode = snapshot.supports_10bit_encode,
            elapsed_ms,
            "Capability probe finished"
        );

        snapshot
    }

    fn score(
        &self,
        ctx: &ProbeContext,
        candidate: EncoderCandidate,
        encoder: &'static str,
        ten_bit: bool,
    ) -> f64 {
        let trial = TrialSpec {
            candidate,
            encoder,
            ten_bit,
        };
        match self.runner.encode(ctx, &trial) {
            Ok(speed) if speed.is_finite() && speed > 0.0 => {
                debug!(%candidate, ten_bit, speed, "Trial encode");
                speed
            }
            Ok(_) => {
                debug!(%candidate, ten_bit, reason = %TrialFailure::NoSpeed, "Trial encode failed");
                0.0
            }
            Err(reason) => {
                debug!(%candidate, ten_bit, %reason, "Trial encode failed");
                0.0
            }
        }
    }
}

/// Runs trials through the real ffmpeg binary
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegTrialRunner;

impl FfmpegTrialRunner {
    pub fn encode_command(ctx: &ProbeContext, trial: &TrialSpec) -> Command {
        let table = profile(trial.candidate.accelerator);
        let settings = &ctx.trial;

        let mut cmd = Command::new(&ctx.ffmpeg);
        cmd.args(["-hide_banner", "-nostdin", "-loglevel", "error", "-y"]);
        cmd.args(expand_args(table.encode_device_args, &ctx.vaapi_device));

        cmd.arg("-f").arg("lavfi");
        cmd.arg("-i").arg(format!(
            "testsrc2=size={}x{}:rate={}:duration={}",
            settings.width, settings.height, settings.rate, settings.duration_secs
        ));
        cmd.arg("-an");

        match table.upload_chain(trial.ten_bit) {
            Some(chain) => {
                cmd.arg("-vf").arg(chain);
            }
            None => {
                cmd.arg("-pix_fmt").arg(table.sw_format(trial.ten_bit));
            }
        }

        cmd.arg("-c:v").arg(trial.encoder);
        cmd.args(table.rate_control_args);
        cmd.arg("-b:v").arg(TRIAL_BITRATE);
        cmd.arg("-maxrate").arg(TRIAL_MAXRATE);
        cmd.arg("-bufsize").arg(TRIAL_BUFSIZE);
        cmd.arg("-g").arg((settings.rate * 2).to_string());

        let low_power = trial.candidate.power_mode == PowerMode::LowPower;
        if low_power {
            cmd.args(table.low_power_args);
        }
        if table.forbids_b_frames(low_power) {
            cmd.arg("-bf").arg("0");
        }
        if trial.ten_bit {
            cmd.args(table.hevc_10bit_args);
        }

        cmd.args(["-progress", "pipe:1", "-nostats", "-f", "null", "-"]);
        cmd
    }

    pub fn decode_command(ctx: &ProbeContext, accel: Accelerator, sample: &SampleHandle) -> Command {
        let table = profile(accel);

        let mut cmd = Command::new(&ctx.ffmpeg);
        cmd.args(["-hide_banner", "-nostdin", "-loglevel", "error"]);
        cmd.args(expand_args(table.decode_probe_args, &ctx.vaapi_device));
        if let Some(decoder) = table.hevc_decoder {
            cmd.arg("-c:v").arg(decoder);
        }
        cmd.arg("-i").arg(sample.path());
        cmd.args(["-frames:v", DECODE_PROBE_FRAMES, "-an", "-f", "null", "-"]);
        cmd
    }
}

impl TrialRunner for FfmpegTrialRunner {
    fn decode_10bit(&self, ctx: &ProbeContext, accel: Accelerator, sample: &SampleHandle) -> bool {
        let cmd = Self::decode_command(ctx, accel, sample);
        run_bounded(cmd, ctx.trial.timeout, &ctx.cancel).succeeded()
    }

    fn encode(&self, ctx: &ProbeContext, trial: &TrialSpec) -> Result<f64, TrialFailure> {
        let cmd = Self::encode_command(ctx, trial);
        match run_bounded(cmd, ctx.trial.timeout, &ctx.cancel) {
            RunOutcome::Exited {
                success: true,
                stdout,
                ..
            } => progress_speed(&stdout),
            RunOutcome::Exited {
                code, stderr_tail, ..
            } => {
                debug!(encoder = trial.encoder, stderr = stderr_tail.trim_end(), "ffmpeg stderr");
                Err(TrialFailure::NonZeroExit(code.unwrap_or(-1)))
            }
            RunOutcome::TimedOut => Err(TrialFailure::TimedOut),
            RunOutcome::Cancelled => Err(TrialFailure::Cancelled),
            RunOutcome::SpawnFailed(e) => Err(TrialFailure::SpawnFailed(e)),
        }
    }
}

/// Final speed of a finished trial; output without `progress=end` is rejected
fn progress_speed(stdout: &str) -> Result<f64, TrialFailure> {
    let progress = ProgressParser::parse_output(stdout);
    if !progress.is_complete {
        return Err(TrialFailure::Truncated);
    }
    progress.speed.filter(|s| *s > 0.0).ok_or(TrialFailure::NoSpeed)
}

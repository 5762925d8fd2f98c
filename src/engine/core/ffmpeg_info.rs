use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use super::process::{CancelFlag, RunOutcome, run_bounded};

/// Check if ffmpeg is available and return its version
pub fn ffmpeg_version(ffmpeg: &Path, timeout: Duration) -> Result<String> {
    tool_version(ffmpeg, timeout)
}

/// Check if ffprobe is available and return its version
pub fn ffprobe_version(ffprobe: &Path, timeout: Duration) -> Result<String> {
    tool_version(ffprobe, timeout)
}

fn tool_version(program: &Path, timeout: Duration) -> Result<String> {
    let mut cmd = Command::new(program);
    cmd.arg("-version");
    let stdout = run_tool(cmd, program, timeout)
        .with_context(|| format!("{} -version failed", program.display()))?;

    let first_line = stdout.lines().next().unwrap_or("Unknown version");
    Ok(first_line.to_string())
}

/// Encoders compiled into this ffmpeg build (`ffmpeg -encoders`)
pub fn available_encoders(ffmpeg: &Path, timeout: Duration) -> Result<BTreeSet<String>> {
    let mut cmd = Command::new(ffmpeg);
    cmd.args(["-hide_banner", "-encoders"]);
    let stdout = run_tool(cmd, ffmpeg, timeout).context("ffmpeg -encoders failed")?;

    Ok(parse_encoder_list(&stdout))
}

fn run_tool(cmd: Command, program: &Path, timeout: Duration) -> Result<String> {
    match run_bounded(cmd, timeout, &CancelFlag::new()) {
        RunOutcome::Exited {
            success: true,
            stdout,
            ..
        } => Ok(stdout),
        RunOutcome::Exited { code, .. } => match code {
            Some(code) => anyhow::bail!("exited with status {}", code),
            None => anyhow::bail!("terminated by signal"),
        },
        RunOutcome::TimedOut => anyhow::bail!("timed out after {}s", timeout.as_secs_f64()),
        RunOutcome::Cancelled => anyhow::bail!("cancelled"),
        RunOutcome::SpawnFailed(e) => anyhow::bail!(
            "Failed to execute {}. Is it installed and in PATH? ({})",
            program.display(),
            e
        ),
    }
}

/// Parse the table printed by `ffmpeg -encoders`.
///
/// Rows look like ` V....D libx264   libx264 H.264 / AVC ...` and follow a
/// ` ------` separator; only video encoders are kept.
pub fn parse_encoder_list(text: &str) -> BTreeSet<String> {
    let mut encoders = BTreeSet::new();
    let mut in_table = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if !in_table {
            if trimmed.starts_with("------") {
                in_table = true;
            }
            continue;
        }

        let mut fields = trimmed.split_whitespace();
        let (Some(flags), Some(name)) = (fields.next(), fields.next()) else {
            continue;
        };
        if flags.len() == 6 && flags.starts_with('V') {
            encoders.insert(name.to_string());
        }
    }

    encoders
}

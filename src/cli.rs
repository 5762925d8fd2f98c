use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ffcaps")]
#[command(version)]
#[command(about = "Hardware encoder capability probe and encoding-plan decisions for ffmpeg", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the hardware fingerprint of this host
    Fingerprint,

    /// Show cached capabilities, probing encoders if the cache is missing or stale
    Probe {
        /// Ignore the cache and re-run every trial encode
        #[arg(long)]
        force: bool,

        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decide how an input should be encoded and print the ffmpeg arguments
    Plan(PlanArgs),

    /// Print the persisted capability record
    ShowCache,

    /// Delete the persisted capability record
    Invalidate,

    /// Check if ffmpeg and ffprobe are installed
    CheckFfmpeg,

    /// Show config status and location, or create default config if missing
    InitConfig,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Path or URL of the input
    #[arg(value_name = "INPUT")]
    pub input: String,

    /// Accelerator override (qsv, vaapi, nvenc, v4l2m2m, videotoolbox, software)
    #[arg(long)]
    pub accel: Option<String>,

    /// Output codec override (h264, hevc)
    #[arg(long)]
    pub codec: Option<String>,

    /// Transcode 10-bit sources even without measured 10-bit encode support
    #[arg(long, conflicts_with = "no_10bit")]
    pub allow_10bit: bool,

    /// Pass 10-bit sources through untouched
    #[arg(long = "no-10bit", conflicts_with = "allow_10bit")]
    pub no_10bit: bool,

    /// Transcode HDR sources keeping BT.2020 metadata
    #[arg(long, conflicts_with = "no_hdr")]
    pub allow_hdr: bool,

    /// Pass HDR sources through untouched
    #[arg(long, conflicts_with = "allow_hdr")]
    pub no_hdr: bool,

    /// Re-probe encoder capabilities before deciding
    #[arg(long)]
    pub force_probe: bool,

    /// User-Agent for HTTP(S) inputs
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Extra HTTP header ("Key: Value") for HTTP(S) inputs; repeatable
    #[arg(long = "header", value_name = "HEADER")]
    pub headers: Vec<String>,

    /// Print the plan and arguments as JSON
    #[arg(long)]
    pub json: bool,
}

impl PlanArgs {
    pub fn allow_10bit(&self) -> Option<bool> {
        flag_pair(self.allow_10bit, self.no_10bit)
    }

    pub fn allow_hdr(&self) -> Option<bool> {
        flag_pair(self.allow_hdr, self.no_hdr)
    }
}

fn flag_pair(yes: bool, no: bool) -> Option<bool> {
    if yes {
        Some(true)
    } else if no {
        Some(false)
    } else {
        None // Use config default
    }
}

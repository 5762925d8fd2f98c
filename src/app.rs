use crate::cli::{Cli, Commands, PlanArgs};
use anyhow::{Context, Result};
use ffcaps::config::Config;
use ffcaps::engine::{
    self, CacheMiss, CapabilityCache, CapabilitySnapshot, EncoderBenchmark, EncodingPlan,
    FfmpegTrialRunner, PlanOverrides, ProbeContext, SampleProvider, StreamProber, hardware,
};
use std::path::Path;
use std::process;

/// Placeholder output name used in printed command previews
const OUTPUT_PLACEHOLDER: &str = "OUTPUT";

pub fn run(cli: Cli) {
    match cli.command {
        Commands::Fingerprint => handle_fingerprint(),
        Commands::Probe { force, json } => handle_probe(force, json),
        Commands::Plan(args) => handle_plan(args),
        Commands::ShowCache => handle_show_cache(),
        Commands::Invalidate => handle_invalidate(),
        Commands::CheckFfmpeg => handle_check_ffmpeg(),
        Commands::InitConfig => handle_init_config(),
    }
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn fail(e: anyhow::Error) -> ! {
    eprintln!("Error: {:#}", e);
    process::exit(1);
}

/// Fingerprint, encoder list and trial settings for this invocation
fn probe_context(config: &Config) -> Result<ProbeContext> {
    let ffmpeg = &config.probe.ffmpeg_path;
    let timeout = config.probe.prober_timeout();
    let version = engine::ffmpeg_version(ffmpeg, timeout)?;
    let encoders = engine::available_encoders(ffmpeg, timeout)?;
    let trial = config.probe.trial_settings()?;

    Ok(ProbeContext::new(hardware::fingerprint(), encoders)
        .with_ffmpeg(ffmpeg.clone(), Some(version))
        .with_vaapi_device(hardware::vaapi_device())
        .with_trial(trial))
}

fn capabilities(config: &Config, ctx: &ProbeContext, force: bool) -> Result<CapabilitySnapshot> {
    let cache_dir = config.cache_dir()?;
    let cache = CapabilityCache::new(&cache_dir);
    let samples = SampleProvider::new(
        &cache_dir,
        config.probe.sample_url.clone(),
        config.probe.sample_timeout(),
    );
    let benchmark = EncoderBenchmark::new(FfmpegTrialRunner);
    let accelerators =
        hardware::accelerator_shortlist(&ctx.fingerprint, hardware::has_m2m_device(Path::new("/sys")));

    Ok(engine::resolve_capabilities(
        &cache,
        ctx,
        &samples,
        &benchmark,
        &accelerators,
        force,
    ))
}

fn handle_fingerprint() {
    let fp = hardware::fingerprint();
    println!("{}", fp);
    println!("Platform: {}", fp.platform());
    for device in fp.devices() {
        println!("  {}:{}", device.vendor_id, device.device_id);
    }
    let shortlist = hardware::accelerator_shortlist(&fp, hardware::has_m2m_device(Path::new("/sys")));
    let names: Vec<&str> = shortlist.iter().map(|a| a.as_str()).collect();
    println!("Accelerators to benchmark: {}", names.join(", "));
}

fn print_snapshot(snapshot: &CapabilitySnapshot) {
    println!("Fingerprint:      {}", snapshot.hardware_fingerprint);
    println!(
        "Best encoder:     {}/{}{}",
        snapshot.best_accelerator,
        snapshot.best_codec,
        if snapshot.best_uses_low_power { " (low power)" } else { "" }
    );
    println!("10-bit decode:    {}", yes_no(snapshot.supports_10bit_decode));
    println!("10-bit encode:    {}", yes_no(snapshot.supports_10bit_encode));
    if !snapshot.results.is_empty() {
        println!("Trials:");
        for result in &snapshot.results {
            println!("  {:<28} {:>7.2}x", result.candidate.to_string(), result.speed_multiplier);
        }
    }
}

fn yes_no(v: bool) -> &'static str {
    if v { "yes" } else { "no" }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => fail(anyhow::Error::new(e).context("Failed to serialize output")),
    }
}

fn handle_probe(force: bool, json: bool) {
    let config = load_config();
    let ctx = probe_context(&config).unwrap_or_else(|e| fail(e));
    let snapshot = capabilities(&config, &ctx, force).unwrap_or_else(|e| fail(e));

    if json {
        print_json(&snapshot);
    } else {
        print_snapshot(&snapshot);
    }
}

/// Command-line overrides win over `[defaults]` in the config file
fn merge_overrides(args: &PlanArgs, config: &Config) -> PlanOverrides {
    let defaults = config.defaults.overrides();
    PlanOverrides {
        codec: args.codec.clone().or(defaults.codec),
        accelerator: args.accel.clone().or(defaults.accelerator),
        allow_10bit: args.allow_10bit().or(defaults.allow_10bit),
        allow_hdr: args.allow_hdr().or(defaults.allow_hdr),
    }
}

fn handle_plan(args: PlanArgs) {
    let config = load_config();

    // Stream first: a source without video must fail before any benchmarking
    let prober = StreamProber::new(&config.probe.ffprobe_path, config.probe.prober_timeout());
    let stream = prober
        .probe_stream(&args.input, args.user_agent.as_deref(), &args.headers)
        .with_context(|| format!("Failed to probe {}", args.input))
        .unwrap_or_else(|e| fail(e));

    let ctx = probe_context(&config)
        .map(|ctx| ctx.with_overrides(merge_overrides(&args, &config)))
        .unwrap_or_else(|e| fail(e));
    let caps = capabilities(&config, &ctx, args.force_probe).unwrap_or_else(|e| fail(e));

    let plan = engine::decision::decide_in(&ctx, &stream, &caps).unwrap_or_else(|e| fail(e.into()));
    let rendered = engine::render(&plan, &ctx.vaapi_device);

    if args.json {
        print_json(&serde_json::json!({
            "stream": stream,
            "plan": plan,
            "args": rendered.args(&args.input, OUTPUT_PLACEHOLDER),
        }));
        return;
    }

    match &plan {
        EncodingPlan::Passthrough(reason) => println!("Passthrough ({:?})", reason),
        EncodingPlan::Transcode(t) => {
            println!(
                "Transcode with {} ({}/{}{})",
                t.encoder,
                t.accelerator,
                t.codec,
                if t.low_power { ", low power" } else { "" }
            );
            println!(
                "  video {} b/s (max {}, buf {}), GOP {}, B-frames {}",
                t.video_bitrate, t.max_bitrate, t.buffer_size, t.gop, t.b_frames
            );
            println!(
                "  audio {} b/s, {}",
                t.audio_bitrate,
                t.channel_layout.as_str()
            );
            for diagnostic in &t.diagnostics {
                println!("  note: {:?}", diagnostic);
            }
        }
    }
    println!(
        "{}",
        rendered.preview(
            &config.probe.ffmpeg_path.to_string_lossy(),
            &args.input,
            OUTPUT_PLACEHOLDER
        )
    );
}

fn handle_show_cache() {
    let config = load_config();
    let cache = CapabilityCache::new(config.cache_dir().unwrap_or_else(|e| fail(e)));

    match cache.load_record() {
        Ok(record) => {
            println!("Cache file:       {}", cache.path().display());
            println!("Probed at:        {}", record.probed_at.to_rfc3339());
            if let Some(version) = &record.ffmpeg_version {
                println!("ffmpeg:           {}", version);
            }
            print_snapshot(&record.snapshot);

            let current = hardware::fingerprint().canonical();
            if current != record.hardware_fingerprint {
                println!("Stale: current hardware fingerprints as {}", current);
            }
        }
        Err(CacheMiss::Absent) => {
            println!("No capability cache at {}", cache.path().display());
        }
        Err(miss) => {
            eprintln!("Error: {}", miss);
            process::exit(1);
        }
    }
}

fn handle_invalidate() {
    let config = load_config();
    let cache = CapabilityCache::new(config.cache_dir().unwrap_or_else(|e| fail(e)));

    match cache.invalidate() {
        Ok(true) => println!("Removed {}", cache.path().display()),
        Ok(false) => println!("No capability cache to remove"),
        Err(e) => fail(e),
    }
}

fn handle_check_ffmpeg() {
    let config = load_config();
    let timeout = config.probe.prober_timeout();
    match engine::ffmpeg_version(&config.probe.ffmpeg_path, timeout) {
        Ok(version) => {
            println!("ffmpeg found: {}", version);
            match engine::ffprobe_version(&config.probe.ffprobe_path, timeout) {
                Ok(probe_version) => println!("ffprobe found: {}", probe_version),
                Err(e) => fail(e),
            }
            match engine::available_encoders(&config.probe.ffmpeg_path, timeout) {
                Ok(encoders) => {
                    let relevant: Vec<&str> = engine::Accelerator::ALL
                        .into_iter()
                        .flat_map(|a| {
                            engine::Codec::ALL
                                .into_iter()
                                .map(move |c| engine::profile(a).encoder_name(c))
                        })
                        .filter(|name| encoders.contains(*name))
                        .collect();
                    println!("Usable encoders: {}", relevant.join(", "));
                    process::exit(0);
                }
                Err(e) => fail(e),
            }
        }
        Err(e) => fail(e),
    }
}

fn handle_init_config() {
    match Config::load() {
        Ok(cfg) => {
            match Config::config_path() {
                Ok(path) => println!("Config loaded successfully from {}", path.display()),
                Err(e) => println!("Config loaded, but config path unknown: {:#}", e),
            }
            println!("{:#?}", cfg);
        }
        Err(e) => {
            println!("Config missing or invalid: {:#}", e);
            println!("Creating default config...");

            let cfg = Config::default();
            if let Err(err) = cfg.save() {
                eprintln!("Failed to save default config: {:#}", err);
                process::exit(1);
            } else {
                match Config::config_path() {
                    Ok(path) => println!("Default config saved to {}", path.display()),
                    Err(e) => println!("Default config saved (path unknown): {:#}", e),
                }
            }
        }
    }
}

//! Redub - Automated Spanish Dubbing Workflow
//!
//! Entry point for the redub binary: transcribes training videos, translates
//! the speech within each segment's syllable budget, synthesizes it and lays
//! the clips back onto a track that matches the source video's length.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender::{non_blocking, rolling};

use redub::assemble::{Assembler, DriftReport};
use redub::cli::{Args, Commands};
use redub::config::Config;
use redub::media::MediaProcessorFactory;
use redub::segment::{Timeline, read_segments};
use redub::workflow::{RunOptions, Workflow};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;
    info!("Starting Redub - Automated Spanish Dubbing Workflow");

    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            // Try to load config.toml from current directory first
            if Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };
    config.resolve_api_keys(|name| std::env::var(name).ok());

    match args.command {
        Commands::Process { input, output_dir, keep_intermediates, redo_from } => {
            info!("Processing video file: {}", input.display());
            let workflow = Workflow::new(config)?;
            let options = RunOptions { keep_intermediates, redo_from };
            let outcome = workflow.process_single_file(&input, output_dir.as_deref(), &options).await?;

            match &outcome.output_video {
                Some(path) => println!("Dubbed video: {}", path.display()),
                None => println!("No speech detected in {}, nothing to dub", input.display()),
            }
            println!("Estimated API cost: ${:.4}", outcome.cost.total);
        }
        Commands::Batch { input_dir, output_dir, keep_intermediates } => {
            info!("Processing directory: {}", input_dir.display());
            let workflow = Workflow::new(config)?;
            let options = RunOptions { keep_intermediates, redo_from: None };
            let summary = workflow.process_directory(&input_dir, output_dir.as_deref(), &options).await?;

            println!(
                "Processed {}/{} videos, estimated API cost ${:.4}",
                summary.processed.len(),
                summary.found,
                summary.cost.total
            );
            for (path, error) in &summary.failed {
                println!("  FAILED {}: {}", path.display(), error);
            }
            if !summary.failed.is_empty() {
                anyhow::bail!("{} of {} videos failed", summary.failed.len(), summary.found);
            }
        }
        Commands::Extract { input, output } => {
            info!("Extracting audio from: {}", input.display());
            let media = MediaProcessorFactory::create_processor(config.media.clone());
            media.check_availability()?;
            info!("Using {}", media.get_version_info().await?);
            media.extract_audio(&input, &output).await?;
        }
        Commands::Assemble { segments, total_duration, output, report } => {
            info!("Assembling {} into {}", segments.display(), output.display());
            let timeline = Timeline::new(read_segments(&segments)?, total_duration);
            let assembler = Assembler::with_ffmpeg(config.align.clone(), &config.media);
            let outcome = tokio::task::spawn_blocking(move || assembler.assemble(&timeline, &output)).await??;

            let report_path = report.unwrap_or_else(|| outcome.track.with_extension("drift.json"));
            outcome.report.write_to(&report_path)?;
            print_report(&outcome.report);
            println!("Track: {}", outcome.track.display());
            println!("Drift report: {}", report_path.display());
        }
        Commands::Plan { segments, total_duration } => {
            let timeline = Timeline::new(read_segments(&segments)?, total_duration);
            let assembler = Assembler::with_ffmpeg(config.align.clone(), &config.media);
            let plan = assembler.plan(&timeline)?;
            print_report(&DriftReport::from_plan(&plan));
        }
        Commands::Mux { video, audio, output } => {
            info!("Muxing {} into {}", audio.display(), video.display());
            let media = MediaProcessorFactory::create_processor(config.media.clone());
            media.check_availability()?;
            info!("Using {}", media.get_version_info().await?);
            media.mux_audio(&video, &audio, &output).await?;
        }
        Commands::InitConfig { path } => {
            if path.exists() {
                warn!("{} already exists, not overwriting", path.display());
                anyhow::bail!("{} already exists", path.display());
            }
            Config::default().save_to_file(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }

    info!("Redub workflow completed successfully");
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = std::env::current_dir()?.join(".redub").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "redub.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("redub.log").display());

    Ok(())
}

/// Print a per-segment summary of a drift report
fn print_report(report: &DriftReport) {
    println!("{:<8} {:<14} {:>10} {:>10}", "Segment", "Policy", "Magnitude", "Lead-in");
    println!("{}", "-".repeat(45));
    for entry in &report.entries {
        println!(
            "{:<8} {:<14} {:>10.3} {:>10.3}",
            entry.segment_index,
            format!("{:?}", entry.policy),
            entry.magnitude,
            entry.lead_in
        );
    }
    for warning in report.warnings() {
        println!("warning: {}", warning);
    }
}

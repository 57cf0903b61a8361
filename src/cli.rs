use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::manifest::Stage;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dub a single video file
    Process {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for the dubbed video (defaults to the input's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Keep the work directory with clips, manifest and assembled track
        #[arg(long)]
        keep_intermediates: bool,

        /// Rerun from this stage even if a previous run completed it
        #[arg(long, value_enum)]
        redo_from: Option<Stage>,
    },

    /// Dub all video files in a directory
    Batch {
        /// Input directory containing video files
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Output directory for the dubbed videos (defaults to the input directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Keep the work directories with clips, manifests and assembled tracks
        #[arg(long)]
        keep_intermediates: bool,
    },

    /// Extract audio from video file
    Extract {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Output audio file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Assemble synthesized segments into a track of the given length
    Assemble {
        /// JSON file with the segments (array, or a pipeline manifest)
        #[arg(short, long)]
        segments: PathBuf,

        /// Target track length in seconds
        #[arg(short, long)]
        total_duration: f64,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Where to write the drift report (defaults to <output>.drift.json)
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Show what assembly would do to each segment without rendering
    Plan {
        /// JSON file with the segments (array, or a pipeline manifest)
        #[arg(short, long)]
        segments: PathBuf,

        /// Target track length in seconds
        #[arg(short, long)]
        total_duration: f64,
    },

    /// Replace the audio track of a video
    Mux {
        /// Input video file
        #[arg(short, long)]
        video: PathBuf,

        /// Replacement audio file
        #[arg(short, long)]
        audio: PathBuf,

        /// Output video file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write a default configuration file
    InitConfig {
        /// Where to write the configuration
        #[arg(short, long, default_value = "config.toml")]
        path: PathBuf,
    },
}

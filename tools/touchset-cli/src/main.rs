//! Touchset CLI: build touch/no-touch training datasets from stylus sessions.
//!
//! Usage:
//!   touchset init <NAME>        Create a session from a video and a pointer log
//!   touchset mark <PATH>        Pin a video frame to a pointer timestamp
//!   touchset labels <PATH>      Edit or derive the touch labels
//!   touchset export <PATH>      Export a session to a dataset file
//!   touchset inspect <FILE>     Summarize an exported dataset
//!   touchset info <PATH>        Show session information
//!   touchset check              Check system capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "touchset",
    about = "Align stylus pointer logs with video and export touch datasets",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit structured JSON logs
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new session
    Init {
        /// Session name
        name: String,

        /// Video file or directory of frame images
        #[arg(long)]
        video: PathBuf,

        /// Pointer event log (JSONL)
        #[arg(long)]
        events: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Frame rate override (required for accurate frame directories)
        #[arg(long)]
        fps: Option<f64>,
    },

    /// Set the calibration anchor
    Mark {
        /// Path to the session directory
        path: PathBuf,

        /// Video frame where the stylus visibly lands
        #[arg(long)]
        frame: i32,

        /// Pointer timestamp (microseconds) recorded at that instant
        #[arg(long, conflicts_with = "event_index", required_unless_present = "event_index")]
        timestamp: Option<u64>,

        /// Index into the sorted pointer log instead of a raw timestamp
        #[arg(long)]
        event_index: Option<usize>,
    },

    /// Show, edit or derive touch labels
    Labels {
        /// Path to the session directory
        path: PathBuf,

        /// Derive labels from where pointer data matches frames
        #[arg(long)]
        auto: bool,

        /// First frame for --auto
        #[arg(long, default_value = "0")]
        start: i32,

        /// End frame (exclusive) for --auto; defaults to the video length
        #[arg(long)]
        end: Option<i32>,

        /// Set a label change, e.g. `--set 120=1 --set 180=0`
        #[arg(long = "set", value_name = "FRAME=0|1")]
        set: Vec<String>,

        /// Remove all labels
        #[arg(long)]
        clear: bool,
    },

    /// Export a session to a dataset file
    Export {
        /// Path to the session directory
        path: PathBuf,

        /// Output dataset path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// First frame to export
        #[arg(long, default_value = "0")]
        start: i32,

        /// End frame (exclusive); defaults to the video length
        #[arg(long)]
        end: Option<i32>,

        /// Rotation in degrees, counter-clockwise (multiple of 90)
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        rotation: i32,

        /// Side length of the square output images
        #[arg(long)]
        size: Option<u32>,

        /// Derive labels from pointer matches instead of the saved labels
        #[arg(long)]
        auto_labels: bool,

        /// Print the final outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize an exported dataset
    Inspect {
        /// Dataset file
        path: PathBuf,
    },

    /// Show session information
    Info {
        /// Path to the session directory
        path: PathBuf,
    },

    /// Check system capabilities
    Check {
        /// Write the effective configuration to the config file
        #[arg(long)]
        write_config: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = touchset_common::config::AppConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    touchset_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Init {
            name,
            video,
            events,
            output,
            fps,
        } => commands::init::run(name, video, events, output, fps),
        Commands::Mark {
            path,
            frame,
            timestamp,
            event_index,
        } => commands::mark::run(path, frame, timestamp, event_index),
        Commands::Labels {
            path,
            auto,
            start,
            end,
            set,
            clear,
        } => commands::labels::run(path, auto, start, end, set, clear, &config),
        Commands::Export {
            path,
            output,
            start,
            end,
            rotation,
            size,
            auto_labels,
            json,
        } => {
            commands::export::run(
                path,
                output,
                start,
                end,
                rotation,
                size,
                auto_labels,
                json,
                &config,
            )
            .await
        }
        Commands::Inspect { path } => commands::inspect::run(path),
        Commands::Info { path } => commands::info::run(path, &config),
        Commands::Check { write_config } => commands::check::run(write_config),
    }
}

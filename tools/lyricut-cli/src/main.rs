//! Lyricut CLI: assemble, edit, preview, and export lyric music videos.
//!
//! Usage:
//!   lyricut init <NAME>                  Create a new project
//!   lyricut add-clip <PATH> <FILE>       Append a video clip
//!   lyricut trim <PATH> <CLIP> <IN> <OUT>
//!   lyricut import <PATH> <RESPONSE>     Import aligned cues
//!   lyricut cues <PATH>                  List cues
//!   lyricut edit-cue <PATH> <CUE> ...    Retime or retext a cue
//!   lyricut add-cue <PATH> <AT>          Insert a placeholder cue
//!   lyricut subtitles <PATH>             Write SRT/VTT
//!   lyricut validate <PATH>              Check a project
//!   lyricut info <PATH>                  Show project information
//!   lyricut frame <PATH> <TIME>          Render one frame to PNG
//!   lyricut export <PATH>                Render the music video
//!   lyricut play <PATH>                  Real-time dry run

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(
    name = "lyricut",
    about = "Lyric music videos: clips, synced subtitles, one render",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum NudgeArg {
    Earlier,
    Later,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SubtitleFormat {
    Srt,
    Vtt,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new empty project
    Init {
        /// Project name
        name: String,

        /// Parent directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Master audio track
        #[arg(long)]
        audio: Option<PathBuf>,

        /// Output width
        #[arg(long)]
        width: Option<u32>,

        /// Output height
        #[arg(long)]
        height: Option<u32>,

        /// Output FPS
        #[arg(long)]
        fps: Option<u32>,
    },

    /// Append a video clip to the sequence
    AddClip {
        /// Path to the project directory
        path: PathBuf,

        /// Video file
        file: PathBuf,

        /// Source duration in seconds (probed when omitted)
        #[arg(long)]
        duration: Option<f64>,
    },

    /// Set a clip's trim points
    Trim {
        /// Path to the project directory
        path: PathBuf,

        /// Clip id
        clip: u64,

        /// Trim in (seconds)
        trim_in: f64,

        /// Trim out (seconds)
        trim_out: f64,
    },

    /// Import cues from a saved alignment response
    Import {
        /// Path to the project directory
        path: PathBuf,

        /// Alignment response JSON
        response: PathBuf,

        /// Word-level transcript JSON sent with the request
        #[arg(long)]
        transcript: Option<PathBuf>,

        /// Plain-text lyrics sent with the request
        #[arg(long)]
        lyrics: Option<PathBuf>,
    },

    /// List cues
    Cues {
        /// Path to the project directory
        path: PathBuf,

        /// Print the cue list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Edit one cue
    EditCue {
        /// Path to the project directory
        path: PathBuf,

        /// Cue id
        cue: u64,

        /// New start (seconds)
        #[arg(long)]
        start: Option<f64>,

        /// New end (seconds), committed as a finished edit
        #[arg(long)]
        end: Option<f64>,

        /// Nudge the start by one step
        #[arg(long, value_enum)]
        nudge_start: Option<NudgeArg>,

        /// Nudge the end by one step
        #[arg(long, value_enum)]
        nudge_end: Option<NudgeArg>,

        /// New primary text
        #[arg(long)]
        primary: Option<String>,

        /// New secondary text
        #[arg(long)]
        secondary: Option<String>,

        /// Shift later cues with end edits (overrides the project toggle)
        #[arg(long)]
        ripple: Option<bool>,

        /// Delete the cue
        #[arg(long)]
        delete: bool,
    },

    /// Insert a placeholder cue
    AddCue {
        /// Path to the project directory
        path: PathBuf,

        /// Start time (seconds)
        at: f64,
    },

    /// Write subtitles next to the exports
    Subtitles {
        /// Path to the project directory
        path: PathBuf,

        #[arg(long, value_enum, default_value = "srt")]
        format: SubtitleFormat,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a project
    Validate {
        /// Path to the project directory
        path: PathBuf,
    },

    /// Show project information
    Info {
        /// Path to the project directory
        path: PathBuf,
    },

    /// Render one composited frame to PNG
    Frame {
        /// Path to the project directory
        path: PathBuf,

        /// Timeline position (seconds)
        time: f64,

        /// Output PNG path
        #[arg(short, long, default_value = "frame.png")]
        output: PathBuf,
    },

    /// Export the project to WebM
    Export {
        /// Path to the project directory
        path: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Play the timeline against the wall clock and report sync
    Play {
        /// Path to the project directory
        path: PathBuf,

        /// Start position (seconds)
        #[arg(long, default_value = "0.0")]
        from: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = lyricut_common::config::AppConfig::load();

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    lyricut_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Init {
            name,
            output,
            audio,
            width,
            height,
            fps,
        } => commands::init::run(&config, name, output, audio, width, height, fps),
        Commands::AddClip {
            path,
            file,
            duration,
        } => commands::add_clip::run(path, file, duration),
        Commands::Trim {
            path,
            clip,
            trim_in,
            trim_out,
        } => commands::trim::run(path, clip, trim_in, trim_out),
        Commands::Import {
            path,
            response,
            transcript,
            lyrics,
        } => commands::import::run(path, response, transcript, lyrics),
        Commands::Cues { path, json } => commands::cues::run(path, json),
        Commands::EditCue {
            path,
            cue,
            start,
            end,
            nudge_start,
            nudge_end,
            primary,
            secondary,
            ripple,
            delete,
        } => commands::edit_cue::run(
            &config,
            path,
            cue,
            commands::edit_cue::CueChanges {
                start,
                end,
                nudge_start,
                nudge_end,
                primary,
                secondary,
                ripple,
                delete,
            },
        ),
        Commands::AddCue { path, at } => commands::add_cue::run(path, at),
        Commands::Subtitles {
            path,
            format,
            output,
        } => commands::subtitles::run(path, format, output),
        Commands::Validate { path } => commands::validate::run(path),
        Commands::Info { path } => commands::info::run(path),
        Commands::Frame { path, time, output } => {
            commands::frame::run(&config, path, time, output)
        }
        Commands::Export { path, output } => commands::export::run(config, path, output).await,
        Commands::Play { path, from } => commands::play::run(&config, path, from).await,
    }
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

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
    /// Generate a narrated, subtitled video from a topic
    Generate {
        /// Topic of the video
        #[arg(short, long)]
        topic: String,

        /// Output file stem (default: video-<timestamp>)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Generate a video from an existing script and image prompts
    Script {
        /// Narration script
        #[arg(short, long)]
        script: String,

        /// Image prompt, one per scene (repeatable)
        #[arg(short, long = "prompt", required = true)]
        prompts: Vec<String>,

        /// Output file stem (default: video-<timestamp>)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Assemble a video from narration audio, timing marks and images
    Assemble {
        /// Narration audio file
        #[arg(short, long)]
        audio: PathBuf,

        /// Newline-delimited timing marks for the narration
        #[arg(short, long)]
        marks: PathBuf,

        /// Image locator: URL, data URI, base64 payload or path (repeatable)
        #[arg(short, long = "image", required_unless_present = "image_dir", conflicts_with = "image_dir")]
        images: Vec<String>,

        /// Directory whose images are used in file-name order
        #[arg(long)]
        image_dir: Option<PathBuf>,

        /// Output file stem (default: video-<timestamp>)
        #[arg(short, long)]
        name: Option<String>,

        /// Keep the job's working directory
        #[arg(long)]
        keep: bool,
    },

    /// Render SRT and karaoke ASS subtitles from timing marks
    Subtitles {
        /// Newline-delimited timing marks
        #[arg(short, long)]
        marks: PathBuf,

        /// Sentence-level SRT output
        #[arg(long)]
        srt: PathBuf,

        /// Word-timed ASS output
        #[arg(long)]
        ass: PathBuf,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Output configuration file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
}

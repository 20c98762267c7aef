//! Reelforge - narrated short-video assembly
//!
//! Entry point for the `reelforge` binary: turns a topic, a script or ready-made
//! narration and images into a zoom-pan video with burned-in karaoke subtitles.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use walkdir::WalkDir;

use reelforge::cli::{Args, Commands};
use reelforge::config::Config;
use reelforge::generator::{default_output_name, VideoGenerator};
use reelforge::media::MediaEngineFactory;
use reelforge::sources::ScriptPlan;
use reelforge::workflow::{AssemblyRequest, Workflow};

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "webp", "gif", "bmp"];

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;
    info!("Starting Reelforge");

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

    match args.command {
        Commands::InitConfig { output } => {
            config.save_to_file(&output)?;
            println!("Configuration written to {}", output.display());
        }
        Commands::Subtitles { marks, srt, ass } => {
            let timing_marks = tokio::fs::read(&marks)
                .await
                .with_context(|| format!("Failed to read timing marks {}", marks.display()))?;

            // The engine is never invoked here, so its availability is not checked
            let engine = MediaEngineFactory::create_engine(config.media.clone());
            let workflow = Workflow::new(config, engine)?;
            workflow.render_subtitles(&timing_marks, &srt, &ass).await?;
            println!("Subtitles written to {} and {}", srt.display(), ass.display());
        }
        Commands::Assemble {
            audio,
            marks,
            images,
            image_dir,
            name,
            keep,
        } => {
            if keep {
                config.workspace.keep_intermediates = true;
            }
            let image_locators = match image_dir {
                Some(dir) => collect_images(&dir)?,
                None => images,
            };
            let timing_marks = tokio::fs::read(&marks)
                .await
                .with_context(|| format!("Failed to read timing marks {}", marks.display()))?;

            let workflow = Workflow::from_config(config).await?.with_progress(staging_progress());
            let path = workflow
                .assemble(AssemblyRequest {
                    narration_audio: audio,
                    timing_marks,
                    image_locators,
                    output_name: name.unwrap_or_else(|| default_output_name("video")),
                })
                .await?;
            println!("Video assembled at {}", path.display());
        }
        Commands::Generate { topic, name } => {
            let generator = build_generator(config).await?;
            let output_name = name.unwrap_or_else(|| default_output_name("video"));
            let path = generator.generate(&topic, &output_name).await?;
            println!("Video generated at {}", path.display());
        }
        Commands::Script {
            script,
            prompts,
            name,
        } => {
            let generator = build_generator(config).await?;
            let output_name = name.unwrap_or_else(|| default_output_name("video"));
            let plan = ScriptPlan {
                script,
                image_prompts: prompts,
            };
            let path = generator.generate_from_script(&plan, &output_name).await?;
            println!("Video generated at {}", path.display());
        }
    }

    info!("Reelforge completed successfully");
    Ok(())
}

async fn build_generator(config: Config) -> Result<VideoGenerator> {
    // Credentials first, so a missing key fails before the engine is probed
    config.require_credentials()?;
    let workflow = Workflow::from_config(config.clone())
        .await?
        .with_progress(staging_progress());
    Ok(VideoGenerator::from_config(&config, workflow)?)
}

/// Image files directly under `dir`, sorted by file name.
fn collect_images(dir: &Path) -> Result<Vec<String>> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        })
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No images found in {}", dir.display());
    }
    info!("Found {} images in {}", files.len(), dir.display());

    Ok(files
        .into_iter()
        .map(|path| path.to_string_lossy().into_owned())
        .collect())
}

fn staging_progress() -> ProgressBar {
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template("{spinner} staging images {pos}/{len} {wide_bar}") {
        bar.set_style(style);
    }
    bar
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = std::env::current_dir()?.join(".reelforge").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "reelforge.log");
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

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("reelforge.log").display()
    );

    Ok(())
}

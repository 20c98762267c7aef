use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use super::filter::{FilterGraph, OUTPUT_LABEL};
use crate::config::MediaConfig;
use crate::error::{ReelError, Result};

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Set video codec
    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    /// Set audio codec
    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Copy video stream
    pub fn copy_video(self) -> Self {
        self.video_codec("copy")
    }

    /// Copy audio stream
    pub fn copy_audio(self) -> Self {
        self.audio_codec("copy")
    }

    /// Add video filter
    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    /// Add a complex filter graph
    pub fn filter_complex<S: Into<String>>(self, graph: S) -> Self {
        self.arg("-filter_complex").arg(graph)
    }

    /// Select a stream for the output
    pub fn map<S: Into<String>>(self, stream: S) -> Self {
        self.arg("-map").arg(stream)
    }

    pub fn preset<S: Into<String>>(self, preset: S) -> Self {
        self.arg("-preset").arg(preset)
    }

    pub fn pixel_format<S: Into<String>>(self, format: S) -> Self {
        self.arg("-pix_fmt").arg(format)
    }

    pub fn frame_rate(self, fps: u32) -> Self {
        self.arg("-r").arg(fps.to_string())
    }

    /// Move the moov atom to the front for progressive playback
    pub fn fast_start(self) -> Self {
        self.arg("-movflags").arg("+faststart")
    }

    /// Stop at the end of the shortest input
    pub fn shortest(self) -> Self {
        self.arg("-shortest")
    }

    /// Full command line, for logging
    pub fn command_line(&self) -> String {
        std::iter::once(self.binary_path.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Execute the command and wait for it to finish
    pub async fn execute(&self) -> Result<()> {
        self.run().await.map(|_| ())
    }

    /// Execute the command and return its standard output
    pub async fn capture(&self) -> Result<String> {
        let stdout = self.run().await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    async fn run(&self) -> Result<Vec<u8>> {
        debug!("Executing media processing command: {}", self.command_line());
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| ReelError::Media(format!("Failed to execute media processor: {}", e)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            tracing::trace!(target: "reelforge::engine", "{}", line);
        }

        if !output.status.success() {
            return Err(ReelError::Media(format!(
                "{} failed ({}): {}",
                self.description,
                output.status,
                stderr_tail(&stderr, 20)
            )));
        }

        Ok(output.stdout)
    }
}

/// Last `lines` lines of engine output; ffmpeg puts the actual error at the end.
fn stderr_tail(stderr: &str, lines: usize) -> String {
    let all: Vec<&str> = stderr.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

/// Escape a path for use inside a filter-graph option value.
pub fn escape_filter_path(path: &str) -> String {
    path.replace('\\', "\\\\").replace(':', "\\:")
}

/// Builder for the pipeline's engine invocations
pub struct MediaCommandBuilder {
    config: MediaConfig,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    /// Build the zoom-pan slideshow command: one input per image, concatenated, silent
    pub fn compose<P: AsRef<Path>>(
        &self,
        images: &[P],
        graph: &FilterGraph,
        output_path: &Path,
    ) -> MediaCommand {
        let mut cmd = MediaCommand::new(&self.config.binary_path, "Video composition").overwrite();
        for image in images {
            cmd = cmd.input(image);
        }

        cmd.filter_complex(graph.render())
            .map(format!("[{}]", OUTPUT_LABEL))
            .video_codec(&self.config.video_codec)
            .preset(&self.config.preset)
            .pixel_format(&self.config.pixel_format)
            .frame_rate(graph.canvas().fps)
            .fast_start()
            .output(output_path)
    }

    /// Build the narration muxing command: video copied, audio re-encoded, trimmed to shortest
    pub fn mux_audio(&self, video_path: &Path, audio_path: &Path, output_path: &Path) -> MediaCommand {
        MediaCommand::new(&self.config.binary_path, "Audio muxing")
            .overwrite()
            .input(video_path)
            .input(audio_path)
            .copy_video()
            .audio_codec(&self.config.audio_codec)
            .args(["-strict", "experimental"])
            .shortest()
            .output(output_path)
    }

    /// Build subtitle burn-in command
    pub fn burn_subtitles(
        &self,
        video_path: &Path,
        subtitle_path: &Path,
        output_path: &Path,
    ) -> MediaCommand {
        let escaped = escape_filter_path(&subtitle_path.to_string_lossy());

        let mut cmd = MediaCommand::new(&self.config.binary_path, "Subtitle burn-in")
            .overwrite()
            .input(video_path)
            .video_filter(format!("ass='{}'", escaped))
            .map("0:v")
            .map("0:a")
            .copy_audio()
            .video_codec(&self.config.video_codec)
            .preset(&self.config.preset)
            .args(["-vsync", "1", "-max_muxing_queue_size", "1024"]);

        // Add user-specified additional options
        for option in &self.config.subtitle_options {
            cmd = cmd.arg(option);
        }

        cmd.output(output_path)
    }

    /// Build duration probe command; prints the container duration in seconds
    pub fn probe_duration(&self, media_path: &Path) -> MediaCommand {
        MediaCommand::new(&self.config.probe_path, "Duration probe")
            .args(["-v", "error", "-show_entries", "format=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .output(media_path)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.config.binary_path, "Version check").arg("-version")
    }
}

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{FilterGraph, MediaCommandBuilder, MediaEngine};
use crate::config::MediaConfig;
use crate::error::{ReelError, Result};

/// Media engine driving the ffmpeg and ffprobe binaries
pub struct FfmpegEngine {
    command_builder: MediaCommandBuilder,
}

impl FfmpegEngine {
    pub fn new(config: MediaConfig) -> Self {
        Self {
            command_builder: MediaCommandBuilder::new(config),
        }
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn compose(
        &self,
        images: &[PathBuf],
        graph: &FilterGraph,
        output_path: &Path,
    ) -> Result<()> {
        if images.len() != graph.stages().len() {
            return Err(ReelError::Compose(format!(
                "{} images but {} filter stages",
                images.len(),
                graph.stages().len()
            )));
        }

        info!(
            "Composing {} images ({} frames) into {}",
            images.len(),
            graph.total_frames(),
            output_path.display()
        );

        self.command_builder
            .compose(images, graph, output_path)
            .execute()
            .await
            .map_err(|e| ReelError::Compose(e.to_string()))?;

        info!("Video composition completed");
        Ok(())
    }

    async fn mux_audio(&self, video_path: &Path, audio_path: &Path, output_path: &Path) -> Result<()> {
        info!(
            "Muxing narration {} into {} -> {}",
            audio_path.display(),
            video_path.display(),
            output_path.display()
        );

        self.command_builder
            .mux_audio(video_path, audio_path, output_path)
            .execute()
            .await
            .map_err(|e| ReelError::Mux(e.to_string()))?;

        info!("Audio muxing completed");
        Ok(())
    }

    async fn burn_subtitles(
        &self,
        video_path: &Path,
        subtitle_path: &Path,
        output_path: &Path,
    ) -> Result<()> {
        let subtitle_path = std::path::absolute(subtitle_path).map_err(|e| {
            ReelError::SubtitleBurn(format!(
                "Cannot resolve subtitle path {}: {}",
                subtitle_path.display(),
                e
            ))
        })?;
        if !subtitle_path.is_file() {
            return Err(ReelError::SubtitleBurn(format!(
                "Subtitle document not found: {}",
                subtitle_path.display()
            )));
        }

        info!(
            "Burning subtitles from {} into {} -> {}",
            subtitle_path.display(),
            video_path.display(),
            output_path.display()
        );

        self.command_builder
            .burn_subtitles(video_path, &subtitle_path, output_path)
            .execute()
            .await
            .map_err(|e| ReelError::SubtitleBurn(e.to_string()))?;

        info!("Subtitle burn-in completed successfully");
        Ok(())
    }

    async fn probe_duration(&self, media_path: &Path) -> Result<f64> {
        let stdout = self
            .command_builder
            .probe_duration(media_path)
            .capture()
            .await?;

        parse_probe_duration(&stdout).ok_or_else(|| {
            ReelError::Media(format!(
                "Could not read duration of {} from probe output {:?}",
                media_path.display(),
                stdout.trim()
            ))
        })
    }

    async fn check_availability(&self) -> Result<()> {
        let version = self
            .command_builder
            .version_check()
            .capture()
            .await
            .map_err(|e| ReelError::Media(format!("Media processor not available: {}", e)))?;

        // Extract the first line which typically contains the version
        let first_line = version.lines().next().unwrap_or("Unknown version");
        info!("Media processor is available: {}", first_line);
        Ok(())
    }
}

fn parse_probe_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.parse::<f64>().ok())
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
}

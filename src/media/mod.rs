// Media processing over an external transcoding engine
//
// - filter: zoom-pan stage descriptors and their filter-graph rendering
// - commands: engine command builders and blocking execution
// - processor: the ffmpeg-backed engine used by the workflow

pub mod commands;
pub mod filter;
pub mod processor;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use commands::*;
pub use filter::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;

/// Stage operations of the assembly pipeline. Every call runs to completion or error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Concatenate the zoom-pan clips of `images` into one silent video
    async fn compose(&self, images: &[PathBuf], graph: &FilterGraph, output_path: &Path)
        -> Result<()>;

    /// Add the narration track to a silent video
    async fn mux_audio(&self, video_path: &Path, audio_path: &Path, output_path: &Path)
        -> Result<()>;

    /// Render an ASS subtitle document into the video
    async fn burn_subtitles(
        &self,
        video_path: &Path,
        subtitle_path: &Path,
        output_path: &Path,
    ) -> Result<()>;

    /// Duration of a media file in seconds
    async fn probe_duration(&self, media_path: &Path) -> Result<f64>;

    /// Check if the engine binaries can be executed
    async fn check_availability(&self) -> Result<()>;
}

/// Factory for creating media engine instances
pub struct MediaEngineFactory;

impl MediaEngineFactory {
    /// Create the default engine implementation (FFmpeg-based)
    pub fn create_engine(config: MediaConfig) -> Box<dyn MediaEngine> {
        Box::new(processor::FfmpegEngine::new(config))
    }
}

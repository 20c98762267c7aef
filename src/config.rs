use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ReelError, Result};
use crate::subtitle::KaraokeStyle;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub media: MediaConfig,
    pub subtitles: KaraokeStyle,
    pub stager: StagerConfig,
    pub workspace: WorkspaceConfig,
    pub script: ScriptConfig,
    pub images: ImagesConfig,
    pub narration: NarrationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Path to ffprobe binary, used to measure the narration duration
    pub probe_path: String,
    /// Output canvas width in pixels
    pub width: u32,
    /// Output canvas height in pixels
    pub height: u32,
    /// Output frame rate
    pub fps: u32,
    /// Zoom increment applied on every frame of a clip
    pub zoom_step: f64,
    /// Upper bound of the zoom factor
    pub zoom_max: f64,
    /// Pad colour behind images that do not fill the canvas
    pub background: String,
    pub video_codec: String,
    /// Encoding speed (ultrafast, fast, medium, slow, veryslow)
    pub preset: String,
    pub pixel_format: String,
    pub audio_codec: String,
    /// Additional encoding options for subtitle burn-in
    /// Common options: ["-crf", "23"]
    pub subtitle_options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagerConfig {
    /// Maximum number of image fetches in flight
    pub max_concurrent: usize,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Parent of the per-job working directories
    pub root: PathBuf,
    /// Where finished videos are copied
    pub output_dir: PathBuf,
    /// Keep job working directories for debugging
    pub keep_intermediates: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// OpenAI-compatible API base URL
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Language the narration is written in
    pub language: String,
    /// Number of image prompts requested
    pub image_count: usize,
    pub max_duration_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    /// RunPod `runsync` endpoint
    pub endpoint: String,
    /// Environment variable holding the API token
    pub api_key_env: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    /// Text-to-speech command; the script is written to its stdin
    pub binary_path: String,
    /// Arguments; `{audio}`, `{marks}` and `{voice}` are substituted
    pub args: Vec<String>,
    pub voice: String,
    /// Extension of the audio file the command produces
    pub audio_extension: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
            probe_path: "ffprobe".to_string(),
            width: 1080,
            height: 1920,
            fps: 30,
            zoom_step: 0.0001,
            zoom_max: 1.2,
            background: "black".to_string(),
            video_codec: "libx264".to_string(),
            preset: "medium".to_string(),
            pixel_format: "yuv420p".to_string(),
            audio_codec: "aac".to_string(),
            subtitle_options: vec![],
        }
    }
}

impl Default for StagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            request_timeout_secs: 60,
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".reelforge/jobs"),
            output_dir: PathBuf::from(".reelforge/output"),
            keep_intermediates: false,
        }
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            api_key_env: "DEEPSEEK_API".to_string(),
            language: "French".to_string(),
            image_count: 4,
            max_duration_secs: 60,
        }
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.runpod.ai/v2/9oj46z7k5inkxh/runsync".to_string(),
            api_key_env: "RUNPOD_API".to_string(),
            width: 900,
            height: 1600,
        }
    }
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            binary_path: "narrate".to_string(),
            args: vec![
                "--voice".to_string(),
                "{voice}".to_string(),
                "--audio".to_string(),
                "{audio}".to_string(),
                "--marks".to_string(),
                "{marks}".to_string(),
            ],
            voice: "Celine".to_string(),
            audio_extension: "mp3".to_string(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReelError::Configuration(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ReelError::Configuration(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ReelError::Configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ReelError::Configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        let media = &self.media;
        if media.width == 0 || media.height == 0 || media.fps == 0 {
            return Err(ReelError::Configuration(
                "media width, height and fps must be positive".to_string(),
            ));
        }
        if !(media.zoom_step > 0.0) || !(media.zoom_max >= 1.0) {
            return Err(ReelError::Configuration(format!(
                "zoom_step must be positive and zoom_max at least 1.0 (got {} / {})",
                media.zoom_step, media.zoom_max
            )));
        }
        if self.stager.max_concurrent == 0 {
            return Err(ReelError::Configuration(
                "stager.max_concurrent must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// API keys needed by the script and image collaborators, read from the environment.
    pub fn require_credentials(&self) -> Result<Credentials> {
        let script = std::env::var(&self.script.api_key_env).ok().filter(|v| !v.is_empty());
        let images = std::env::var(&self.images.api_key_env).ok().filter(|v| !v.is_empty());

        match (script, images) {
            (Some(script_api_key), Some(images_api_key)) => Ok(Credentials {
                script_api_key,
                images_api_key,
            }),
            (script, images) => {
                let missing: Vec<&str> = [
                    (script.is_none(), self.script.api_key_env.as_str()),
                    (images.is_none(), self.images.api_key_env.as_str()),
                ]
                .into_iter()
                .filter_map(|(absent, name)| absent.then_some(name))
                .collect();
                Err(ReelError::Configuration(format!(
                    "Missing credentials in environment: {}",
                    missing.join(", ")
                )))
            }
        }
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub script_api_key: String,
    pub images_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").finish_non_exhaustive()
    }
}

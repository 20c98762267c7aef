use thiserror::Error;
use uuid::Uuid;

use crate::job::JobState;

#[derive(Error, Debug)]
pub enum ReelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Malformed timing record on line {line}: {reason}")]
    MalformedTimeline { line: usize, reason: String },

    #[error("Timeline has nothing to render: {0}")]
    EmptyTimeline(String),

    #[error("Failed to fetch image #{index} ({locator}): {reason}")]
    AssetFetch {
        index: usize,
        locator: String,
        reason: String,
    },

    #[error("None of the {attempted} image assets could be staged")]
    NoAssetsStaged { attempted: usize },

    #[error("Video composition failed: {0}")]
    Compose(String),

    #[error("Audio muxing failed: {0}")]
    Mux(String),

    #[error("Subtitle burn-in failed: {0}")]
    SubtitleBurn(String),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Script generation error: {0}")]
    Script(String),

    #[error("Narration error: {0}")]
    Narration(String),

    #[error("Image generation error: {0}")]
    ImageSource(String),

    #[error("Assembly of job {job_id} failed while reaching {stage}: {source}")]
    AssemblyFailed {
        job_id: Uuid,
        stage: JobState,
        #[source]
        source: Box<ReelError>,
    },
}

impl ReelError {
    /// The stage-level error behind an `AssemblyFailed` wrapper, or `self`.
    pub fn root_stage_error(&self) -> &ReelError {
        match self {
            ReelError::AssemblyFailed { source, .. } => source.root_stage_error(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReelError>;

use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;

/// Stages of an assembly job, in the only order they can be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    TimelineParsed,
    SubtitlesRendered,
    AssetsStaged,
    Composed,
    Muxed,
    SubtitlesBurned,
    Done,
    Failed,
}

impl JobState {
    /// Next state on success; `None` for the terminal states.
    pub fn next(self) -> Option<JobState> {
        match self {
            JobState::Created => Some(JobState::TimelineParsed),
            JobState::TimelineParsed => Some(JobState::SubtitlesRendered),
            JobState::SubtitlesRendered => Some(JobState::AssetsStaged),
            JobState::AssetsStaged => Some(JobState::Composed),
            JobState::Composed => Some(JobState::Muxed),
            JobState::Muxed => Some(JobState::SubtitlesBurned),
            JobState::SubtitlesBurned => Some(JobState::Done),
            JobState::Done | JobState::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Image,
    Audio,
    Video,
    Subtitle,
}

/// A file living inside a job's working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    pub local_path: PathBuf,
    pub kind: AssetKind,
}

impl MediaAsset {
    pub fn new<P: Into<PathBuf>>(local_path: P, kind: AssetKind) -> Self {
        Self {
            local_path: local_path.into(),
            kind,
        }
    }
}

/// One assembly run. Only the workflow mutates it.
#[derive(Debug)]
pub struct PipelineJob {
    pub job_id: Uuid,
    pub working_dir: PathBuf,
    pub state: JobState,
    pub narration_audio_path: PathBuf,
    pub image_assets: Vec<MediaAsset>,
    pub sentence_subtitle_path: Option<PathBuf>,
    pub karaoke_subtitle_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
}

impl PipelineJob {
    /// Allocate a fresh working directory `{root}/{job_id}` and return the job in `Created`.
    pub async fn allocate<P: AsRef<Path>>(
        job_id: Uuid,
        root: P,
        narration_audio_path: PathBuf,
    ) -> Result<Self> {
        let working_dir = root.as_ref().join(job_id.to_string());
        fs::create_dir_all(&working_dir).await?;

        info!("Allocated job {} in {}", job_id, working_dir.display());

        Ok(Self {
            job_id,
            working_dir,
            state: JobState::Created,
            narration_audio_path,
            image_assets: Vec::new(),
            sentence_subtitle_path: None,
            karaoke_subtitle_path: None,
            output_path: None,
        })
    }

    /// Path of an intermediate artifact inside the working directory.
    pub fn artifact(&self, name: &str) -> PathBuf {
        self.working_dir.join(name)
    }

    pub fn advance(&mut self, to: JobState) {
        debug_assert_eq!(self.state.next(), Some(to), "illegal job transition");
        debug!("Job {}: {} -> {}", self.job_id, self.state, to);
        self.state = to;
    }

    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = JobState::Failed;
        }
    }

    /// Remove the working directory unless the caller asked to keep it.
    pub async fn release(&self, keep: bool) {
        if keep {
            info!(
                "Keeping intermediates of job {} in {}",
                self.job_id,
                self.working_dir.display()
            );
            return;
        }

        match fs::remove_dir_all(&self.working_dir).await {
            Ok(()) => debug!("Removed working directory {}", self.working_dir.display()),
            Err(e) => warn!(
                "Failed to remove working directory {}: {}",
                self.working_dir.display(),
                e
            ),
        }
    }
}

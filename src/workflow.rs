use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{ReelError, Result};
use crate::job::{AssetKind, JobState, PipelineJob};
use crate::media::{MediaEngine, MediaEngineFactory, MotionClipBuilder};
use crate::stager::AssetStager;
use crate::subtitle::{karaoke_cues, render_ass, render_srt, sentence_cues};
use crate::timeline::Timeline;

/// Everything needed to assemble one video.
#[derive(Debug, Clone)]
pub struct AssemblyRequest {
    pub narration_audio: PathBuf,
    /// Raw newline-delimited timing marks for the narration
    pub timing_marks: Vec<u8>,
    pub image_locators: Vec<String>,
    /// Stem of the final file name
    pub output_name: String,
}

type StageResult<T> = std::result::Result<T, (JobState, ReelError)>;

/// Tag a stage error with the state the job was trying to reach.
fn at(stage: JobState) -> impl Fn(ReelError) -> (JobState, ReelError) {
    move |e| (stage, e)
}

pub struct Workflow {
    config: Config,
    media: Box<dyn MediaEngine>,
    stager: AssetStager,
}

impl Workflow {
    pub fn new(config: Config, media: Box<dyn MediaEngine>) -> Result<Self> {
        config.validate()?;
        let stager = AssetStager::new(&config.stager)?;

        Ok(Self {
            config,
            media,
            stager,
        })
    }

    /// Build a workflow over the ffmpeg engine, failing early if it cannot run.
    pub async fn from_config(config: Config) -> Result<Self> {
        let media = MediaEngineFactory::create_engine(config.media.clone());

        // Check dependencies
        media.check_availability().await?;

        Self::new(config, media)
    }

    /// Show staging progress on `progress`.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.stager = self.stager.with_progress(progress);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Render the sentence SRT and karaoke ASS documents for a timing stream.
    pub async fn render_subtitles<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        timing_marks: &[u8],
        srt_path: P,
        ass_path: Q,
    ) -> Result<()> {
        let timeline = Timeline::parse(timing_marks)?;
        self.write_documents(&timeline, srt_path.as_ref(), ass_path.as_ref())
            .await
    }

    /// Run one job from timing marks and images to the final subtitled video.
    ///
    /// Returns the path of the copy in the output directory. The job's working directory
    /// is removed on success and on failure unless `workspace.keep_intermediates` is set.
    pub async fn assemble(&self, request: AssemblyRequest) -> Result<PathBuf> {
        let job_id = Uuid::new_v4();
        let keep = self.config.workspace.keep_intermediates;

        let mut job = PipelineJob::allocate(
            job_id,
            &self.config.workspace.root,
            request.narration_audio.clone(),
        )
        .await
        .map_err(|e| ReelError::AssemblyFailed {
            job_id,
            stage: JobState::Created,
            source: Box::new(e),
        })?;

        info!(
            "Assembling {:?} from {} images (job {})",
            request.output_name,
            request.image_locators.len(),
            job_id
        );

        let outcome = self.run_stages(&mut job, &request).await;
        job.release(keep).await;

        match outcome {
            Ok(final_path) => {
                info!("Job {} done: {}", job_id, final_path.display());
                Ok(final_path)
            }
            Err((stage, e)) => {
                error!("Job {} failed while reaching {}: {}", job_id, stage, e);
                Err(ReelError::AssemblyFailed {
                    job_id,
                    stage,
                    source: Box::new(e),
                })
            }
        }
    }

    async fn run_stages(
        &self,
        job: &mut PipelineJob,
        request: &AssemblyRequest,
    ) -> StageResult<PathBuf> {
        let result = self.drive(job, request).await;
        if result.is_err() {
            job.fail();
        }
        result
    }

    async fn drive(&self, job: &mut PipelineJob, request: &AssemblyRequest) -> StageResult<PathBuf> {
        // Timing marks
        let timeline =
            Timeline::parse(&request.timing_marks).map_err(at(JobState::TimelineParsed))?;
        job.advance(JobState::TimelineParsed);
        info!("Parsed {} timing marks", timeline.len());

        // Subtitle documents
        let srt_path = job.artifact("narration.srt");
        let ass_path = job.artifact("narration.ass");
        self.write_documents(&timeline, &srt_path, &ass_path)
            .await
            .map_err(at(JobState::SubtitlesRendered))?;
        job.sentence_subtitle_path = Some(srt_path);
        job.karaoke_subtitle_path = Some(ass_path.clone());
        job.advance(JobState::SubtitlesRendered);

        // Images
        let assets = self
            .stager
            .stage(&request.image_locators, &job.working_dir)
            .await
            .map_err(at(JobState::AssetsStaged))?;
        job.image_assets = assets;
        job.advance(JobState::AssetsStaged);

        // Silent zoom-pan video
        let video_path = job.artifact("video.mp4");
        self.compose(job, &video_path)
            .await
            .map_err(at(JobState::Composed))?;
        job.advance(JobState::Composed);

        // Narration track
        let muxed_path = job.artifact("with_audio.mp4");
        self.media
            .mux_audio(&video_path, &job.narration_audio_path, &muxed_path)
            .await
            .map_err(at(JobState::Muxed))?;
        job.advance(JobState::Muxed);

        // Karaoke subtitles
        let subtitled_path = job.artifact("subtitled.mp4");
        self.media
            .burn_subtitles(&muxed_path, &ass_path, &subtitled_path)
            .await
            .map_err(at(JobState::SubtitlesBurned))?;
        job.output_path = Some(subtitled_path.clone());
        job.advance(JobState::SubtitlesBurned);

        let final_path = self
            .publish(&subtitled_path, &request.output_name)
            .await
            .map_err(at(JobState::Done))?;
        job.advance(JobState::Done);

        Ok(final_path)
    }

    /// Both documents are rendered before either is written.
    async fn write_documents(&self, timeline: &Timeline, srt_path: &Path, ass_path: &Path) -> Result<()> {
        let sentences = sentence_cues(timeline)?;
        let karaoke = karaoke_cues(timeline)?;
        let srt = render_srt(&sentences);
        let ass = render_ass(&karaoke, &self.config.subtitles);

        info!(
            "Writing {} SRT cues to {} and {} karaoke lines to {}",
            sentences.len(),
            srt_path.display(),
            karaoke.len(),
            ass_path.display()
        );
        fs::write(srt_path, srt).await?;
        fs::write(ass_path, ass).await?;
        Ok(())
    }

    async fn compose(&self, job: &PipelineJob, video_path: &Path) -> Result<()> {
        let images: Vec<PathBuf> = job
            .image_assets
            .iter()
            .filter(|asset| asset.kind == AssetKind::Image)
            .map(|asset| asset.local_path.clone())
            .collect();

        let narration_seconds = self.media.probe_duration(&job.narration_audio_path).await?;
        info!(
            "Narration lasts {:.3}s over {} images",
            narration_seconds,
            images.len()
        );

        let graph = MotionClipBuilder::from_config(&self.config.media)
            .build(images.len(), narration_seconds)?;
        self.media.compose(&images, &graph, video_path).await
    }

    /// Copy the finished video out of the working directory.
    async fn publish(&self, video_path: &Path, output_name: &str) -> Result<PathBuf> {
        let output_dir = &self.config.workspace.output_dir;
        fs::create_dir_all(output_dir).await?;

        let final_path = output_dir.join(format!("{}-final.mp4", output_name));
        fs::copy(video_path, &final_path).await?;

        info!("Final video saved to {}", final_path.display());
        Ok(final_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockMediaEngine;
    use crate::subtitle::parse_srt_time;
    use base64::{engine::general_purpose, Engine as _};
    use tempfile::TempDir;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    const MARKS: &str = concat!(
        r#"{"time":0,"type":"sentence","start":0,"end":14,"value":"Hello world."}"#, "\n",
        r#"{"time":0,"type":"word","start":0,"end":5,"value":"Hello"}"#, "\n",
        r#"{"time":730,"type":"word","start":6,"end":11,"value":"world"}"#, "\n",
        r#"{"time":5000,"type":"sentence","start":15,"end":31,"value":"Second one here."}"#, "\n",
        r#"{"time":5000,"type":"word","start":15,"end":21,"value":"Second"}"#, "\n",
        r#"{"time":5404,"type":"word","start":22,"end":25,"value":"one"}"#, "\n",
        r#"{"time":12000,"type":"sentence","start":32,"end":42,"value":"Last line."}"#, "\n",
        r#"{"time":12000,"type":"word","start":32,"end":36,"value":"Last"}"#, "\n",
        r#"{"time":12345,"type":"word","start":37,"end":41,"value":"line"}"#, "\n",
    );

    struct Fixture {
        _temp: TempDir,
        config: Config,
        audio: PathBuf,
    }

    impl Fixture {
        fn new(keep: bool) -> Self {
            let temp = TempDir::new().unwrap();
            let audio = temp.path().join("narration.mp3");
            std::fs::write(&audio, b"ID3").unwrap();

            let mut config = Config::default();
            config.workspace.root = temp.path().join("jobs");
            config.workspace.output_dir = temp.path().join("output");
            config.workspace.keep_intermediates = keep;

            Self {
                _temp: temp,
                config,
                audio,
            }
        }

        fn request(&self, image_count: usize) -> AssemblyRequest {
            let image = format!(
                "data:image/png;base64,{}",
                general_purpose::STANDARD.encode(PNG_MAGIC)
            );
            AssemblyRequest {
                narration_audio: self.audio.clone(),
                timing_marks: MARKS.as_bytes().to_vec(),
                image_locators: vec![image; image_count],
                output_name: "clip".to_string(),
            }
        }

        fn job_dirs(&self) -> usize {
            match std::fs::read_dir(&self.config.workspace.root) {
                Ok(entries) => entries.count(),
                Err(_) => 0,
            }
        }

        fn only_job_dir(&self) -> PathBuf {
            let mut entries = std::fs::read_dir(&self.config.workspace.root).unwrap();
            let dir = entries.next().unwrap().unwrap().path();
            assert!(entries.next().is_none());
            dir
        }
    }

    fn write_output(path: &Path, content: &str) -> Result<()> {
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Engine whose stages each write a marker file, with call counts enforced.
    fn working_engine(image_count: usize) -> MockMediaEngine {
        let mut engine = MockMediaEngine::new();
        engine
            .expect_probe_duration()
            .times(1)
            .returning(|_| Ok(6.0));
        engine
            .expect_compose()
            .times(1)
            .returning(move |images, graph, output| {
                assert_eq!(images.len(), image_count);
                assert_eq!(graph.stages().len(), image_count);
                assert_eq!(graph.total_frames(), 180);
                write_output(output, "composed")
            });
        engine
            .expect_mux_audio()
            .times(1)
            .returning(|video, audio, output| {
                assert!(video.ends_with("video.mp4"));
                assert!(audio.ends_with("narration.mp3"));
                write_output(output, "muxed")
            });
        engine
            .expect_burn_subtitles()
            .times(1)
            .returning(|video, subtitles, output| {
                assert!(video.ends_with("with_audio.mp4"));
                let document = std::fs::read_to_string(subtitles).unwrap();
                assert_eq!(document.matches("Dialogue: ").count(), 3);
                write_output(output, "final video")
            });
        engine
    }

    #[tokio::test]
    async fn test_assemble_publishes_and_cleans_up() {
        let fixture = Fixture::new(false);
        let workflow = Workflow::new(fixture.config.clone(), Box::new(working_engine(4))).unwrap();

        let final_path = workflow.assemble(fixture.request(4)).await.unwrap();

        assert_eq!(
            final_path,
            fixture.config.workspace.output_dir.join("clip-final.mp4")
        );
        assert_eq!(std::fs::read_to_string(&final_path).unwrap(), "final video");
        assert_eq!(fixture.job_dirs(), 0);
    }

    #[tokio::test]
    async fn test_keep_intermediates_leaves_documents() {
        let fixture = Fixture::new(true);
        let workflow = Workflow::new(fixture.config.clone(), Box::new(working_engine(2))).unwrap();

        workflow.assemble(fixture.request(2)).await.unwrap();

        let dir = fixture.only_job_dir();
        for name in ["image1.png", "image2.png", "narration.ass", "video.mp4", "subtitled.mp4"] {
            assert!(dir.join(name).is_file(), "missing {}", name);
        }

        let srt = std::fs::read_to_string(dir.join("narration.srt")).unwrap();
        let blocks: Vec<&str> = srt.trim_end().split("\n\n").collect();
        assert_eq!(blocks.len(), 3);
        let last_times: Vec<&str> = blocks[2].lines().nth(1).unwrap().split(" --> ").collect();
        assert_eq!(parse_srt_time(last_times[0]), Some(12000));
        assert_eq!(parse_srt_time(last_times[1]), Some(14000));
    }

    #[tokio::test]
    async fn test_nothing_staged_stops_before_compose() {
        let fixture = Fixture::new(false);
        let mut engine = MockMediaEngine::new();
        engine.expect_probe_duration().never();
        engine.expect_compose().never();
        engine.expect_mux_audio().never();
        engine.expect_burn_subtitles().never();
        let workflow = Workflow::new(fixture.config.clone(), Box::new(engine)).unwrap();

        let mut request = fixture.request(0);
        request.image_locators = vec![
            "/definitely/not/here.png".to_string(),
            "data:image/png;base64,".to_string(),
        ];
        let err = workflow.assemble(request).await.unwrap_err();

        match &err {
            ReelError::AssemblyFailed { stage, .. } => assert_eq!(*stage, JobState::AssetsStaged),
            other => panic!("unexpected error: {}", other),
        }
        assert!(matches!(
            err.root_stage_error(),
            ReelError::NoAssetsStaged { attempted: 2 }
        ));
        assert_eq!(fixture.job_dirs(), 0);
    }

    #[tokio::test]
    async fn test_mux_failure_names_stage_and_cleans_up() {
        let fixture = Fixture::new(false);
        let mut engine = MockMediaEngine::new();
        engine.expect_probe_duration().returning(|_| Ok(6.0));
        engine
            .expect_compose()
            .times(1)
            .returning(|_, _, output| write_output(output, "composed"));
        engine
            .expect_mux_audio()
            .times(1)
            .returning(|_, _, _| Err(ReelError::Mux("exit status: 1".to_string())));
        engine.expect_burn_subtitles().never();
        let workflow = Workflow::new(fixture.config.clone(), Box::new(engine)).unwrap();

        let err = workflow.assemble(fixture.request(3)).await.unwrap_err();

        match &err {
            ReelError::AssemblyFailed { stage, source, .. } => {
                assert_eq!(*stage, JobState::Muxed);
                assert!(matches!(**source, ReelError::Mux(_)));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(fixture.job_dirs(), 0);
        assert!(!fixture.config.workspace.output_dir.join("clip-final.mp4").exists());
    }

    #[tokio::test]
    async fn test_probe_failure_fails_composition() {
        let fixture = Fixture::new(false);
        let mut engine = MockMediaEngine::new();
        engine
            .expect_probe_duration()
            .returning(|_| Err(ReelError::Media("no duration".to_string())));
        engine.expect_compose().never();
        let workflow = Workflow::new(fixture.config.clone(), Box::new(engine)).unwrap();

        let err = workflow.assemble(fixture.request(1)).await.unwrap_err();
        assert!(matches!(
            err,
            ReelError::AssemblyFailed {
                stage: JobState::Composed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_timeline_errors_stop_before_documents() {
        let fixture = Fixture::new(true);
        let workflow = Workflow::new(fixture.config.clone(), Box::new(MockMediaEngine::new())).unwrap();

        let mut request = fixture.request(1);
        request.timing_marks = b"{\"time\":0,\"type\":\"viseme\",\"value\":\"p\"}\n".to_vec();
        let err = workflow.assemble(request).await.unwrap_err();
        assert!(matches!(
            err,
            ReelError::AssemblyFailed {
                stage: JobState::TimelineParsed,
                ..
            }
        ));

        let mut request = fixture.request(1);
        request.timing_marks = b"\n\n".to_vec();
        let err = workflow.assemble(request).await.unwrap_err();
        assert!(matches!(
            err,
            ReelError::AssemblyFailed {
                stage: JobState::SubtitlesRendered,
                ..
            }
        ));
        assert!(matches!(err.root_stage_error(), ReelError::EmptyTimeline(_)));

        // Both jobs were kept; neither got a subtitle document.
        for entry in std::fs::read_dir(&fixture.config.workspace.root).unwrap() {
            let dir = entry.unwrap().path();
            assert!(!dir.join("narration.srt").exists());
            assert!(!dir.join("narration.ass").exists());
        }
    }

    #[tokio::test]
    async fn test_render_subtitles_writes_both_documents() {
        let fixture = Fixture::new(false);
        let workflow = Workflow::new(fixture.config.clone(), Box::new(MockMediaEngine::new())).unwrap();
        let out = TempDir::new().unwrap();
        let srt = out.path().join("subs.srt");
        let ass = out.path().join("subs.ass");

        workflow
            .render_subtitles(MARKS.as_bytes(), &srt, &ass)
            .await
            .unwrap();

        let srt = std::fs::read_to_string(srt).unwrap();
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:05,000\nHello world.\n\n"));
        let ass = std::fs::read_to_string(ass).unwrap();
        assert!(ass.contains("{\\k73}Hello {\\k50}world"));
    }

    #[tokio::test]
    async fn test_render_subtitles_without_words_writes_nothing() {
        let fixture = Fixture::new(false);
        let workflow = Workflow::new(fixture.config.clone(), Box::new(MockMediaEngine::new())).unwrap();
        let out = TempDir::new().unwrap();
        let srt = out.path().join("subs.srt");
        let ass = out.path().join("subs.ass");

        let marks = br#"{"time":0,"type":"sentence","start":0,"end":12,"value":"No words here."}"#;
        let err = workflow.render_subtitles(marks, &srt, &ass).await.unwrap_err();

        assert!(matches!(err, ReelError::EmptyTimeline(_)));
        assert!(!srt.exists());
        assert!(!ass.exists());
    }
}

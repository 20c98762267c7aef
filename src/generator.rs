use chrono::Local;
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::sources::{ImageSource, NarrationSource, ScriptPlan, ScriptSource, SourceFactory};
use crate::workflow::{AssemblyRequest, Workflow};

/// `{prefix}-{local timestamp}`, unique per second.
pub fn default_output_name(prefix: &str) -> String {
    format!("{}-{}", prefix, Local::now().format("%Y%m%d-%H%M%S"))
}

/// Topic-to-video driver: script, narration and images feeding one assembly job.
pub struct VideoGenerator {
    script: Box<dyn ScriptSource>,
    narration: Box<dyn NarrationSource>,
    images: Box<dyn ImageSource>,
    workflow: Workflow,
}

impl VideoGenerator {
    pub fn new(
        workflow: Workflow,
        script: Box<dyn ScriptSource>,
        narration: Box<dyn NarrationSource>,
        images: Box<dyn ImageSource>,
    ) -> Self {
        Self {
            script,
            narration,
            images,
            workflow,
        }
    }

    /// Wire the configured collaborators around `workflow`. Fails on missing API keys.
    pub fn from_config(config: &Config, workflow: Workflow) -> Result<Self> {
        let credentials = config.require_credentials()?;

        Ok(Self::new(
            workflow,
            SourceFactory::create_script_source(config, &credentials)?,
            SourceFactory::create_narration_source(config),
            SourceFactory::create_image_source(config, &credentials)?,
        ))
    }

    pub async fn generate(&self, topic: &str, output_name: &str) -> Result<PathBuf> {
        info!("Generating video for topic {:?}", topic);
        let plan = self.script.generate_script(topic).await?;
        self.generate_from_script(&plan, output_name).await
    }

    /// Narrate `plan.script`, fetch one image per prompt and assemble the result.
    pub async fn generate_from_script(&self, plan: &ScriptPlan, output_name: &str) -> Result<PathBuf> {
        let scratch = tempfile::Builder::new().prefix("reelforge-narration-").tempdir()?;

        let (narration, locators) = tokio::try_join!(
            self.narration.narrate(&plan.script, scratch.path()),
            self.images.images(&plan.image_prompts),
        )?;
        let timing_marks = fs::read(&narration.marks_path).await?;

        self.workflow
            .assemble(AssemblyRequest {
                narration_audio: narration.audio_path,
                timing_marks,
                image_locators: locators,
                output_name: output_name.to_string(),
            })
            .await
    }
}

// Collaborators that produce the pipeline's inputs
//
// - script: topic -> narration script and image prompts, over a chat-completions API
// - narration: script -> narration audio and its timing stream, via an external TTS command
// - images: prompts -> image locators the stager understands

pub mod images;
pub mod narration;
pub mod script;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use images::{RunpodImageSource, StaticImageSource};
pub use narration::CommandNarrator;
pub use script::ChatScriptSource;

use crate::config::{Config, Credentials};
use crate::error::Result;

/// Narration script plus one image prompt per scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptPlan {
    pub script: String,
    #[serde(rename = "imagesPrompts", alias = "image_prompts")]
    pub image_prompts: Vec<String>,
}

/// Files produced by a narration source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narration {
    pub audio_path: PathBuf,
    /// Newline-delimited timing marks for `audio_path`
    pub marks_path: PathBuf,
}

#[async_trait]
pub trait ScriptSource: Send + Sync {
    async fn generate_script(&self, topic: &str) -> Result<ScriptPlan>;
}

#[async_trait]
pub trait NarrationSource: Send + Sync {
    /// Synthesize `text` into files under `dir`.
    async fn narrate(&self, text: &str, dir: &Path) -> Result<Narration>;
}

#[async_trait]
pub trait ImageSource: Send + Sync {
    /// One locator per prompt, in prompt order.
    async fn images(&self, prompts: &[String]) -> Result<Vec<String>>;
}

/// Factory for the configured collaborator implementations
pub struct SourceFactory;

impl SourceFactory {
    pub fn create_script_source(
        config: &Config,
        credentials: &Credentials,
    ) -> Result<Box<dyn ScriptSource>> {
        Ok(Box::new(ChatScriptSource::new(
            config.script.clone(),
            credentials.script_api_key.clone(),
        )?))
    }

    pub fn create_image_source(
        config: &Config,
        credentials: &Credentials,
    ) -> Result<Box<dyn ImageSource>> {
        Ok(Box::new(RunpodImageSource::new(
            config.images.clone(),
            credentials.images_api_key.clone(),
            config.stager.request_timeout_secs,
        )?))
    }

    pub fn create_narration_source(config: &Config) -> Box<dyn NarrationSource> {
        Box::new(CommandNarrator::new(config.narration.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_plan_accepts_both_prompt_keys() {
        let camel: ScriptPlan =
            serde_json::from_str(r#"{"script":"Bonjour.","imagesPrompts":["a cat"]}"#).unwrap();
        let snake: ScriptPlan =
            serde_json::from_str(r#"{"script":"Bonjour.","image_prompts":["a cat"]}"#).unwrap();

        assert_eq!(camel, snake);
        assert_eq!(camel.image_prompts, vec!["a cat"]);
    }
}

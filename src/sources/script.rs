use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::{ScriptPlan, ScriptSource};
use crate::config::ScriptConfig;
use crate::error::{ReelError, Result};

/// Characters the model likes to decorate narration with; they read badly aloud.
const DECORATIONS: &[char] = &['🎉', '🚀', '—', '_'];

const SYSTEM_PROMPT: &str = "You write voice-over scripts and image prompts for short vertical videos.\n\
    Scripts are concise, clear and written for narration.\n\
    Do not include extra context, emoji or decorative styling.\n\
    Use short, complete sentences.\n\
    Image prompts must be complete and precise, describing characters, setting, \
    objects and the desired art style.\n\
    Answer with a JSON object: {\"script\": \"...\", \"imagesPrompts\": [\"...\"]}";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Script source backed by an OpenAI-compatible chat-completions endpoint.
pub struct ChatScriptSource {
    client: Client,
    config: ScriptConfig,
    api_key: String,
}

impl ChatScriptSource {
    pub fn new(config: ScriptConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn user_prompt(&self, topic: &str) -> String {
        format!(
            "Write a voice-over script in {} for a video of at most {} seconds on the topic: \"{}\".\n\
             Keep sentences short and complete. The tone is inspiring and funny.\n\
             For each image prompt describe the main character (appearance, clothes, accessories), \
             the environment (scenery, lighting, dominant colours) and the art style.\n\
             Return a JSON object containing the script and {} image prompts written in English, \
             each describing one scene in as much detail as possible.",
            self.config.language, self.config.max_duration_secs, topic, self.config.image_count
        )
    }
}

#[async_trait]
impl ScriptSource for ChatScriptSource {
    async fn generate_script(&self, topic: &str) -> Result<ScriptPlan> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: self.user_prompt(topic),
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let url = format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'));
        info!("Requesting script for topic {:?} from {}", topic, url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ReelError::Script(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ReelError::Script(format!(
                "Chat API error {}: {}",
                status, error_text
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ReelError::Script(format!("Failed to parse response: {}", e)))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ReelError::Script("Response contained no choices".to_string()))?;
        debug!("Raw script response: {}", content);

        let plan = parse_plan(&content)?;
        info!(
            "Generated script of {} characters with {} image prompts",
            plan.script.chars().count(),
            plan.image_prompts.len()
        );
        Ok(plan)
    }
}

fn strip_decorations(text: &str) -> String {
    text.replace(DECORATIONS, "").trim().to_string()
}

/// Parse the model's JSON answer into a plan with a script and at least one prompt.
fn parse_plan(content: &str) -> Result<ScriptPlan> {
    let mut plan: ScriptPlan = serde_json::from_str(content.trim())
        .map_err(|e| ReelError::Script(format!("Response is not a script plan: {}", e)))?;
    plan.script = strip_decorations(&plan.script);

    if plan.script.trim().is_empty() {
        return Err(ReelError::Script("Empty script received".to_string()));
    }
    if plan.image_prompts.is_empty() {
        return Err(ReelError::Script("No image prompts received".to_string()));
    }
    Ok(plan)
}

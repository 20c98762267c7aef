use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::ImageSource;
use crate::config::ImagesConfig;
use crate::error::{ReelError, Result};

#[derive(Debug, Serialize)]
struct RunpodRequest<'a> {
    input: RunpodInput<'a>,
}

#[derive(Debug, Serialize)]
struct RunpodInput<'a> {
    prompt: &'a str,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
struct RunpodResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    output: Option<RunpodOutput>,
}

#[derive(Debug, Deserialize)]
struct RunpodOutput {
    #[serde(default)]
    images: Vec<String>,
}

impl RunpodResponse {
    fn first_image(self) -> Option<String> {
        self.output
            .and_then(|output| output.images.into_iter().next())
            .filter(|image| !image.is_empty())
    }
}

/// Wrap a bare base64 payload in a data URI; URLs and data URIs pass through.
fn as_locator(image: String) -> String {
    if image.starts_with("data:") || image.starts_with("http://") || image.starts_with("https://")
    {
        image
    } else {
        format!("data:image/png;base64,{}", image)
    }
}

/// Image source generating one image per prompt on a RunPod `runsync` endpoint.
pub struct RunpodImageSource {
    client: Client,
    config: ImagesConfig,
    api_key: String,
}

impl RunpodImageSource {
    pub fn new(config: ImagesConfig, api_key: String, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1) * 5))
            .build()?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    async fn generate_one(&self, number: usize, prompt: &str) -> Result<String> {
        let request = RunpodRequest {
            input: RunpodInput {
                prompt,
                width: self.config.width,
                height: self.config.height,
            },
        };
        debug!("Requesting image #{}: {}", number, prompt);

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ReelError::ImageSource(format!("Image #{} request failed: {}", number, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ReelError::ImageSource(format!(
                "Image #{}: RunPod API error {}: {}",
                number, status, error_text
            )));
        }

        let body: RunpodResponse = response.json().await.map_err(|e| {
            ReelError::ImageSource(format!("Image #{}: failed to parse response: {}", number, e))
        })?;

        let status = body.status.clone().unwrap_or_default();
        match body.first_image() {
            Some(image) => Ok(as_locator(image)),
            None => {
                // Empty locators fail in the stager and are skipped there.
                warn!("Image #{} returned no image (status {:?})", number, status);
                Ok(String::new())
            }
        }
    }
}

#[async_trait]
impl ImageSource for RunpodImageSource {
    async fn images(&self, prompts: &[String]) -> Result<Vec<String>> {
        info!("Generating {} images", prompts.len());

        let requests = prompts
            .iter()
            .enumerate()
            .map(|(i, prompt)| self.generate_one(i + 1, prompt));
        let locators = try_join_all(requests).await?;

        info!(
            "Received {}/{} images",
            locators.iter().filter(|l| !l.is_empty()).count(),
            prompts.len()
        );
        Ok(locators)
    }
}

/// Image source returning a fixed list of locators, whatever the prompts.
pub struct StaticImageSource {
    locators: Vec<String>,
}

impl StaticImageSource {
    pub fn new(locators: Vec<String>) -> Self {
        Self { locators }
    }
}

#[async_trait]
impl ImageSource for StaticImageSource {
    async fn images(&self, prompts: &[String]) -> Result<Vec<String>> {
        if prompts.len() != self.locators.len() {
            debug!(
                "{} prompts but {} fixed images; using the fixed images",
                prompts.len(),
                self.locators.len()
            );
        }
        Ok(self.locators.clone())
    }
}

//! Concurrent staging of image assets into a job's working directory.

use base64::{engine::general_purpose, Engine as _};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use reqwest::{Client, Url};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::StagerConfig;
use crate::error::{ReelError, Result};
use crate::job::{AssetKind, MediaAsset};

const KNOWN_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "webp", "gif", "bmp"];
const DEFAULT_EXTENSION: &str = "jpg";

/// Where an image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLocator {
    Remote(Url),
    /// Base64 payload, from a `data:` URI (with its MIME type) or bare
    Inline {
        mime: Option<String>,
        payload: String,
    },
    Local(PathBuf),
}

impl AssetLocator {
    pub fn parse(locator: &str) -> std::result::Result<Self, String> {
        let trimmed = locator.trim();
        if trimmed.is_empty() {
            return Err("empty locator".to_string());
        }

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Url::parse(trimmed)
                .map(AssetLocator::Remote)
                .map_err(|e| format!("invalid URL: {}", e));
        }

        if let Some(rest) = trimmed.strip_prefix("data:") {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| "data URI without payload".to_string())?;
            let Some(mime) = header.strip_suffix(";base64") else {
                return Err("only base64 data URIs are supported".to_string());
            };
            return Ok(AssetLocator::Inline {
                mime: Some(mime.to_string()).filter(|m| !m.is_empty()),
                payload: payload.to_string(),
            });
        }

        if trimmed.starts_with("file://") {
            return Url::parse(trimmed)
                .ok()
                .and_then(|url| url.to_file_path().ok())
                .map(AssetLocator::Local)
                .ok_or_else(|| format!("invalid file URL: {}", trimmed));
        }

        if !Path::new(trimmed).exists() && looks_like_base64(trimmed) {
            return Ok(AssetLocator::Inline {
                mime: None,
                payload: trimmed.to_string(),
            });
        }

        Ok(AssetLocator::Local(PathBuf::from(trimmed)))
    }

    /// Extension suggested by the locator itself, if any.
    fn extension_hint(&self) -> Option<String> {
        match self {
            AssetLocator::Remote(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .and_then(|name| Path::new(name).extension())
                .map(|ext| ext.to_string_lossy().to_string()),
            AssetLocator::Inline { mime, .. } => mime
                .as_deref()
                .and_then(|m| m.strip_prefix("image/"))
                .map(str::to_string),
            AssetLocator::Local(path) => path
                .extension()
                .map(|ext| ext.to_string_lossy().to_string()),
        }
    }
}

/// Bare base64 as returned by image generators: long, base64 alphabet only, no dots,
/// padded to a multiple of four.
fn looks_like_base64(s: &str) -> bool {
    let significant = s.bytes().filter(|b| !matches!(b, b'\n' | b'\r')).count();
    significant >= 64
        && significant % 4 == 0
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=' | b'\n' | b'\r'))
}

/// File extension for an image: a known hint wins, then the magic bytes, then jpg.
fn image_extension(hint: Option<&str>, bytes: &[u8]) -> &'static str {
    if let Some(hint) = hint {
        let hint = hint.to_ascii_lowercase();
        if let Some(known) = KNOWN_EXTENSIONS.iter().find(|ext| **ext == hint) {
            return if *known == "jpeg" { "jpg" } else { *known };
        }
    }

    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "png",
        [0xFF, 0xD8, 0xFF, ..] => "jpg",
        [b'G', b'I', b'F', b'8', ..] => "gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "webp",
        [b'B', b'M', ..] => "bmp",
        _ => DEFAULT_EXTENSION,
    }
}

/// Fetches image locators concurrently into a destination directory.
pub struct AssetStager {
    client: Client,
    max_concurrent: usize,
    progress: ProgressBar,
}

impl AssetStager {
    pub fn new(config: &StagerConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("reelforge/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self::with_client(client, config.max_concurrent))
    }

    pub fn with_client(client: Client, max_concurrent: usize) -> Self {
        Self {
            client,
            max_concurrent: max_concurrent.max(1),
            progress: ProgressBar::hidden(),
        }
    }

    /// Report each completed fetch on `progress`.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Stage every locator as `image{n}.<ext>` under `dest`.
    ///
    /// Failed fetches are logged and skipped. The result keeps the order of `locators`.
    pub async fn stage(&self, locators: &[String], dest: &Path) -> Result<Vec<MediaAsset>> {
        info!(
            "Staging {} image assets into {} ({} concurrent)",
            locators.len(),
            dest.display(),
            self.max_concurrent
        );
        self.progress.set_length(locators.len() as u64);

        let mut results: Vec<(usize, Result<MediaAsset>)> = stream::iter(locators.iter().enumerate())
            .map(|(i, locator)| async move {
                let result = self.fetch_one(i + 1, locator, dest).await;
                self.progress.inc(1);
                (i, result)
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;
        results.sort_by_key(|(i, _)| *i);
        self.progress.finish_and_clear();

        let mut staged = Vec::with_capacity(results.len());
        for (_, result) in results {
            match result {
                Ok(asset) => staged.push(asset),
                Err(e) => warn!("{}", e),
            }
        }

        if staged.is_empty() {
            return Err(ReelError::NoAssetsStaged {
                attempted: locators.len(),
            });
        }

        info!("Staged {}/{} image assets", staged.len(), locators.len());
        Ok(staged)
    }

    async fn fetch_one(&self, number: usize, locator: &str, dest: &Path) -> Result<MediaAsset> {
        let failure = |reason: String| ReelError::AssetFetch {
            index: number,
            locator: abbreviate(locator),
            reason,
        };

        let parsed = AssetLocator::parse(locator).map_err(failure)?;
        let (bytes, hint) = self.fetch_bytes(&parsed).await.map_err(failure)?;
        if bytes.is_empty() {
            return Err(failure("empty payload".to_string()));
        }

        let extension = image_extension(hint.as_deref(), &bytes);
        let final_path = dest.join(format!("image{}.{}", number, extension));
        let part_path = dest.join(format!("image{}.{}.part", number, extension));

        let written = match fs::write(&part_path, &bytes).await {
            Ok(()) => fs::rename(&part_path, &final_path)
                .await
                .map_err(|e| format!("rename failed: {}", e)),
            Err(e) => Err(format!("write failed: {}", e)),
        };
        if let Err(reason) = written {
            let _ = fs::remove_file(&part_path).await;
            return Err(failure(reason));
        }

        debug!("Staged {} ({} bytes)", final_path.display(), bytes.len());
        Ok(MediaAsset::new(final_path, AssetKind::Image))
    }

    async fn fetch_bytes(
        &self,
        locator: &AssetLocator,
    ) -> std::result::Result<(Vec<u8>, Option<String>), String> {
        let hint = locator.extension_hint();

        match locator {
            AssetLocator::Remote(url) => {
                let response = self
                    .client
                    .get(url.clone())
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| format!("HTTP request failed: {}", e))?;

                let content_type_hint = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.strip_prefix("image/"))
                    .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| format!("failed to read body: {}", e))?;
                Ok((bytes.to_vec(), hint.or(content_type_hint)))
            }
            AssetLocator::Inline { payload, .. } => {
                let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
                let bytes = general_purpose::STANDARD
                    .decode(compact)
                    .map_err(|e| format!("invalid base64 payload: {}", e))?;
                Ok((bytes, hint))
            }
            AssetLocator::Local(path) => {
                let bytes = fs::read(path)
                    .await
                    .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
                Ok((bytes, hint))
            }
        }
    }
}

/// Inline payloads are huge; keep log lines readable.
fn abbreviate(locator: &str) -> String {
    const MAX: usize = 80;
    if locator.len() <= MAX {
        return locator.to_string();
    }
    let cut = (0..=MAX).rev().find(|i| locator.is_char_boundary(*i)).unwrap_or(0);
    format!("{}...", &locator[..cut])
}

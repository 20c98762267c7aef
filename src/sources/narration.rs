use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use super::{Narration, NarrationSource};
use crate::config::NarrationConfig;
use crate::error::{ReelError, Result};

/// Narration through an external text-to-speech command.
///
/// The script is written to the command's stdin. The command must write the audio to the
/// `{audio}` path and the newline-delimited timing marks to the `{marks}` path.
pub struct CommandNarrator {
    config: NarrationConfig,
}

impl CommandNarrator {
    pub fn new(config: NarrationConfig) -> Self {
        Self { config }
    }

    fn render_args(&self, audio: &Path, marks: &Path) -> Vec<String> {
        let audio = audio.to_string_lossy();
        let marks = marks.to_string_lossy();
        self.config
            .args
            .iter()
            .map(|arg| {
                arg.replace("{audio}", &audio)
                    .replace("{marks}", &marks)
                    .replace("{voice}", &self.config.voice)
            })
            .collect()
    }
}

#[async_trait]
impl NarrationSource for CommandNarrator {
    async fn narrate(&self, text: &str, dir: &Path) -> Result<Narration> {
        let audio_path = dir.join(format!("narration.{}", self.config.audio_extension));
        let marks_path = dir.join("narration.marks");
        let args = self.render_args(&audio_path, &marks_path);

        info!(
            "Synthesizing narration of {} characters with voice {}",
            text.chars().count(),
            self.config.voice
        );
        debug!("Executing narration command: {} {}", self.config.binary_path, args.join(" "));

        let mut child = Command::new(&self.config.binary_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ReelError::Narration(format!(
                    "Failed to execute {}: {}",
                    self.config.binary_path, e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A command that exits without reading stdin is judged by its exit status below.
            if let Err(e) = stdin.write_all(text.as_bytes()).await {
                debug!("Narration command closed stdin early: {}", e);
            }
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReelError::Narration(format!(
                "{} failed ({}): {}",
                self.config.binary_path,
                output.status,
                stderr.trim()
            )));
        }

        for path in [&audio_path, &marks_path] {
            if !path.is_file() {
                return Err(ReelError::Narration(format!(
                    "Narration command did not produce {}",
                    path.display()
                )));
            }
        }

        info!("Narration saved to {}", audio_path.display());
        Ok(Narration {
            audio_path,
            marks_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell_narrator(script: &str) -> CommandNarrator {
        CommandNarrator::new(NarrationConfig {
            binary_path: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            voice: "Celine".to_string(),
            audio_extension: "mp3".to_string(),
        })
    }

    #[test]
    fn test_placeholders_are_substituted() {
        let narrator = CommandNarrator::new(NarrationConfig::default());
        let args = narrator.render_args(Path::new("/w/a.mp3"), Path::new("/w/a.marks"));
        assert_eq!(
            args,
            vec!["--voice", "Celine", "--audio", "/w/a.mp3", "--marks", "/w/a.marks"]
        );
    }

    #[tokio::test]
    async fn test_narrate_feeds_text_and_collects_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let narrator = shell_narrator(
            "cat > '{audio}' && echo '{\"time\":0,\"type\":\"sentence\",\"start\":0,\"end\":6,\"value\":\"Bonjour\"}' > '{marks}'",
        );

        let narration = narrator.narrate("Bonjour.", dir.path()).await.unwrap();

        assert_eq!(narration.audio_path, dir.path().join("narration.mp3"));
        assert_eq!(std::fs::read_to_string(&narration.audio_path).unwrap(), "Bonjour.");
        let timeline = crate::timeline::Timeline::load(&narration.marks_path).await.unwrap();
        assert_eq!(timeline.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_command_is_narration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = shell_narrator("echo boom >&2; exit 3")
            .narrate("text", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ReelError::Narration(ref m) if m.contains("boom")));
    }

    #[tokio::test]
    async fn test_missing_marks_is_narration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = shell_narrator("cat > '{audio}'")
            .narrate("text", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ReelError::Narration(_)));
    }
}

use std::path::Path;
use tokio::fs;
use tracing::info;

use super::{sentence_cues, SubtitleCue};
use crate::error::Result;
use crate::timeline::Timeline;

/// Generate the sentence-level SRT document for a timeline.
pub async fn write_srt<P: AsRef<Path>>(timeline: &Timeline, output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    let cues = sentence_cues(timeline)?;

    info!(
        "Generating SRT file with {} cues: {}",
        cues.len(),
        output_path.display()
    );
    fs::write(output_path, render_srt(&cues)).await?;

    Ok(())
}

pub fn render_srt(cues: &[SubtitleCue]) -> String {
    let mut srt_content = String::new();

    for cue in cues {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            cue.index,
            format_srt_time(cue.start_ms),
            format_srt_time(cue.end_ms),
            cue.text
        ));
    }

    srt_content
}

/// Format milliseconds as an SRT timestamp (HH:MM:SS,mmm)
pub fn format_srt_time(total_milliseconds: u64) -> String {
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Parse an SRT timestamp back into milliseconds.
pub fn parse_srt_time(timestamp: &str) -> Option<u64> {
    let (clock, millis) = timestamp.trim().split_once(',')?;
    let mut parts = clock.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let secs: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || secs >= 60 || millis.len() != 3 {
        return None;
    }
    let millis: u64 = millis.parse().ok()?;

    Some(hours * 3_600_000 + minutes * 60_000 + secs * 1_000 + millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::fixtures::three_sentences;
    use crate::timeline::Timeline;

    #[test]
    fn test_format_srt_time() {
        assert_eq!(format_srt_time(0), "00:00:00,000");
        assert_eq!(format_srt_time(61_234), "00:01:01,234");
        assert_eq!(format_srt_time(3_661_500), "01:01:01,500");
        assert_eq!(format_srt_time(360_000_000), "100:00:00,000");
    }

    #[test]
    fn test_srt_time_round_trips() {
        for ms in [0, 1, 999, 1_000, 59_999, 61_234, 3_599_999, 3_600_000, 86_399_999] {
            assert_eq!(parse_srt_time(&format_srt_time(ms)), Some(ms), "ms = {}", ms);
        }
        assert_eq!(parse_srt_time("00:61:00,000"), None);
        assert_eq!(parse_srt_time("00:00:00.000"), None);
    }

    #[test]
    fn test_render_srt_document() {
        let cues = crate::subtitle::sentence_cues(&three_sentences()).unwrap();
        let srt = render_srt(&cues);

        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:05,000\nCats sleep.\n\n"));
        assert!(srt.ends_with("3\n00:00:12,000 --> 00:00:14,000\nBirds sing.\n\n"));
        assert_eq!(srt.matches(" --> ").count(), 3);
    }

    #[tokio::test]
    async fn test_write_srt_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("narration.srt");

        write_srt(&three_sentences(), &path).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.split("\n\n").filter(|b| !b.is_empty()).count(), 3);
    }

    #[tokio::test]
    async fn test_write_srt_empty_timeline_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("narration.srt");

        assert!(write_srt(&Timeline::default(), &path).await.is_err());
        assert!(!path.exists());
    }
}

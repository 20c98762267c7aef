use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::info;

use super::{karaoke_cues, KaraokeCue};
use crate::error::Result;
use crate::timeline::Timeline;

const STYLE_FORMAT: &str = "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding";
const EVENT_FORMAT: &str =
    "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text";

/// Script resolution and the single style used by every karaoke dialogue line.
///
/// Colours are ASS `&HAABBGGRR` literals; `bold` uses the ASS convention of `-1` for true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KaraokeStyle {
    pub play_res_x: u32,
    pub play_res_y: u32,
    pub name: String,
    pub font_name: String,
    pub font_size: u32,
    pub primary_colour: String,
    pub secondary_colour: String,
    pub outline_colour: String,
    pub back_colour: String,
    pub bold: i32,
    pub italic: i32,
    pub underline: i32,
    pub strike_out: i32,
    pub scale_x: u32,
    pub scale_y: u32,
    pub spacing: u32,
    pub angle: u32,
    pub border_style: u32,
    pub outline: f64,
    pub shadow: f64,
    pub alignment: u32,
    pub margin_l: u32,
    pub margin_r: u32,
    pub margin_v: u32,
    pub encoding: u32,
}

impl Default for KaraokeStyle {
    fn default() -> Self {
        Self {
            play_res_x: 1920,
            play_res_y: 1080,
            name: "Default".to_string(),
            font_name: "Leelawadee UI".to_string(),
            font_size: 54,
            primary_colour: "&H003EFFF3".to_string(),
            secondary_colour: "&H00FFFFFF".to_string(),
            outline_colour: "&H00000000".to_string(),
            back_colour: "&H00000000".to_string(),
            bold: -1,
            italic: 0,
            underline: 0,
            strike_out: 0,
            scale_x: 100,
            scale_y: 100,
            spacing: 0,
            angle: 0,
            border_style: 1,
            outline: 3.0,
            shadow: 0.5,
            alignment: 2,
            margin_l: 10,
            margin_r: 10,
            margin_v: 30,
            encoding: 1,
        }
    }
}

impl KaraokeStyle {
    fn style_line(&self) -> String {
        format!(
            "Style: {},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            self.name,
            self.font_name,
            self.font_size,
            self.primary_colour,
            self.secondary_colour,
            self.outline_colour,
            self.back_colour,
            self.bold,
            self.italic,
            self.underline,
            self.strike_out,
            self.scale_x,
            self.scale_y,
            self.spacing,
            self.angle,
            self.border_style,
            self.outline,
            self.shadow,
            self.alignment,
            self.margin_l,
            self.margin_r,
            self.margin_v,
            self.encoding
        )
    }
}

/// Generate the word-timed ASS document for a timeline.
pub async fn write_ass<P: AsRef<Path>>(
    timeline: &Timeline,
    style: &KaraokeStyle,
    output_path: P,
) -> Result<()> {
    let output_path = output_path.as_ref();
    let cues = karaoke_cues(timeline)?;

    info!(
        "Generating karaoke ASS file with {} dialogue lines: {}",
        cues.len(),
        output_path.display()
    );
    fs::write(output_path, render_ass(&cues, style)).await?;

    Ok(())
}

pub fn render_ass(cues: &[KaraokeCue], style: &KaraokeStyle) -> String {
    let mut lines = vec![
        "[Script Info]".to_string(),
        "ScriptType: v4.00+".to_string(),
        format!("PlayResX: {}", style.play_res_x),
        format!("PlayResY: {}", style.play_res_y),
        String::new(),
        "[V4+ Styles]".to_string(),
        STYLE_FORMAT.to_string(),
        style.style_line(),
        String::new(),
        "[Events]".to_string(),
        EVENT_FORMAT.to_string(),
    ];

    for cue in cues {
        let text = cue
            .words
            .iter()
            .map(|word| format!("{{\\k{}}}{}", word.duration_centiseconds, word.text))
            .collect::<Vec<_>>()
            .join(" ");

        lines.push(format!(
            "Dialogue: 0,{},{},{},,0,0,0,,{}",
            format_ass_time(cue.start_ms),
            format_ass_time(cue.end_ms),
            style.name,
            text
        ));
    }

    lines.join("\n")
}

/// Format milliseconds as an ASS timestamp (H:MM:SS.cc), hours always present.
pub fn format_ass_time(total_milliseconds: u64) -> String {
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let centis = (total_milliseconds % 1_000) / 10;

    format!("{}:{:02}:{:02}.{:02}", hours, minutes, secs, centis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::fixtures::three_sentences;

    #[test]
    fn test_format_ass_time() {
        assert_eq!(format_ass_time(3_661_230), "1:01:01.23");
        assert_eq!(format_ass_time(0), "0:00:00.00");
        assert_eq!(format_ass_time(5_009), "0:00:05.00");
        assert_eq!(format_ass_time(36_000_990), "10:00:00.99");
    }

    #[test]
    fn test_default_header_and_dialogues() {
        let cues = karaoke_cues(&three_sentences()).unwrap();
        let ass = render_ass(&cues, &KaraokeStyle::default());

        assert!(ass.starts_with("[Script Info]\nScriptType: v4.00+\nPlayResX: 1920\nPlayResY: 1080\n\n[V4+ Styles]\n"));
        assert!(ass.contains(
            "\nStyle: Default,Leelawadee UI,54,&H003EFFF3,&H00FFFFFF,&H00000000,&H00000000,-1,0,0,0,100,100,0,0,1,3,0.5,2,10,10,30,1\n"
        ));

        let dialogues: Vec<&str> = ass.lines().filter(|l| l.starts_with("Dialogue:")).collect();
        assert_eq!(dialogues.len(), 3);
        assert_eq!(
            dialogues[0],
            "Dialogue: 0,0:00:00.00,0:00:05.00,Default,,0,0,0,,{\\k73}Cats {\\k50}sleep"
        );
        assert_eq!(
            dialogues[2],
            "Dialogue: 0,0:00:12.00,0:00:13.34,Default,,0,0,0,,{\\k35}Birds {\\k50}sing"
        );
    }

    #[test]
    fn test_custom_style_is_rendered() {
        let style = KaraokeStyle {
            name: "Reel".to_string(),
            font_size: 72,
            play_res_x: 1080,
            play_res_y: 1920,
            ..KaraokeStyle::default()
        };
        let cues = karaoke_cues(&three_sentences()).unwrap();
        let ass = render_ass(&cues, &style);

        assert!(ass.contains("PlayResY: 1920"));
        assert!(ass.contains("Style: Reel,Leelawadee UI,72,"));
        assert!(ass.lines().filter(|l| l.starts_with("Dialogue:")).all(|l| l.contains(",Reel,,")));
    }

    #[tokio::test]
    async fn test_write_ass_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("narration.ass");

        write_ass(&three_sentences(), &KaraokeStyle::default(), &path)
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("\nDialogue: ").count(), 3);
    }
}

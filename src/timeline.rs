//! Speech-mark timelines.
//!
//! A narration engine emits one JSON record per line, e.g.
//! `{"time":0,"type":"sentence","start":0,"end":23,"value":"Hello there, world."}`.
//! Records are parsed eagerly into [`TimingMark`] values and kept in the order received.

use serde::Deserialize;
use std::path::Path;
use tokio::fs;
use tracing::debug;

use crate::error::{ReelError, Result};

/// Timing and character span of one speech mark.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Mark {
    #[serde(rename = "time")]
    pub time_ms: u64,
    #[serde(rename = "value")]
    pub text: String,
    #[serde(rename = "start")]
    pub char_start: usize,
    #[serde(rename = "end")]
    pub char_end: usize,
}

impl Mark {
    /// True when `other`'s character span lies inside this mark's span.
    pub fn contains(&self, other: &Mark) -> bool {
        other.char_start >= self.char_start && other.char_end <= self.char_end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TimingMark {
    Sentence(Mark),
    Word(Mark),
}

impl TimingMark {
    pub fn mark(&self) -> &Mark {
        match self {
            TimingMark::Sentence(mark) | TimingMark::Word(mark) => mark,
        }
    }

    pub fn time_ms(&self) -> u64 {
        self.mark().time_ms
    }
}

/// Ordered, immutable sequence of speech marks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    marks: Vec<TimingMark>,
}

impl Timeline {
    pub fn new(marks: Vec<TimingMark>) -> Self {
        Self { marks }
    }

    /// Parse newline-delimited timing records. Blank lines are skipped.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| ReelError::MalformedTimeline {
            line: 0,
            reason: format!("timing stream is not valid UTF-8: {}", e),
        })?;
        text.parse()
    }

    /// Read and parse a timing-record file.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).await?;
        let timeline = Self::parse(&bytes)?;
        debug!(
            "Loaded {} timing marks from {}",
            timeline.len(),
            path.display()
        );
        Ok(timeline)
    }

    pub fn marks(&self) -> &[TimingMark] {
        &self.marks
    }

    pub fn sentences(&self) -> impl Iterator<Item = &Mark> {
        self.marks.iter().filter_map(|m| match m {
            TimingMark::Sentence(mark) => Some(mark),
            TimingMark::Word(_) => None,
        })
    }

    pub fn words(&self) -> impl Iterator<Item = &Mark> {
        self.marks.iter().filter_map(|m| match m {
            TimingMark::Word(mark) => Some(mark),
            TimingMark::Sentence(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}

impl std::str::FromStr for Timeline {
    type Err = ReelError;

    fn from_str(text: &str) -> Result<Self> {
        let mut marks = Vec::new();

        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let mark: TimingMark =
                serde_json::from_str(line).map_err(|e| ReelError::MalformedTimeline {
                    line: number + 1,
                    reason: e.to_string(),
                })?;
            marks.push(mark);
        }

        Ok(Self { marks })
    }
}

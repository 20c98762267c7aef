// Subtitle rendering from speech-mark timelines
//
// Two independent derivations share the sentence boundaries of one timeline:
// - srt: one cue per sentence, plain text
// - ass: one karaoke dialogue per sentence, each word carrying its own \k duration

pub mod ass;
pub mod srt;

pub use ass::{format_ass_time, render_ass, write_ass, KaraokeStyle};
pub use srt::{format_srt_time, parse_srt_time, render_srt, write_srt};

use crate::error::{ReelError, Result};
use crate::timeline::{Mark, Timeline};

/// How long the last sentence stays on screen in the sentence format.
pub const LAST_SENTENCE_HOLD_MS: u64 = 2000;
/// Tail added after the last spoken word in the karaoke format.
pub const KARAOKE_TAIL_MS: u64 = 1000;
/// Duration of a sentence's final word, which has no in-sentence follower.
pub const LAST_WORD_CENTISECONDS: u64 = 50;

/// Sentence-level cue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleCue {
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KaraokeWord {
    pub text: String,
    pub duration_centiseconds: u64,
}

/// Word-timed cue covering one sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KaraokeCue {
    pub sentence_index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub words: Vec<KaraokeWord>,
}

/// One cue per sentence; a sentence ends where the next one starts.
pub fn sentence_cues(timeline: &Timeline) -> Result<Vec<SubtitleCue>> {
    let sentences: Vec<&Mark> = timeline.sentences().collect();
    if sentences.is_empty() {
        return Err(ReelError::EmptyTimeline(
            "no sentence marks in timeline".to_string(),
        ));
    }

    let cues = sentences
        .iter()
        .enumerate()
        .map(|(i, sentence)| {
            let end_ms = match sentences.get(i + 1) {
                Some(next) => next.time_ms,
                None => sentence.time_ms + LAST_SENTENCE_HOLD_MS,
            };

            SubtitleCue {
                index: i + 1,
                start_ms: sentence.time_ms,
                end_ms,
                text: sentence.text.trim().to_string(),
            }
        })
        .collect();

    Ok(cues)
}

/// One karaoke cue per sentence, with the words whose span falls inside it.
pub fn karaoke_cues(timeline: &Timeline) -> Result<Vec<KaraokeCue>> {
    let sentences: Vec<&Mark> = timeline.sentences().collect();
    let words: Vec<&Mark> = timeline.words().collect();

    if sentences.is_empty() {
        return Err(ReelError::EmptyTimeline(
            "no sentence marks in timeline".to_string(),
        ));
    }
    let Some(last_word) = words.last() else {
        return Err(ReelError::EmptyTimeline(
            "karaoke subtitles need at least one word mark".to_string(),
        ));
    };
    let final_end_ms = last_word.time_ms + KARAOKE_TAIL_MS;

    let cues = sentences
        .iter()
        .enumerate()
        .map(|(i, sentence)| {
            let end_ms = sentences
                .get(i + 1)
                .map(|next| next.time_ms)
                .unwrap_or(final_end_ms);

            let in_sentence: Vec<&Mark> = words
                .iter()
                .copied()
                .filter(|word| sentence.contains(word))
                .collect();

            let words = in_sentence
                .iter()
                .enumerate()
                .map(|(w, word)| {
                    let duration_centiseconds = match in_sentence.get(w + 1) {
                        Some(next) => round_to_centiseconds(next.time_ms.saturating_sub(word.time_ms)),
                        None => LAST_WORD_CENTISECONDS,
                    };
                    KaraokeWord {
                        text: word.text.clone(),
                        duration_centiseconds,
                    }
                })
                .collect();

            KaraokeCue {
                sentence_index: i + 1,
                start_ms: sentence.time_ms,
                end_ms,
                words,
            }
        })
        .collect();

    Ok(cues)
}

/// Milliseconds to centiseconds, halves rounded up.
fn round_to_centiseconds(ms: u64) -> u64 {
    (ms + 5) / 10
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_sentence_cue_end_times() {
        let cues = sentence_cues(&three_sentences()).unwrap();

        let ends: Vec<u64> = cues.iter().map(|c| c.end_ms).collect();
        assert_eq!(ends, vec![5000, 12000, 14000]);
        assert_eq!(cues[0].text, "Cats sleep.");
        assert_eq!(cues[2].index, 3);
    }

    #[test]
    fn test_sentence_cue_count_matches_sentence_marks() {
        let timeline = three_sentences();
        let cues = sentence_cues(&timeline).unwrap();
        assert_eq!(cues.len(), timeline.sentences().count());
    }

    #[test]
    fn test_karaoke_word_durations() {
        let cues = karaoke_cues(&three_sentences()).unwrap();

        let first: Vec<u64> = cues[0].words.iter().map(|w| w.duration_centiseconds).collect();
        assert_eq!(first, vec![73, LAST_WORD_CENTISECONDS]);

        // 404ms rounds down, 345ms rounds half up
        assert_eq!(cues[1].words[0].duration_centiseconds, 40);
        assert_eq!(cues[2].words[0].duration_centiseconds, 35);
        assert!(cues.iter().all(|c| c.words.last().unwrap().duration_centiseconds == 50));
    }

    #[test]
    fn test_karaoke_final_end_follows_last_word() {
        let cues = karaoke_cues(&three_sentences()).unwrap();

        assert_eq!(cues[0].end_ms, 5000);
        assert_eq!(cues[1].end_ms, 12000);
        assert_eq!(cues[2].end_ms, 12345 + KARAOKE_TAIL_MS);
    }

    #[test]
    fn test_karaoke_groups_words_by_span() {
        let timeline = Timeline::new(vec![
            sentence(0, "A b.", (0, 4)),
            sentence(1000, "C d.", (5, 9)),
            word(0, "A", (0, 1)),
            word(200, "b", (2, 3)),
            word(1000, "C", (5, 6)),
            word(1300, "d", (7, 8)),
            word(1400, "stray", (40, 45)),
        ]);

        let cues = karaoke_cues(&timeline).unwrap();
        let texts: Vec<Vec<&str>> = cues
            .iter()
            .map(|c| c.words.iter().map(|w| w.text.as_str()).collect())
            .collect();
        assert_eq!(texts, vec![vec!["A", "b"], vec!["C", "d"]]);
        assert_eq!(cues[1].end_ms, 2400);
    }

    #[test]
    fn test_no_sentences_is_empty_timeline() {
        let timeline = Timeline::new(vec![word(0, "lonely", (0, 6))]);
        assert!(matches!(sentence_cues(&timeline), Err(ReelError::EmptyTimeline(_))));
        assert!(matches!(karaoke_cues(&timeline), Err(ReelError::EmptyTimeline(_))));
    }

    #[test]
    fn test_karaoke_requires_words() {
        let timeline = Timeline::new(vec![sentence(0, "Silent.", (0, 7))]);
        assert!(sentence_cues(&timeline).is_ok());
        assert!(matches!(karaoke_cues(&timeline), Err(ReelError::EmptyTimeline(_))));
    }
}

use super::transcript::SubtitleEntry;

const SENTENCE_SEPARATORS: &[char] = &['，', '。', '！', '？', '；', '：', '、'];
const SEGMENT_JOINER: char = '，';

/// One engine-reported sentence with its span in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct SentenceInfo {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentationOptions {
    /// Upper bound, in characters, for a merged untimed segment.
    pub max_segment_length: usize,
    /// Display window, in seconds, given to each untimed segment.
    pub duration_per_segment: f64,
}

impl Default for SegmentationOptions {
    fn default() -> Self {
        Self {
            max_segment_length: 20,
            duration_per_segment: 3.0,
        }
    }
}

/// Builds subtitle entries, preferring engine sentence timestamps when present.
///
/// Pass `None` for `sentences` when timestamps are disabled. When timing
/// information is missing or yields no usable line, the text is split on
/// punctuation and laid out on a fixed cadence instead.
pub fn build_subtitle_body(
    text: &str,
    sentences: Option<&[SentenceInfo]>,
    options: &SegmentationOptions,
) -> Vec<SubtitleEntry> {
    if let Some(sentences) = sentences {
        let timed = timed_entries(sentences);
        if !timed.is_empty() {
            return timed;
        }
    }

    split_text_into_segments(text, options.max_segment_length)
        .into_iter()
        .enumerate()
        .map(|(i, segment)| {
            let start = i as f64 * options.duration_per_segment;
            let end = (i + 1) as f64 * options.duration_per_segment;
            SubtitleEntry::new(i as u32 + 1, start, end, segment)
        })
        .collect()
}

fn timed_entries(sentences: &[SentenceInfo]) -> Vec<SubtitleEntry> {
    sentences
        .iter()
        .enumerate()
        .filter_map(|(i, sentence)| {
            let content = sentence.text.trim();
            if content.is_empty() {
                return None;
            }
            let end_ms = sentence.end_ms.max(sentence.start_ms);
            Some(SubtitleEntry::new(
                i as u32 + 1,
                sentence.start_ms as f64 / 1000.0,
                end_ms as f64 / 1000.0,
                content,
            ))
        })
        .collect()
}

/// Splits text on CJK punctuation and greedily merges the pieces into
/// subtitle-sized segments of at most `max_length` characters.
pub fn split_text_into_segments(text: &str, max_length: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();

    for sentence in text.split(SENTENCE_SEPARATORS) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        if current.chars().count() + sentence.chars().count() <= max_length {
            current.push_str(sentence);
            current.push(SEGMENT_JOINER);
        } else {
            let finished = current.trim();
            if !finished.is_empty() {
                segments.push(finished.to_string());
            }
            current = format!("{}{}", sentence, SEGMENT_JOINER);
        }
    }

    let finished = current.trim();
    if !finished.is_empty() {
        segments.push(finished.to_string());
    }

    segments
}

use regex::{Regex, RegexBuilder};

use crate::error::{ModeratorError, Result};
use crate::lexicon::Lexicon;

/// Unicode ranges stripped as emoji/pictographs before any other pass.
const EMOJI_RANGES: &[(u32, u32)] = &[
    (0x200D, 0x200D),
    (0x1F1E6, 0x1F1FF),
    (0x1F300, 0x1F5FF),
    (0x1F600, 0x1F64F),
    (0x1F680, 0x1F6FF),
    (0x1F900, 0x1F9FF),
    (0x1FA70, 0x1FAFF),
    (0x2600, 0x26FF),
    (0x2700, 0x27BF),
    (0xFE00, 0xFE0F),
];

const MIN_SENTENCE_KEY_CHARS: usize = 3;
const LONG_SENTENCE_WORDS: usize = 40;
const COMPRESSED_SENTENCE_WORDS: usize = 30;

/// Normalizes raw user input before anything else looks at it.
///
/// Filler patterns come from the lexicon and are compiled once at startup;
/// the pass order is fixed: emoji strip, filler strip, whitespace collapse,
/// sentence dedup, long-sentence compression. If the pipeline reduces a
/// message to under 3 characters the trimmed original is returned instead,
/// so a message never normalizes to nothing.
pub struct Preprocessor {
    prefix_re: Regex,
    inline_re: Regex,
}

impl Preprocessor {
    pub fn new(lexicon: &Lexicon) -> Result<Self> {
        let prefix_re = RegexBuilder::new(&format!(
            r"^\s*(?:{})[\s,.!:;]+",
            lexicon.filler_prefixes.join("|")
        ))
        .case_insensitive(true)
        .build()
        .map_err(|e| ModeratorError::Config(format!("bad filler prefix pattern: {e}")))?;

        let inline_re = RegexBuilder::new(&format!(
            r"\b(?:{})\b,?",
            lexicon.filler_inline.join("|")
        ))
        .case_insensitive(true)
        .build()
        .map_err(|e| ModeratorError::Config(format!("bad inline filler pattern: {e}")))?;

        Ok(Self {
            prefix_re,
            inline_re,
        })
    }

    pub fn run(&self, raw: &str) -> String {
        let text = strip_emoji(raw);
        let text = self.strip_filler(&text);
        let text = collapse_whitespace(&text);
        let text = dedup_sentences(&text);
        let text = compress_long_sentences(&text);

        if text.trim().chars().count() < MIN_SENTENCE_KEY_CHARS {
            raw.trim().to_string()
        } else {
            text.trim().to_string()
        }
    }

    fn strip_filler(&self, text: &str) -> String {
        // Greetings and throat clearing stack up ("ok so well..."), so the
        // prefix pass repeats until the head of the message is stable.
        let mut head = text.to_string();
        loop {
            let stripped = self.prefix_re.replace(&head, "").into_owned();
            if stripped == head {
                break;
            }
            head = stripped;
        }
        self.inline_re.replace_all(&head, " ").into_owned()
    }
}

fn strip_emoji(text: &str) -> String {
    text.chars()
        .filter(|c| {
            let cp = *c as u32;
            !EMOJI_RANGES
                .iter()
                .any(|(start, end)| cp >= *start && cp <= *end)
        })
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sentence key: lowercase, collapsed whitespace, trailing terminator removed.
fn sentence_key(sentence: &str) -> String {
    collapse_whitespace(sentence)
        .trim_end_matches(['.', '!', '?'])
        .trim()
        .to_lowercase()
}

fn dedup_sentences(text: &str) -> String {
    let mut seen: Vec<String> = Vec::new();
    let mut kept: Vec<String> = Vec::new();

    for chunk in text.split_inclusive(['.', '!', '?']) {
        let key = sentence_key(chunk);
        if key.chars().count() < MIN_SENTENCE_KEY_CHARS {
            continue;
        }
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        kept.push(chunk.trim().to_string());
    }

    kept.join(" ")
}

fn compress_long_sentences(text: &str) -> String {
    let compressed: Vec<String> = text
        .split_inclusive(['.', '!', '?'])
        .map(|sentence| {
            let words: Vec<&str> = sentence.split_whitespace().collect();
            if words.len() > LONG_SENTENCE_WORDS {
                let mut short = words[..COMPRESSED_SENTENCE_WORDS].join(" ");
                short.push('…');
                short
            } else {
                sentence.trim().to_string()
            }
        })
        .filter(|s| !s.is_empty())
        .collect();
    compressed.join(" ")
}

/// Rejects degenerate input. Applied to the preprocessed text only; a true
/// result short-circuits the whole pipeline without touching state.
pub fn is_low_quality(cleaned: &str) -> bool {
    if cleaned.chars().count() < 8 {
        return true;
    }
    if is_repeated_single_char(cleaned) {
        return true;
    }
    if !cleaned.chars().any(|c| c.is_alphanumeric()) {
        return true;
    }
    cleaned.split_whitespace().count() < 2
}

// Equivalent of ^(.)\1{4,}$ without backreferences.
fn is_repeated_single_char(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => text.chars().count() >= 5 && chars.all(|c| c == first),
        None => false,
    }
}

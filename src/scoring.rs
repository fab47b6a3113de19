use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::lexicon::Lexicon;
use crate::models::{MessageType, SlimMessage};

const DUPLICATE_WINDOW: usize = 10;
const NOVELTY_WINDOW: usize = 5;
const NOVELTY_OVERLAP_THRESHOLD: f64 = 0.65;
const MEANINGFUL_WORD_LEN: usize = 4;

/// Coarse deterministic phase of a discussion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscussionStage {
    Opening,
    Developing,
    Maturing,
    Closing,
}

impl std::fmt::Display for DiscussionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DiscussionStage::Opening => "opening",
            DiscussionStage::Developing => "developing",
            DiscussionStage::Maturing => "maturing",
            DiscussionStage::Closing => "closing",
        };
        f.write_str(s)
    }
}

/// Additive 0-10 reasoning-quality heuristic over lexical markers.
///
/// Deterministic by construction: same content, same type, same lexicon,
/// same score. Weights: length (+2 at 10 words, +1 more at 20, -1 past 80),
/// evidence markers capped at +2, logic connectors at 1.5 each capped at +2,
/// hedge penalty -1 past two hits, +1.5 for synthesis, +0.5 for evidence.
pub fn compute_reasoning_score(
    content: &str,
    message_type: MessageType,
    lexicon: &Lexicon,
) -> f64 {
    let lowered = content.to_lowercase();
    let word_count = lowered.split_whitespace().count();

    let mut score = 0.0;

    if word_count >= 10 {
        score += 2.0;
    }
    if word_count >= 20 {
        score += 1.0;
    }
    if word_count > 80 {
        score -= 1.0;
    }

    let evidence_hits = lexicon
        .evidence_markers
        .iter()
        .filter(|marker| lowered.contains(marker.as_str()))
        .count() as f64;
    score += evidence_hits.min(2.0);

    let connector_hits = lexicon
        .logic_connectors
        .iter()
        .filter(|connector| lowered.contains(connector.as_str()))
        .count() as f64;
    score += (1.5 * connector_hits).min(2.0);

    let hedge_hits = lexicon
        .hedge_words
        .iter()
        .filter(|hedge| lowered.contains(hedge.as_str()))
        .count();
    if hedge_hits > 2 {
        score -= 1.0;
    }

    match message_type {
        MessageType::Synthesis => score += 1.5,
        MessageType::Evidence => score += 0.5,
        _ => {}
    }

    round1(score.clamp(0.0, 10.0))
}

/// Order-insensitive bag-of-words fingerprint: lowercase, strip punctuation,
/// sort words, join. Catches reordered near-duplicates, not paraphrases.
pub fn fingerprint(content: &str) -> String {
    let normalized: String = content
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    let mut words: Vec<&str> = normalized.split_whitespace().collect();
    words.sort_unstable();
    words.join("|")
}

/// True when the content's fingerprint matches any of the last 10 messages.
pub fn is_duplicate(content: &str, existing: &[SlimMessage]) -> bool {
    let needle = fingerprint(content);
    existing
        .iter()
        .rev()
        .take(DUPLICATE_WINDOW)
        .any(|m| fingerprint(&m.content) == needle)
}

fn meaningful_words(content: &str) -> HashSet<String> {
    content
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .filter(|w| w.chars().count() > MEANINGFUL_WORD_LEN)
        .map(|w| w.to_string())
        .collect()
}

/// Word-overlap novelty check against the last 5 messages only; older
/// repetition is deliberately not caught.
pub fn is_novel(content: &str, existing: &[SlimMessage]) -> bool {
    let new_words = meaningful_words(content);
    if new_words.is_empty() {
        return true;
    }

    for message in existing.iter().rev().take(NOVELTY_WINDOW) {
        let old_words = meaningful_words(&message.content);
        let overlap = new_words.intersection(&old_words).count() as f64;
        if overlap / new_words.len() as f64 > NOVELTY_OVERLAP_THRESHOLD {
            return false;
        }
    }
    true
}

/// How far the loudest participant is from an even share: `max/total - 1/n`,
/// zero when perfectly even, approaching (n-1)/n under total dominance.
pub fn participation_imbalance(participation: &BTreeMap<String, u32>) -> f64 {
    let n = participation.len();
    if n < 2 {
        return 0.0;
    }
    let total: u32 = participation.values().sum();
    if total == 0 {
        return 0.0;
    }
    let max = participation.values().copied().max().unwrap_or(0);
    round2(max as f64 / total as f64 - 1.0 / n as f64)
}

/// Decision table, first match wins.
pub fn discussion_stage(message_count: u32, claim_count: u32, counter_count: u32) -> DiscussionStage {
    if message_count <= 4 {
        DiscussionStage::Opening
    } else if message_count <= 12 && counter_count < 2 {
        DiscussionStage::Developing
    } else if counter_count >= 2 || claim_count >= 4 {
        DiscussionStage::Maturing
    } else {
        DiscussionStage::Closing
    }
}

/// Counterarguments in the window with no synthesis after them.
pub fn count_unresolved_conflicts(window: &[SlimMessage]) -> u32 {
    let last_synthesis = window
        .iter()
        .rposition(|m| m.message_type == MessageType::Synthesis);
    window
        .iter()
        .enumerate()
        .filter(|(idx, m)| {
            m.message_type == MessageType::Counterargument
                && last_synthesis.is_none_or(|s| *idx > s)
        })
        .count() as u32
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

use serde::{Deserialize, Serialize};

/// The tunable vocabulary of the scoring and preprocessing heuristics.
///
/// These lists are the actual parameters of the moderation pipeline: the
/// reasoning score, the hedge penalty, and the filler stripper are all driven
/// by them. They are kept as data (overridable from config.yaml) so tuning
/// never touches control flow, and `version` is bumped whenever a list
/// changes so stored scores can be traced back to the vocabulary that
/// produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lexicon {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Phrases that signal grounding in evidence (substring match, lowercase).
    #[serde(default = "default_evidence_markers")]
    pub evidence_markers: Vec<String>,

    /// Logical connectors that signal structured argument.
    #[serde(default = "default_logic_connectors")]
    pub logic_connectors: Vec<String>,

    /// Hedging phrases; more than two of these costs a point.
    #[serde(default = "default_hedge_words")]
    pub hedge_words: Vec<String>,

    /// Regex fragments stripped when they open a message (greetings, throat
    /// clearing). Applied repeatedly until the head of the message is clean.
    #[serde(default = "default_filler_prefixes")]
    pub filler_prefixes: Vec<String>,

    /// Regex fragments stripped anywhere in the message body.
    #[serde(default = "default_filler_inline")]
    pub filler_inline: Vec<String>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            version: default_version(),
            evidence_markers: default_evidence_markers(),
            logic_connectors: default_logic_connectors(),
            hedge_words: default_hedge_words(),
            filler_prefixes: default_filler_prefixes(),
            filler_inline: default_filler_inline(),
        }
    }
}

fn default_version() -> u32 {
    1
}

fn default_evidence_markers() -> Vec<String> {
    [
        "because",
        "study",
        "studies",
        "research",
        "evidence",
        "data",
        "according to",
        "source",
        "statistics",
        "survey",
        "experiment",
        "measured",
        "observed",
        "demonstrates",
        "for example",
        "cited",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_logic_connectors() -> Vec<String> {
    [
        "therefore",
        "however",
        "thus",
        "hence",
        "consequently",
        "although",
        "whereas",
        "furthermore",
        "moreover",
        "nevertheless",
        "on the other hand",
        "as a result",
        "in contrast",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_hedge_words() -> Vec<String> {
    [
        "maybe",
        "perhaps",
        "i think",
        "i guess",
        "i feel",
        "kind of",
        "sort of",
        "possibly",
        "probably",
        "not sure",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_filler_prefixes() -> Vec<String> {
    [
        "hi there",
        "hi everyone",
        "hello everyone",
        "hello",
        "hey guys",
        "hey",
        "greetings",
        "ok so",
        "okay so",
        "ok",
        "okay",
        "so yeah",
        "so",
        "well",
        "right",
        "anyway",
        "um+",
        "uh+",
        "hmm+",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_filler_inline() -> Vec<String> {
    [
        "you know",
        "i mean",
        "i think",
        "i guess",
        "maybe",
        "like",
        "basically",
        "actually",
        "honestly",
        "literally",
        "kind of",
        "sort of",
        "um+",
        "uh+",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_list_sizes() {
        let lex = Lexicon::default();
        assert_eq!(lex.evidence_markers.len(), 16);
        assert_eq!(lex.logic_connectors.len(), 13);
        assert_eq!(lex.hedge_words.len(), 10);
        assert!(!lex.filler_prefixes.is_empty());
        assert!(!lex.filler_inline.is_empty());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let lex: Lexicon = serde_yaml::from_str("version: 2\nhedge_words: [\"maybe\"]")
            .expect("lexicon yaml should parse");
        assert_eq!(lex.version, 2);
        assert_eq!(lex.hedge_words, vec!["maybe".to_string()]);
        assert_eq!(lex.evidence_markers.len(), 16);
    }
}

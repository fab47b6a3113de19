use crate::critic::TaskId;
use crate::models::SessionState;
use crate::scoring::{
    DiscussionStage, count_unresolved_conflicts, discussion_stage, participation_imbalance,
};

pub const SUMMARY_WORD_LIMIT: usize = 40;
pub const RECENT_WORD_LIMIT: usize = 30;
pub const NEW_MESSAGE_WORD_LIMIT: usize = 80;
pub const RECENT_MESSAGE_LIMIT: usize = 5;

/// The single word-trim rule used at every trim site in the packet, so all
/// call sites share one token budget.
pub fn trim_words(text: &str, limit: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= limit {
        text.to_string()
    } else {
        let mut trimmed = words[..limit].join(" ");
        trimmed.push('…');
        trimmed
    }
}

/// The ten scalars the model is allowed to see. Nothing else numeric leaves
/// the session state.
#[derive(Debug, Clone)]
pub struct SessionMetrics {
    pub claims: u32,
    pub evidence: u32,
    pub counters: u32,
    pub questions: u32,
    pub syntheses: u32,
    pub avg_score: f64,
    pub imbalance: f64,
    pub unresolved: u32,
    pub messages: u32,
    pub stage: DiscussionStage,
}

impl SessionMetrics {
    pub fn compute(state: &SessionState) -> Self {
        Self {
            claims: state.graph.claim,
            evidence: state.graph.evidence,
            counters: state.graph.counterargument,
            questions: state.graph.question,
            syntheses: state.graph.synthesis,
            avg_score: state.scores.depth_avg,
            imbalance: participation_imbalance(&state.participation),
            unresolved: count_unresolved_conflicts(&state.last_messages),
            messages: state.message_count,
            stage: discussion_stage(
                state.message_count,
                state.graph.claim,
                state.graph.counterargument,
            ),
        }
    }

    /// Fixed key order; this is the serialization order on the wire.
    fn as_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("claims", self.claims.to_string()),
            ("evidence", self.evidence.to_string()),
            ("counters", self.counters.to_string()),
            ("questions", self.questions.to_string()),
            ("syntheses", self.syntheses.to_string()),
            ("avg_score", self.avg_score.to_string()),
            ("imbalance", self.imbalance.to_string()),
            ("unresolved", self.unresolved.to_string()),
            ("messages", self.messages.to_string()),
            ("stage", self.stage.to_string()),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct PacketMessage {
    pub role: &'static str,
    pub text: String,
}

/// The token-bounded payload handed to the model: a short summary, the ten
/// metrics, at most five trimmed recent messages, and the new message. Built
/// fresh per call, never persisted.
#[derive(Debug, Clone)]
pub struct ContextPacket {
    pub task: TaskId,
    pub session_summary: String,
    pub metrics: SessionMetrics,
    pub recent_messages: Vec<PacketMessage>,
    pub new_message: String,
}

impl ContextPacket {
    pub fn build(
        state: &SessionState,
        metrics: SessionMetrics,
        new_message: &str,
        task: TaskId,
        ai_username: &str,
    ) -> Self {
        let recent_messages = state
            .last_messages
            .iter()
            .rev()
            .take(RECENT_MESSAGE_LIMIT)
            .rev()
            .map(|m| PacketMessage {
                role: if m.username == ai_username {
                    "assistant"
                } else {
                    "user"
                },
                text: trim_words(&m.content, RECENT_WORD_LIMIT),
            })
            .collect();

        let session_summary = if state.summary.is_empty() {
            format!(
                "Discussion \"{}\" with {} messages so far.",
                state.topic, state.message_count
            )
        } else {
            trim_words(&state.summary, SUMMARY_WORD_LIMIT)
        };

        Self {
            task,
            session_summary,
            metrics,
            recent_messages,
            new_message: trim_words(new_message, NEW_MESSAGE_WORD_LIMIT),
        }
    }

    /// Flat-text serialization; this string is the only thing that crosses
    /// the boundary to the model call.
    pub fn render_to_prompt(&self) -> String {
        let mut out = format!("CTX: {}\n", self.session_summary);

        let metrics_line = self
            .metrics
            .as_pairs()
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&format!("METRICS: {metrics_line}\n"));

        if !self.recent_messages.is_empty() {
            out.push_str("HISTORY:\n");
            for message in &self.recent_messages {
                out.push_str(&format!("[{}]: {}\n", message.role, message.text));
            }
        }

        out.push_str(&format!("NEW: {}\n", self.new_message));
        out.push_str(&format!("TASK: {}", self.task));
        out
    }
}

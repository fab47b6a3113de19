use crate::models::{DEFAULT_TOPIC, MessageType, SessionState, SlimMessage};
use crate::scoring::round2;

const MESSAGE_WINDOW: usize = 8;
const SCORE_HISTORY_WINDOW: usize = 20;
const TOPIC_WORDS: usize = 7;
const SUMMARY_EVERY: u32 = 8;

/// Folds one message into the session state, returning a new value.
///
/// The input is never mutated; callers ingest the human message and the AI
/// reply in sequence and persist the final value. `score` is recorded for
/// scored (human) messages only. Messages from `ai_username` never count
/// toward participation.
pub fn ingest(
    state: &SessionState,
    message: &SlimMessage,
    score: Option<f64>,
    ai_username: &str,
) -> SessionState {
    let mut next = state.clone();

    next.graph.increment(message.message_type);

    if message.username != ai_username {
        *next
            .participation
            .entry(message.username.clone())
            .or_insert(0) += 1;
    }

    next.message_count += 1;

    next.last_messages.push(message.clone());
    if next.last_messages.len() > MESSAGE_WINDOW {
        let excess = next.last_messages.len() - MESSAGE_WINDOW;
        next.last_messages.drain(..excess);
    }

    if let Some(score) = score {
        next.scores.score_history.push(score);
        if next.scores.score_history.len() > SCORE_HISTORY_WINDOW {
            let excess = next.scores.score_history.len() - SCORE_HISTORY_WINDOW;
            next.scores.score_history.drain(..excess);
        }
        let sum: f64 = next.scores.score_history.iter().sum();
        next.scores.depth_avg = round2(sum / next.scores.score_history.len() as f64);
    }

    if next.topic == DEFAULT_TOPIC
        && matches!(
            message.message_type,
            MessageType::Claim | MessageType::Question
        )
    {
        next.topic = derive_topic(&message.content);
    }

    next
}

// First seven words of the first claim or question; set once, never rewritten.
fn derive_topic(content: &str) -> String {
    let mut topic = content
        .split_whitespace()
        .take(TOPIC_WORDS)
        .collect::<Vec<_>>()
        .join(" ");
    if !topic.ends_with('?') {
        topic.push('…');
    }
    topic
}

pub fn should_summarize(state: &SessionState) -> bool {
    state.message_count > 0 && state.message_count % SUMMARY_EVERY == 0
}

/// Deterministic natural-language digest of the session. No model involved.
pub fn build_backend_summary(state: &SessionState) -> String {
    let mut summary = format!("Discussion on \"{}\".", state.topic);

    let graph = &state.graph;
    let counts: Vec<String> = [
        (graph.claim, "claims"),
        (graph.evidence, "evidence messages"),
        (graph.counterargument, "counterarguments"),
        (graph.question, "questions"),
        (graph.synthesis, "syntheses"),
    ]
    .iter()
    .filter(|(count, _)| *count > 0)
    .map(|(count, label)| format!("{count} {label}"))
    .collect();

    if !counts.is_empty() {
        summary.push_str(&format!(" So far: {}.", counts.join(", ")));
    }

    // BTreeMap iteration order makes the tie-break stable.
    let top = state
        .participation
        .iter()
        .fold(None::<(&String, u32)>, |best, (name, count)| match best {
            Some((_, best_count)) if best_count >= *count => best,
            _ => Some((name, *count)),
        });
    if let Some((name, count)) = top {
        summary.push_str(&format!(" Most active: {name} ({count} messages)."));
    }

    summary.push_str(&format!(
        " Average reasoning depth {} across {} messages.",
        state.scores.depth_avg, state.message_count
    ));

    summary
}

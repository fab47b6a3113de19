use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Topic placeholder used until the first claim or question names one.
pub const DEFAULT_TOPIC: &str = "Untitled discussion";

/// Structural role of a contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Claim,
    Evidence,
    Counterargument,
    Question,
    Synthesis,
}

impl MessageType {
    pub const ALL: [MessageType; 5] = [
        MessageType::Claim,
        MessageType::Evidence,
        MessageType::Counterargument,
        MessageType::Question,
        MessageType::Synthesis,
    ];

    /// Forgiving parse for type strings arriving over the wire.
    pub fn parse_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "claim" => Some(MessageType::Claim),
            "evidence" => Some(MessageType::Evidence),
            "counterargument" | "counter" | "rebuttal" => Some(MessageType::Counterargument),
            "question" => Some(MessageType::Question),
            "synthesis" => Some(MessageType::Synthesis),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            MessageType::Claim => "claim",
            MessageType::Evidence => "evidence",
            MessageType::Counterargument => "counterargument",
            MessageType::Question => "question",
            MessageType::Synthesis => "synthesis",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compact message kept in the rolling session window. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlimMessage {
    pub username: String,
    /// Preprocessed content, never the raw text.
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub timestamp: String,
}

impl SlimMessage {
    pub fn new(username: &str, content: &str, message_type: MessageType) -> Self {
        Self {
            username: username.to_string(),
            content: content.to_string(),
            message_type,
            timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }
}

/// Per-type message counts. Five fixed keys, monotonically non-decreasing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeCounts {
    pub claim: u32,
    pub evidence: u32,
    pub counterargument: u32,
    pub question: u32,
    pub synthesis: u32,
}

impl TypeCounts {
    pub fn get(&self, message_type: MessageType) -> u32 {
        match message_type {
            MessageType::Claim => self.claim,
            MessageType::Evidence => self.evidence,
            MessageType::Counterargument => self.counterargument,
            MessageType::Question => self.question,
            MessageType::Synthesis => self.synthesis,
        }
    }

    pub fn increment(&mut self, message_type: MessageType) {
        match message_type {
            MessageType::Claim => self.claim += 1,
            MessageType::Evidence => self.evidence += 1,
            MessageType::Counterargument => self.counterargument += 1,
            MessageType::Question => self.question += 1,
            MessageType::Synthesis => self.synthesis += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.claim + self.evidence + self.counterargument + self.question + self.synthesis
    }
}

/// Rolling score bookkeeping inside the session state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreBoard {
    pub depth_avg: f64,
    pub logic_issues: u32,
    pub score_history: Vec<f64>,
}

/// Compact per-room session record, read and rewritten on every moderated
/// message. Windows are FIFO and bounded; see `session_state` for the
/// ingest rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub topic: String,
    pub summary: String,
    pub graph: TypeCounts,
    pub scores: ScoreBoard,
    /// Message count per username; the AI author is never tracked here.
    pub participation: BTreeMap<String, u32>,
    pub message_count: u32,
    pub last_messages: Vec<SlimMessage>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            summary: String::new(),
            graph: TypeCounts::default(),
            scores: ScoreBoard::default(),
            participation: BTreeMap::new(),
            message_count: 0,
            last_messages: Vec::new(),
        }
    }
}

/// Session state as persisted: the state plus its room key and write stamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub room_id: String,
    pub updated_at: String,
    #[serde(flatten)]
    pub state: SessionState,
}

impl StoredSession {
    pub fn new(room_id: &str, state: SessionState) -> Self {
        Self {
            room_id: room_id.to_string(),
            updated_at: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            state,
        }
    }
}

/// AI-authored moderation message as persisted to the per-room log.
///
/// `category` is always "question" for display purposes; the model's own
/// classification only feeds graph bookkeeping. Keep it that way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationMessage {
    pub id: String,
    pub room_id: String,
    pub parent_id: String,
    pub username: String,
    pub content: String,
    pub category: String,
    pub contradicts: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contradiction_reason: Option<String>,
    pub timestamp: String,
}

/// Incoming moderation request body.
#[derive(Debug, Clone, Deserialize)]
pub struct ModerateRequest {
    pub content: String,
    pub parent_id: String,
    pub username: String,
    pub column_type: String,
    pub room_id: String,
}

/// Successful moderation response body.
#[derive(Debug, Clone, Serialize)]
pub struct ModerateResponse {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub short_feedback: String,
    pub guiding_question: String,
    pub contradicts: bool,
    pub reasoning_score: f64,
    pub novel: bool,
    pub discussion_stage: String,
}

/// Short-circuit response body for rejected input.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedResponse {
    pub skipped: bool,
    pub reason: String,
}

impl SkippedResponse {
    pub fn new(reason: &str) -> Self {
        Self {
            skipped: true,
            reason: reason.to_string(),
        }
    }
}

// Groq chat message format
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

// Groq API request format
#[derive(Debug, Serialize, Clone)]
pub struct GroqRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
}

// Groq API response format
#[derive(Debug, Deserialize)]
pub struct GroqResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChatMessage,
}

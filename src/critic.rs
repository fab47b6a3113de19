use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{ModeratorError, Result};
use crate::models::{ChatMessage, GroqRequest};
use crate::transport::Transport;

/// Moderation tasks the model can be asked to run. Each maps to a fixed
/// instruction template below; there is no dynamic prompt assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskId {
    ClassifyAndFeedback,
    DetectContradiction,
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskId::ClassifyAndFeedback => "classify_and_feedback",
            TaskId::DetectContradiction => "detect_contradiction",
        };
        f.write_str(s)
    }
}

impl TaskId {
    /// Task-keyed instruction table.
    pub fn system_template(&self) -> &'static str {
        match self {
            TaskId::ClassifyAndFeedback => {
                r#"You are a Socratic discussion moderator. You receive a compact context packet: a CTX summary line, a METRICS line, an optional HISTORY block, the NEW message, and a TASK line.
Classify the NEW message and nudge the discussion deeper. Respond with a JSON object only:
{
    "type": "claim" | "evidence" | "counterargument" | "question" | "synthesis",
    "short_feedback": "one sentence on the reasoning quality, max 80 characters",
    "guiding_question": "one Socratic question that deepens the discussion, max 80 characters"
}
Never argue a side. Never exceed the character limits."#
            }
            TaskId::DetectContradiction => {
                r#"You are a Socratic discussion moderator. You receive a compact context packet: a CTX summary line, a METRICS line, an optional HISTORY block, the NEW message, and a TASK line.
The discussion has active counterarguments. Check the NEW message against the HISTORY for contradictions and respond with a JSON object only:
{
    "type": "claim" | "evidence" | "counterargument" | "question" | "synthesis",
    "short_feedback": "one sentence on the reasoning quality, max 80 characters",
    "guiding_question": "one Socratic question that deepens the discussion, max 80 characters",
    "contradicts": true | false,
    "contradiction_reason": "what contradicts what, max 80 characters (omit when false)"
}
Never argue a side. Never exceed the character limits."#
            }
        }
    }
}

#[async_trait]
pub trait Critic: Send + Sync {
    /// Runs one critique and returns the model's raw text. The orchestrator
    /// owns parsing and validation; anything the model returns is untrusted.
    async fn critique(&self, task: TaskId, prompt: &str) -> Result<String>;
}

pub struct GroqCritic {
    tx: Arc<dyn Transport>,
    model: String,
}

impl GroqCritic {
    pub fn new(tx: Arc<dyn Transport>, model: String) -> Self {
        Self { tx, model }
    }
}

#[async_trait]
impl Critic for GroqCritic {
    async fn critique(&self, task: TaskId, prompt: &str) -> Result<String> {
        tracing::debug!("Requesting {task} critique from Groq");

        let request = GroqRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: task.system_template().to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: 0.2,
            max_tokens: 256,
            response_format: Some(serde_json::json!({"type": "json_object"})),
        };

        let response = self.tx.chat(&request).await?;

        response
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                ModeratorError::ModelCall("Groq API returned empty choices".to_string())
            })
    }
}

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use crate::config::Config;
use crate::critic::{Critic, TaskId};
use crate::error::Result;
use crate::lexicon::Lexicon;
use crate::models::{
    MessageType, ModerateRequest, ModerateResponse, ModerationMessage, SessionState,
    SkippedResponse, SlimMessage, StoredSession,
};
use crate::packet::{ContextPacket, SessionMetrics};
use crate::preprocess::{Preprocessor, is_low_quality};
use crate::repository::SessionStore;
use crate::scoring;
use crate::session_state;
use crate::validation::InputValidator;

const FEEDBACK_CHAR_LIMIT: usize = 80;
const CONTRADICTION_LOOKBACK: usize = 3;

/// Display category every AI message is persisted under, regardless of the
/// model's own classification. The model's type only feeds graph
/// bookkeeping; re-deriving the display category from it regressed the UI
/// once already. Do not "fix" this.
pub const AI_DISPLAY_CATEGORY: &str = "question";

const FALLBACK_FEEDBACK: &str = "The moderator could not fully assess this message.";
const FALLBACK_QUESTION: &str = "What reasoning or evidence supports this point?";

const SKIP_LOW_QUALITY: &str = "low_quality";
const SKIP_DUPLICATE: &str = "duplicate";

/// Untrusted verdict shape as the model returns it.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(rename = "type")]
    message_type: Option<String>,
    short_feedback: Option<String>,
    guiding_question: Option<String>,
    contradicts: Option<bool>,
    contradiction_reason: Option<String>,
}

/// Validated, clamped verdict the rest of the cycle works with.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub message_type: MessageType,
    pub short_feedback: String,
    pub guiding_question: String,
    pub contradicts: bool,
    pub contradiction_reason: Option<String>,
}

impl Verdict {
    /// Canned verdict for model faults; the cycle always completes with a
    /// response-shaped outcome.
    fn fallback() -> Self {
        Self {
            message_type: MessageType::Question,
            short_feedback: FALLBACK_FEEDBACK.to_string(),
            guiding_question: FALLBACK_QUESTION.to_string(),
            contradicts: false,
            contradiction_reason: None,
        }
    }
}

/// Hard character clamp for model-returned text fields.
fn clamp_text(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let mut clamped: String = text.chars().take(limit).collect();
        clamped.push('…');
        clamped
    }
}

/// Parses and clamps a raw model response. None means unparseable; the
/// caller substitutes the canned fallback.
fn parse_verdict(raw_text: &str) -> Option<Verdict> {
    let raw: RawVerdict = serde_json::from_str(raw_text.trim()).ok()?;

    let contradicts = raw.contradicts.unwrap_or(false);
    Some(Verdict {
        message_type: raw
            .message_type
            .as_deref()
            .and_then(MessageType::parse_loose)
            .unwrap_or(MessageType::Question),
        short_feedback: clamp_text(
            raw.short_feedback.as_deref().unwrap_or(FALLBACK_FEEDBACK),
            FEEDBACK_CHAR_LIMIT,
        ),
        guiding_question: clamp_text(
            raw.guiding_question.as_deref().unwrap_or(FALLBACK_QUESTION),
            FEEDBACK_CHAR_LIMIT,
        ),
        contradicts,
        contradiction_reason: raw
            .contradiction_reason
            .as_deref()
            .filter(|_| contradicts)
            .map(|reason| clamp_text(reason, FEEDBACK_CHAR_LIMIT)),
    })
}

/// A counterargument in the last three window messages switches the model
/// task to contradiction detection.
fn select_task(window: &[SlimMessage]) -> TaskId {
    let has_recent_counter = window
        .iter()
        .rev()
        .take(CONTRADICTION_LOOKBACK)
        .any(|m| m.message_type == MessageType::Counterargument);
    if has_recent_counter {
        TaskId::DetectContradiction
    } else {
        TaskId::ClassifyAndFeedback
    }
}

/// Outcome of one moderation cycle.
#[derive(Debug)]
pub enum ModerationOutcome {
    Moderated(ModerateResponse),
    Skipped(SkippedResponse),
}

/// Sequences one full moderation cycle per request: preprocess, gate, score,
/// duplicate check, packet build, model call, persist, state update,
/// summarize. State values are transformed by pure functions; only the store
/// and the critic do I/O.
pub struct ModerationService {
    store: Arc<dyn SessionStore>,
    critic: Arc<dyn Critic>,
    preprocessor: Preprocessor,
    validator: InputValidator,
    lexicon: Lexicon,
    ai_username: String,
}

impl ModerationService {
    pub fn new(store: Arc<dyn SessionStore>, critic: Arc<dyn Critic>, config: &Config) -> Result<Self> {
        Ok(Self {
            store,
            critic,
            preprocessor: Preprocessor::new(&config.lexicon)?,
            validator: InputValidator::new(config.moderation.max_content_length),
            lexicon: config.lexicon.clone(),
            ai_username: config.moderation.ai_username.clone(),
        })
    }

    pub async fn moderate(&self, request: ModerateRequest) -> Result<ModerationOutcome> {
        self.validator.validate_request(&request)?;

        let cleaned = self.preprocessor.run(&request.content);
        if is_low_quality(&cleaned) {
            tracing::info!(room = %request.room_id, "Skipping low-quality message");
            return Ok(ModerationOutcome::Skipped(SkippedResponse::new(
                SKIP_LOW_QUALITY,
            )));
        }

        // Read the room state; a missing room starts from defaults. Two
        // concurrent cycles on the same room can both read here and the
        // later write wins; accepted, see the store contract.
        let state = self
            .store
            .get_state(&request.room_id)
            .await?
            .map(|stored| stored.state)
            .unwrap_or_else(SessionState::default);

        let message_type = MessageType::parse_loose(&request.column_type).unwrap_or_else(|| {
            tracing::warn!(
                column_type = %request.column_type,
                "Unknown column type, treating as claim"
            );
            MessageType::Claim
        });

        let score = scoring::compute_reasoning_score(&cleaned, message_type, &self.lexicon);

        if scoring::is_duplicate(&cleaned, &state.last_messages) {
            tracing::info!(room = %request.room_id, "Skipping duplicate message");
            return Ok(ModerationOutcome::Skipped(SkippedResponse::new(
                SKIP_DUPLICATE,
            )));
        }
        let novel = scoring::is_novel(&cleaned, &state.last_messages);

        let metrics = SessionMetrics::compute(&state);
        let stage = metrics.stage;
        let task = select_task(&state.last_messages);
        let packet = ContextPacket::build(&state, metrics, &cleaned, task, &self.ai_username);
        let prompt = packet.render_to_prompt();

        let verdict = match self.critic.critique(task, &prompt).await {
            Ok(raw) => parse_verdict(&raw).unwrap_or_else(|| {
                tracing::warn!(room = %request.room_id, "Unparseable model response, using fallback");
                Verdict::fallback()
            }),
            Err(e) => {
                tracing::warn!(room = %request.room_id, "Model fault, using fallback: {e}");
                Verdict::fallback()
            }
        };

        // Persist the AI reply first; if this fails the cycle surfaces a
        // fault with no state mutated. If the state write below fails
        // instead, the reply stays persisted - a known, logged divergence.
        let ai_content = format!("{} {}", verdict.short_feedback, verdict.guiding_question)
            .trim()
            .to_string();
        let moderation_message = ModerationMessage {
            id: uuid::Uuid::new_v4().to_string(),
            room_id: request.room_id.clone(),
            parent_id: request.parent_id.clone(),
            username: self.ai_username.clone(),
            content: ai_content.clone(),
            category: AI_DISPLAY_CATEGORY.to_string(),
            contradicts: verdict.contradicts,
            contradiction_reason: verdict.contradiction_reason.clone(),
            timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        };
        self.store
            .append_moderation_message(&moderation_message)
            .await
            .inspect_err(|e| {
                tracing::error!(room = %request.room_id, "Failed to persist AI message: {e}");
            })?;

        // Ingest the human message, then the AI reply. The AI reply carries
        // the model-classified type for graph bookkeeping and no score.
        let human_message = SlimMessage::new(&request.username, &cleaned, message_type);
        let mut next = session_state::ingest(&state, &human_message, Some(score), &self.ai_username);
        let ai_message = SlimMessage::new(&self.ai_username, &ai_content, verdict.message_type);
        next = session_state::ingest(&next, &ai_message, None, &self.ai_username);

        if verdict.contradicts {
            next.scores.logic_issues += 1;
        }

        if session_state::should_summarize(&next) {
            next.summary = session_state::build_backend_summary(&next);
            tracing::info!(room = %request.room_id, "Refreshed backend summary");
        }

        self.store
            .upsert_state(&StoredSession::new(&request.room_id, next))
            .await
            .inspect_err(|e| {
                tracing::error!(
                    room = %request.room_id,
                    "State update failed after AI message was persisted: {e}"
                );
            })?;

        Ok(ModerationOutcome::Moderated(ModerateResponse {
            message_type: verdict.message_type,
            short_feedback: verdict.short_feedback,
            guiding_question: verdict.guiding_question,
            contradicts: verdict.contradicts,
            reasoning_score: score,
            novel,
            discussion_stage: stage.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModeratorError;
    use crate::repository::MockSessionStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const AI: &str = "moderator";

    struct MockCritic {
        response: Option<String>,
        last_task: Mutex<Option<TaskId>>,
        last_prompt: Mutex<Option<String>>,
    }

    impl MockCritic {
        fn returning(response: &str) -> Self {
            Self {
                response: Some(response.to_string()),
                last_task: Mutex::new(None),
                last_prompt: Mutex::new(None),
            }
        }

        fn failing() -> Self {
            Self {
                response: None,
                last_task: Mutex::new(None),
                last_prompt: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Critic for MockCritic {
        async fn critique(&self, task: TaskId, prompt: &str) -> Result<String> {
            *self.last_task.lock().expect("mock mutex") = Some(task);
            *self.last_prompt.lock().expect("mock mutex") = Some(prompt.to_string());
            self.response
                .clone()
                .ok_or_else(|| ModeratorError::ModelCall("mock model down".to_string()))
        }
    }

    fn request(content: &str, column_type: &str) -> ModerateRequest {
        ModerateRequest {
            content: content.to_string(),
            parent_id: "parent-1".to_string(),
            username: "alice".to_string(),
            column_type: column_type.to_string(),
            room_id: "room-1".to_string(),
        }
    }

    fn good_verdict_json() -> &'static str {
        r#"{"type":"claim","short_feedback":"Clear claim, needs support.","guiding_question":"What data backs this?"}"#
    }

    fn service(
        store: MockSessionStore,
        critic: MockCritic,
    ) -> (ModerationService, Arc<MockCritic>) {
        let critic = Arc::new(critic);
        let config = Config::default();
        let service = ModerationService::new(
            Arc::new(store),
            critic.clone(),
            &config,
        )
        .expect("service should construct");
        (service, critic)
    }

    #[tokio::test]
    async fn test_low_quality_short_circuits_without_store_access() {
        // No store expectations: any call would panic the mock.
        let store = MockSessionStore::new();
        let (service, _critic) = service(store, MockCritic::returning(good_verdict_json()));

        let outcome = service
            .moderate(request("aaaaaa", "claim"))
            .await
            .expect("moderate should succeed");
        match outcome {
            ModerationOutcome::Skipped(skip) => {
                assert!(skip.skipped);
                assert_eq!(skip.reason, "low_quality");
            }
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_short_circuits_without_writes() {
        let mut store = MockSessionStore::new();
        store.expect_get_state().returning(|room_id| {
            let mut state = SessionState::default();
            state.last_messages.push(SlimMessage::new(
                "bob",
                "Evidence shows this is true",
                MessageType::Evidence,
            ));
            Ok(Some(StoredSession::new(room_id, state)))
        });
        let (service, _critic) = service(store, MockCritic::returning(good_verdict_json()));

        let outcome = service
            .moderate(request("Evidence shows this is true", "evidence"))
            .await
            .expect("moderate should succeed");
        match outcome {
            ModerationOutcome::Skipped(skip) => assert_eq!(skip.reason, "duplicate"),
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_happy_path_persists_reply_and_updates_state() {
        let saved: Arc<Mutex<Option<StoredSession>>> = Arc::new(Mutex::new(None));
        let appended: Arc<Mutex<Option<ModerationMessage>>> = Arc::new(Mutex::new(None));

        let mut store = MockSessionStore::new();
        store.expect_get_state().returning(|_| Ok(None));
        {
            let appended = appended.clone();
            store
                .expect_append_moderation_message()
                .returning(move |message| {
                    *appended.lock().expect("test mutex") = Some(message.clone());
                    Ok(())
                });
        }
        {
            let saved = saved.clone();
            store.expect_upsert_state().returning(move |state| {
                *saved.lock().expect("test mutex") = Some(state.clone());
                Ok(())
            });
        }

        let (service, _critic) = service(store, MockCritic::returning(good_verdict_json()));
        let outcome = service
            .moderate(request(
                "remote work increases productivity because studies of distributed teams show gains",
                "claim",
            ))
            .await
            .expect("moderate should succeed");

        let response = match outcome {
            ModerationOutcome::Moderated(response) => response,
            other => panic!("expected moderated outcome, got {other:?}"),
        };
        assert_eq!(response.message_type, MessageType::Claim);
        assert_eq!(response.short_feedback, "Clear claim, needs support.");
        assert!(response.novel);
        assert!(!response.contradicts);
        assert_eq!(response.discussion_stage, "opening");
        assert!(response.reasoning_score > 0.0);

        let message = appended
            .lock()
            .expect("test mutex")
            .clone()
            .expect("AI message should be persisted");
        // Display category is pinned regardless of the model's type.
        assert_eq!(message.category, AI_DISPLAY_CATEGORY);
        assert_eq!(message.username, AI);
        assert_eq!(message.room_id, "room-1");

        let stored = saved
            .lock()
            .expect("test mutex")
            .clone()
            .expect("state should be saved");
        // Both the human message and the AI reply were ingested.
        assert_eq!(stored.state.message_count, 2);
        assert_eq!(stored.state.participation.get("alice"), Some(&1));
        assert!(!stored.state.participation.contains_key(AI));
        assert_eq!(stored.state.last_messages.len(), 2);
        // The model-classified type feeds the graph.
        assert_eq!(stored.state.graph.claim, 2);
        assert_eq!(stored.state.scores.score_history.len(), 1);
        assert!(stored.state.topic.starts_with("remote work increases"));
    }

    #[tokio::test]
    async fn test_model_fault_falls_back_to_canned_verdict() {
        let mut store = MockSessionStore::new();
        store.expect_get_state().returning(|_| Ok(None));
        store
            .expect_append_moderation_message()
            .returning(|_| Ok(()));
        store.expect_upsert_state().returning(|_| Ok(()));

        let (service, _critic) = service(store, MockCritic::failing());
        let outcome = service
            .moderate(request("a perfectly reasonable argument about trade policy", "claim"))
            .await
            .expect("moderate should succeed despite model fault");

        match outcome {
            ModerationOutcome::Moderated(response) => {
                assert_eq!(response.message_type, MessageType::Question);
                assert_eq!(response.guiding_question, FALLBACK_QUESTION);
            }
            other => panic!("expected moderated outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_model_json_falls_back() {
        let mut store = MockSessionStore::new();
        store.expect_get_state().returning(|_| Ok(None));
        store
            .expect_append_moderation_message()
            .returning(|_| Ok(()));
        store.expect_upsert_state().returning(|_| Ok(()));

        let (service, _critic) = service(store, MockCritic::returning("not json at all"));
        let outcome = service
            .moderate(request("an argument that deserves a real look", "claim"))
            .await
            .expect("moderate should succeed");

        match outcome {
            ModerationOutcome::Moderated(response) => {
                assert_eq!(response.message_type, MessageType::Question);
                assert_eq!(response.short_feedback, FALLBACK_FEEDBACK);
            }
            other => panic!("expected moderated outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_recent_counterargument_selects_contradiction_task() {
        let mut store = MockSessionStore::new();
        store.expect_get_state().returning(|room_id| {
            let mut state = SessionState::default();
            state.message_count = 3;
            for content in ["first claim here", "second claim here"] {
                state
                    .last_messages
                    .push(SlimMessage::new("bob", content, MessageType::Claim));
            }
            state.last_messages.push(SlimMessage::new(
                "carol",
                "that conclusion does not follow",
                MessageType::Counterargument,
            ));
            Ok(Some(StoredSession::new(room_id, state)))
        });
        store
            .expect_append_moderation_message()
            .returning(|_| Ok(()));
        store.expect_upsert_state().returning(|_| Ok(()));

        let (service, critic) = service(store, MockCritic::returning(good_verdict_json()));
        service
            .moderate(request("a fresh angle on the debate entirely", "claim"))
            .await
            .expect("moderate should succeed");

        assert_eq!(
            *critic.last_task.lock().expect("test mutex"),
            Some(TaskId::DetectContradiction)
        );
    }

    #[tokio::test]
    async fn test_persistence_fault_surfaces_as_error() {
        let mut store = MockSessionStore::new();
        store.expect_get_state().returning(|_| Ok(None));
        store
            .expect_append_moderation_message()
            .returning(|_| Err(ModeratorError::Internal("disk on fire".to_string())));
        // No upsert expectation: state must not be written.

        let (service, _critic) = service(store, MockCritic::returning(good_verdict_json()));
        let result = service
            .moderate(request("a fine message that will fail to persist", "claim"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_summary_refreshed_on_eighth_message() {
        let saved: Arc<Mutex<Option<StoredSession>>> = Arc::new(Mutex::new(None));

        let mut store = MockSessionStore::new();
        store.expect_get_state().returning(|room_id| {
            let mut state = SessionState::default();
            state.message_count = 6;
            state.graph.claim = 3;
            Ok(Some(StoredSession::new(room_id, state)))
        });
        store
            .expect_append_moderation_message()
            .returning(|_| Ok(()));
        {
            let saved = saved.clone();
            store.expect_upsert_state().returning(move |state| {
                *saved.lock().expect("test mutex") = Some(state.clone());
                Ok(())
            });
        }

        let (service, _critic) = service(store, MockCritic::returning(good_verdict_json()));
        service
            .moderate(request("the sixth claim in a long discussion", "claim"))
            .await
            .expect("moderate should succeed");

        let stored = saved
            .lock()
            .expect("test mutex")
            .clone()
            .expect("state should be saved");
        assert_eq!(stored.state.message_count, 8);
        assert!(stored.state.summary.contains("messages"));
    }

    #[tokio::test]
    async fn test_filler_heavy_message_reaches_model_with_cleaned_text() {
        let mut store = MockSessionStore::new();
        store.expect_get_state().returning(|_| Ok(None));
        store
            .expect_append_moderation_message()
            .returning(|_| Ok(()));
        store.expect_upsert_state().returning(|_| Ok(()));

        let (service, critic) = service(store, MockCritic::returning(good_verdict_json()));
        let outcome = service
            .moderate(request(
                "ok so like i think maybe this works because the study shows clear evidence",
                "claim",
            ))
            .await
            .expect("moderate should succeed");

        let prompt = critic
            .last_prompt
            .lock()
            .expect("test mutex")
            .clone()
            .expect("model should have been called");
        assert!(prompt.contains("NEW: this works because the study shows clear evidence"));

        match outcome {
            ModerationOutcome::Moderated(response) => {
                assert_eq!(response.reasoning_score, 2.0);
                assert!(response.novel);
            }
            other => panic!("expected moderated outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_contradiction_bumps_logic_issues() {
        let saved: Arc<Mutex<Option<StoredSession>>> = Arc::new(Mutex::new(None));

        let mut store = MockSessionStore::new();
        store.expect_get_state().returning(|_| Ok(None));
        store
            .expect_append_moderation_message()
            .returning(|_| Ok(()));
        {
            let saved = saved.clone();
            store.expect_upsert_state().returning(move |state| {
                *saved.lock().expect("test mutex") = Some(state.clone());
                Ok(())
            });
        }

        let verdict = r#"{"type":"counterargument","short_feedback":"Conflicts with earlier point.","guiding_question":"Which statement do you stand by?","contradicts":true,"contradiction_reason":"Directly negates the opening claim"}"#;
        let (service, _critic) = service(store, MockCritic::returning(verdict));
        let outcome = service
            .moderate(request("this directly negates what was said before", "counterargument"))
            .await
            .expect("moderate should succeed");

        match outcome {
            ModerationOutcome::Moderated(response) => assert!(response.contradicts),
            other => panic!("expected moderated outcome, got {other:?}"),
        }
        let stored = saved
            .lock()
            .expect("test mutex")
            .clone()
            .expect("state should be saved");
        assert_eq!(stored.state.scores.logic_issues, 1);
    }

    #[test]
    fn test_clamp_text_limits_and_marks() {
        assert_eq!(clamp_text("short", 80), "short");
        let long = "x".repeat(100);
        let clamped = clamp_text(&long, 80);
        assert_eq!(clamped.chars().count(), 81);
        assert!(clamped.ends_with('…'));
    }

    #[test]
    fn test_parse_verdict_defaults_unknown_type_to_question() {
        let verdict = parse_verdict(r#"{"type":"rant","short_feedback":"hm","guiding_question":"why?"}"#)
            .expect("verdict should parse");
        assert_eq!(verdict.message_type, MessageType::Question);
        assert!(!verdict.contradicts);
    }

    #[test]
    fn test_parse_verdict_drops_reason_without_contradiction() {
        let verdict = parse_verdict(
            r#"{"type":"claim","short_feedback":"a","guiding_question":"b","contradicts":false,"contradiction_reason":"stale"}"#,
        )
        .expect("verdict should parse");
        assert!(verdict.contradiction_reason.is_none());
    }

    #[test]
    fn test_select_task_looks_back_three_messages() {
        let mut window = vec![
            SlimMessage::new("a", "one", MessageType::Counterargument),
            SlimMessage::new("a", "two", MessageType::Claim),
            SlimMessage::new("a", "three", MessageType::Claim),
            SlimMessage::new("a", "four", MessageType::Claim),
        ];
        assert_eq!(select_task(&window), TaskId::ClassifyAndFeedback);
        window.push(SlimMessage::new(
            "b",
            "five",
            MessageType::Counterargument,
        ));
        assert_eq!(select_task(&window), TaskId::DetectContradiction);
        assert_eq!(select_task(&[]), TaskId::ClassifyAndFeedback);
    }
}

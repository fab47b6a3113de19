use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{ModerationMessage, StoredSession};
use crate::redis::RedisManager;

/// Storage contract for the moderation pipeline. Any key-value or document
/// store satisfies this; the schema is the session record plus an
/// append-only moderation log per room.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch the session record for a room, or None if the room is new.
    async fn get_state(&self, room_id: &str) -> Result<Option<StoredSession>>;

    /// Full upsert keyed by room id. Last writer wins; concurrent cycles on
    /// the same room can silently overwrite each other (accepted).
    async fn upsert_state(&self, state: &StoredSession) -> Result<()>;

    /// Append an AI-authored moderation message to the room's log.
    async fn append_moderation_message(&self, message: &ModerationMessage) -> Result<()>;
}

/// Redis implementation of SessionStore
pub struct RedisSessionStore {
    redis: Arc<RedisManager>,
}

impl RedisSessionStore {
    pub fn new(redis: Arc<RedisManager>) -> Self {
        Self { redis }
    }
}

fn state_key(room_id: &str) -> String {
    format!("room:{room_id}:state")
}

fn moderation_key(room_id: &str) -> String {
    format!("room:{room_id}:moderation")
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get_state(&self, room_id: &str) -> Result<Option<StoredSession>> {
        let key = state_key(room_id);
        self.redis.json_get::<StoredSession>(&key, "$").await
    }

    async fn upsert_state(&self, state: &StoredSession) -> Result<()> {
        let key = state_key(&state.room_id);
        self.redis.json_set(&key, "$", state).await?;
        tracing::debug!(
            "Saved session state for room {} ({} messages)",
            state.room_id,
            state.state.message_count
        );
        Ok(())
    }

    async fn append_moderation_message(&self, message: &ModerationMessage) -> Result<()> {
        let key = moderation_key(&message.room_id);
        self.redis.rpush_json(&key, message).await?;
        tracing::debug!(
            "Appended moderation message {} to room {}",
            message.id,
            message.room_id
        );
        Ok(())
    }
}

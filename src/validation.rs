use crate::error::{ModeratorError, Result};
use crate::models::ModerateRequest;

const MAX_ID_LENGTH: usize = 64;
const MAX_USERNAME_LENGTH: usize = 64;

/// Validates request fields before the pipeline runs. Failures here are
/// client errors, not faults.
pub struct InputValidator {
    max_content_length: usize,
}

impl InputValidator {
    pub fn new(max_content_length: usize) -> Self {
        Self { max_content_length }
    }

    pub fn validate_request(&self, request: &ModerateRequest) -> Result<()> {
        self.validate_content(&request.content)?;
        Self::validate_room_id(&request.room_id)?;
        Self::validate_username(&request.username)?;
        Ok(())
    }

    fn validate_content(&self, content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(ModeratorError::Validation(
                "Message content cannot be empty".to_string(),
            ));
        }
        if content.chars().count() > self.max_content_length {
            return Err(ModeratorError::Validation(format!(
                "Message content exceeds maximum length of {} characters",
                self.max_content_length
            )));
        }
        Ok(())
    }

    fn validate_room_id(room_id: &str) -> Result<()> {
        if room_id.is_empty() || room_id.chars().count() > MAX_ID_LENGTH {
            return Err(ModeratorError::Validation(
                "Room id must be between 1 and 64 characters".to_string(),
            ));
        }
        if !room_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ModeratorError::Validation(
                "Room id may only contain alphanumerics, dashes and underscores".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_username(username: &str) -> Result<()> {
        if username.trim().is_empty() || username.chars().count() > MAX_USERNAME_LENGTH {
            return Err(ModeratorError::Validation(
                "Username must be between 1 and 64 characters".to_string(),
            ));
        }
        Ok(())
    }
}

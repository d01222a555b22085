//! Common validation utilities.

use validator::ValidationError;

/// Maximum length of an invite title, counted in characters after trimming.
pub const MAX_TITLE_CHARS: usize = 80;

/// Maximum length of a chat message, counted in characters after trimming.
pub const MAX_CHAT_CHARS: usize = 1000;

/// Validates that a latitude value is within valid range (-90 to 90).
pub fn validate_latitude(lat: f64) -> Result<(), ValidationError> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        let mut err = ValidationError::new("latitude_range");
        err.message = Some("Latitude must be between -90 and 90".into());
        Err(err)
    }
}

/// Validates that a longitude value is within valid range (-180 to 180).
pub fn validate_longitude(lon: f64) -> Result<(), ValidationError> {
    if (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        let mut err = ValidationError::new("longitude_range");
        err.message = Some("Longitude must be between -180 and 180".into());
        Err(err)
    }
}

/// Validates an invite title: non-blank and at most [`MAX_TITLE_CHARS`] characters once trimmed.
pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("title_blank");
        err.message = Some("Title must not be blank".into());
        return Err(err);
    }
    if trimmed.chars().count() > MAX_TITLE_CHARS {
        let mut err = ValidationError::new("title_length");
        err.message = Some(format!("Title must be at most {} characters", MAX_TITLE_CHARS).into());
        return Err(err);
    }
    Ok(())
}

/// Validates chat text: non-blank and at most [`MAX_CHAT_CHARS`] characters once trimmed.
pub fn validate_chat_text(text: &str) -> Result<(), ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("chat_blank");
        err.message = Some("Message must not be blank".into());
        return Err(err);
    }
    if trimmed.chars().count() > MAX_CHAT_CHARS {
        let mut err = ValidationError::new("chat_length");
        err.message =
            Some(format!("Message must be at most {} characters", MAX_CHAT_CHARS).into());
        return Err(err);
    }
    Ok(())
}

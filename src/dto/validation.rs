//! Validation helpers for DTOs and path parameters.

use validator::ValidationError;

const MAX_GAME_ID_LEN: usize = 64;
const MAX_FILE_NAME_LEN: usize = 128;

/// Validates a game identifier: non-blank, at most 64 characters, made of
/// ASCII letters, digits, `-` and `_`.
///
/// # Examples
///
/// ```ignore
/// validate_game_id("3f2a9c0d1b7e4a55") // Ok
/// validate_game_id("   ")              // Err - blank
/// validate_game_id("../etc")           // Err - invalid characters
/// ```
pub fn validate_game_id(id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        let mut err = ValidationError::new("game_id_blank");
        err.message = Some("Game ID must not be blank".into());
        return Err(err);
    }

    if id.len() > MAX_GAME_ID_LEN {
        let mut err = ValidationError::new("game_id_length");
        err.message = Some(
            format!("Game ID must be at most {MAX_GAME_ID_LEN} characters (got {})", id.len())
                .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("game_id_format");
        err.message = Some("Game ID must contain only letters, digits, '-' or '_'".into());
        return Err(err);
    }

    Ok(())
}

/// Validates an uploaded file name: a single path segment of ASCII letters,
/// digits, `.`, `-` and `_` that does not start with a dot.
pub fn validate_file_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() || name.len() > MAX_FILE_NAME_LEN {
        let mut err = ValidationError::new("file_name_length");
        err.message = Some(
            format!("File name must be between 1 and {MAX_FILE_NAME_LEN} characters").into(),
        );
        return Err(err);
    }

    if name.starts_with('.')
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        let mut err = ValidationError::new("file_name_format");
        err.message = Some("File name contains forbidden characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a participant name: something other than whitespace.
pub fn validate_participant_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("participant_name_blank");
        err.message = Some("Participant name must not be blank".into());
        return Err(err);
    }
    Ok(())
}

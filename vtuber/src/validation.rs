use thiserror::Error;

/// Why a user action was ignored. Never shown as an error to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InputRejection {
    #[error("nothing to send")]
    EmptyInput,

    #[error("a turn is already in flight")]
    Busy,
}

/// A send needs text that is not blank, or at least one attachment.
pub fn validate_send(text: &str, attachment_count: usize) -> Result<(), InputRejection> {
    if text.trim().is_empty() && attachment_count == 0 {
        return Err(InputRejection::EmptyInput);
    }
    Ok(())
}

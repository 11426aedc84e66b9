use thiserror::Error;

/// The error taxonomy shared by every PRISM component.
///
/// Callers at the CLI/HTTP boundary map each variant to a fixed exit code /
/// status code; components never invent new error shapes beyond these seven.
#[derive(Error, Debug)]
pub enum PrismError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("external service unavailable: {0}")]
    ExternalUnavailable(String),

    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, PrismError>;

impl PrismError {
    /// True for errors that are safe to retry without operator intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PrismError::ExternalUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_only_for_external_unavailable() {
        assert!(PrismError::ExternalUnavailable("board api".into()).is_retryable());
        assert!(!PrismError::NotFound("skill".into()).is_retryable());
        assert!(!PrismError::Conflict("duplicate id".into()).is_retryable());
    }

    #[test]
    fn display_messages_are_terse() {
        let err = PrismError::InvalidInput("skill_id must be kebab-case".into());
        assert_eq!(err.to_string(), "invalid input: skill_id must be kebab-case");
    }
}

//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic failure raised by the domain types themselves.
///
/// Lost races and missing rows are storage outcomes and are reported by the
/// store errors in `printfarm-infra`, not here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A stored value is outside its domain (e.g. an unknown status id).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A lifecycle rule was broken (e.g. a backward status transition).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier could not be parsed or is not positive.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_the_detail() {
        assert_eq!(
            DomainError::validation("unknown status id 9").to_string(),
            "validation failed: unknown status id 9"
        );
        assert_eq!(
            DomainError::invariant("job 1 cannot move from Done to Waiting").to_string(),
            "invariant violated: job 1 cannot move from Done to Waiting"
        );
        assert_eq!(
            DomainError::invalid_id("JobId: 0").to_string(),
            "invalid identifier: JobId: 0"
        );
    }
}

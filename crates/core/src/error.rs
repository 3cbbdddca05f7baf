//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Prefix carried by every refused-delete message.
///
/// The boundary recognizes this prefix and reports the failure as a client error.
pub const DELETE_REFUSED_PREFIX: &str = "Cannot delete: ";

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// missing records, dependency guards). Store and transport failures belong to
/// the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A required field was empty or absent.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A requested record was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A natural key is already taken by another record.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// A delete was refused because dependent records still exist.
    #[error("Cannot delete: {0}")]
    DeleteRefused(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::Duplicate(msg.into())
    }

    pub fn delete_refused(msg: impl Into<String>) -> Self {
        Self::DeleteRefused(msg.into())
    }

    /// Whether this is the dependency-guard refusal (see [`DELETE_REFUSED_PREFIX`]).
    pub fn is_delete_refused(&self) -> bool {
        matches!(self, Self::DeleteRefused(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_refused_message_carries_prefix() {
        let err = DomainError::delete_refused("company still has 2 opportunities");
        let msg = err.to_string();
        assert!(msg.starts_with(DELETE_REFUSED_PREFIX));
        assert!(msg.ends_with("company still has 2 opportunities"));
        assert!(err.is_delete_refused());
    }

    #[test]
    fn other_errors_do_not_carry_prefix() {
        for err in [
            DomainError::validation("bad"),
            DomainError::not_found("Acme"),
            DomainError::duplicate("Acme"),
            DomainError::missing_field("name"),
        ] {
            assert!(!err.to_string().starts_with(DELETE_REFUSED_PREFIX));
            assert!(!err.is_delete_refused());
        }
    }
}

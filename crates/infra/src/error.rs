//! Infrastructure and boundary error model.
//!
//! Two classes reach callers: store failures (transport, malformed payloads,
//! poisoned local state), reported as server errors; and domain failures,
//! reported as client errors. A refused delete is a domain failure carrying
//! [`DELETE_REFUSED_PREFIX`] so that a boundary holding only the message text
//! can still classify it.

use thiserror::Error;

use sheetcrm_core::{DELETE_REFUSED_PREFIX, DomainError};

/// Failure talking to, or interpreting, the backing store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed store response: {0}")]
    Malformed(String),

    #[error("row {row_index} not found in {table}")]
    RowNotFound { table: String, row_index: u32 },

    #[error("lock poisoned: {0}")]
    Poisoned(String),

    #[error("cache entry {0} holds a different type")]
    CacheType(String),
}

/// Error returned by readers, writers, services and workflows.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CrmError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type CrmResult<T> = Result<T, CrmError>;

/// How the boundary reports a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    BadRequest,
    NotFound,
    Server,
}

impl ErrorClass {
    /// Classify a bare error message (only the refused-delete prefix is recognizable).
    pub fn from_message(message: &str) -> Self {
        if message.starts_with(DELETE_REFUSED_PREFIX) {
            Self::BadRequest
        } else {
            Self::Server
        }
    }

    pub fn status_code(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::Server => 500,
        }
    }
}

impl CrmError {
    pub fn class(&self) -> ErrorClass {
        match self {
            CrmError::Domain(DomainError::NotFound(_)) => ErrorClass::NotFound,
            CrmError::Domain(_) => ErrorClass::BadRequest,
            CrmError::Store(_) => ErrorClass::Server,
        }
    }

    pub fn is_delete_refused(&self) -> bool {
        matches!(self, CrmError::Domain(e) if e.is_delete_refused())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_delete_is_a_client_error_even_as_text() {
        let err = CrmError::from(DomainError::delete_refused("2 opportunities remain"));
        assert_eq!(err.class(), ErrorClass::BadRequest);
        assert!(err.is_delete_refused());
        assert_eq!(ErrorClass::from_message(&err.to_string()), ErrorClass::BadRequest);
    }

    #[test]
    fn store_failures_are_server_errors() {
        let err = CrmError::from(StoreError::Unreachable("timeout".to_string()));
        assert_eq!(err.class(), ErrorClass::Server);
        assert_eq!(err.class().status_code(), 500);
        assert_eq!(ErrorClass::from_message(&err.to_string()), ErrorClass::Server);
    }

    #[test]
    fn missing_records_map_to_not_found() {
        let err = CrmError::from(DomainError::not_found("company Acme"));
        assert_eq!(err.class(), ErrorClass::NotFound);
    }
}

//! Domain errors for the codegraph core.

use thiserror::Error;

/// Stable error kinds surfaced at the API boundary.
///
/// Transports map these to their own wire representations; the string values
/// are part of the external contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    WaitTimeout,
    WaitCancelled,
    Backend,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Validation => "VALIDATION",
            Self::Conflict => "CONFLICT",
            Self::WaitTimeout => "WAIT_TIMEOUT",
            Self::WaitCancelled => "WAIT_CANCELLED",
            Self::Backend => "BACKEND",
            Self::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by the graph store, journal, snapshot engine, and broker.
///
/// One error scheme for all operations: "not found" is an error, never a
/// sentinel value, and every variant carries a single descriptive message
/// with no sensitive internals.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Wait for agent {agent_id} timed out after {timeout_ms}ms")]
    WaitTimeout { agent_id: String, timeout_ms: u64 },

    #[error("Wait for agent {agent_id} cancelled: {reason}")]
    WaitCancelled { agent_id: String, reason: String },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Stable kind code for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::WaitTimeout { .. } => ErrorKind::WaitTimeout,
            Self::WaitCancelled { .. } => ErrorKind::WaitCancelled,
            Self::Backend(_) => ErrorKind::Backend,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for a not-found error on a named entity kind.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    /// Shorthand for a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed") => {
                CoreError::Conflict(db.message().to_string())
            }
            _ => CoreError::Backend(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Internal(format!("serialization: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_are_stable() {
        assert_eq!(CoreError::not_found("Component", "c1").kind().as_str(), "NOT_FOUND");
        assert_eq!(CoreError::validation("bad").kind().as_str(), "VALIDATION");
        assert_eq!(CoreError::Conflict("dup".into()).kind().as_str(), "CONFLICT");
        assert_eq!(
            CoreError::WaitTimeout { agent_id: "a".into(), timeout_ms: 5 }.kind().as_str(),
            "WAIT_TIMEOUT"
        );
        assert_eq!(
            CoreError::WaitCancelled { agent_id: "a".into(), reason: "r".into() }.kind().as_str(),
            "WAIT_CANCELLED"
        );
        assert_eq!(CoreError::Backend("b".into()).kind().as_str(), "BACKEND");
        assert_eq!(CoreError::Internal("i".into()).kind().as_str(), "INTERNAL");
    }

    #[test]
    fn messages_name_the_entity() {
        let err = CoreError::not_found("Component", "abc");
        assert_eq!(err.to_string(), "Component not found: abc");
    }
}

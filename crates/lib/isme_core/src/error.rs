//! Service-level error taxonomy.

use thiserror::Error;

/// Boxed source error carried by [`AuthError::Collaborator`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience alias for service return types.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors returned by the session lifecycle and app registry services.
///
/// Authentication failures carry deliberately generic messages; the message
/// is safe to show to the caller.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed input or a failed business rule.
    #[error("{0}")]
    InvalidRequest(String),

    /// Missing or invalid caller identity for an operation that needs one.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A repository or cipher call failed.
    #[error("{op} failed: {source}")]
    Collaborator {
        op: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Adapter for `map_err` that wraps a collaborator failure with the
    /// name of the operation that failed.
    pub fn collaborator<E>(op: &'static str) -> impl FnOnce(E) -> Self
    where
        E: Into<BoxError>,
    {
        move |e| {
            let source = e.into();
            tracing::error!(op, error = %source, "collaborator failure");
            Self::Collaborator { op, source }
        }
    }

    /// Stable machine-readable code for transport layers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Collaborator { .. } => "COLLABORATOR_FAILURE",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::RepoError;

    #[test]
    fn invalid_request_displays_bare_message() {
        let err = AuthError::invalid("invalid email or password");
        assert_eq!(err.to_string(), "invalid email or password");
        assert_eq!(err.kind(), "INVALID_REQUEST");
    }

    #[test]
    fn collaborator_keeps_source_and_op() {
        let err = AuthError::collaborator("sessions.create")(RepoError::Unavailable(
            "connection reset".into(),
        ));
        assert_eq!(err.kind(), "COLLABORATOR_FAILURE");
        let msg = err.to_string();
        assert!(msg.contains("sessions.create"));
        assert!(msg.contains("connection reset"));
        assert!(std::error::Error::source(&err).is_some());
    }
}

//! Error kinds the master emits on the wire.
//!
//! Every REST error body is `{"code": <PascalCaseKind>, "message": <human>}`.
//! The HTTP status is derived from the kind, never chosen ad hoc by a
//! handler.

/// A REST-visible failure.
///
/// Downstream dependency failures (directory, KV, collaborator lookups) are
/// logged with context where they happen and surface here as [`Internal`]
/// with a generic message; the handler never guesses a user-visible reason.
///
/// [`Internal`]: MasterError::Internal
#[derive(Debug, thiserror::Error)]
pub enum MasterError {
    /// A required field is absent from the request.
    #[error("{0}")]
    MissingParameter(String),

    /// A field is malformed, a UUID is wrong, a probe type is unknown, or
    /// authorization was denied.
    #[error("{0}")]
    InvalidArgument(String),

    /// The addressed entity does not exist.
    #[error("{0}")]
    ResourceNotFound(String),

    /// The id was issued at some point but the entity no longer exists.
    #[error("{0}")]
    Gone(String),

    /// Unexpected failure of a downstream dependency.
    #[error("{0}")]
    Internal(String),

    /// N independent failures from a batch request.
    #[error("{}", multi_message(.0))]
    Multi(Vec<MasterError>),
}

fn multi_message(errs: &[MasterError]) -> String {
    let parts: Vec<String> = errs.iter().map(|e| e.to_string()).collect();
    format!("{} errors: {}", errs.len(), parts.join("; "))
}

impl MasterError {
    /// The PascalCase wire code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            MasterError::MissingParameter(_) => "MissingParameter",
            MasterError::InvalidArgument(_) => "InvalidArgument",
            MasterError::ResourceNotFound(_) => "ResourceNotFound",
            MasterError::Gone(_) => "Gone",
            MasterError::Internal(_) => "InternalError",
            MasterError::Multi(_) => "MultiError",
        }
    }

    /// HTTP status for this kind. A multi-error is 500 as soon as one
    /// member is internal, 409 otherwise.
    pub fn http_status(&self) -> u16 {
        match self {
            MasterError::MissingParameter(_) | MasterError::InvalidArgument(_) => 409,
            MasterError::ResourceNotFound(_) => 404,
            MasterError::Gone(_) => 410,
            MasterError::Internal(_) => 500,
            MasterError::Multi(errs) => {
                if errs.iter().any(|e| matches!(e, MasterError::Internal(_))) {
                    500
                } else {
                    409
                }
            }
        }
    }

    /// Wrap a list of failures: one error passes through unchanged, more
    /// than one becomes a `Multi`.
    pub fn aggregate(mut errs: Vec<MasterError>) -> Option<MasterError> {
        match errs.len() {
            0 => None,
            1 => Some(errs.remove(0)),
            _ => Some(MasterError::Multi(errs)),
        }
    }

    pub fn missing(field: &str) -> Self {
        MasterError::MissingParameter(format!("\"{field}\" is a required parameter"))
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        MasterError::InvalidArgument(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        MasterError::Internal(msg.into())
    }
}

/// Convenience alias used by the model and engine layers.
pub type Result<T> = std::result::Result<T, MasterError>;

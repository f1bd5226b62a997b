use serde::Serialize;
use thiserror::Error;

/// Framework error type.
///
/// Variants carry enough context to render the JSON error payload a handler
/// failure produces, and to pick a process exit code when startup fails.
#[derive(Error, Debug)]
pub enum Error {
    /// Startup was asked to register an empty controller list.
    #[error("no controllers found: register at least one controller before starting")]
    NoControllers,

    /// A blueprint referenced a handler or binding that does not exist.
    #[error("invalid blueprint for {controller}: {message}")]
    InvalidBlueprint {
        controller: &'static str,
        message: String,
    },

    /// Dependency wiring failed under the strict resolve policy.
    #[error("dependency injection error: {0}")]
    DependencyInjection(String),

    /// A required provider was never bound in the container.
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    /// No registered route matched the request.
    #[error("route not found: {0}")]
    RouteNotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("internal server error: {0}")]
    Internal(String),

    /// Handler-supplied failure with an explicit HTTP status.
    #[error("{message}")]
    Status {
        code: u16,
        message: String,
        error_code: Option<String>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Failure with an explicit HTTP status code, the way a handler reports
    /// domain errors ("404, product not found") without a custom error enum.
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Error::Status {
            code,
            message: message.into(),
            error_code: None,
        }
    }

    /// Attaches an application error code, surfaced as `code` in the payload.
    pub fn with_code(self, error_code: impl Into<String>) -> Self {
        match self {
            Error::Status { code, message, .. } => Error::Status {
                code,
                message,
                error_code: Some(error_code.into()),
            },
            other => Error::Status {
                code: other.status_code(),
                message: other.to_string(),
                error_code: Some(error_code.into()),
            },
        }
    }

    /// HTTP status this error maps to when rendered as a response.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Status { code, .. } => *code,
            Error::BadRequest(_) | Error::Deserialization(_) => 400,
            Error::Unauthorized(_) => 401,
            Error::Forbidden(_) => 403,
            Error::NotFound(_) | Error::RouteNotFound(_) => 404,
            Error::Conflict(_) => 409,
            Error::UnprocessableEntity(_) => 422,
            _ => 500,
        }
    }

    /// Process exit code used when this error aborts startup.
    ///
    /// An empty controller list exits with 2 so scripts can tell a
    /// misconfigured application apart from a failed listener.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::NoControllers => 2,
            _ => 1,
        }
    }

    /// Body of the JSON error response. The trace is withheld in production.
    pub fn to_body(&self, production: bool) -> ErrorBody {
        ErrorBody {
            message: self.to_string(),
            code: match self {
                Error::Status { error_code, .. } => error_code.clone(),
                _ => None,
            },
            stack: if production { None } else { Some(self.trace()) },
        }
    }

    fn trace(&self) -> String {
        let mut trace = format!("{self:?}");
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            trace.push_str("\ncaused by: ");
            trace.push_str(&cause.to_string());
            source = cause.source();
        }
        trace
    }
}

/// JSON payload rendered for a failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

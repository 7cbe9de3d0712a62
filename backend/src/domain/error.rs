//! Domain-level error type.
//!
//! Errors are transport agnostic. The HTTP adapter renders them as JSON:API
//! error documents; nothing in the domain knows about status codes.

use super::TraceId;

/// Stable machine-readable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    /// Query parameters or the request body could not be interpreted.
    InvalidRequest,
    /// The request body was well formed but violated field rules.
    ValidationFailed,
    /// No valid credential accompanied the request.
    Unauthorized,
    /// The caller is authenticated but the gate denied the action.
    Forbidden,
    /// The resource or a referenced resource does not exist.
    NotFound,
    /// The request contradicts the target resource (type or id mismatch).
    Conflict,
    /// A collaborator such as the database is unreachable.
    ServiceUnavailable,
    /// An unexpected failure.
    InternalError,
}

/// A single violated field rule.
///
/// `pointer` is a JSON pointer into the request document, e.g.
/// `/data/attributes/title`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pointer: String,
    message: String,
}

impl FieldViolation {
    /// Create a violation for the field at `pointer`.
    pub fn new(pointer: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
            message: message.into(),
        }
    }

    /// JSON pointer to the offending field.
    pub fn pointer(&self) -> &str {
        &self.pointer
    }

    /// Human-readable rule description.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Domain error payload.
///
/// Construction captures the trace identifier in scope, if any.
///
/// # Examples
/// ```
/// use bookshelf::domain::{Error, ErrorCode};
///
/// let err = Error::not_found("No query results for model [books] 7");
/// assert_eq!(err.code(), ErrorCode::NotFound);
/// assert_eq!(err.title(), "Not Found");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    code: ErrorCode,
    title: String,
    message: String,
    violations: Vec<FieldViolation>,
    trace_id: Option<String>,
}

impl Error {
    /// Create an error with an explicit title.
    pub fn new(code: ErrorCode, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            title: title.into(),
            message: message.into(),
            violations: Vec::new(),
            trace_id: TraceId::current().map(|id| id.to_string()),
        }
    }

    /// Malformed request. Callers usually refine the title with
    /// [`Error::with_title`].
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, "Invalid Request", message)
    }

    /// One or more field rules were violated.
    pub fn validation(violations: Vec<FieldViolation>) -> Self {
        let message = violations
            .first()
            .map_or_else(|| "The given data was invalid.".to_owned(), |v| v.message.clone());
        let mut error = Self::new(ErrorCode::ValidationFailed, "Validation Error", message);
        error.violations = violations;
        error
    }

    /// Missing or unknown credential.
    pub fn unauthenticated() -> Self {
        Self::new(
            ErrorCode::Unauthorized,
            "Unauthenticated",
            "You are not authenticated",
        )
    }

    /// Gate denial.
    pub fn forbidden() -> Self {
        Self::new(
            ErrorCode::Forbidden,
            "Unauthorized Action",
            "This action is unauthorized.",
        )
    }

    /// Missing resource.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, "Not Found", message)
    }

    /// Request contradicts the addressed resource.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, "Conflict", message)
    }

    /// Collaborator unavailable.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ServiceUnavailable,
            "Service Unavailable",
            message,
        )
    }

    /// Unexpected failure; `class` names the failure kind and becomes the title.
    pub fn internal(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, class, message)
    }

    /// Replace the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Attach a trace identifier explicitly.
    #[must_use]
    pub fn with_trace_id(mut self, id: impl Into<String>) -> Self {
        self.trace_id = Some(id.into());
        self
    }

    /// Failure category.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Short summary rendered as the error `title`.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Detail rendered as the error `details`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Field violations; empty unless the code is
    /// [`ErrorCode::ValidationFailed`].
    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    /// Trace identifier captured at construction.
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

impl std::error::Error for Error {}

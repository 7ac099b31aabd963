//! Error classification — the closed taxonomy every failure is mapped into
//! before it reaches a caller, plus the user-facing message catalogue.

use std::fmt;

use thiserror::Error;

/// Machine-readable error codes.
///
/// `FileTooLarge`/`UnsupportedFileType` are raised by client-side
/// pre-validation and never reach the wire. `Cancelled` is client-local too:
/// it carries a cooperative abort out of the transport layer so the
/// orchestrator can surface a distinct outcome. Backend codes this client does
/// not recognize are preserved verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    FileTooLarge,
    UnsupportedFileType,
    GenerateCooldown,
    QuotaExceeded,
    ResumeNotFound,
    /// Non-success HTTP response with no structured `error.code` in the body.
    HttpError,
    /// Transport-level failure: network error or malformed response.
    UnknownError,
    Cancelled,
    Other(String),
}

impl ErrorCode {
    pub fn from_code(code: &str) -> Self {
        match code {
            "FILE_TOO_LARGE" => ErrorCode::FileTooLarge,
            "UNSUPPORTED_FILE_TYPE" => ErrorCode::UnsupportedFileType,
            "GENERATE_COOLDOWN" => ErrorCode::GenerateCooldown,
            "QUOTA_EXCEEDED" => ErrorCode::QuotaExceeded,
            "RESUME_NOT_FOUND" => ErrorCode::ResumeNotFound,
            "HTTP_ERROR" => ErrorCode::HttpError,
            "UNKNOWN_ERROR" => ErrorCode::UnknownError,
            other => ErrorCode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::FileTooLarge => "FILE_TOO_LARGE",
            ErrorCode::UnsupportedFileType => "UNSUPPORTED_FILE_TYPE",
            ErrorCode::GenerateCooldown => "GENERATE_COOLDOWN",
            ErrorCode::QuotaExceeded => "QUOTA_EXCEEDED",
            ErrorCode::ResumeNotFound => "RESUME_NOT_FOUND",
            ErrorCode::HttpError => "HTTP_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::Other(code) => code,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed API error surfaced by every layer of the client.
///
/// `request_id` is the backend correlation id (`x-request-id` header or the
/// error body) and must be shown to users when present so support can match
/// reports to server logs.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub request_id: Option<String>,
    pub http_status: Option<u16>,
}

impl ApiError {
    /// An error raised client-side, before any network call.
    pub fn local(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            request_id: None,
            http_status: None,
        }
    }

    /// Transport-level failure with no structured body.
    pub fn network(message: impl Into<String>) -> Self {
        ApiError::local(ErrorCode::UnknownError, message)
    }

    pub fn cancelled() -> Self {
        ApiError::local(ErrorCode::Cancelled, "Operation cancelled")
    }

    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::Cancelled
    }

    /// Renders the fixed, user-facing message for this error.
    ///
    /// Recognized codes map to a canned template; anything else falls back to
    /// the backend-supplied message, then to `fallback`. The request id is
    /// always appended when present.
    pub fn friendly_message(&self, fallback: &str) -> String {
        let base = match &self.code {
            ErrorCode::FileTooLarge => "File size exceeds 10MB.".to_string(),
            ErrorCode::UnsupportedFileType => {
                "Only PDF, DOCX, or TXT files are supported.".to_string()
            }
            ErrorCode::GenerateCooldown => {
                "Please wait 5 seconds before generating again.".to_string()
            }
            ErrorCode::QuotaExceeded => {
                "Daily quota reached. Please try again tomorrow.".to_string()
            }
            _ => {
                if self.message.is_empty() {
                    fallback.to_string()
                } else {
                    self.message.clone()
                }
            }
        };

        match self.request_id.as_deref() {
            Some(id) if !id.is_empty() => format!("{base} (Request ID: {id})"),
            _ => base,
        }
    }
}

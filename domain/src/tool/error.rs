//! Tool error taxonomy — numeric codes carried by every [`Envelope`]
//!
//! Codes split into two ranges that drive caller behavior:
//!
//! | Range | Meaning | Caller action |
//! |-------|---------|---------------|
//! | `4000-4999` | Caller error | Fix the request, do not retry as-is |
//! | `5000-5999` | Provider/server error | Retry may help, or page an operator |
//!
//! The executor converts every failure at the invocation boundary into a
//! [`ToolError`]; nothing escapes the envelope uncaught.
//!
//! [`Envelope`]: crate::envelope::Envelope

use thiserror::Error;

/// Numeric error code of the response envelope. `0` (success) is not part of
/// this enum; a successful envelope simply carries no error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Structurally invalid request (unparsable body, malformed URL, ...)
    MalformedRequest,
    /// Operation name did not resolve to any registered entry
    UnknownTool,
    /// A required parameter without a declared default was absent
    MissingParameter,
    /// A parameter was present but of the wrong type
    InvalidParameterType,
    /// A bare simple name matched more than one registered operation
    AmbiguousToolName,
    /// The operation ran fine but produced no results
    EmptyResult,
    /// The backend's session-initialize hook failed
    SessionInitFailed,
    /// Unclassified internal fault (includes contained panics)
    Internal,
    /// Credentials or mandatory configuration missing on the provider side
    MissingCredentials,
    /// An upstream call failed
    UpstreamFailed,
    /// An upstream response could not be parsed
    UpstreamUnparsable,
    /// The operation exceeded its per-call timeout
    Timeout,
    /// Content fetch failed
    FetchFailed,
    /// Summarization or other derivation over fetched content failed
    DerivationFailed,
    /// The backend's warmup has not completed (or failed)
    BackendNotWarm,
    /// Every item of a batch failed
    BatchAllFailed,
    /// Some items of a batch failed; payload still carries all results
    BatchPartialFailure,
}

impl ErrorCode {
    /// The numeric wire value of this code.
    pub const fn value(self) -> i32 {
        match self {
            ErrorCode::MalformedRequest => 4000,
            ErrorCode::UnknownTool => 4001,
            ErrorCode::MissingParameter => 4002,
            ErrorCode::InvalidParameterType => 4003,
            ErrorCode::AmbiguousToolName => 4004,
            ErrorCode::EmptyResult => 4005,
            ErrorCode::SessionInitFailed => 4006,
            ErrorCode::Internal => 5000,
            ErrorCode::MissingCredentials => 5001,
            ErrorCode::UpstreamFailed => 5002,
            ErrorCode::UpstreamUnparsable => 5003,
            ErrorCode::Timeout => 5004,
            ErrorCode::FetchFailed => 5005,
            ErrorCode::DerivationFailed => 5006,
            ErrorCode::BackendNotWarm => 5007,
            ErrorCode::BatchAllFailed => 5008,
            ErrorCode::BatchPartialFailure => 5009,
        }
    }

    /// Whether the code lies in the caller-error range.
    pub fn is_caller_error(self) -> bool {
        (4000..5000).contains(&self.value())
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Error produced by (or on behalf of) a tool invocation.
#[derive(Debug, Clone, Error)]
#[error("[{code}] {message}")]
pub struct ToolError {
    /// Taxonomy code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Additional details
    pub details: Option<String>,
}

impl ToolError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Common constructors

    pub fn malformed_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MalformedRequest, message)
    }

    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::UnknownTool,
            format!("Unknown tool: {}", name.into()),
        )
    }

    pub fn missing_parameter(name: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::MissingParameter,
            format!("Missing required parameter: {}", name.into()),
        )
    }

    pub fn invalid_parameter_type(name: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidParameterType,
            format!(
                "Parameter '{}' has the wrong type, expected {}",
                name.into(),
                expected.into()
            ),
        )
    }

    pub fn session_init_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SessionInitFailed, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("Operation timed out: {}", operation.into()),
        )
    }

    pub fn backend_not_warm(resource_type: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::BackendNotWarm,
            format!("Backend '{}' is not warmed up", resource_type.into()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_ranges() {
        assert!(ErrorCode::MissingParameter.is_caller_error());
        assert!(ErrorCode::AmbiguousToolName.is_caller_error());
        assert!(!ErrorCode::Timeout.is_caller_error());
        assert!(!ErrorCode::BatchPartialFailure.is_caller_error());
    }

    #[test]
    fn test_missing_and_wrong_type_are_distinct() {
        // These two must never share a code
        assert_ne!(
            ErrorCode::MissingParameter.value(),
            ErrorCode::InvalidParameterType.value()
        );
    }

    #[test]
    fn test_partial_failure_code() {
        assert_eq!(ErrorCode::BatchPartialFailure.value(), 5009);
        assert_eq!(ErrorCode::BatchAllFailed.value(), 5008);
    }

    #[test]
    fn test_display() {
        let err = ToolError::missing_parameter("path").with_details("declared by read_file");
        assert_eq!(err.to_string(), "[4002] Missing required parameter: path");
        assert!(err.details.is_some());
    }
}

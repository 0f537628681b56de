//! Error types for gkemc
//!
//! One enum covers the whole reconciliation taxonomy: validation and
//! infeasibility errors are raised before any mutation, conflicts are
//! recovered by the retry driver, everything else is returned to the caller
//! with enough context (resource path, field path, operation) to diagnose.

use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// gRPC status code for ABORTED, reported by operations that lost a race
const GRPC_ABORTED: i32 = 10;

/// Main error type for reconciliation
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A required field is missing or an enum value is outside its valid set
    #[error("validation error: {field}: {message}")]
    Validation { field: String, message: String },

    /// The plan requires recreation, or a lifecycle directive forbids it
    #[error("apply infeasible: {message}")]
    ApplyInfeasible { message: String },

    /// Remote version token mismatch
    #[error("conflict on {resource}: {message}")]
    Conflict { resource: String, message: String },

    /// Delete finished but the resource is still observable
    #[error("{resource} still exists after {attempts} confirm attempts")]
    NotDeleted { resource: String, attempts: u32 },

    /// Apply finished without transport failure but state still differs
    #[error("diffs remain after apply:\n{}", .diffs.join("\n"))]
    DiffAfterApply { diffs: Vec<String> },

    /// The remote system reported the resource as absent
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// Non-success HTTP status other than 404/409/412
    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    /// A long-running operation finished with an error status
    #[error("operation {operation} failed (code {code}): {message}")]
    Operation {
        operation: String,
        code: i32,
        message: String,
    },

    /// The call deadline elapsed
    #[error("timed out waiting for {waiting_for}")]
    Timeout { waiting_for: String },

    /// Programming error in the caller, e.g. diffing two absent values
    #[error("structural error: {0}")]
    Structural(String),

    /// Wire value did not match the schema
    #[error("codec error at {field}: {message}")]
    Codec { field: String, message: String },

    /// Socket/TLS level failure
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Credentials could not be obtained
    #[error("authentication error: {0}")]
    Auth(String),

    /// Errors collected by `delete_all`
    #[error("failed to delete {} resource(s):\n{}", .failures.len(), .failures.join("\n"))]
    DeleteAll { failures: Vec<String> },
}

impl Error {
    /// Create a validation error for the given field path
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an infeasibility error with the given message
    pub fn infeasible(message: impl Into<String>) -> Self {
        Self::ApplyInfeasible {
            message: message.into(),
        }
    }

    /// Create a codec error for the given field path
    pub fn codec(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Codec {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Map a finished operation's error status, treating ABORTED as a conflict
    pub fn from_operation(operation: &str, code: i32, message: &str) -> Self {
        if code == GRPC_ABORTED {
            return Self::Conflict {
                resource: operation.to_string(),
                message: message.to_string(),
            };
        }
        Self::Operation {
            operation: operation.to_string(),
            code,
            message: message.to_string(),
        }
    }

    /// Whether the whole apply should be retried from a fresh read
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Only conflicts are retried; everything else fails fast
    pub fn is_retryable(&self) -> bool {
        self.is_conflict()
    }
}

/// Format an error for display on the command line.
/// Keeps messages short and never echoes raw response bodies.
pub fn format_api_error(error: &Error) -> String {
    match error {
        Error::Api { status: 401, .. } | Error::Auth(_) => {
            "Authentication failed. Run 'gcloud auth application-default login'.".to_string()
        }
        Error::Api { status: 403, .. } => {
            "Permission denied. Check your GCP IAM permissions.".to_string()
        }
        Error::Api { status: 429, .. } => {
            "Rate limit exceeded. Please try again later.".to_string()
        }
        Error::Api { status: 400, .. } => "Invalid request. Check your manifest.".to_string(),
        Error::Api { status, .. } if *status >= 500 => {
            "GCP service temporarily unavailable. Please try again.".to_string()
        }
        Error::NotFound { resource } => format!("Resource not found: {}", resource),
        Error::Conflict { .. } => {
            "Resource conflict. The resource was modified concurrently.".to_string()
        }
        Error::Http(_) => "Request failed. Check your network connection and try again.".to_string(),
        other => other.to_string(),
    }
}

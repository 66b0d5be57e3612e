//! Error types for the page-analysis client.
//!
//! Failures fall into four groups, all local to a single job:
//! - transport failures ([`FetchError`]),
//! - malformed bodies ([`DecodeError`]),
//! - errors reported by the service itself ([`ApiError`]),
//! - non-fatal run warnings ([`RunWarning`]).
//!
//! Only [`RunError`] concerns a whole batch.

use crate::credential::CredentialError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One component error of a Google API error response.
///
/// The service keeps `domain`, `reason` and the location fields constant for
/// a failure class but interpolates request-specific text into `message`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "camelCase", default)]
#[error("{message}")]
pub struct ErrorRecord {
    /// Error domain, e.g. `global`
    pub domain: String,
    /// Machine-readable reason, e.g. `rateLimitExceeded`
    pub reason: String,
    /// Human-readable message
    pub message: String,
    /// Kind of location the error refers to, e.g. `parameter`
    pub location_type: String,
    /// Location the error refers to, e.g. `url`
    pub location: String,
}

impl ErrorRecord {
    /// Create a record from its five fields.
    #[must_use]
    pub fn new(
        domain: impl Into<String>,
        reason: impl Into<String>,
        message: impl Into<String>,
        location_type: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            reason: reason.into(),
            message: message.into(),
            location_type: location_type.into(),
            location: location.into(),
        }
    }
}

/// A failure reported by the remote service.
///
/// Carries the status code, the top-level message and the ordered component
/// records. Errors decoded from a response body keep that body.
///
/// See: <https://developers.google.com/webmaster-tools/v1/errors>
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    /// HTTP status code; 0 for runtime errors reported inside a successful run
    pub code: u16,
    /// Canonical status (`INVALID_ARGUMENT`) or runtime error code (`NO_FCP`)
    pub status: Option<String>,
    /// Top-level message
    pub message: String,
    /// Component error records, in response order
    pub errors: Vec<ErrorRecord>,
    raw: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiErrorBody {
    code: u16,
    message: String,
    status: Option<String>,
    errors: Vec<ErrorRecord>,
}

impl ApiError {
    /// Create an error without component records.
    #[must_use]
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            status: None,
            message: message.into(),
            errors: Vec::new(),
            raw: None,
        }
    }

    /// Add a component record.
    #[must_use]
    pub fn with_record(mut self, record: ErrorRecord) -> Self {
        self.errors.push(record);
        self
    }

    /// Set the canonical status string.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Decode the `{"error": {...}}` envelope of a failed response.
    ///
    /// # Errors
    /// Returns [`DecodeError`] if the body is not JSON or has no `error` object.
    pub fn from_body(body: &[u8]) -> Result<Self, DecodeError> {
        let envelope: ErrorEnvelope = serde_json::from_slice(body)?;
        let error = envelope.error.ok_or(DecodeError::MissingField("error"))?;

        Ok(Self {
            code: error.code,
            status: error.status,
            message: error.message,
            errors: error.errors,
            raw: Some(String::from_utf8_lossy(body).into_owned()),
        })
    }

    /// The top-level fields viewed as a record.
    ///
    /// The envelope only has a message, so every other field is empty.
    #[must_use]
    pub fn top_level(&self) -> ErrorRecord {
        ErrorRecord {
            message: self.message.clone(),
            ..ErrorRecord::default()
        }
    }

    /// The response body this error was decoded from, or the message.
    #[must_use]
    pub fn raw(&self) -> &str {
        self.raw.as_deref().unwrap_or(&self.message)
    }
}

/// A non-fatal diagnostic returned alongside a successful analysis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct RunWarning(String);

impl RunWarning {
    /// Wrap a warning message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// The warning text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Transport-level failures (network, DNS, timeouts).
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP client error
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The request did not complete in time
    #[error("request timed out after {seconds}s")]
    Timeout {
        /// Timeout duration in seconds
        seconds: u64,
    },

    /// Any other transport failure
    #[error("transport error: {0}")]
    Transport(String),
}

/// Malformed response bodies.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Body is not the expected JSON
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A required object is absent
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A URL field could not be parsed
    #[error("invalid {field}: {source}")]
    InvalidUrl {
        /// JSON field name
        field: &'static str,
        /// Parse failure
        source: url::ParseError,
    },

    /// A timestamp field could not be parsed
    #[error("invalid {field}: {source}")]
    InvalidTime {
        /// JSON field name
        field: &'static str,
        /// Parse failure
        source: chrono::ParseError,
    },
}

/// Client-side failure of a single job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The credential could not issue a token
    #[error("token error: {0}")]
    Credential(#[from] CredentialError),

    /// The request URL could not be built
    #[error("invalid request url: {0}")]
    RequestUrl(#[from] url::ParseError),

    /// Transport failure
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Response body could not be decoded
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The batch was cancelled before this job was admitted
    #[error("job cancelled before it started")]
    Cancelled,

    /// The task running the job panicked
    #[error("job task failed: {0}")]
    Panicked(String),
}

/// Batch-level failures.
#[derive(Debug, Error)]
pub enum RunError {
    /// A concurrency cap of zero would never admit a job
    #[error("max concurrency must be at least 1")]
    InvalidConcurrency,

    /// The admission gate was closed while jobs were waiting
    #[error("admission gate closed: {0}")]
    GateClosed(#[from] tokio::sync::AcquireError),
}

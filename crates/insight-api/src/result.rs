//! Per-job outcome aggregation.

use crate::decoder::Decoded;
use crate::error::{ApiError, JobError, RunWarning};
use crate::signature::{Classify, ErrorSignature};
use std::fmt;
use thiserror::Error;

/// Coarse outcome of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Payload present, no errors or warnings
    Success,
    /// Payload present with warnings only
    SuccessWithWarnings,
    /// An error occurred or no payload was produced
    Failed,
}

/// Borrowed view of one error attached to a [`JobResult`].
#[derive(Debug, Clone, Copy)]
pub enum ErrorRef<'a> {
    /// Client-side failure
    Job(&'a JobError),
    /// Failure reported by the service
    Api(&'a ApiError),
    /// Non-fatal warning
    Warning(&'a RunWarning),
}

impl fmt::Display for ErrorRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Job(e) => fmt::Display::fmt(e, f),
            Self::Api(e) => fmt::Display::fmt(e, f),
            Self::Warning(w) => fmt::Display::fmt(w, f),
        }
    }
}

impl std::error::Error for ErrorRef<'_> {}

impl Classify for ErrorRef<'_> {
    /// Only service errors carry the metadata signatures describe.
    fn matches(&self, signature: &ErrorSignature) -> bool {
        match self {
            Self::Api(e) => e.matches(signature),
            Self::Job(_) | Self::Warning(_) => false,
        }
    }
}

/// Everything one job produced: payload, errors and warnings.
///
/// A result never records more than one internal error; the first one set
/// wins.
#[derive(Debug)]
pub struct JobResult<T> {
    url: String,
    payload: Option<T>,
    error: Option<JobError>,
    api_error: Option<ApiError>,
    warnings: Vec<RunWarning>,
}

impl<T> JobResult<T> {
    /// Empty result for `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            payload: None,
            error: None,
            api_error: None,
            warnings: Vec::new(),
        }
    }

    /// Result for a job that was never started.
    #[must_use]
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::failed(url, JobError::Cancelled)
    }

    /// Result carrying only an internal error.
    #[must_use]
    pub fn failed(url: impl Into<String>, error: JobError) -> Self {
        let mut result = Self::new(url);
        result.set_error(error);
        result
    }

    /// The analyzed page URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The payload, if the job succeeded.
    #[must_use]
    pub fn payload(&self) -> Option<&T> {
        self.payload.as_ref()
    }

    /// Take the payload.
    #[must_use]
    pub fn into_payload(self) -> Option<T> {
        self.payload
    }

    /// The internal error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&JobError> {
        self.error.as_ref()
    }

    /// The service error, if any.
    #[must_use]
    pub fn api_error(&self) -> Option<&ApiError> {
        self.api_error.as_ref()
    }

    /// Run warnings, in the order they were reported.
    #[must_use]
    pub fn warnings(&self) -> &[RunWarning] {
        &self.warnings
    }

    /// All attached errors: internal error, service error, then warnings.
    #[must_use]
    pub fn errs(&self) -> Vec<ErrorRef<'_>> {
        self.error
            .iter()
            .map(ErrorRef::Job)
            .chain(self.api_error.iter().map(ErrorRef::Api))
            .chain(self.warnings.iter().map(ErrorRef::Warning))
            .collect()
    }

    /// Whether any error (not counting warnings) is attached.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.error.is_some() || self.api_error.is_some()
    }

    /// Coarse outcome.
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        if self.has_error() || self.payload.is_none() {
            Outcome::Failed
        } else if self.warnings.is_empty() {
            Outcome::Success
        } else {
            Outcome::SuccessWithWarnings
        }
    }

    /// Whether the job was cancelled before it started.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.error, Some(JobError::Cancelled))
    }

    /// Store the payload.
    pub fn set_payload(&mut self, payload: T) {
        self.payload = Some(payload);
    }

    /// Record an internal error unless one is already recorded.
    pub fn set_error(&mut self, error: JobError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Record a service error.
    pub fn set_api_error(&mut self, error: ApiError) {
        self.api_error = Some(error);
    }

    /// Append a warning.
    pub fn push_warning(&mut self, warning: RunWarning) {
        self.warnings.push(warning);
    }

    /// Merge a decoded body into this result.
    pub fn apply(&mut self, decoded: Decoded<T>) {
        if let Some(payload) = decoded.payload {
            self.set_payload(payload);
        }
        if let Some(error) = decoded.runtime_error {
            self.set_api_error(error);
        }
        self.warnings.extend(decoded.warnings);
    }

    /// Convert into a plain `Result`.
    ///
    /// # Errors
    /// Returns [`AnalysisError`] carrying the internal error, else the service
    /// error, else [`AnalysisFailure::MissingPayload`].
    pub fn into_result(self) -> Result<(T, Vec<RunWarning>), AnalysisError> {
        let url = self.url;
        let cause = match (self.error, self.api_error, self.payload) {
            (Some(error), _, _) => AnalysisFailure::Job(error),
            (None, Some(error), _) => AnalysisFailure::Api(error),
            (None, None, Some(payload)) => return Ok((payload, self.warnings)),
            (None, None, None) => AnalysisFailure::MissingPayload,
        };

        Err(AnalysisError { url, cause })
    }
}

/// Why an analysis failed.
#[derive(Debug, Error)]
pub enum AnalysisFailure {
    /// Client-side failure
    #[error(transparent)]
    Job(JobError),

    /// Failure reported by the service
    #[error(transparent)]
    Api(ApiError),

    /// The response carried neither a payload nor an error
    #[error("response carried no result")]
    MissingPayload,
}

/// A failed analysis of a single URL.
#[derive(Debug, Error)]
#[error("\"{url}\": {cause}")]
pub struct AnalysisError {
    /// The analyzed page URL
    pub url: String,
    /// The underlying failure
    #[source]
    pub cause: AnalysisFailure,
}

impl AnalysisError {
    /// The service error, if the service rejected the request.
    #[must_use]
    pub fn api_error(&self) -> Option<&ApiError> {
        match &self.cause {
            AnalysisFailure::Api(error) => Some(error),
            AnalysisFailure::Job(_) | AnalysisFailure::MissingPayload => None,
        }
    }
}

impl Classify for AnalysisError {
    fn matches(&self, signature: &ErrorSignature) -> bool {
        self.api_error().is_some_and(|error| error.matches(signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorRecord;
    use crate::signature::{matches, KnownError};

    fn invalid_key() -> ApiError {
        ApiError::new(400, "API key not valid. Please pass a valid API key.").with_record(
            ErrorRecord::new(
                "global",
                "badRequest",
                "API key not valid. Please pass a valid API key.",
                "",
                "",
            ),
        )
    }

    #[test]
    fn test_outcomes() {
        let mut result: JobResult<u32> = JobResult::new("https://example.com");
        assert_eq!(result.outcome(), Outcome::Failed);

        result.set_payload(7);
        assert_eq!(result.outcome(), Outcome::Success);

        result.push_warning(RunWarning::new("slow"));
        assert_eq!(result.outcome(), Outcome::SuccessWithWarnings);

        result.set_api_error(invalid_key());
        assert_eq!(result.outcome(), Outcome::Failed);
    }

    #[test]
    fn test_first_error_wins() {
        let mut result: JobResult<()> = JobResult::new("https://example.com");
        result.set_error(JobError::Panicked("first".to_string()));
        result.set_error(JobError::Cancelled);

        assert!(matches!(result.error(), Some(JobError::Panicked(msg)) if msg == "first"));
        assert!(!result.is_cancelled());
    }

    #[test]
    fn test_errs_order() {
        let mut result: JobResult<()> = JobResult::new("https://example.com");
        result.push_warning(RunWarning::new("w1"));
        result.set_api_error(invalid_key());
        result.set_error(JobError::Cancelled);
        result.push_warning(RunWarning::new("w2"));

        let errs = result.errs();
        assert_eq!(errs.len(), 4);
        assert!(matches!(errs[0], ErrorRef::Job(JobError::Cancelled)));
        assert!(matches!(errs[1], ErrorRef::Api(_)));
        assert_eq!(errs[2].to_string(), "w1");
        assert_eq!(errs[3].to_string(), "w2");
    }

    #[test]
    fn test_error_refs_classify() {
        let mut result: JobResult<()> = JobResult::new("https://example.com");
        result.set_api_error(invalid_key());
        result.push_warning(RunWarning::new(
            "API key not valid. Please pass a valid API key.",
        ));

        let hits: Vec<bool> = result
            .errs()
            .iter()
            .map(|e| matches(e, KnownError::InvalidKey.signature()))
            .collect();
        assert_eq!(hits, vec![true, false]);
    }

    #[test]
    fn test_apply_decoded() {
        let mut result: JobResult<&str> = JobResult::new("https://example.com");
        result.apply(Decoded {
            payload: Some("report"),
            runtime_error: None,
            warnings: vec![RunWarning::new("redirected")],
        });

        assert_eq!(result.payload(), Some(&"report"));
        assert_eq!(result.warnings().len(), 1);
        assert_eq!(result.outcome(), Outcome::SuccessWithWarnings);

        let mut result: JobResult<&str> = JobResult::new("https://example.com");
        result.apply(Decoded {
            payload: None,
            runtime_error: Some(ApiError::new(0, "no paint").with_status("NO_FCP")),
            warnings: Vec::new(),
        });
        assert_eq!(result.outcome(), Outcome::Failed);
        assert_eq!(result.api_error().map(|e| e.message.as_str()), Some("no paint"));
    }

    #[test]
    fn test_into_result() {
        let mut ok: JobResult<u8> = JobResult::new("https://example.com");
        ok.set_payload(1);
        ok.push_warning(RunWarning::new("w"));
        let (payload, warnings) = ok.into_result().expect("success");
        assert_eq!(payload, 1);
        assert_eq!(warnings.len(), 1);

        let mut api: JobResult<u8> = JobResult::new("https://example.com");
        api.set_api_error(invalid_key());
        let err = api.into_result().expect_err("api failure");
        assert_eq!(
            err.to_string(),
            "\"https://example.com\": API key not valid. Please pass a valid API key."
        );
        assert!(matches(&err, KnownError::InvalidKey.signature()));

        let cancelled: JobResult<u8> = JobResult::cancelled("https://example.com");
        let err = cancelled.into_result().expect_err("cancelled");
        assert!(matches!(err.cause, AnalysisFailure::Job(JobError::Cancelled)));
        assert!(err.api_error().is_none());

        let empty: JobResult<u8> = JobResult::new("https://example.com");
        let err = empty.into_result().expect_err("missing payload");
        assert!(matches!(err.cause, AnalysisFailure::MissingPayload));
    }
}

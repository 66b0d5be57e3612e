//! Classification of service errors against known failure signatures.
//!
//! The service returns constant metadata (domain, reason, location) for a
//! failure class but embeds request-specific text (URLs, consumer ids, quota
//! names) in the message. A signature therefore compares the metadata
//! exactly and falls back to treating its own message as a regular
//! expression tested against the observed message.
//!
//! Matching is one-directional: the observed error is tested against the
//! signature, never the other way round.
//!
//! # Example
//!
//! ```rust
//! use insight_api::{matches, ApiError, ErrorRecord, KnownError};
//!
//! let err = ApiError::new(429, "Quota exceeded").with_record(ErrorRecord::new(
//!     "global",
//!     "rateLimitExceeded",
//!     "Quota exceeded for quota metric 'Queries' and limit 'Queries per minute' \
//!      of service 'pagespeedonline.googleapis.com' for consumer 'project_number:42'.",
//!     "",
//!     "",
//! ));
//!
//! assert!(matches(&err, KnownError::RateLimitExceeded.signature()));
//! assert!(!matches(&err, KnownError::InvalidKey.signature()));
//! ```

use crate::error::{ApiError, ErrorRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// A registered template of a known failure class.
#[derive(Debug, Clone)]
pub struct ErrorSignature {
    name: &'static str,
    domain: String,
    reason: String,
    location_type: String,
    location: String,
    message: String,
    pattern: Option<Regex>,
}

impl ErrorSignature {
    /// Create a signature with empty location fields.
    ///
    /// `message` is compared literally first and then used as a regular
    /// expression. A message that is not a valid pattern only matches
    /// literally.
    #[must_use]
    pub fn new(
        name: &'static str,
        domain: impl Into<String>,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        let pattern = match Regex::new(&message) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                tracing::debug!("Signature {} message is not a pattern: {}", name, e);
                None
            }
        };

        Self {
            name,
            domain: domain.into(),
            reason: reason.into(),
            location_type: String::new(),
            location: String::new(),
            message,
            pattern,
        }
    }

    /// Set the location type and location.
    #[must_use]
    pub fn with_location(
        mut self,
        location_type: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        self.location_type = location_type.into();
        self.location = location.into();
        self
    }

    /// Signature name, for display.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The registered message (literal or pattern).
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The signature's fields as a record, message included verbatim.
    #[must_use]
    pub fn record(&self) -> ErrorRecord {
        ErrorRecord::new(
            self.domain.clone(),
            self.reason.clone(),
            self.message.clone(),
            self.location_type.clone(),
            self.location.clone(),
        )
    }

    /// Test a single record against this signature.
    ///
    /// Empty fields are literal values: an empty domain only matches an
    /// empty domain.
    #[must_use]
    pub fn matches_record(&self, observed: &ErrorRecord) -> bool {
        if observed.domain != self.domain
            || observed.reason != self.reason
            || observed.location_type != self.location_type
            || observed.location != self.location
        {
            return false;
        }

        if observed.message == self.message {
            return true;
        }

        self.pattern
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(&observed.message))
    }
}

impl fmt::Display for ErrorSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Anything that can be tested against an [`ErrorSignature`].
pub trait Classify {
    /// Whether this error is an instance of `signature`.
    fn matches(&self, signature: &ErrorSignature) -> bool;
}

impl Classify for ErrorRecord {
    fn matches(&self, signature: &ErrorSignature) -> bool {
        signature.matches_record(self)
    }
}

impl Classify for ApiError {
    /// The top-level fields or any component record may match.
    fn matches(&self, signature: &ErrorSignature) -> bool {
        signature.matches_record(&self.top_level())
            || self
                .errors
                .iter()
                .any(|record| signature.matches_record(record))
    }
}

impl<C: Classify + ?Sized> Classify for &C {
    fn matches(&self, signature: &ErrorSignature) -> bool {
        (**self).matches(signature)
    }
}

/// Test `observed` against `signature`.
#[must_use]
pub fn matches<C: Classify + ?Sized>(observed: &C, signature: &ErrorSignature) -> bool {
    observed.matches(signature)
}

/// The well-known failure classes of the PageSpeed Insights API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownError {
    /// Lighthouse could not load the requested page
    FailedDocumentRequest,
    /// The service is overloaded; too many requests
    Unprocessable,
    /// The API key was rejected
    InvalidKey,
    /// A string parameter has a value outside its allowed set
    InvalidParameter,
    /// Unknown `category` value
    InvalidCategory,
    /// Unknown `strategy` value
    InvalidStrategy,
    /// The `url` parameter is not an http(s) URL
    InvalidUrl,
    /// Per-minute query quota exceeded
    RateLimitExceeded,
    /// Per-day query quota exhausted
    QuotaExhausted,
}

impl KnownError {
    /// Number of known failure classes.
    pub const COUNT: usize = 9;

    /// Every known failure class, in registry order.
    pub const ALL: [KnownError; Self::COUNT] = [
        Self::FailedDocumentRequest,
        Self::Unprocessable,
        Self::InvalidKey,
        Self::InvalidParameter,
        Self::InvalidCategory,
        Self::InvalidStrategy,
        Self::InvalidUrl,
        Self::RateLimitExceeded,
        Self::QuotaExhausted,
    ];

    /// Stable name of the failure class.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::FailedDocumentRequest => "failed_document_request",
            Self::Unprocessable => "unprocessable",
            Self::InvalidKey => "invalid_key",
            Self::InvalidParameter => "invalid_parameter",
            Self::InvalidCategory => "invalid_category",
            Self::InvalidStrategy => "invalid_strategy",
            Self::InvalidUrl => "invalid_url",
            Self::RateLimitExceeded => "rate_limit_exceeded",
            Self::QuotaExhausted => "quota_exhausted",
        }
    }

    /// The built-in signature of this failure class.
    #[must_use]
    pub fn signature(self) -> &'static ErrorSignature {
        SignatureRegistry::builtin().get(self)
    }

    fn build_signature(self) -> ErrorSignature {
        let name = self.name();
        match self {
            Self::FailedDocumentRequest => ErrorSignature::new(
                name,
                "lighthouse",
                "lighthouseUserError",
                r"^Lighthouse returned error: FAILED_DOCUMENT_REQUEST\. Lighthouse was unable to reliably load the page you requested\. .*$",
            ),
            Self::Unprocessable => ErrorSignature::new(
                name,
                "global",
                "internalError",
                "Unable to process request. Please wait a while and try again.",
            ),
            Self::InvalidKey => ErrorSignature::new(
                name,
                "global",
                "badRequest",
                "API key not valid. Please pass a valid API key.",
            ),
            Self::InvalidParameter => ErrorSignature::new(
                name,
                "global",
                "invalidParameter",
                r"^Invalid string value: '.*'\. Allowed values: \[.*\]$",
            ),
            Self::InvalidCategory => ErrorSignature::new(
                name,
                "",
                "invalid",
                r"^Invalid value at 'category' \(type\.googleapis\.com/google\.chrome\.pagespeedonline\.v5\.PagespeedonlinePagespeedapiRunpagespeedRequest\.Category\), .*$",
            ),
            Self::InvalidStrategy => ErrorSignature::new(
                name,
                "",
                "invalid",
                r"^Invalid value at 'strategy' \(type\.googleapis\.com/google\.chrome\.pagespeedonline\.v5\.PagespeedonlinePagespeedapiRunpagespeedRequest\.Strategy\), .*$",
            ),
            Self::InvalidUrl => ErrorSignature::new(
                name,
                "gdata.CoreErrorDomain",
                "INVALID_PARAMETER",
                r"^Invalid value '.*'\. Values must match the following regular expression: '\(\?i\)\(url:\|origin:\)\?http\(s\)\?://\.\*'$",
            )
            .with_location("other", "url"),
            Self::RateLimitExceeded => ErrorSignature::new(
                name,
                "global",
                "rateLimitExceeded",
                r"^Quota exceeded for quota metric 'Queries' and limit 'Queries per minute' of service 'pagespeedonline\.googleapis\.com' for consumer '.*'\.$",
            ),
            Self::QuotaExhausted => ErrorSignature::new(
                name,
                "global",
                "rateLimitExceeded",
                r"^Quota exceeded for quota metric 'Queries' and limit 'Queries per day' of service 'pagespeedonline\.googleapis\.com' for consumer '.*'\.$",
            ),
        }
    }
}

impl fmt::Display for KnownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

static BUILTIN: Lazy<SignatureRegistry> = Lazy::new(SignatureRegistry::new);

/// Read-only table of the built-in signatures.
///
/// Built once on first use and never mutated afterwards.
#[derive(Debug)]
pub struct SignatureRegistry {
    signatures: [ErrorSignature; KnownError::COUNT],
}

impl SignatureRegistry {
    fn new() -> Self {
        Self {
            signatures: KnownError::ALL.map(KnownError::build_signature),
        }
    }

    /// The process-wide registry.
    #[must_use]
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    /// Signature of a known failure class.
    #[must_use]
    pub fn get(&self, kind: KnownError) -> &ErrorSignature {
        &self.signatures[kind as usize]
    }

    /// All registered signatures with their class.
    pub fn iter(&self) -> impl Iterator<Item = (KnownError, &ErrorSignature)> {
        KnownError::ALL.into_iter().zip(self.signatures.iter())
    }

    /// The first known failure class `observed` belongs to, if any.
    #[must_use]
    pub fn classify<C: Classify + ?Sized>(&self, observed: &C) -> Option<KnownError> {
        self.iter()
            .find(|(_, signature)| observed.matches(signature))
            .map(|(kind, _)| kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate_limit_record(consumer: &str) -> ErrorRecord {
        ErrorRecord::new(
            "global",
            "rateLimitExceeded",
            format!(
                "Quota exceeded for quota metric 'Queries' and limit 'Queries per minute' of service 'pagespeedonline.googleapis.com' for consumer '{consumer}'."
            ),
            "",
            "",
        )
    }

    #[test]
    fn test_every_signature_matches_itself() {
        for (kind, signature) in SignatureRegistry::builtin().iter() {
            assert!(
                matches(&signature.record(), signature),
                "{kind} does not match itself"
            );
        }
    }

    #[test]
    fn test_registry_order_follows_known_errors() {
        for kind in KnownError::ALL {
            assert_eq!(SignatureRegistry::builtin().get(kind).name(), kind.name());
        }
    }

    #[test]
    fn test_dynamic_message_matches_pattern() {
        let record = rate_limit_record("project_number:583797351490");
        assert!(matches(&record, KnownError::RateLimitExceeded.signature()));
        assert!(!matches(&record, KnownError::QuotaExhausted.signature()));
    }

    #[test]
    fn test_metadata_must_match_exactly() {
        let mut record = rate_limit_record("project_number:1");
        record.domain = "usageLimits".to_string();
        assert!(!matches(&record, KnownError::RateLimitExceeded.signature()));

        let mut record = rate_limit_record("project_number:1");
        record.location = "url".to_string();
        assert!(!matches(&record, KnownError::RateLimitExceeded.signature()));
    }

    #[test]
    fn test_empty_fields_are_literal() {
        // InvalidUrl requires location fields; a record without them is not it
        let record = ErrorRecord::new(
            "gdata.CoreErrorDomain",
            "INVALID_PARAMETER",
            "Invalid value 'gorbe.io'. Values must match the following regular expression: '(?i)(url:|origin:)?http(s)?://.*'",
            "",
            "",
        );
        assert!(!matches(&record, KnownError::InvalidUrl.signature()));

        let located = ErrorRecord {
            location_type: "other".to_string(),
            location: "url".to_string(),
            ..record
        };
        assert!(matches(&located, KnownError::InvalidUrl.signature()));
    }

    #[test]
    fn test_matching_is_one_directional() {
        let observed = ErrorSignature::new(
            "observed",
            "global",
            "badRequest",
            "API key not valid. Please pass a valid API key.",
        );
        let pattern = ErrorSignature::new("pattern", "global", "badRequest", "^API key .*$");

        assert!(matches(&observed.record(), &pattern));
        assert!(!matches(&pattern.record(), &observed));
    }

    #[test]
    fn test_invalid_pattern_matches_literally_only() {
        let signature = ErrorSignature::new("broken", "global", "odd", "unbalanced (paren");
        let exact = ErrorRecord::new("global", "odd", "unbalanced (paren", "", "");
        let other = ErrorRecord::new("global", "odd", "something else", "", "");

        assert!(matches(&exact, &signature));
        assert!(!matches(&other, &signature));
    }

    #[test]
    fn test_component_error_unwrap() {
        let err = ApiError::new(
            400,
            "Invalid string value: 'asdf'. Allowed values: [mostpopular]",
        )
        .with_record(ErrorRecord::new(
            "global",
            "internalError",
            "Unable to process request. Please wait a while and try again.",
            "",
            "",
        ));

        assert!(!matches(&err.top_level(), KnownError::Unprocessable.signature()));
        assert!(matches(&err, KnownError::Unprocessable.signature()));
    }

    #[test]
    fn test_top_level_match() {
        let signature = ErrorSignature::new("backend", "", "", "^Backend error$");
        let err = ApiError::new(503, "Backend error");
        assert!(matches(&err, &signature));
    }

    #[test]
    fn test_invalid_parameter_record() {
        let record = ErrorRecord::new(
            "global",
            "invalidParameter",
            "Invalid string value: 'asdf'. Allowed values: [mostpopular]",
            "",
            "",
        );
        let err = ApiError::new(400, record.message.clone()).with_record(record);

        assert_eq!(
            SignatureRegistry::builtin().classify(&err),
            Some(KnownError::InvalidParameter)
        );
    }

    #[test]
    fn test_classify_unknown() {
        let err = ApiError::new(500, "Internal error encountered.").with_record(
            ErrorRecord::new("global", "backendError", "Internal error encountered.", "", ""),
        );
        assert_eq!(SignatureRegistry::builtin().classify(&err), None);
    }
}

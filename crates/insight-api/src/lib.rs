//! Insight API - PageSpeed Insights client with bounded batch execution.
//!
//! This crate runs Lighthouse analyses through the PageSpeed Insights API.
//! It rotates API keys across requests, runs batches of pages with a fixed
//! concurrency cap while keeping results in input order, and classifies
//! service errors against a registry of known failure signatures.
//!
//! # Features
//!
//! - Single, random and round-robin API key rotation
//! - Concurrent batches with cooperative cancellation
//! - Per-job results aggregating payload, errors and run warnings
//! - Regex-based classification of well-known API failures
//!
//! # Example
//!
//! ```rust,no_run
//! use insight_api::{ApiKey, BatchRunner, Job, KnownError, SignatureRegistry};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let runner = BatchRunner::from_config(&insight_core::AppConfig::default())?;
//! let keys = Arc::new(ApiKey::rotating(["key-a", "key-b"]));
//!
//! let jobs = vec![Job::new("https://example.com"), Job::new("https://example.org")];
//! let results = runner.run(jobs, keys, 2, CancellationToken::new()).await?;
//!
//! for result in &results {
//!     if let Some(err) = result.api_error() {
//!         let kind = SignatureRegistry::builtin().classify(err);
//!         println!("{}: {:?}", result.url(), kind);
//!     }
//! }
//! # let _ = KnownError::InvalidKey;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod credential;
pub mod decoder;
pub mod error;
pub mod fetcher;
pub mod lighthouse;
pub mod request;
pub mod result;
pub mod runner;
pub mod signature;

// Re-export commonly used types
pub use credential::{ApiKey, Credential, CredentialError};
pub use decoder::{Decoded, LighthouseDecoder, ResponseDecoder};
pub use error::{ApiError, DecodeError, ErrorRecord, FetchError, JobError, RunError, RunWarning};
pub use fetcher::{FetchResponse, Fetcher, HttpFetcher};
pub use lighthouse::{Audit, AuditRef, CategoryGroup, CategoryResult, LighthouseResult, ScoreSelector};
pub use request::{build_request_url, Category, Job, Param, Strategy};
pub use result::{AnalysisError, AnalysisFailure, ErrorRef, JobResult, Outcome};
pub use runner::{analysis_params, BatchRunner};
pub use signature::{matches, Classify, ErrorSignature, KnownError, SignatureRegistry};

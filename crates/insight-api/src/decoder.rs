//! Decoding of successful response bodies.
//!
//! The raw JSON is first read into plain transfer structs and then copied
//! field by field into a [`LighthouseResult`], so parsing rules (URLs,
//! timestamps, runtime errors) live in one place.

use crate::error::{ApiError, DecodeError, RunWarning};
use crate::lighthouse::{Audit, CategoryGroup, CategoryResult, LighthouseResult};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Runtime error code Lighthouse reports when nothing went wrong.
const NO_ERROR: &str = "NO_ERROR";

/// Everything a successful body can carry.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    /// The analysis payload; `None` when the run itself failed
    pub payload: Option<T>,
    /// Failure reported inside an otherwise successful response
    pub runtime_error: Option<ApiError>,
    /// Non-fatal warnings
    pub warnings: Vec<RunWarning>,
}

/// Turns a successful response body into a payload.
pub trait ResponseDecoder: Send + Sync {
    /// The decoded payload type.
    type Payload: Send + 'static;

    /// Decode `body`.
    ///
    /// # Errors
    /// Returns [`DecodeError`] if the body is malformed.
    fn decode(&self, body: &[u8]) -> Result<Decoded<Self::Payload>, DecodeError>;
}

/// Decoder for `runPagespeed` responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct LighthouseDecoder;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PagespeedEnvelope {
    lighthouse_result: Option<RawLighthouseResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawLighthouseResult {
    requested_url: String,
    final_url: Option<String>,
    final_displayed_url: Option<String>,
    fetch_time: String,
    run_warnings: Vec<String>,
    runtime_error: Option<RawRuntimeError>,
    audits: HashMap<String, Audit>,
    categories: HashMap<String, CategoryResult>,
    category_groups: HashMap<String, CategoryGroup>,
    timing: RawTiming,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRuntimeError {
    code: String,
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTiming {
    /// Milliseconds
    total: f64,
}

impl ResponseDecoder for LighthouseDecoder {
    type Payload = LighthouseResult;

    fn decode(&self, body: &[u8]) -> Result<Decoded<LighthouseResult>, DecodeError> {
        let envelope: PagespeedEnvelope = serde_json::from_slice(body)?;
        let raw = envelope
            .lighthouse_result
            .ok_or(DecodeError::MissingField("lighthouseResult"))?;

        let warnings: Vec<RunWarning> = raw.run_warnings.iter().map(RunWarning::new).collect();

        if let Some(runtime) = raw.runtime_error.as_ref().filter(|r| r.code != NO_ERROR) {
            return Ok(Decoded {
                payload: None,
                runtime_error: Some(
                    ApiError::new(0, runtime.message.clone()).with_status(runtime.code.clone()),
                ),
                warnings,
            });
        }

        let final_url = raw
            .final_url
            .as_deref()
            .or(raw.final_displayed_url.as_deref())
            .unwrap_or(&raw.requested_url);

        let result = LighthouseResult {
            requested_url: parse_url("requestedUrl", &raw.requested_url)?,
            final_url: parse_url("finalUrl", final_url)?,
            fetch_time: DateTime::parse_from_rfc3339(&raw.fetch_time)
                .map_err(|source| DecodeError::InvalidTime {
                    field: "fetchTime",
                    source,
                })?
                .with_timezone(&Utc),
            run_warnings: warnings.clone(),
            audits: raw.audits,
            categories: raw.categories,
            category_groups: raw.category_groups,
            timing: Duration::try_from_secs_f64(raw.timing.total / 1000.0).unwrap_or_default(),
        };

        Ok(Decoded {
            payload: Some(result),
            runtime_error: None,
            warnings,
        })
    }
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, DecodeError> {
    Url::parse(value).map_err(|source| DecodeError::InvalidUrl { field, source })
}

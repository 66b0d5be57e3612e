//! Rendering of batch results for the terminal.

use insight_api::{
    Category, ErrorRef, JobResult, LighthouseResult, Outcome, ScoreSelector, SignatureRegistry,
};
use serde_json::{json, Value};

/// Name of the known failure class of a result, if any.
pub fn failure_kind(result: &JobResult<LighthouseResult>) -> Option<&'static str> {
    let registry = SignatureRegistry::builtin();
    result
        .errs()
        .iter()
        .find_map(|err| registry.classify(err))
        .map(|kind| kind.name())
}

/// One human-readable line per result.
pub fn render_line(result: &JobResult<LighthouseResult>) -> String {
    match (result.outcome(), result.payload()) {
        (Outcome::Success | Outcome::SuccessWithWarnings, Some(report)) => {
            let scores: Vec<String> = Category::ALL
                .into_iter()
                .filter_map(|category| {
                    report
                        .score(ScoreSelector::Category(category))
                        .map(|score| format!("{}={score}", category.id()))
                })
                .collect();

            let mut line = format!("ok    {}  {}", result.url(), scores.join(" "));
            if !result.warnings().is_empty() {
                line.push_str(&format!("  ({} warnings)", result.warnings().len()));
            }
            line
        }
        _ => {
            let cause = result
                .errs()
                .iter()
                .find(|err| !matches!(err, ErrorRef::Warning(_)))
                .map_or_else(|| "no result".to_string(), ToString::to_string);

            match failure_kind(result) {
                Some(kind) => format!("fail  {}  [{kind}] {cause}", result.url()),
                None => format!("fail  {}  {cause}", result.url()),
            }
        }
    }
}

/// JSON document describing every result, in input order.
pub fn render_json(results: &[JobResult<LighthouseResult>]) -> Value {
    Value::Array(results.iter().map(result_json).collect())
}

fn result_json(result: &JobResult<LighthouseResult>) -> Value {
    let outcome = match result.outcome() {
        Outcome::Success => "success",
        Outcome::SuccessWithWarnings => "success_with_warnings",
        Outcome::Failed => "failed",
    };

    let scores: serde_json::Map<String, Value> = result
        .payload()
        .map(|report| {
            Category::ALL
                .into_iter()
                .filter_map(|category| {
                    report
                        .score(ScoreSelector::Category(category))
                        .map(|score| (category.id().to_string(), json!(score)))
                })
                .collect()
        })
        .unwrap_or_default();

    let warnings: Vec<&str> = result.warnings().iter().map(|w| w.message()).collect();

    json!({
        "url": result.url(),
        "outcome": outcome,
        "final_url": result.payload().map(|r| r.final_url().as_str()),
        "scores": scores,
        "average": result.payload().and_then(|r| r.score(ScoreSelector::Average)),
        "error": result.error().map(ToString::to_string),
        "api_error": result.api_error().map(|e| json!({
            "code": e.code,
            "status": e.status,
            "message": e.message,
        })),
        "kind": failure_kind(result),
        "warnings": warnings,
    })
}

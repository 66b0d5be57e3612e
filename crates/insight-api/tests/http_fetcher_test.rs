use insight_api::{
    AnalysisFailure, ApiKey, BatchRunner, FetchError, Fetcher, HttpFetcher, JobError, KnownError,
    ScoreSelector, SignatureRegistry,
};
use insight_core::AppConfig;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SUCCESS_BODY: &str = r#"{
  "id": "https://example.com/",
  "lighthouseResult": {
    "requestedUrl": "https://example.com/",
    "finalUrl": "https://example.com/",
    "fetchTime": "2024-07-29T16:25:29.029Z",
    "runWarnings": [],
    "categories": {
      "performance": {"id": "performance", "title": "Performance", "score": 0.75}
    },
    "timing": {"total": 2500}
  }
}"#;

const INVALID_KEY_BODY: &str = r#"{
  "error": {
    "code": 400,
    "message": "API key not valid. Please pass a valid API key.",
    "errors": [
      {
        "message": "API key not valid. Please pass a valid API key.",
        "domain": "global",
        "reason": "badRequest"
      }
    ],
    "status": "INVALID_ARGUMENT"
  }
}"#;

async fn start_service() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/runPagespeed"))
        .and(query_param("url", "https://example.com/"))
        .and(query_param("key", "good-key"))
        .and(query_param("category", "PERFORMANCE"))
        .and(query_param("strategy", "mobile"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SUCCESS_BODY))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/runPagespeed"))
        .and(query_param("key", "bad-key"))
        .respond_with(ResponseTemplate::new(400).set_body_string(INVALID_KEY_BODY))
        .mount(&server)
        .await;

    server
}

fn runner_for(server: &MockServer) -> BatchRunner {
    let mut config = AppConfig::default();
    config.api.endpoint = format!("{}/runPagespeed", server.uri());
    BatchRunner::from_config(&config).expect("runner from config")
}

#[tokio::test]
async fn test_analyze_success() {
    let server = start_service().await;
    let runner = runner_for(&server);

    let result = runner
        .analyze("https://example.com/", &ApiKey::new("good-key"))
        .await
        .expect("analysis succeeds");

    assert_eq!(result.final_url().as_str(), "https://example.com/");
    assert_eq!(result.timing(), Duration::from_millis(2500));
    assert_eq!(result.score(ScoreSelector::Average), Some(75));
}

#[tokio::test]
async fn test_analyze_invalid_key() {
    let server = start_service().await;
    let runner = runner_for(&server);

    let err = runner
        .analyze("https://example.com/", &ApiKey::new("bad-key"))
        .await
        .expect_err("invalid key is rejected");

    assert_eq!(err.url, "https://example.com/");
    assert_eq!(
        SignatureRegistry::builtin().classify(&err),
        Some(KnownError::InvalidKey)
    );

    let api = err.api_error().expect("service error");
    assert_eq!(api.code, 400);
    assert_eq!(api.raw(), INVALID_KEY_BODY);
    assert!(!matches!(err.cause, AnalysisFailure::Job(_)));
}

#[tokio::test]
async fn test_fetcher_returns_status_and_body() {
    let server = start_service().await;
    let fetcher = HttpFetcher::new(5, "insight-test").expect("create fetcher");

    let url = format!("{}/runPagespeed?url=x&key=bad-key", server.uri());
    let response = fetcher.fetch(&url).await.expect("fetch");

    assert_eq!(response.status, 400);
    assert!(!response.is_success());
    assert_eq!(response.body, INVALID_KEY_BODY.as_bytes());
}

#[tokio::test]
async fn test_fetcher_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(1, "insight-test").expect("create fetcher");
    let result = fetcher.fetch(&server.uri()).await;

    assert!(matches!(result, Err(FetchError::Timeout { seconds: 1 })));
}

#[tokio::test]
async fn test_unreachable_service_is_job_error() {
    let mut config = AppConfig::default();
    config.api.endpoint = "http://127.0.0.1:9/runPagespeed".to_string();
    config.api.timeout_secs = 2;
    let runner = BatchRunner::from_config(&config).expect("runner from config");

    let err = runner
        .analyze("https://example.com/", &ApiKey::new("good-key"))
        .await
        .expect_err("connection refused");

    assert!(matches!(
        err.cause,
        AnalysisFailure::Job(JobError::Fetch(_))
    ));
    assert!(!err.to_string().contains("good-key"));
}

//! Bounded concurrent execution of analysis jobs.
//!
//! Jobs are admitted in input order through a semaphore. Each admitted job
//! runs on its own tokio task and hands its result back through the task's
//! join handle, so results are collected by index and always line up with
//! the input regardless of completion order.

use crate::credential::Credential;
use crate::decoder::{LighthouseDecoder, ResponseDecoder};
use crate::error::{ApiError, FetchError, JobError, RunError};
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::request::{build_request_url, Category, Job, Param, Strategy};
use crate::result::{AnalysisError, JobResult, Outcome};
use futures::future::join_all;
use insight_core::{AnalysisConfig, AppConfig, DEFAULT_ENDPOINT};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct RunnerSettings {
    endpoint: String,
    default_params: Vec<Param>,
}

/// Runs analysis jobs against the PageSpeed endpoint.
///
/// Cloning is cheap; clones share the fetcher, decoder and settings.
pub struct BatchRunner<D = LighthouseDecoder> {
    fetcher: Arc<dyn Fetcher>,
    decoder: Arc<D>,
    settings: Arc<RunnerSettings>,
}

impl<D> Clone for BatchRunner<D> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            decoder: Arc::clone(&self.decoder),
            settings: Arc::clone(&self.settings),
        }
    }
}

enum Slot<T> {
    Cancelled(String),
    Running {
        url: String,
        handle: JoinHandle<JobResult<T>>,
    },
}

impl BatchRunner<LighthouseDecoder> {
    /// Runner using `fetcher`, the default endpoint and the Lighthouse decoder.
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            decoder: Arc::new(LighthouseDecoder),
            settings: Arc::new(RunnerSettings {
                endpoint: DEFAULT_ENDPOINT.to_string(),
                default_params: Vec::new(),
            }),
        }
    }

    /// Runner backed by an [`HttpFetcher`] and configured from `config`.
    ///
    /// The `[analysis]` section becomes the default parameters of every job.
    ///
    /// # Errors
    /// Returns [`FetchError`] if the HTTP client cannot be created.
    pub fn from_config(config: &AppConfig) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::from_config(&config.api)?;

        Ok(Self::new(Arc::new(fetcher))
            .with_endpoint(config.api.endpoint.clone())
            .with_default_params(analysis_params(&config.analysis)))
    }
}

impl<D: ResponseDecoder + 'static> BatchRunner<D> {
    /// Replace the response decoder.
    #[must_use]
    pub fn with_decoder<E: ResponseDecoder>(self, decoder: E) -> BatchRunner<E> {
        BatchRunner {
            fetcher: self.fetcher,
            decoder: Arc::new(decoder),
            settings: self.settings,
        }
    }

    /// Replace the service endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.settings).endpoint = endpoint.into();
        self
    }

    /// Parameters sent with every job, before the job's own.
    #[must_use]
    pub fn with_default_params(mut self, params: Vec<Param>) -> Self {
        Arc::make_mut(&mut self.settings).default_params = params;
        self
    }

    /// The service endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.settings.endpoint
    }

    /// Parameters sent with every job.
    #[must_use]
    pub fn default_params(&self) -> &[Param] {
        &self.settings.default_params
    }

    /// Execute a single job without an admission gate.
    ///
    /// Never fails as a whole; every failure is recorded in the result.
    pub async fn run_one(&self, job: &Job, credential: &dyn Credential) -> JobResult<D::Payload> {
        let mut result = JobResult::new(job.url.as_str());

        if let Err(error) = self.execute(job, credential, &mut result).await {
            warn!(url = %job.url, error = %error, "Job failed");
            result.set_error(error);
        }

        if let Some(error) = result.api_error() {
            warn!(
                url = %job.url,
                code = error.code,
                status = error.status.as_deref().unwrap_or_default(),
                message = %error.message,
                "Service reported an error"
            );
        }

        result
    }

    async fn execute(
        &self,
        job: &Job,
        credential: &dyn Credential,
        result: &mut JobResult<D::Payload>,
    ) -> Result<(), JobError> {
        let params: Vec<Param> = self
            .settings
            .default_params
            .iter()
            .chain(&job.params)
            .cloned()
            .collect();

        // Carries the API key; never log it.
        let request =
            build_request_url(&self.settings.endpoint, &job.url, Some(credential), &params)?;

        let response = self.fetcher.fetch(request.as_str()).await?;
        debug!(
            url = %job.url,
            status = response.status,
            bytes = response.body.len(),
            "Response received"
        );

        if response.is_success() {
            result.apply(self.decoder.decode(&response.body)?);
        } else {
            result.set_api_error(ApiError::from_body(&response.body)?);
        }

        Ok(())
    }

    /// Analyze a single page.
    ///
    /// # Errors
    /// Returns [`AnalysisError`] carrying the page URL and the failure.
    pub async fn analyze(
        &self,
        url: &str,
        credential: &dyn Credential,
    ) -> Result<D::Payload, AnalysisError> {
        let (payload, _warnings) = self
            .run_one(&Job::new(url), credential)
            .await
            .into_result()?;

        Ok(payload)
    }

    /// Run `jobs` with at most `max_concurrency` in flight.
    ///
    /// Returns one result per job, in input order. Each job draws its own
    /// token from `credential`. Once `cancel` fires, jobs not yet admitted
    /// are reported as cancelled without being fetched; admitted jobs run
    /// to completion.
    ///
    /// # Errors
    /// Returns [`RunError::InvalidConcurrency`] for a cap of zero and
    /// [`RunError::GateClosed`] if the admission gate closes.
    pub async fn run(
        &self,
        jobs: Vec<Job>,
        credential: Arc<dyn Credential>,
        max_concurrency: usize,
        cancel: CancellationToken,
    ) -> Result<Vec<JobResult<D::Payload>>, RunError> {
        if max_concurrency == 0 {
            return Err(RunError::InvalidConcurrency);
        }

        let batch_id = Uuid::new_v4();
        let span = info_span!("batch", %batch_id, jobs = jobs.len(), max_concurrency);

        self.run_batch(jobs, credential, max_concurrency, cancel)
            .instrument(span)
            .await
    }

    async fn run_batch(
        &self,
        jobs: Vec<Job>,
        credential: Arc<dyn Credential>,
        max_concurrency: usize,
        cancel: CancellationToken,
    ) -> Result<Vec<JobResult<D::Payload>>, RunError> {
        let gate = Arc::new(Semaphore::new(max_concurrency));
        let mut slots = Vec::with_capacity(jobs.len());

        for (index, job) in jobs.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                permit = Arc::clone(&gate).acquire_owned() => Some(permit?),
            };

            let Some(permit) = permit else {
                debug!(index, url = %job.url, "Job cancelled before admission");
                slots.push(Slot::Cancelled(job.url));
                continue;
            };

            debug!(index, url = %job.url, "Job admitted");

            let runner = self.clone();
            let credential = Arc::clone(&credential);
            let url = job.url.clone();
            let handle = tokio::spawn(
                async move {
                    let _permit = permit;
                    let result = runner.run_one(&job, credential.as_ref()).await;
                    debug!(index, url = %job.url, outcome = ?result.outcome(), "Job finished");
                    result
                }
                .in_current_span(),
            );

            slots.push(Slot::Running { url, handle });
        }

        let results = join_all(slots.into_iter().map(|slot| async move {
            match slot {
                Slot::Cancelled(url) => JobResult::cancelled(url),
                Slot::Running { url, handle } => handle.await.unwrap_or_else(|e| {
                    warn!(url = %url, error = %e, "Job task failed");
                    JobResult::failed(url, JobError::Panicked(e.to_string()))
                }),
            }
        }))
        .await;

        let succeeded = results
            .iter()
            .filter(|r| r.outcome() != Outcome::Failed)
            .count();
        let cancelled = results.iter().filter(|r| r.is_cancelled()).count();
        info!(
            total = results.len(),
            succeeded,
            failed = results.len() - succeeded - cancelled,
            cancelled,
            "Batch finished"
        );

        Ok(results)
    }
}

/// Default request parameters for an `[analysis]` config section.
///
/// Values the client does not know are sent verbatim.
#[must_use]
pub fn analysis_params(config: &AnalysisConfig) -> Vec<Param> {
    let mut params: Vec<Param> = config
        .categories
        .iter()
        .map(|value| {
            value
                .parse::<Category>()
                .map_or_else(|_| Param::custom("category", value), Param::Category)
        })
        .collect();

    if !config.strategy.is_empty() {
        params.push(
            config
                .strategy
                .parse::<Strategy>()
                .map_or_else(|_| Param::custom("strategy", &config.strategy), Param::Strategy),
        );
    }

    if let Some(locale) = &config.locale {
        params.push(Param::Locale(locale.clone()));
    }

    params
}

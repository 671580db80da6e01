//! Orchestration: read → (describe → generate → normalize) per product →
//! render.
//!
//! Per-product tasks run through a bounded stream, so at most
//! `concurrency` of them are in flight. Each task is tagged with its input
//! index and lands in a pre-sized slot, which keeps the rendered order equal
//! to the input order whatever order the tasks finish in.

use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Local;
use futures::stream::{self, StreamExt};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::llm::CompletionService;
use crate::models::{ContentStatus, EnrichedProduct, ProductRecord};
use crate::stages::{
    ReadConfig, RenderConfig, execute_read, fetch_description, generate_content, normalize_text,
    render_document,
};

/// What to do when a product's generation fails after all retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort the run; no document is written
    #[default]
    FailFast,
    /// Keep going; failed products are listed in the `skipped` section
    SkipFailed,
}

/// Retry settings for completion calls
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts after the first one; 0 disables retrying
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each further retry
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_ms: 500,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// Everything a run needs, built once and passed by reference
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub read: ReadConfig,
    pub render: RenderConfig,
    /// Maximum number of products processed at once
    pub concurrency: usize,
    pub retry: RetryConfig,
    pub failure_policy: FailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            read: ReadConfig::default(),
            render: RenderConfig::default(),
            concurrency: 5,
            retry: RetryConfig::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(PipelineError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Orchestrator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Reading,
    Generating,
    Rendering,
    Done,
    Failed,
}

impl PipelineState {
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, Reading)
                | (Reading, Generating)
                | (Generating, Rendering)
                | (Rendering, Done)
                | (Reading | Generating | Rendering, Failed)
        )
    }
}

/// A product left out of the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedProduct {
    /// 1-based input position
    pub index: usize,
    pub name: String,
    pub reason: String,
}

/// Summary of a finished run
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub output_path: PathBuf,
    /// Products read from the input
    pub total: usize,
    /// Products rendered with generated content
    pub generated: usize,
    pub skipped: Vec<SkippedProduct>,
    pub elapsed: Duration,
}

/// Runs the whole pipeline once
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    client: &'a dyn CompletionService,
    state: PipelineState,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a PipelineConfig, client: &'a dyn CompletionService) -> Self {
        Self {
            config,
            client,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Read, generate and render.
    ///
    /// Leaves the orchestrator in `Done` on success and `Failed` otherwise.
    /// A pipeline runs once; calling this again returns
    /// [`PipelineError::IllegalTransition`] and leaves the state as it is.
    pub async fn run(&mut self) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&mut self, run_id: Uuid) -> Result<RunReport> {
        self.transition(PipelineState::Reading)?;
        self.config.validate().map_err(|e| self.fail(e))?;
        let started = Instant::now();

        let records = execute_read(&self.config.read).map_err(|e| self.fail(e))?;
        let total = records.len();

        self.transition(PipelineState::Generating)?;
        info!(
            "Generating content for {} products (concurrency {})",
            total, self.config.concurrency
        );
        let products = match self.enrich(records).await {
            Ok(products) => products,
            Err(e) => return Err(self.fail(e)),
        };
        info!("Content generation complete");

        self.transition(PipelineState::Rendering)?;
        let at = Local::now().naive_local();
        let rendered =
            render_document(&products, &self.config.render, at).map_err(|e| self.fail(e))?;

        self.transition(PipelineState::Done)?;

        let skipped: Vec<SkippedProduct> = products
            .iter()
            .enumerate()
            .filter_map(|(i, p)| match &p.status {
                ContentStatus::Failed { reason } => Some(SkippedProduct {
                    index: i + 1,
                    name: p.record.name.clone(),
                    reason: reason.clone(),
                }),
                ContentStatus::Generated => None,
            })
            .collect();

        for s in &skipped {
            warn!("Skipped product {} ({}): {}", s.index, s.name, s.reason);
        }

        Ok(RunReport {
            run_id,
            output_path: rendered.output_path,
            total,
            generated: rendered.rendered,
            skipped,
            elapsed: started.elapsed(),
        })
    }

    /// Run the per-product tasks under the concurrency ceiling.
    ///
    /// The result has one entry per record, in record order. Under
    /// `FailFast` the first error is returned and the remaining tasks are
    /// dropped.
    pub async fn enrich(&self, records: Vec<ProductRecord>) -> Result<Vec<EnrichedProduct>> {
        self.config.validate()?;

        let total = records.len();
        let client = self.client;
        let retry = &self.config.retry;
        let mut slots: Vec<Option<EnrichedProduct>> = vec![None; total];

        let mut results = std::pin::pin!(
            stream::iter(records.into_iter().enumerate())
                .map(move |(index, record)| async move {
                    let result = enrich_product(client, &record, retry).await;
                    (index, result.map_err(|e| (record, e)))
                })
                .buffer_unordered(self.config.concurrency)
        );

        let mut completed = 0;
        while let Some((index, result)) = results.next().await {
            let product = match result {
                Ok(product) => product,
                Err((record, e)) => match self.config.failure_policy {
                    FailurePolicy::FailFast => return Err(e),
                    FailurePolicy::SkipFailed => {
                        warn!("Product {} ({}) failed: {}", index + 1, record.name, e);
                        EnrichedProduct::failed(record, e.to_string())
                    }
                },
            };

            completed += 1;
            info!("[{}/{}] {} done", completed, total, product.name());
            slots[index] = Some(product);
        }

        Ok(slots.into_iter().flatten().collect())
    }

    fn transition(&mut self, next: PipelineState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(PipelineError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        debug!("Pipeline state: {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Move to `Failed` and hand back the error that caused it
    fn fail(&mut self, e: PipelineError) -> PipelineError {
        if let Err(illegal) = self.transition(PipelineState::Failed) {
            warn!("{}", illegal);
        }
        e
    }
}

/// Describe, generate and normalize one product
pub async fn enrich_product(
    client: &dyn CompletionService,
    record: &ProductRecord,
    retry: &RetryConfig,
) -> Result<EnrichedProduct> {
    let description = with_retry(retry, || fetch_description(client, record)).await?;
    let content = with_retry(retry, || generate_content(client, record, &description)).await?;

    Ok(EnrichedProduct::generated(
        record.clone(),
        normalize_text(&description),
        normalize_text(&content),
    ))
}

/// Call `op` until it succeeds, fails with a non-transient error, or the
/// retry budget runs out. Waits `backoff_for(n)` before retry `n`.
async fn with_retry<T, F, Fut>(retry: &RetryConfig, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < retry.max_retries => {
                attempt += 1;
                let backoff = retry.backoff_for(attempt);
                warn!(
                    "{}; retry {}/{} after {}ms",
                    e,
                    attempt,
                    retry.max_retries,
                    backoff.as_millis()
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockCompletionService;
    use crate::models::PromptRole;

    fn records(names: &[&str]) -> Vec<ProductRecord> {
        names
            .iter()
            .map(|n| ProductRecord::new(*n, format!("http://example.com/{}", n.to_lowercase())))
            .collect()
    }

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = PipelineConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_backoff_doubles() {
        let retry = RetryConfig {
            max_retries: 3,
            backoff_ms: 500,
        };
        assert_eq!(retry.backoff_for(1), Duration::from_millis(500));
        assert_eq!(retry.backoff_for(2), Duration::from_millis(1000));
        assert_eq!(retry.backoff_for(3), Duration::from_millis(2000));
        assert_eq!(
            RetryConfig { max_retries: 1, backoff_ms: u64::MAX }.backoff_for(70),
            Duration::from_millis(u64::MAX)
        );
    }

    #[test]
    fn test_state_transitions() {
        use PipelineState::*;
        assert!(Idle.can_transition_to(Reading));
        assert!(Reading.can_transition_to(Generating));
        assert!(Generating.can_transition_to(Rendering));
        assert!(Rendering.can_transition_to(Done));
        for from in [Reading, Generating, Rendering] {
            assert!(from.can_transition_to(Failed));
        }

        assert!(!Idle.can_transition_to(Failed));
        assert!(!Idle.can_transition_to(Generating));
        assert!(!Done.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Reading));
        assert!(!Done.can_transition_to(Reading));
    }

    #[tokio::test]
    async fn test_enrich_product_normalizes_content() {
        let mock = MockCompletionService::new("A **small** widget.", "## Widget\n**Bold** copy\n");
        let record = ProductRecord::new("Widget", "http://example.com/w");

        let product = enrich_product(&mock, &record, &RetryConfig::default())
            .await
            .unwrap();

        assert_eq!(product.record, record);
        assert_eq!(product.fetched_description, "A small widget.");
        assert_eq!(product.generated_content, "Widget\nBold copy\n");
        assert!(product.is_generated());
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_failure() {
        let mock = MockCompletionService::new("desc", "content").failing_on("Widget", 1);
        let record = ProductRecord::new("Widget", "http://example.com/w");
        let retry = RetryConfig {
            max_retries: 2,
            backoff_ms: 10,
        };

        let product = enrich_product(&mock, &record, &retry).await.unwrap();
        assert_eq!(product.generated_content, "content");
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let mock = MockCompletionService::new("desc", "content").failing_on("Product name is Widget", 1);
        let record = ProductRecord::new("Widget", "http://example.com/w");

        let err = enrich_product(&mock, &record, &RetryConfig::default())
            .await
            .unwrap_err();
        match err {
            PipelineError::GenerationFailed { product, stage, .. } => {
                assert_eq!(product, "Widget");
                assert_eq!(stage, PromptRole::Content);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enrich_keeps_input_order() {
        // The first product is the slowest, so it finishes last
        let mock = MockCompletionService::new("desc", "content")
            .with_delay(Duration::from_millis(10))
            .delayed_on("alpha", Duration::from_millis(300))
            .delayed_on("Alpha", Duration::from_millis(300));
        let config = PipelineConfig::default();
        let pipeline = Pipeline::new(&config, &mock);

        let products = pipeline
            .enrich(records(&["Alpha", "Beta", "Gamma"]))
            .await
            .unwrap();

        let names: Vec<&str> = products.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["Alpha", "Beta", "Gamma"]);

        let log = mock.completion_log();
        assert!(log.last().unwrap().contains("Alpha"), "log: {log:?}");
    }

    #[tokio::test]
    async fn test_enrich_fail_fast_returns_the_error() {
        let mock = MockCompletionService::new("desc", "content").failing_on("beta", usize::MAX);
        let config = PipelineConfig::default();
        let pipeline = Pipeline::new(&config, &mock);

        let err = pipeline
            .enrich(records(&["Alpha", "Beta", "Gamma"]))
            .await
            .unwrap_err();
        match err {
            PipelineError::GenerationFailed { product, stage, .. } => {
                assert_eq!(product, "Beta");
                assert_eq!(stage, PromptRole::Description);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_enrich_skip_failed_keeps_placeholder() {
        let mock = MockCompletionService::new("desc", "content").failing_on("beta", usize::MAX);
        let config = PipelineConfig {
            failure_policy: FailurePolicy::SkipFailed,
            ..Default::default()
        };
        let pipeline = Pipeline::new(&config, &mock);

        let products = pipeline
            .enrich(records(&["Alpha", "Beta", "Gamma"]))
            .await
            .unwrap();

        assert_eq!(products.len(), 3);
        assert!(products[0].is_generated());
        assert!(!products[1].is_generated());
        assert_eq!(products[1].name(), "Beta");
        assert!(products[2].is_generated());
    }

    #[tokio::test]
    async fn test_failed_run_ends_in_failed_state() {
        let mock = MockCompletionService::new("desc", "content");
        let config = PipelineConfig {
            read: ReadConfig {
                input_path: PathBuf::from("/no/such/products.csv"),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut pipeline = Pipeline::new(&config, &mock);
        assert_eq!(pipeline.state(), PipelineState::Idle);

        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::InputNotFound { .. }));
        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_second_run_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("products.csv");
        let template_path = dir.path().join("template.docx");
        std::fs::write(&input_path, "name,url\nWidget,http://example.com/w\n").unwrap();
        std::fs::write(&template_path, crate::template::starter_template().unwrap()).unwrap();
        let config = PipelineConfig {
            read: ReadConfig {
                input_path,
                ..Default::default()
            },
            render: RenderConfig {
                template_path,
                output_dir: dir.path().join("output"),
            },
            ..Default::default()
        };
        let mock = MockCompletionService::new("desc", "content");
        let mut pipeline = Pipeline::new(&config, &mock);

        pipeline.run().await.unwrap();
        assert_eq!(pipeline.state(), PipelineState::Done);

        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::IllegalTransition {
                from: PipelineState::Done,
                to: PipelineState::Reading
            }
        ));
        assert_eq!(pipeline.state(), PipelineState::Done);
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_rerun_after_failure_is_rejected() {
        let mock = MockCompletionService::new("desc", "content");
        let config = PipelineConfig {
            read: ReadConfig {
                input_path: PathBuf::from("/no/such/products.csv"),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut pipeline = Pipeline::new(&config, &mock);

        assert!(pipeline.run().await.is_err());
        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::IllegalTransition { .. }));
        assert_eq!(pipeline.state(), PipelineState::Failed);
    }
}

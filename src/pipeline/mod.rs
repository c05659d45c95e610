//! Pipeline orchestration
//!
//! One run goes probe → crawl → classify → extract → merge. The crawl
//! finishes before classification starts and every extraction job finishes
//! (or is abandoned) before the merge. A single cancellation token covers
//! the run; the overall timeout fires it.

mod job;
mod report;

pub use job::{JobError, JobId, JobManager};
pub use report::{ExtractionFailure, MergeConflict, RunReport, SpecSource};

use crate::classifier::{select_api_pages, ClassifiedPage, HeuristicClassifier, PageClassifier};
use crate::config::{validate, Config};
use crate::crawler::{build_http_client, CrawlOptions, CrawlOutcome, RetryPolicy, SiteCrawler};
use crate::extractor::{ExtractionError, HeuristicExtractor, PageExtractor};
use crate::merger::SpecMerger;
use crate::openapi::{ApiFragment, ApiInfo, OpenApiDocument};
use crate::probe::{FoundSpec, ProbeOutcome, SpecProbe};
use crate::store::{ProviderRecord, ProviderStore};
use crate::url::{normalize_url, CrawlScope};
use crate::{Result, WeaverError};
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Phase of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum JobStatus {
    Probing,
    Crawling,
    Extracting,
    Merging,
    Done,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The document a run produced
#[derive(Debug, Clone, PartialEq)]
pub enum SpecDocument {
    Probed(FoundSpec),
    Synthesized(OpenApiDocument),
}

impl SpecDocument {
    /// JSON form: the probed document as served, or the rendered synthesized one
    pub fn to_json(&self) -> Value {
        match self {
            SpecDocument::Probed(found) => found.document.clone(),
            SpecDocument::Synthesized(document) => document.to_json(),
        }
    }

    pub fn source(&self) -> SpecSource {
        match self {
            SpecDocument::Probed(_) => SpecSource::Probed,
            SpecDocument::Synthesized(_) => SpecSource::Synthesized,
        }
    }

    pub fn synthesized(&self) -> Option<&OpenApiDocument> {
        match self {
            SpecDocument::Synthesized(document) => Some(document),
            SpecDocument::Probed(_) => None,
        }
    }
}

/// Output of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    pub spec: SpecDocument,
    pub report: RunReport,
}

/// Runs the discovery pipeline for one root URL at a time
pub struct Pipeline {
    config: Config,
    client: Client,
    classifier: Arc<dyn PageClassifier>,
    extractor: Arc<dyn PageExtractor>,
    store: Option<Arc<dyn ProviderStore>>,
}

impl Pipeline {
    /// Validates the configuration and builds the HTTP client
    pub fn new(config: Config) -> Result<Self> {
        validate(&config)?;
        let client = build_http_client(&config.user_agent)?;
        let classifier = Arc::new(HeuristicClassifier::new(
            config.extractor.classifier_confidence_floor,
        ));

        Ok(Self {
            config,
            client,
            classifier,
            extractor: Arc::new(HeuristicExtractor::new()),
            store: None,
        })
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn PageClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn PageExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Saves every finished run's spec and report
    pub fn with_store(mut self, store: Arc<dyn ProviderStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs the pipeline to completion
    pub async fn run(&self, root_url: &str) -> Result<PipelineResult> {
        let (status, _) = watch::channel(JobStatus::Probing);
        self.run_with(root_url, CancellationToken::new(), &status)
            .await
    }

    /// Runs the pipeline, publishing each phase on `status`
    ///
    /// Cancelling `cancel` ends the run early with whatever was collected;
    /// the result is then marked partial. Terminal states are left to the
    /// caller.
    pub async fn run_with(
        &self,
        root_url: &str,
        cancel: CancellationToken,
        status: &watch::Sender<JobStatus>,
    ) -> Result<PipelineResult> {
        let root = resolve_root(root_url, &self.config)?;

        let run_token = cancel.child_token();
        let overall = self.config.pipeline.overall_timeout();
        let timer = {
            let token = run_token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(overall).await;
                warn!("Overall timeout of {:?} reached, cancelling run", overall);
                token.cancel();
            })
        };

        let mut report = RunReport::new(root.as_str());
        let result = self.execute(&root, &run_token, status, &mut report).await;
        timer.abort();

        let spec = result?;
        report.finished_at = Utc::now();
        let mut result = PipelineResult { spec, report };
        self.hand_off(&root, &mut result).await;

        info!(
            "Run for {} finished: {} source, {} page(s) visited{}",
            root,
            result.report.spec_source,
            result.report.pages_visited,
            if result.report.partial { ", partial" } else { "" }
        );
        Ok(result)
    }

    async fn execute(
        &self,
        root: &Url,
        cancel: &CancellationToken,
        status: &watch::Sender<JobStatus>,
        report: &mut RunReport,
    ) -> Result<SpecDocument> {
        status.send_replace(JobStatus::Probing);
        let probe = SpecProbe::new(self.client.clone(), self.config.crawler.per_page_timeout())
            .with_retry(RetryPolicy::from_config(&self.config.crawler));

        let root_page = tokio::select! {
            checked = probe.check_root(root) => checked?,
            _ = cancel.cancelled() => {
                mark_partial(report);
                return Ok(self.empty_document(root));
            }
        };

        if self.config.pipeline.probe {
            let outcome = tokio::select! {
                outcome = probe.probe_candidates(root, root_page.as_ref()) => outcome,
                _ = cancel.cancelled() => {
                    mark_partial(report);
                    return Ok(self.empty_document(root));
                }
            };
            match outcome {
                ProbeOutcome::Found(found) => {
                    report.spec_source = SpecSource::Probed;
                    report.probed_from = Some(found.url.clone());
                    return Ok(SpecDocument::Probed(found));
                }
                ProbeOutcome::NotFound { tried } => {
                    debug!("Probe missed {} candidate(s), crawling", tried.len());
                }
            }
        }

        status.send_replace(JobStatus::Crawling);
        let scope = crawl_scope(root, &self.config);
        let crawler = SiteCrawler::new(
            self.client.clone(),
            CrawlOptions::from_config(&self.config, scope),
        );
        let crawl = crawler.crawl(root.clone(), cancel.clone()).await;
        record_crawl(report, &crawl);

        status.send_replace(JobStatus::Extracting);
        let classified = self.classify(&crawl).await;
        report.pages_classified_as_api_doc = classified.len();

        let title = crawl
            .pages
            .iter()
            .find(|p| p.depth == 0)
            .and_then(|p| p.title.clone());

        let extraction = self.extract_all(classified, cancel).await;
        report.extraction_failures = extraction.failures;
        report.abandoned_extractions = extraction.abandoned;

        if cancel.is_cancelled() {
            mark_partial(report);
        }

        if report.pages_visited == 0 {
            report.note("No page could be fetched from the root URL; the document has no paths");
        } else if report.pages_classified_as_api_doc == 0 {
            report.note(format!(
                "None of the {} crawled page(s) reached the API documentation confidence floor of {}; the document has no paths",
                report.pages_visited, self.config.extractor.classifier_confidence_floor
            ));
        } else if extraction.fragments.is_empty() {
            report.note("Every classified page failed extraction; the document has no paths");
        }

        status.send_replace(JobStatus::Merging);
        let merger = SpecMerger::new(ApiInfo::for_site(root.as_str(), title.as_deref()));
        let merged = merger.merge(extraction.fragments);
        report.merge_conflicts = merged.conflicts.iter().map(Into::into).collect();
        report.repairs = merged.repairs;

        Ok(SpecDocument::Synthesized(merged.document))
    }

    async fn classify(&self, crawl: &CrawlOutcome) -> Vec<ClassifiedPage> {
        let classifier = Arc::clone(&self.classifier);
        let pages = crawl.pages.clone();
        match tokio::task::spawn_blocking(move || select_api_pages(classifier.as_ref(), &pages))
            .await
        {
            Ok(classified) => {
                info!(
                    "{} of {} page(s) classified as API documentation",
                    classified.len(),
                    crawl.pages.len()
                );
                classified
            }
            Err(e) => {
                warn!("Classification task failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Extracts every classified page with at most `extract-concurrency` jobs
    ///
    /// After cancellation, running and queued jobs get one more extraction
    /// timeout to finish; whatever is still pending then is abandoned.
    async fn extract_all(
        &self,
        classified: Vec<ClassifiedPage>,
        cancel: &CancellationToken,
    ) -> Extraction {
        let limit = self.config.extractor.extract_concurrency.max(1) as usize;
        let timeout = self.config.extractor.per_page_timeout();

        let mut queue: VecDeque<ClassifiedPage> = classified.into();
        let mut running: BTreeSet<String> = BTreeSet::new();
        let mut jobs: JoinSet<(String, std::result::Result<ApiFragment, ExtractionError>)> =
            JoinSet::new();
        let mut extraction = Extraction::default();
        let mut deadline: Option<Instant> = None;

        loop {
            if deadline.is_none() && cancel.is_cancelled() {
                debug!("Run cancelled, finishing extraction within {:?}", timeout);
                deadline = Some(Instant::now() + timeout);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }

            while jobs.len() < limit {
                let Some(page) = queue.pop_front() else {
                    break;
                };
                running.insert(page.page.url.clone());
                jobs.spawn(extract_job(Arc::clone(&self.extractor), page, timeout));
            }

            if jobs.is_empty() {
                break;
            }

            let joined = match deadline {
                Some(d) => match tokio::time::timeout_at(d, jobs.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => break,
                },
                None => tokio::select! {
                    joined = jobs.join_next() => joined,
                    _ = cancel.cancelled() => continue,
                },
            };

            match joined {
                Some(Ok((url, Ok(fragment)))) => {
                    running.remove(&url);
                    extraction.fragments.push(fragment);
                }
                Some(Ok((url, Err(e)))) => {
                    running.remove(&url);
                    warn!("Extraction failed: {}", e);
                    extraction.failures.push(ExtractionFailure {
                        url,
                        reason: e.to_string(),
                    });
                }
                Some(Err(e)) => warn!("Extraction job failed: {}", e),
                None => break,
            }
        }

        jobs.abort_all();
        extraction.abandoned = running
            .into_iter()
            .chain(queue.into_iter().map(|p| p.page.url.clone()))
            .collect();
        extraction.abandoned.sort();
        extraction.failures.sort_by(|a, b| a.url.cmp(&b.url));

        if !extraction.abandoned.is_empty() {
            warn!(
                "Abandoned extraction of {} page(s)",
                extraction.abandoned.len()
            );
        }
        info!(
            "Extracted {} fragment(s), {} failure(s)",
            extraction.fragments.len(),
            extraction.failures.len()
        );
        extraction
    }

    fn empty_document(&self, root: &Url) -> SpecDocument {
        SpecDocument::Synthesized(OpenApiDocument::new(ApiInfo::for_site(root.as_str(), None)))
    }

    /// Writes the finished run to the provider store, if one is configured
    /// Saves the result to the provider store on a blocking thread
    async fn hand_off(&self, root: &Url, result: &mut PipelineResult) {
        let Some(store) = &self.store else {
            return;
        };

        let record = ProviderRecord {
            provider_id: root.host_str().unwrap_or_default().to_string(),
            doc_url: root.to_string(),
            spec_json: result.spec.to_json(),
            report: result.report.clone(),
        };
        let provider_id = record.provider_id.clone();

        let store = Arc::clone(store);
        let saved = tokio::task::spawn_blocking(move || store.save(&record))
            .await
            .map_err(|e| e.to_string())
            .and_then(|saved| saved.map_err(|e| e.to_string()));

        match saved {
            Ok(()) => info!("Saved provider {}", provider_id),
            Err(e) => {
                warn!("Failed to save provider {}: {}", provider_id, e);
                result
                    .report
                    .note(format!("Saving to the provider store failed: {}", e));
            }
        }
    }
}

#[derive(Debug, Default)]
struct Extraction {
    fragments: Vec<ApiFragment>,
    failures: Vec<ExtractionFailure>,
    abandoned: Vec<String>,
}

fn crawl_scope(root: &Url, config: &Config) -> CrawlScope {
    CrawlScope::from_mode(
        root,
        config.crawler.scope,
        config.crawler.path_prefix.as_deref(),
    )
}

/// Normalizes the root URL and checks it lies inside the configured scope
pub(crate) fn resolve_root(root_url: &str, config: &Config) -> Result<Url> {
    let root = normalize_url(root_url).map_err(|e| WeaverError::InvalidRootUrl {
        url: root_url.to_string(),
        reason: e.to_string(),
    })?;

    let scope = crawl_scope(&root, config);
    if !scope.contains(&root) {
        return Err(WeaverError::InvalidRootUrl {
            url: root_url.to_string(),
            reason: format!(
                "outside the configured path prefix {}",
                scope.prefix().unwrap_or("/")
            ),
        });
    }
    Ok(root)
}

async fn extract_job(
    extractor: Arc<dyn PageExtractor>,
    page: ClassifiedPage,
    timeout: Duration,
) -> (String, std::result::Result<ApiFragment, ExtractionError>) {
    let url = page.page.url.clone();
    let handle = tokio::task::spawn_blocking(move || extractor.extract(&page));

    let result = match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(ExtractionError::Aborted {
            url: url.clone(),
            message: e.to_string(),
        }),
        Err(_) => Err(ExtractionError::Timeout { url: url.clone() }),
    };
    (url, result)
}

fn record_crawl(report: &mut RunReport, crawl: &CrawlOutcome) {
    report.pages_visited = crawl.pages.len();
    report.crawl_failures = crawl.stats.failures.clone();
    report.crawl_failures.sort_by(|a, b| a.url.cmp(&b.url));
    report.out_of_scope_links = crawl.stats.out_of_scope.len();
    report.skipped_pages = crawl.stats.skipped();
    if crawl.stats.cancelled {
        mark_partial(report);
    }
}

fn mark_partial(report: &mut RunReport) {
    if !report.partial {
        report.partial = true;
        report.note("Run was cancelled or hit the overall timeout; results are partial");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::PageRecord;

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.crawler.crawl_concurrency = 0;
        assert!(matches!(Pipeline::new(config), Err(WeaverError::Config(_))));
    }

    #[tokio::test]
    async fn test_malformed_root_is_fatal() {
        let pipeline = Pipeline::new(Config::default()).unwrap();
        let err = pipeline.run("not a url").await.unwrap_err();
        assert!(matches!(err, WeaverError::InvalidRootUrl { .. }));

        let err = pipeline.run("ftp://docs.example.com").await.unwrap_err();
        assert!(matches!(err, WeaverError::InvalidRootUrl { .. }));
    }

    #[tokio::test]
    async fn test_extraction_collects_failures() {
        let pipeline = Pipeline::new(Config::default()).unwrap();
        let page = |url: &str, html: &str| ClassifiedPage {
            page: Arc::new(PageRecord::new(url, html, "text/html", 1, None)),
            is_api_doc: true,
            confidence: 0.9,
            signals: Vec::new(),
        };

        let extraction = pipeline
            .extract_all(
                vec![
                    page("https://d.test/b", "<p>nothing here</p>"),
                    page("https://d.test/a", "<pre>GET /users</pre>"),
                ],
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(extraction.fragments.len(), 1);
        assert_eq!(extraction.failures.len(), 1);
        assert_eq!(extraction.failures[0].url, "https://d.test/b");
        assert!(extraction.abandoned.is_empty());
    }

    #[tokio::test]
    async fn test_extraction_after_cancel_still_runs_within_grace() {
        let pipeline = Pipeline::new(Config::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let classified = vec![ClassifiedPage {
            page: Arc::new(PageRecord::new(
                "https://d.test/a",
                "<pre>GET /users</pre>",
                "text/html",
                1,
                None,
            )),
            is_api_doc: true,
            confidence: 0.9,
            signals: Vec::new(),
        }];

        let extraction = pipeline.extract_all(classified, &cancel).await;
        assert_eq!(extraction.fragments.len(), 1);
    }

    /// Remembers which thread each save ran on
    #[derive(Default)]
    struct ThreadRecordingStore {
        threads: std::sync::Mutex<Vec<std::thread::ThreadId>>,
        fail: bool,
    }

    impl ProviderStore for ThreadRecordingStore {
        fn save(&self, _record: &ProviderRecord) -> crate::store::StoreResult<()> {
            self.threads
                .lock()
                .unwrap()
                .push(std::thread::current().id());
            if self.fail {
                Err(crate::store::StoreError::Sqlite(
                    rusqlite::Error::QueryReturnedNoRows,
                ))
            } else {
                Ok(())
            }
        }
    }

    fn finished_result() -> PipelineResult {
        let root = "https://docs.example.com/";
        PipelineResult {
            spec: SpecDocument::Synthesized(OpenApiDocument::new(ApiInfo::for_site(root, None))),
            report: RunReport::new(root),
        }
    }

    #[tokio::test]
    async fn test_store_save_runs_off_the_runtime_thread() {
        let store = Arc::new(ThreadRecordingStore::default());
        let pipeline = Pipeline::new(Config::default())
            .unwrap()
            .with_store(store.clone());
        let root = Url::parse("https://docs.example.com/").unwrap();

        let mut result = finished_result();
        pipeline.hand_off(&root, &mut result).await;

        let threads = store.threads.lock().unwrap().clone();
        assert_eq!(threads.len(), 1);
        assert_ne!(threads[0], std::thread::current().id());
        assert!(result.report.notes.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_becomes_note() {
        let store = Arc::new(ThreadRecordingStore {
            fail: true,
            ..Default::default()
        });
        let pipeline = Pipeline::new(Config::default()).unwrap().with_store(store);
        let root = Url::parse("https://docs.example.com/").unwrap();

        let mut result = finished_result();
        pipeline.hand_off(&root, &mut result).await;

        assert_eq!(result.report.notes.len(), 1);
        assert!(result.report.notes[0].contains("provider store failed"));
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Merging.is_terminal());
        assert_eq!(JobStatus::Crawling.to_string(), "Crawling");
    }
}

//! Crawler coordinator - bounded breadth-first crawl
//!
//! This module runs the crawl loop:
//! - Fetching robots.txt for the root's origin
//! - Spawning a fixed pool of fetch workers over a shared frontier
//! - Coordinating fetching, parsing, scope checks and link enqueueing
//! - Honoring cancellation
//! - Streaming fetched pages to the consumer

use crate::config::Config;
use crate::crawler::fetcher::{fetch_with_retry, FetchResult, RetryPolicy};
use crate::crawler::frontier::{CrawlTask, Enqueued, Frontier, NextTask, TaskStatus};
use crate::crawler::page::{CrawlFailure, PageRecord};
use crate::crawler::parser::parse_html;
use crate::robots::{fetch_robots, ParsedRobots};
use crate::url::{normalize_url, CrawlScope};
use reqwest::Client;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Fixed crawl parameters for one run
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub scope: CrawlScope,
    pub max_depth: u32,
    pub max_pages: u32,
    pub concurrency: usize,
    pub page_timeout: Duration,
    pub retry: RetryPolicy,
    pub respect_robots: bool,
    /// Product token matched against robots.txt groups
    pub robots_agent: String,
}

impl CrawlOptions {
    pub fn from_config(config: &Config, scope: CrawlScope) -> Self {
        Self {
            scope,
            max_depth: config.crawler.max_depth,
            max_pages: config.crawler.max_pages,
            concurrency: config.crawler.crawl_concurrency.max(1) as usize,
            page_timeout: config.crawler.per_page_timeout(),
            retry: RetryPolicy::from_config(&config.crawler),
            respect_robots: config.crawler.respect_robots,
            robots_agent: config.user_agent.crawler_name.clone(),
        }
    }
}

/// Counters and failures gathered during a crawl
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlStats {
    pub pages_fetched: usize,
    pub failures: Vec<CrawlFailure>,
    /// Normalized links that were seen but lie outside the crawl scope
    pub out_of_scope: BTreeSet<String>,
    pub content_mismatches: usize,
    pub robots_disallowed: usize,
    /// The crawl stopped because its cancellation token fired
    pub cancelled: bool,
}

impl CrawlStats {
    /// Pages deliberately not fetched or not kept
    pub fn skipped(&self) -> usize {
        self.content_mismatches + self.robots_disallowed
    }
}

/// Result of a collected crawl
#[derive(Debug)]
pub struct CrawlOutcome {
    /// Fetched pages, ordered by URL
    pub pages: Vec<Arc<PageRecord>>,
    pub stats: CrawlStats,
}

/// A running crawl
///
/// Pages arrive in fetch order and the stream ends when the crawl is over;
/// it cannot be restarted.
pub struct CrawlHandle {
    pages: mpsc::Receiver<PageRecord>,
    driver: JoinHandle<CrawlStats>,
}

impl CrawlHandle {
    /// Waits for the next fetched page; `None` once the crawl is over
    pub async fn next_page(&mut self) -> Option<PageRecord> {
        self.pages.recv().await
    }

    /// Stops consuming pages and waits for the crawl's statistics
    pub async fn finish(self) -> CrawlStats {
        drop(self.pages);
        match self.driver.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Crawl driver task failed: {}", e);
                CrawlStats {
                    cancelled: true,
                    ..Default::default()
                }
            }
        }
    }
}

/// Breadth-first site crawler
pub struct SiteCrawler {
    client: Client,
    options: Arc<CrawlOptions>,
}

impl SiteCrawler {
    pub fn new(client: Client, options: CrawlOptions) -> Self {
        Self {
            client,
            options: Arc::new(options),
        }
    }

    /// Starts a crawl from `root` and returns its page stream
    ///
    /// # Arguments
    ///
    /// * `root` - Normalized root URL, fetched at depth 0
    /// * `cancel` - Stops workers from taking new tasks and abandons in-flight fetches
    pub fn spawn(&self, root: Url, cancel: CancellationToken) -> CrawlHandle {
        let (tx, rx) = mpsc::channel(self.options.concurrency * 2);
        let client = self.client.clone();
        let options = self.options.clone();

        let driver = tokio::spawn(async move {
            if !options.scope.contains(&root) {
                warn!("Root {} lies outside the crawl scope, nothing to crawl", root);
                let mut stats = CrawlStats::default();
                stats.out_of_scope.insert(root.to_string());
                return stats;
            }

            let robots = if options.respect_robots {
                fetch_robots(&client, &root, options.page_timeout).await
            } else {
                ParsedRobots::allow_all()
            };

            info!(
                "Crawling {} (max depth {}, max pages {}, {} workers)",
                root, options.max_depth, options.max_pages, options.concurrency
            );

            let shared = Arc::new(CrawlShared {
                state: Mutex::new(CrawlState {
                    frontier: Frontier::new(root, options.max_depth, options.max_pages),
                    stats: CrawlStats::default(),
                }),
                notify: Notify::new(),
                client,
                options: options.clone(),
                robots,
                cancel,
            });

            let mut workers = JoinSet::new();
            for _ in 0..options.concurrency {
                workers.spawn(worker_loop(shared.clone(), tx.clone()));
            }
            drop(tx);

            while let Some(result) = workers.join_next().await {
                if let Err(e) = result {
                    warn!("Crawl worker failed: {}", e);
                }
            }

            let mut state = shared.state.lock().await;
            let mut stats = std::mem::take(&mut state.stats);
            stats.cancelled = shared.cancel.is_cancelled();

            info!(
                "Crawl finished: {} pages fetched, {} failed, {} skipped, {} out-of-scope links{}",
                stats.pages_fetched,
                stats.failures.len(),
                stats.skipped(),
                stats.out_of_scope.len(),
                if stats.cancelled { " (cancelled)" } else { "" }
            );
            stats
        });

        CrawlHandle { pages: rx, driver }
    }

    /// Runs a crawl to completion and collects every page
    pub async fn crawl(&self, root: Url, cancel: CancellationToken) -> CrawlOutcome {
        let mut handle = self.spawn(root, cancel);

        let mut pages = Vec::new();
        while let Some(page) = handle.next_page().await {
            pages.push(Arc::new(page));
        }
        let stats = handle.finish().await;

        pages.sort_by(|a, b| a.url.cmp(&b.url));
        CrawlOutcome { pages, stats }
    }
}

struct CrawlState {
    frontier: Frontier,
    stats: CrawlStats,
}

struct CrawlShared {
    state: Mutex<CrawlState>,
    /// Signalled whenever the frontier may have changed
    notify: Notify,
    client: Client,
    options: Arc<CrawlOptions>,
    robots: ParsedRobots,
    cancel: CancellationToken,
}

async fn worker_loop(shared: Arc<CrawlShared>, tx: mpsc::Sender<PageRecord>) {
    loop {
        // Registered before the frontier is inspected so no wakeup is missed
        let notified = shared.notify.notified();

        if shared.cancel.is_cancelled() {
            shared.state.lock().await.frontier.close();
            break;
        }

        let next = shared.state.lock().await.frontier.next_task();
        match next {
            NextTask::Fetch(task) => {
                shared.process(task, &tx).await;
                shared.state.lock().await.frontier.complete();
                shared.notify.notify_waiters();
            }
            NextTask::Wait => {
                tokio::select! {
                    _ = notified => {}
                    _ = shared.cancel.cancelled() => {}
                }
            }
            NextTask::Done => break,
        }
    }

    shared.notify.notify_waiters();
}

impl CrawlShared {
    async fn process(&self, mut task: CrawlTask, tx: &mpsc::Sender<PageRecord>) {
        let url = task.url.as_str().to_string();

        if self.options.respect_robots && !self.robots.is_allowed(&url, &self.options.robots_agent)
        {
            debug!("Skipping {} (disallowed by robots.txt)", url);
            self.state.lock().await.stats.robots_disallowed += 1;
            return;
        }

        let (result, attempts) = tokio::select! {
            fetched = fetch_with_retry(&self.client, &url, self.options.page_timeout, &self.options.retry) => fetched,
            _ = self.cancel.cancelled() => {
                debug!("Abandoning {} (crawl cancelled)", url);
                return;
            }
        };

        match result {
            FetchResult::Success {
                final_url,
                content_type,
                body,
                ..
            } => {
                task.status = TaskStatus::Fetched;
                let page_url = normalize_url(&final_url).unwrap_or_else(|_| task.url.clone());
                if let Some(record) = self.accept_page(&task, page_url, content_type, body).await {
                    self.notify.notify_waiters();
                    if tx.send(record).await.is_err() {
                        debug!("Page receiver dropped, stopping crawl");
                        self.state.lock().await.frontier.close();
                    }
                }
            }
            FetchResult::ContentMismatch { content_type } => {
                debug!("Skipping {} (content type '{}')", url, content_type);
                self.state.lock().await.stats.content_mismatches += 1;
            }
            failure => {
                task.status = TaskStatus::Failed;
                let reason = failure
                    .failure_reason()
                    .unwrap_or_else(|| "unknown failure".to_string());
                warn!(
                    "Failed to fetch {} after {} attempt(s): {}",
                    url, attempts, reason
                );
                self.state.lock().await.stats.failures.push(CrawlFailure {
                    url,
                    reason,
                    attempts,
                });
            }
        }

        debug!("Task {} finished as {:?}", task.url, task.status);
    }

    /// Records a fetched page and enqueues its in-scope links
    async fn accept_page(
        &self,
        task: &CrawlTask,
        page_url: Url,
        content_type: String,
        body: String,
    ) -> Option<PageRecord> {
        let parsed = parse_html(&body, &page_url);
        let mut state = self.state.lock().await;

        if page_url != task.url {
            if !self.options.scope.contains(&page_url) {
                debug!("{} redirected out of scope to {}", task.url, page_url);
                state.stats.out_of_scope.insert(page_url.to_string());
                return None;
            }
            if !state.frontier.mark_seen(&page_url) {
                debug!("{} redirected to already-seen {}", task.url, page_url);
                return None;
            }
        }

        let mut queued = 0;
        for link in parsed.links {
            let Ok(link) = normalize_url(link.as_str()) else {
                continue;
            };
            if !self.options.scope.contains(&link) {
                state.stats.out_of_scope.insert(link.to_string());
                continue;
            }
            if state.frontier.enqueue(link, task.depth + 1, page_url.as_str()) == Enqueued::Queued {
                queued += 1;
            }
        }

        state.stats.pages_fetched += 1;
        let fetched = state.stats.pages_fetched;
        if fetched % 10 == 0 {
            info!(
                "Progress: {} pages fetched, {} queued, {} in flight",
                fetched,
                state.frontier.queued(),
                state.frontier.in_flight()
            );
        }
        drop(state);

        debug!(
            "Fetched {} (depth {}, {} new links)",
            page_url, task.depth, queued
        );

        Some(PageRecord::new(
            page_url.as_str(),
            body,
            content_type,
            task.depth,
            parsed.title,
        ))
    }
}

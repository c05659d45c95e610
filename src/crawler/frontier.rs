//! Crawl frontier
//!
//! The frontier owns every [`CrawlTask`]: the FIFO queue that makes the
//! traversal breadth-first, the visited set keyed by normalized URL, the
//! count of in-flight fetches and the page budget. Workers share one
//! frontier behind a single `tokio::sync::Mutex`.

use std::collections::{HashSet, VecDeque};
use url::Url;

/// Processing state of a crawl task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Fetched,
    Failed,
}

/// A URL waiting to be fetched, or being fetched
#[derive(Debug, Clone)]
pub struct CrawlTask {
    /// Normalized URL
    pub url: Url,
    /// Link distance from the root (root is 0)
    pub depth: u32,
    /// Page the link was discovered on
    pub parent_url: Option<String>,
    pub status: TaskStatus,
}

/// Outcome of offering a discovered link to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Queued,
    AlreadySeen,
    TooDeep,
}

/// What a worker should do next
#[derive(Debug)]
pub enum NextTask {
    /// Fetch this task
    Fetch(CrawlTask),
    /// Nothing queued, but in-flight fetches may still discover links
    Wait,
    /// The crawl is over for this worker
    Done,
}

#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<CrawlTask>,
    visited: HashSet<String>,
    in_flight: usize,
    dispatched: u32,
    max_depth: u32,
    max_pages: u32,
    closed: bool,
}

impl Frontier {
    /// Creates a frontier seeded with the root URL at depth 0
    pub fn new(root: Url, max_depth: u32, max_pages: u32) -> Self {
        let mut frontier = Self {
            queue: VecDeque::new(),
            visited: HashSet::new(),
            in_flight: 0,
            dispatched: 0,
            max_depth,
            max_pages,
            closed: false,
        };
        frontier.visited.insert(root.as_str().to_string());
        frontier.queue.push_back(CrawlTask {
            url: root,
            depth: 0,
            parent_url: None,
            status: TaskStatus::Pending,
        });
        frontier
    }

    /// Offers a discovered, already-normalized link
    ///
    /// A URL is queued at most once for the lifetime of the frontier. Links
    /// beyond the depth limit are refused without being marked visited.
    pub fn enqueue(&mut self, url: Url, depth: u32, parent_url: &str) -> Enqueued {
        if depth > self.max_depth {
            return Enqueued::TooDeep;
        }
        if !self.visited.insert(url.as_str().to_string()) {
            return Enqueued::AlreadySeen;
        }

        self.queue.push_back(CrawlTask {
            url,
            depth,
            parent_url: Some(parent_url.to_string()),
            status: TaskStatus::Pending,
        });
        Enqueued::Queued
    }

    /// Marks a URL reached by redirect as visited
    ///
    /// Returns false if it was already seen.
    pub fn mark_seen(&mut self, url: &Url) -> bool {
        self.visited.insert(url.as_str().to_string())
    }

    /// Hands out the next task, if the budget allows
    pub fn next_task(&mut self) -> NextTask {
        if self.closed || self.budget_exhausted() {
            return NextTask::Done;
        }

        match self.queue.pop_front() {
            Some(task) => {
                self.in_flight += 1;
                self.dispatched += 1;
                NextTask::Fetch(task)
            }
            None if self.in_flight > 0 => NextTask::Wait,
            None => NextTask::Done,
        }
    }

    /// Marks one dispatched task as finished
    pub fn complete(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Stops handing out tasks; queued tasks are dropped
    pub fn close(&mut self) {
        self.closed = true;
        self.queue.clear();
    }

    pub fn budget_exhausted(&self) -> bool {
        self.dispatched >= self.max_pages
    }

    pub fn is_seen(&self, url: &Url) -> bool {
        self.visited.contains(url.as_str())
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn dispatched(&self) -> u32 {
        self.dispatched
    }
}

use crate::fetch::PageSource;
use crate::frontier::{Frontier, FrontierEntry};
use crate::ingest::{index_page, IndexedPage};
use crate::parse::{normalize, parse};
use search_core::{IdCache, StorageError};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use url::Url;

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub max_depth: usize,
    /// Stop claiming new URLs after this many.
    pub max_pages: Option<usize>,
    pub concurrency: usize,
    pub max_body_bytes: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self { max_depth: 1, max_pages: None, concurrency: 16, max_body_bytes: 2 * 1024 * 1024 }
    }
}

/// Cooperative stop signal, checked before every frontier pop. Pages already
/// in flight finish writing before the crawl returns.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) { self.0.store(true, Ordering::SeqCst); }

    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::SeqCst) }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    /// URLs claimed from the frontier plus redirect targets reached through
    /// them, whether or not the page could be indexed.
    pub visited: usize,
    pub indexed: usize,
    pub failed: usize,
    /// Fetches that redirected to a page this crawl had already visited.
    pub redirect_duplicates: usize,
    /// Distinct link targets left unfetched because they were too deep.
    pub skipped_depth: usize,
    pub enqueued: usize,
    pub links_recorded: usize,
    pub cancelled: bool,
}

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("crawl worker failed: {0}")]
    Join(String),
}

enum PageOutcome {
    Indexed(IndexedPage),
    Failed,
    Duplicate,
}

pub struct Crawler {
    ids: Arc<IdCache>,
    source: Arc<dyn PageSource>,
    config: CrawlConfig,
    cancel: CancelHandle,
}

impl Crawler {
    pub fn new(ids: Arc<IdCache>, source: Arc<dyn PageSource>, config: CrawlConfig) -> Self {
        Self { ids, source, config, cancel: CancelHandle::default() }
    }

    pub fn cancel_handle(&self) -> CancelHandle { self.cancel.clone() }

    /// Breadth-first crawl from `seeds` (depth 0) down to `max_depth`.
    ///
    /// Fetch and parse failures are logged and counted; a storage failure
    /// stops the crawl and is returned. Rows written before the stop stay
    /// consistent since every row is written atomically.
    pub async fn crawl(&self, seeds: Vec<Url>) -> Result<CrawlReport, CrawlError> {
        let frontier = Arc::new(Frontier::new(self.config.max_depth));
        for seed in &seeds {
            frontier.push(normalize(seed), 0);
        }
        tracing::info!(
            seeds = seeds.len(),
            max_depth = self.config.max_depth,
            concurrency = self.config.concurrency,
            "crawl started"
        );

        let concurrency = self.config.concurrency.max(1);
        let mut report = CrawlReport::default();
        let mut workers: JoinSet<Result<PageOutcome, StorageError>> = JoinSet::new();
        let mut claimed = 0usize;

        loop {
            while workers.len() < concurrency && self.may_claim(claimed) {
                let Some(entry) = frontier.pop() else { break };
                claimed += 1;
                workers.spawn(visit(
                    self.ids.clone(),
                    self.source.clone(),
                    frontier.clone(),
                    entry,
                    self.config.max_body_bytes,
                ));
            }
            if self.cancel.is_cancelled() && !report.cancelled {
                report.cancelled = true;
                tracing::info!(in_flight = workers.len(), "crawl cancelled, draining workers");
            }

            let Some(joined) = workers.join_next().await else { break };
            match joined {
                Ok(Ok(PageOutcome::Indexed(page))) => {
                    report.indexed += 1;
                    report.links_recorded += page.new_links;
                }
                Ok(Ok(PageOutcome::Failed)) => report.failed += 1,
                Ok(Ok(PageOutcome::Duplicate)) => report.redirect_duplicates += 1,
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "storage failure, aborting crawl");
                    return Err(e.into());
                }
                Err(e) => return Err(CrawlError::Join(e.to_string())),
            }

            let done = report.indexed + report.failed + report.redirect_duplicates;
            if done % 100 == 0 {
                tracing::info!(
                    indexed = report.indexed,
                    failed = report.failed,
                    visited = frontier.visited_count(),
                    frontier = frontier.len(),
                    "progress"
                );
            }
        }

        report.visited = frontier.visited_count();
        report.skipped_depth = frontier.skipped_depth();
        report.enqueued = frontier.enqueued_count();
        self.ids.store().flush()?;
        tracing::info!(
            visited = report.visited,
            indexed = report.indexed,
            failed = report.failed,
            links = report.links_recorded,
            "crawl finished"
        );
        Ok(report)
    }

    fn may_claim(&self, claimed: usize) -> bool {
        !self.cancel.is_cancelled() && self.config.max_pages.map_or(true, |max| claimed < max)
    }
}

async fn visit(
    ids: Arc<IdCache>,
    source: Arc<dyn PageSource>,
    frontier: Arc<Frontier>,
    entry: FrontierEntry,
    max_body_bytes: usize,
) -> Result<PageOutcome, StorageError> {
    let page = match source.fetch(&entry.url).await {
        Ok(page) => page,
        Err(e) => {
            tracing::warn!(url = %entry.url, error = %e, "fetch failed");
            return Ok(PageOutcome::Failed);
        }
    };
    // A redirect target is claimed under its own name too, so the same
    // content is not indexed again when the target or another alias comes up.
    let target = normalize(&page.url);
    if target != entry.url && !frontier.mark_visited(&target) {
        tracing::debug!(url = %entry.url, target = %target, "redirect target already visited");
        return Ok(PageOutcome::Duplicate);
    }
    let parsed = match parse(&page, max_body_bytes) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(url = %entry.url, error = %e, "skipping page");
            return Ok(PageOutcome::Failed);
        }
    };

    let indexed = index_page(&ids, entry.url.as_str(), &parsed)?;
    for link in parsed.links {
        frontier.push(link, entry.depth + 1);
    }
    Ok(PageOutcome::Indexed(indexed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_name_their_source() {
        let join = CrawlError::Join("task panicked".into());
        assert_eq!(join.to_string(), "crawl worker failed: task panicked");
        let storage: CrawlError = StorageError::Corrupt("bad id".into()).into();
        assert!(matches!(storage, CrawlError::Storage(_)));
        assert_eq!(storage.to_string(), "corrupt record: bad id");
    }
}

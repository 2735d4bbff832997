//! Crawler module for fetching firm sites and extracting contacts
//!
//! This module contains the core crawling logic, including:
//! - Contact extraction and profile-link discovery
//! - HTTP fetching with retry logic
//! - Worker-pool scheduling and per-domain rate limiting
//! - vCard downloads
//! - Overall crawl coordination

mod coordinator;
pub mod discover;
pub mod extractor;
mod fetcher;
mod scheduler;
mod vcard;

pub use coordinator::Coordinator;
pub use discover::discover_profile_links;
pub use extractor::{extract, ExtractError, Extractor};
pub use fetcher::{
    build_http_client, fetch_page, read_body, FetchError, FetchedPage, Fetcher, RetryPolicy,
};
pub use scheduler::{RequestPermit, Scheduler, VisitedSet};
pub use vcard::download_vcard;

pub use crate::model::TaskOutcome;

use crate::aggregate::FirmAggregator;
use crate::config::Config;
use crate::model::{FirmRecord, SeedSite};
use crate::output::RunStatistics;
use crate::CounselError;
use tokio_util::sync::CancellationToken;

/// Everything a finished (or cancelled) run produced
#[derive(Debug)]
pub struct CrawlReport {
    /// Finalized records, in the order their seeds completed
    pub records: Vec<FirmRecord>,

    /// Seeds whose records were still open when the run stopped
    pub discarded: Vec<SeedSite>,

    pub statistics: RunStatistics,

    pub cancelled: bool,
}

/// Runs a complete crawl
///
/// This is the main entry point for a run. It will:
/// 1. Build the HTTP client and shared crawl state
/// 2. Fetch every seed page and its discovered profile pages
/// 3. Aggregate outcomes into one [`FirmRecord`] per seed as seeds settle
/// 4. Discard unfinished records if the run is cancelled
pub async fn crawl(
    config: Config,
    seeds: Vec<SeedSite>,
    cancel: CancellationToken,
) -> Result<CrawlReport, CounselError> {
    if seeds.is_empty() {
        return Err(CounselError::NoSeeds);
    }

    let mut aggregator = FirmAggregator::new(&seeds);
    let mut statistics = RunStatistics::new(seeds.len());
    let mut records = Vec::new();

    let coordinator = Coordinator::new(config)?;
    let mut outcomes = coordinator.start(seeds, cancel.clone());

    while let Some(outcome) = outcomes.recv().await {
        statistics.record_outcome(&outcome);
        if let Some(record) = aggregator.ingest(outcome) {
            statistics.record_firm(&record);
            records.push(record);

            let progress = aggregator.overall_progress();
            tracing::info!(
                "Progress: {}/{} seed site(s) finalized",
                progress.finalized,
                progress.total
            );
        }
    }

    let discarded = aggregator.finish();
    if !discarded.is_empty() {
        tracing::warn!(
            "Discarding {} unfinished record(s) after cancellation",
            discarded.len()
        );
    }
    statistics.finish();

    Ok(CrawlReport {
        records,
        discarded,
        statistics,
        cancelled: cancel.is_cancelled(),
    })
}

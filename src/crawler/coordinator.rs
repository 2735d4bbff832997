//! Crawler coordinator - crawl orchestration
//!
//! This module contains the dispatch loop that coordinates a run:
//! - Seeding one depth-0 task per seed site
//! - Running tasks on a bounded worker pool
//! - Robots.txt checks, deduplication, fetching, extraction
//! - Enqueuing discovered profile pages (depth 1, never deeper)
//! - Downloading vCards found on each page
//! - Streaming one [`TaskOutcome`] per settled task
//!
//! A parent's outcome, carrying the number of profile tasks it spawned, is
//! always sent before any of those profile tasks can settle.

use crate::config::Config;
use crate::crawler::discover::discover_profile_links;
use crate::crawler::extractor::Extractor;
use crate::crawler::fetcher::{build_http_client, FetchError, Fetcher};
use crate::crawler::scheduler::{Scheduler, VisitedSet};
use crate::crawler::vcard::download_vcard;
use crate::model::{
    CrawlTask, Depth, SeedSite, SkipReason, TaskOutcome, TaskResult, VCardOutcome,
    VCardSkipReason,
};
use crate::robots::{fetch_robots, robots_origin, ParsedRobots, RobotsCache};
use crate::state::TaskLifecycle;
use crate::url::extract_domain;
use crate::CounselError;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Capacity of the outcome channel
const OUTCOME_BUFFER: usize = 256;

/// What a worker hands back to the dispatcher
struct WorkerReport {
    outcome: TaskOutcome,
    children: Vec<CrawlTask>,
}

/// State shared by every worker for the lifetime of a run
struct CrawlContext {
    config: Arc<Config>,
    fetcher: Fetcher,
    scheduler: Arc<Scheduler>,
    robots: RobotsCache,
    visited: VisitedSet,
    extractor: Extractor,
    robots_agent: String,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    ctx: Arc<CrawlContext>,
}

impl Coordinator {
    /// Creates a coordinator from a validated configuration
    ///
    /// Fails only if the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self, CounselError> {
        let client = build_http_client(&config)?;
        let scheduler = Arc::new(Scheduler::new(&config.crawler));
        let fetcher = Fetcher::new(client, Arc::clone(&scheduler), &config.crawler);

        let ctx = CrawlContext {
            extractor: Extractor::new(&config.heuristics),
            robots_agent: config.user_agent.crawler_name.clone(),
            config: Arc::new(config),
            fetcher,
            scheduler,
            robots: RobotsCache::new(),
            visited: VisitedSet::new(),
        };

        Ok(Self { ctx: Arc::new(ctx) })
    }

    /// Starts the run in the background and returns the outcome stream
    ///
    /// The stream ends when every task has settled or the run is cancelled.
    pub fn start(self, seeds: Vec<SeedSite>, cancel: CancellationToken) -> mpsc::Receiver<TaskOutcome> {
        let (tx, rx) = mpsc::channel(OUTCOME_BUFFER);
        tokio::spawn(async move { self.run(seeds, tx, cancel).await });
        rx
    }

    /// Runs the dispatch loop until all tasks settle or `cancel` fires
    pub async fn run(
        self,
        seeds: Vec<SeedSite>,
        tx: mpsc::Sender<TaskOutcome>,
        cancel: CancellationToken,
    ) {
        tracing::info!(
            "Starting crawl of {} seed site(s) with {} workers",
            seeds.len(),
            self.ctx.config.crawler.max_concurrent_requests
        );

        let mut queue: VecDeque<CrawlTask> = seeds.iter().map(CrawlTask::seed_page).collect();
        let mut workers: JoinSet<WorkerReport> = JoinSet::new();
        let mut in_flight: HashMap<tokio::task::Id, CrawlTask> = HashMap::new();
        let mut settled = 0usize;

        loop {
            while let Some(task) = queue.pop_front() {
                let ctx = Arc::clone(&self.ctx);
                let worker_cancel = cancel.clone();
                let worker_task = task.clone();
                let handle = workers.spawn(async move { ctx.process(worker_task, worker_cancel).await });
                in_flight.insert(handle.id(), task);
            }

            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::warn!(
                        "Crawl cancelled: abandoning {} in-flight task(s)",
                        in_flight.len()
                    );
                    workers.abort_all();
                    break;
                }
                joined = workers.join_next_with_id() => joined,
            };

            let report = match joined {
                None => break,
                Some(Ok((id, report))) => {
                    in_flight.remove(&id);
                    report
                }
                Some(Err(e)) => {
                    let Some(task) = in_flight.remove(&e.id()) else {
                        tracing::error!("Worker failed for an unknown task: {}", e);
                        continue;
                    };
                    tracing::error!("Worker for {} failed: {}", task.url, e);
                    WorkerReport {
                        outcome: TaskOutcome {
                            task,
                            result: TaskResult::Failed {
                                error: format!("worker failed: {}", e),
                                attempts: 0,
                            },
                            spawned: 0,
                        },
                        children: Vec::new(),
                    }
                }
            };

            settled += 1;
            queue.extend(report.children);
            if tx.send(report.outcome).await.is_err() {
                tracing::warn!("Outcome receiver dropped, stopping crawl");
                workers.abort_all();
                break;
            }
        }

        tracing::info!(
            "Crawl finished: {} task(s) settled, {} URL(s) visited, {} domain(s) contacted, {} robots.txt origin(s)",
            settled,
            self.ctx.visited.len(),
            self.ctx.scheduler.domain_count(),
            self.ctx.robots.len()
        );
    }
}

impl CrawlContext {
    /// Runs one task to a terminal state
    async fn process(&self, task: CrawlTask, cancel: CancellationToken) -> WorkerReport {
        if cancel.is_cancelled() {
            return skipped(task, SkipReason::Cancelled);
        }

        let mut lifecycle = TaskLifecycle::new();

        if !self.visited.claim(&task.url) {
            tracing::debug!("Skipping duplicate {}", task.url);
            skip_lifecycle(&mut lifecycle, &task.url);
            return skipped(task, SkipReason::Duplicate);
        }

        if !self.robots_allows(&task.url).await {
            tracing::info!("URL {} disallowed by robots.txt", task.url);
            skip_lifecycle(&mut lifecycle, &task.url);
            return skipped(task, SkipReason::Excluded);
        }

        let page = match self.fetcher.fetch(&task.url, &mut lifecycle, &cancel).await {
            Ok(page) => page,
            Err(FetchError::Cancelled) => return skipped(task, SkipReason::Cancelled),
            Err(e) => {
                tracing::warn!(
                    "Failed {} (depth {}) after {} attempt(s): {}",
                    task.url,
                    task.depth,
                    lifecycle.attempts(),
                    e
                );
                return WorkerReport {
                    outcome: TaskOutcome {
                        task,
                        result: TaskResult::Failed {
                            error: e.to_string(),
                            attempts: lifecycle.attempts(),
                        },
                        spawned: 0,
                    },
                    children: Vec::new(),
                };
            }
        };

        if !self.visited.claim_redirect(&task.url, &page.final_url) {
            tracing::debug!(
                "Skipping {}: redirected to already visited {}",
                task.url,
                page.final_url
            );
            return skipped(task, SkipReason::Duplicate);
        }

        let extraction = self.extractor.extract_page(
            &page.final_url,
            &page.body,
            task.depth == Depth::Profile,
        );

        let children = match task.depth {
            Depth::Seed => self.profile_tasks(&task, &page.final_url, &page.body),
            Depth::Profile => Vec::new(),
        };

        let vcards = self.fetch_vcards(&extraction.vcard_links, &cancel).await;

        WorkerReport {
            outcome: TaskOutcome {
                task,
                result: TaskResult::Succeeded {
                    extraction,
                    vcards,
                    attempts: lifecycle.attempts(),
                },
                spawned: children.len(),
            },
            children,
        }
    }

    /// Builds the depth-1 tasks for a fetched seed page
    fn profile_tasks(&self, task: &CrawlTask, page_url: &Url, html: &str) -> Vec<CrawlTask> {
        let crawler = &self.config.crawler;
        let budget = crawler
            .max_profile_links
            .min(crawler.max_pages_per_site.saturating_sub(1));

        let links = discover_profile_links(page_url, html, &self.config.heuristics, budget);
        tracing::info!(
            "Discovered {} profile link(s) on {}",
            links.len(),
            task.url
        );

        links
            .into_iter()
            .enumerate()
            .map(|(i, url)| CrawlTask::profile_page(url, task.origin_seed, i + 1))
            .collect()
    }

    /// Checks robots.txt for `url`, fetching the origin's rules once per run
    async fn robots_allows(&self, url: &Url) -> bool {
        let Some(domain) = extract_domain(url) else {
            return false;
        };
        let origin = robots_origin(url);

        let rules = self
            .robots
            .get_or_fetch(&origin, || async {
                let Some(_permit) = self.scheduler.acquire_request(&domain).await else {
                    return ParsedRobots::allow_all();
                };
                let rules = fetch_robots(self.fetcher.client(), url).await;
                self.scheduler
                    .set_crawl_delay(&domain, rules.crawl_delay(&self.robots_agent));
                rules
            })
            .await;

        rules.is_allowed(url.as_str(), &self.robots_agent)
    }

    /// Downloads the vCards linked from a page
    async fn fetch_vcards(
        &self,
        links: &BTreeSet<String>,
        cancel: &CancellationToken,
    ) -> Vec<VCardOutcome> {
        let mut outcomes = Vec::with_capacity(links.len());
        let max_bytes = self.config.vcard.max_bytes;

        for link in links {
            if cancel.is_cancelled() {
                break;
            }

            let skip = |reason| VCardOutcome::Skipped {
                source_url: link.clone(),
                reason,
            };

            let url = match Url::parse(link) {
                Ok(url) => url,
                Err(e) => {
                    outcomes.push(skip(VCardSkipReason::Failed(e.to_string())));
                    continue;
                }
            };
            let Some(domain) = extract_domain(&url) else {
                outcomes.push(skip(VCardSkipReason::Failed("URL has no host".to_string())));
                continue;
            };

            if !self.visited.claim(&url) {
                outcomes.push(skip(VCardSkipReason::Duplicate));
                continue;
            }
            if !self.robots_allows(&url).await {
                outcomes.push(skip(VCardSkipReason::Excluded));
                continue;
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = async {
                    let _permit = self.scheduler.acquire_request(&domain).await?;
                    Some(download_vcard(self.fetcher.client(), &url, max_bytes).await)
                } => outcome,
            };
            let Some(outcome) = outcome else {
                break;
            };
            outcomes.push(outcome);
        }

        outcomes
    }
}

/// Moves a task that never reached the network to `Skipped`
fn skip_lifecycle(lifecycle: &mut TaskLifecycle, url: &Url) {
    if let Err(e) = lifecycle.skip() {
        tracing::warn!("Task {} could not be marked skipped: {}", url, e);
    }
}

fn skipped(task: CrawlTask, reason: SkipReason) -> WorkerReport {
    WorkerReport {
        outcome: TaskOutcome {
            task,
            result: TaskResult::Skipped(reason),
            spawned: 0,
        },
        children: Vec::new(),
    }
}

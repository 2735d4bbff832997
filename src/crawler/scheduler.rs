//! Shared scheduling state for the worker pool
//!
//! This module handles:
//! - Global concurrency limiting via a semaphore (the worker pool size)
//! - Per-domain politeness: in-flight burst and minimum delay between requests
//! - Integrating robots.txt crawl delays
//! - The run-wide visited set that enforces at-most-once fetches
//!
//! All of it is passed explicitly to workers behind `Arc`s; nothing here is
//! global.

use crate::config::CrawlerConfig;
use crate::state::DomainState;
use crate::url::normalize_url;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

/// How long to wait before rechecking a domain whose burst is exhausted
const BUSY_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Scheduler coordinates the worker pool and per-domain throttling
///
/// Domain state is keyed by host and shared across seeds, so two seeds on
/// the same domain still take turns. A worker slot is only held while a
/// request is actually on the wire; tasks waiting out a domain's politeness
/// delay hold nothing.
#[derive(Debug)]
pub struct Scheduler {
    /// Global semaphore bounding concurrent requests
    workers: Arc<Semaphore>,

    /// Per-domain state tracking
    domains: Mutex<HashMap<String, DomainState>>,

    /// In-flight requests allowed per domain
    burst: u32,

    /// Configured minimum delay between request starts on one domain
    base_delay: Duration,

    /// Ceiling applied to robots.txt crawl delays
    max_crawl_delay: Duration,
}

impl Scheduler {
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            workers: Arc::new(Semaphore::new(config.max_concurrent_requests as usize)),
            domains: Mutex::new(HashMap::new()),
            burst: config.per_domain_burst.max(1),
            base_delay: Duration::from_millis(config.politeness_delay_ms),
            max_crawl_delay: Duration::from_secs(config.max_crawl_delay_secs),
        }
    }

    /// Number of idle worker slots
    #[cfg(test)]
    pub fn available_workers(&self) -> usize {
        self.workers.available_permits()
    }

    /// Waits until a request to `domain` may start, then claims a worker
    /// slot and the domain together
    ///
    /// A worker slot is taken first and handed back whenever the domain is
    /// not ready yet, so other domains keep the pool busy in the meantime.
    /// Returns None only if the pool was closed.
    pub async fn acquire_request(self: &Arc<Self>, domain: &str) -> Option<RequestPermit> {
        loop {
            let worker = Arc::clone(&self.workers).acquire_owned().await.ok()?;

            let wait = match self.try_claim_domain(domain) {
                Ok(permit) => {
                    return Some(RequestPermit {
                        _worker: worker,
                        _domain: permit,
                    })
                }
                Err(wait) => wait,
            };
            drop(worker);

            tracing::trace!("Domain {} not ready, waiting {:?}", domain, wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Claims `domain` if it may receive a request now, otherwise returns
    /// how long to wait before asking again
    fn try_claim_domain(self: &Arc<Self>, domain: &str) -> Result<DomainPermit, Duration> {
        let now = Instant::now();
        let mut domains = self.lock();
        let state = domains.entry(domain.to_string()).or_default();

        if state.can_request(self.burst, self.base_delay, now) {
            state.record_request(now);
            tracing::trace!(
                "Domain {} request #{} ({} in flight)",
                domain,
                state.request_count,
                state.in_flight
            );
            return Ok(DomainPermit {
                scheduler: Arc::clone(self),
                domain: domain.to_string(),
            });
        }

        if state.in_flight >= self.burst {
            Err(BUSY_POLL_INTERVAL)
        } else {
            Err(state
                .time_until_next_request(self.base_delay, now)
                .unwrap_or(BUSY_POLL_INTERVAL))
        }
    }

    /// Applies a robots.txt crawl-delay (seconds) to a domain
    ///
    /// Non-positive and non-finite values are ignored; anything above the
    /// configured ceiling is clamped to it.
    pub fn set_crawl_delay(&self, domain: &str, seconds: Option<f64>) {
        let delay = seconds
            .filter(|s| s.is_finite() && *s > 0.0)
            .map(|s| {
                Duration::try_from_secs_f64(s)
                    .unwrap_or(self.max_crawl_delay)
                    .min(self.max_crawl_delay)
            });
        if let (Some(requested), Some(applied)) = (seconds, delay) {
            if applied.as_secs_f64() < requested {
                tracing::debug!(
                    "Clamping crawl-delay for {} from {}s to {:?}",
                    domain,
                    requested,
                    applied
                );
            }
        }
        self.lock()
            .entry(domain.to_string())
            .or_default()
            .set_crawl_delay(delay);
    }

    /// Snapshot of a domain's state
    #[cfg(test)]
    pub fn domain_state(&self, domain: &str) -> Option<DomainState> {
        self.lock().get(domain).cloned()
    }

    /// Number of distinct domains contacted so far
    pub fn domain_count(&self) -> usize {
        self.lock().len()
    }

    fn release(&self, domain: &str) {
        if let Some(state) = self.lock().get_mut(domain) {
            state.release();
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, DomainState>> {
        self.domains.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Claim on one in-flight request slot for a domain
#[derive(Debug)]
struct DomainPermit {
    scheduler: Arc<Scheduler>,
    domain: String,
}

impl Drop for DomainPermit {
    fn drop(&mut self) {
        self.scheduler.release(&self.domain);
    }
}

/// A worker slot plus a domain slot, both released on drop
#[derive(Debug)]
pub struct RequestPermit {
    _worker: OwnedSemaphorePermit,
    _domain: DomainPermit,
}

impl RequestPermit {
    #[cfg(test)]
    pub fn domain(&self) -> &str {
        &self._domain.domain
    }
}

/// Run-scoped set of URLs that have been claimed for fetching
///
/// Keys are normalized URLs, so trivial variants (fragment, trailing slash,
/// `www.`, tracking parameters) count as the same URL.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: Mutex<HashSet<String>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `url` for this run; returns false if it was already claimed
    pub fn claim(&self, url: &Url) -> bool {
        let key = visit_key(url);
        self.lock().insert(key)
    }

    /// Claims the URL a request was redirected to
    ///
    /// Returns false when `final_url` differs from `requested` and another
    /// task already claimed it.
    pub fn claim_redirect(&self, requested: &Url, final_url: &Url) -> bool {
        let key = visit_key(final_url);
        if key == visit_key(requested) {
            return true;
        }
        self.lock().insert(key)
    }

    #[cfg(test)]
    pub fn contains(&self, url: &Url) -> bool {
        let key = visit_key(url);
        self.lock().contains(&key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn visit_key(url: &Url) -> String {
    normalize_url(url.as_str())
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

use std::time::{Duration, Instant};

/// Tracks the politeness state of a domain during crawling
///
/// One entry exists per domain for the whole run, shared by every seed that
/// resolves to that domain, so throttling holds across seeds.
#[derive(Debug, Clone, Default)]
pub struct DomainState {
    /// Number of requests started against this domain
    pub request_count: u32,

    /// Requests currently outstanding
    pub in_flight: u32,

    /// When the most recent request to this domain started
    pub last_request_time: Option<Instant>,

    /// Crawl-delay advertised by the domain's robots.txt
    pub crawl_delay: Option<Duration>,
}

impl DomainState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Politeness delay for this domain: the configured delay or the
    /// robots.txt crawl-delay, whichever is longer
    pub fn effective_delay(&self, base_delay: Duration) -> Duration {
        match self.crawl_delay {
            Some(delay) => delay.max(base_delay),
            None => base_delay,
        }
    }

    /// Checks if a request can be made to this domain
    ///
    /// This enforces:
    /// - The per-domain in-flight burst
    /// - The minimum time between request starts
    pub fn can_request(&self, burst: u32, base_delay: Duration, now: Instant) -> bool {
        if self.in_flight >= burst {
            return false;
        }

        self.time_until_next_request(base_delay, now).is_none()
    }

    /// Records that a request was started against this domain
    pub fn record_request(&mut self, now: Instant) {
        self.request_count += 1;
        self.in_flight += 1;
        self.last_request_time = Some(now);
    }

    /// Records that an outstanding request finished
    pub fn release(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    pub fn set_crawl_delay(&mut self, delay: Option<Duration>) {
        self.crawl_delay = delay;
    }

    /// Calculates the time until the next request can be started
    ///
    /// Returns None if the delay has already elapsed. The in-flight limit is
    /// not considered here.
    pub fn time_until_next_request(&self, base_delay: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let min_delay = self.effective_delay(base_delay);
        let elapsed = now.saturating_duration_since(last);
        if elapsed < min_delay {
            Some(min_delay - elapsed)
        } else {
            None
        }
    }
}

//! Robots.txt handling module
//!
//! Fetches, parses and caches each origin's exclusion rules. A URL
//! disallowed by them is skipped silently; it is never an error.

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::ParsedRobots;

use crate::crawler::read_body;
use reqwest::Client;
use url::Url;

/// Bytes of robots.txt parsed; anything past this is ignored
const MAX_ROBOTS_BYTES: u64 = 512 * 1024;

/// Returns the cache key for a URL's robots.txt (scheme, host and port)
pub fn robots_origin(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// Fetches and parses robots.txt for the origin of `url`
///
/// Any failure (network error, non-success status, unreadable body) yields
/// the permissive rule set; a site without usable robots.txt is crawlable.
pub async fn fetch_robots(client: &Client, url: &Url) -> ParsedRobots {
    let robots_url = match url.join("/robots.txt") {
        Ok(u) => u,
        Err(e) => {
            tracing::debug!("Cannot build robots.txt URL for {}: {}", url, e);
            return ParsedRobots::allow_all();
        }
    };

    tracing::debug!("Fetching {}", robots_url);

    let response = match client.get(robots_url.clone()).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!("robots.txt fetch failed for {}: {}", robots_url, e);
            return ParsedRobots::allow_all();
        }
    };

    if !response.status().is_success() {
        tracing::debug!(
            "robots.txt at {} returned {}, allowing all",
            robots_url,
            response.status()
        );
        return ParsedRobots::allow_all();
    }

    match read_body(response, MAX_ROBOTS_BYTES).await {
        Ok(body) => {
            if body.truncated {
                tracing::debug!(
                    "robots.txt at {} exceeds {} bytes, parsing the prefix",
                    robots_url,
                    MAX_ROBOTS_BYTES
                );
            }
            ParsedRobots::from_content(&String::from_utf8_lossy(body.prefix(MAX_ROBOTS_BYTES)))
        }
        Err(e) => {
            tracing::debug!("robots.txt body unreadable at {}: {}", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}

//! Seed intake from the search and list-import collaborators
//!
//! Both collaborators hand over URLs; the crawler turns each selected URL
//! into a [`SeedSite`]. Entries that are not crawlable web URLs are dropped
//! with a warning, and a site listed twice is kept once.

use crate::config::SeedEntry;
use crate::model::{SeedId, SeedSite};
use crate::url::{normalize_url, site_domain};
use std::collections::HashSet;
use url::Url;

/// One candidate returned by the search collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Builds seed sites in input order, numbering them sequentially
#[derive(Debug, Default)]
pub struct SeedBuilder {
    seeds: Vec<SeedSite>,
    seen: HashSet<String>,
}

impl SeedBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a seed URL, returning false if it was rejected or already present
    pub fn push(
        &mut self,
        raw_url: &str,
        practice_area: Option<String>,
        location_filters: Vec<String>,
    ) -> bool {
        let raw_url = raw_url.trim();
        let url = match parse_seed_url(raw_url) {
            Some(url) => url,
            None => {
                tracing::warn!("Ignoring seed '{}': not an http(s) URL", raw_url);
                return false;
            }
        };

        let key = match normalize_url(url.as_str()) {
            Ok(normalized) => normalized.to_string(),
            Err(e) => {
                tracing::warn!("Ignoring seed '{}': {}", raw_url, e);
                return false;
            }
        };
        if !self.seen.insert(key) {
            tracing::debug!("Duplicate seed {}", url);
            return false;
        }

        let seed = SeedSite::new(SeedId(self.seeds.len()), url)
            .with_practice_area(practice_area)
            .with_location_filters(location_filters);
        self.seeds.push(seed);
        true
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    pub fn build(self) -> Vec<SeedSite> {
        self.seeds
    }
}

/// Accepts full URLs and bare hostnames (`firm.com` becomes `https://firm.com/`)
fn parse_seed_url(raw: &str) -> Option<Url> {
    if raw.is_empty() {
        return None;
    }

    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{}", raw)).ok()?
        }
        Err(_) => return None,
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    let host = url.host_str()?;
    if !host.contains('.') && host != "localhost" && url.port().is_none() {
        return None;
    }
    Some(url)
}

/// Converts the selected search results into seeds
///
/// Only `url` is consumed; title and snippet are for the user's selection.
pub fn seeds_from_search_results(
    results: &[SearchResult],
    practice_area: Option<&str>,
    location_filters: &[String],
) -> Vec<SeedSite> {
    let mut builder = SeedBuilder::new();
    for result in results {
        builder.push(
            &result.url,
            practice_area.map(str::to_string),
            location_filters.to_vec(),
        );
    }
    builder.build()
}

/// Converts an imported URL list into seeds, same as search results
pub fn seeds_from_urls<'a, I>(urls: I, practice_area: Option<&str>) -> Vec<SeedSite>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut builder = SeedBuilder::new();
    for url in urls {
        builder.push(url, practice_area.map(str::to_string), Vec::new());
    }
    builder.build()
}

/// Reads a list-import file: one URL per line, `#` starts a comment
pub fn parse_url_list(content: &str) -> Vec<&str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

/// Adds the `[[seed]]` entries of a configuration file
pub fn push_config_seeds(builder: &mut SeedBuilder, entries: &[SeedEntry]) {
    for entry in entries {
        builder.push(
            &entry.url,
            entry.practice_area.clone(),
            entry.location_filters.clone(),
        );
    }
}

/// Distinct site domains across a seed list
pub fn distinct_domains(seeds: &[SeedSite]) -> usize {
    seeds
        .iter()
        .filter_map(|s| s.base_url.host_str())
        .map(site_domain)
        .collect::<HashSet<_>>()
        .len()
}

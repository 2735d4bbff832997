//! Profile-link discovery
//!
//! Given a firm's front page, finds links that plausibly lead to individual
//! attorney bios. A link qualifies when its path carries a profile-like
//! segment (`/attorney/...`, `/our-people/...`) or its anchor text reads
//! like a person's name, optionally followed by "Esq." or a title.

use crate::config::HeuristicsConfig;
use crate::url::{is_same_site, normalize_url};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

static ANCHOR_SELECTOR: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("a[href]").ok());

/// Capitalized words that show up in navigation far more often than in names
const NON_NAME_WORDS: &[&str] = &[
    "about", "all", "and", "areas", "attorneys", "blog", "call", "careers", "case", "cases",
    "client", "contact", "criminal", "defense", "estate", "faq", "family", "firm", "free",
    "group", "home", "injury", "law", "lawyers", "llc", "llp", "location", "locations", "meet",
    "menu", "more", "news", "now", "office", "offices", "our", "page", "personal", "planning",
    "policy", "practice", "privacy", "read", "results", "reviews", "schedule", "services",
    "team", "terms", "testimonials", "the", "us", "view",
];

/// Lowercase particles allowed inside a name ("Ana de la Cruz")
const NAME_PARTICLES: &[&str] = &["de", "del", "der", "da", "di", "la", "le", "van", "von", "bin"];

const FILE_EXTENSIONS: &[&str] = &[
    ".pdf", ".vcf", ".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".doc", ".docx", ".zip",
];

/// Returns up to `max_links` candidate profile URLs found on the seed page
///
/// Candidates are kept in document order, deduplicated by normalized URL,
/// and restricted to the seed's site. The seed page itself is never a
/// candidate.
pub fn discover_profile_links(
    seed_url: &Url,
    html: &str,
    heuristics: &HeuristicsConfig,
    max_links: usize,
) -> Vec<Url> {
    let Some(selector) = ANCHOR_SELECTOR.as_ref() else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let seed_key = normalize_url(seed_url.as_str()).ok();
    let mut seen: HashSet<String> = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(selector) {
        if links.len() >= max_links {
            break;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(candidate) = resolve_page_link(href, seed_url) else {
            continue;
        };
        if !is_same_site(seed_url, &candidate) {
            continue;
        }

        let anchor_text = element.text().collect::<Vec<_>>().join(" ");
        if !has_profile_path(&candidate, &heuristics.profile_path_segments)
            && !looks_like_person_name(&anchor_text, &heuristics.profile_title_keywords)
        {
            continue;
        }

        let Ok(key) = normalize_url(candidate.as_str()) else {
            continue;
        };
        if seed_key.as_ref() == Some(&key) {
            continue;
        }
        if seen.insert(key.to_string()) {
            tracing::trace!("Profile candidate {} ({:?})", candidate, anchor_text.trim());
            links.push(candidate);
        }
    }

    links
}

/// Resolves an href to an absolute http(s) page URL, dropping the fragment
fn resolve_page_link(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);

    let path = url.path().to_ascii_lowercase();
    if FILE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return None;
    }

    Some(url)
}

/// True if any path segment is a profile-like segment
///
/// A segment matches a configured value exactly, in plural form, or as the
/// head of a hyphenated segment (`attorney-profiles`).
pub fn has_profile_path(url: &Url, segments: &[String]) -> bool {
    let Some(path_segments) = url.path_segments() else {
        return false;
    };

    path_segments
        .map(|s| s.to_ascii_lowercase())
        .any(|segment| {
            segments.iter().any(|wanted| {
                let wanted = wanted.trim_matches('/').to_ascii_lowercase();
                segment == wanted
                    || segment == format!("{}s", wanted)
                    || segment.starts_with(&format!("{}-", wanted))
                    || segment.starts_with(&format!("{}s-", wanted))
            })
        })
}

/// Heuristic check for text that reads like a person's name
///
/// Accepts two to four capitalized words (initials and name particles
/// allowed), optionally followed by a comma-separated or trailing title such
/// as "Esq." or "Partner". Navigation phrases like "Our Team" are rejected.
pub fn looks_like_person_name(text: &str, title_keywords: &[String]) -> bool {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() || text.len() > 80 {
        return false;
    }

    let mut parts = text.split([',', '|']);
    let name_part = parts.next().unwrap_or_default();
    for suffix in parts {
        if !suffix
            .split_whitespace()
            .all(|word| is_title_keyword(word, title_keywords))
        {
            return false;
        }
    }

    let mut words: Vec<&str> = name_part.split_whitespace().collect();
    while words
        .last()
        .is_some_and(|word| is_title_keyword(word, title_keywords))
    {
        words.pop();
    }

    if words.len() < 2 || words.len() > 4 {
        return false;
    }

    let mut capitalized = 0;
    for (i, word) in words.iter().enumerate() {
        let lower = word.to_lowercase();
        if NON_NAME_WORDS.contains(&lower.trim_end_matches('.')) {
            return false;
        }
        if i > 0 && i + 1 < words.len() && NAME_PARTICLES.contains(&lower.as_str()) {
            continue;
        }
        if !is_name_word(word) {
            return false;
        }
        capitalized += 1;
    }

    capitalized >= 2
}

fn is_title_keyword(word: &str, title_keywords: &[String]) -> bool {
    let word = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
    !word.is_empty() && title_keywords.iter().any(|k| k.eq_ignore_ascii_case(&word))
}

/// "Jane", "O'Neil", "Smith-Jones", or an initial like "J."
fn is_name_word(word: &str) -> bool {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_uppercase() {
        return false;
    }

    let rest: Vec<char> = chars.collect();
    if rest.is_empty() || rest == ['.'] {
        return true;
    }
    if rest.iter().all(|c| c.is_uppercase()) && rest.len() > 1 {
        // all-caps words are headings ("CONTACT US"), not names
        return false;
    }
    rest.iter()
        .all(|c| c.is_alphabetic() || matches!(c, '\'' | '-' | '’' | '.'))
}

//! Contact extraction from fetched pages
//!
//! This module handles parsing page content to extract:
//! - Email addresses (text and `mailto:` links), minus generic firm inboxes
//! - Phone numbers (text and `tel:` links) with a digits-only canonical form
//! - vCard, PDF and image links, resolved to absolute URLs
//! - Whether the page looks like an individual attorney's profile
//!
//! Extraction never fails a task: content that cannot be handled produces
//! an empty result and a warning.

use crate::config::HeuristicsConfig;
use crate::crawler::discover::looks_like_person_name;
use crate::model::{PageExtractionResult, PhoneNumber};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)*\.[a-z]{2,}\b")
        .expect("valid regex")
});

/// North American numbers with optional +1 and common separators
static PHONE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+?1[\s.-]?)?(?:\(\d{3}\)|\d{3})[\s.-]?\d{3}[\s.-]?\d{4}").expect("valid regex")
});

/// `+CC` numbers outside North America, grouped with common separators
static INTL_PHONE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\+[2-9]\d{0,2}(?:[\s.-]?\(?\d{1,4}\)?){2,6}").expect("valid regex")
});

/// `url(...)` references in inline styles and `<style>` blocks
static CSS_URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*['"]?([^'")\s]+)['"]?\s*\)"#).expect("valid regex")
});

/// Email "TLDs" that are really file extensions (`logo@2x.png`)
const FILE_SUFFIXES: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "svg", "css", "js", "ico", "bmp",
];

const IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".ico", ".avif", ".bmp",
];

const LAZY_IMAGE_ATTRS: &[&str] = &["src", "data-src", "data-lazy-src", "data-original"];

/// Errors raised while extracting a page
///
/// These never leave the extractor: [`Extractor::extract_page`] logs them
/// and returns an empty result instead.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("invalid selector '{0}'")]
    Selector(String),

    #[error("content is not text markup")]
    BinaryContent,
}

static SELECTORS: LazyLock<Result<Selectors, ExtractError>> = LazyLock::new(Selectors::new);

/// Selectors compiled once per process
struct Selectors {
    links: Selector,
    resources: Selector,
    images: Selector,
    sources: Selector,
    styled: Selector,
    style_blocks: Selector,
    headings: Selector,
}

impl Selectors {
    fn new() -> Result<Self, ExtractError> {
        let parse = |s: &str| Selector::parse(s).map_err(|_| ExtractError::Selector(s.to_string()));
        Ok(Self {
            links: parse("a[href], area[href]")?,
            resources: parse("link[href]")?,
            images: parse("img")?,
            sources: parse("source[srcset], img[srcset]")?,
            styled: parse("[style]")?,
            style_blocks: parse("style")?,
            headings: parse("h1")?,
        })
    }
}

/// Page extractor configured with the run's heuristic lists
pub struct Extractor {
    generic_prefixes: Vec<String>,
    title_keywords: Vec<String>,
}

impl Extractor {
    pub fn new(heuristics: &HeuristicsConfig) -> Self {
        Self {
            generic_prefixes: heuristics
                .generic_email_prefixes
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            title_keywords: heuristics.profile_title_keywords.clone(),
        }
    }

    /// Extracts contacts and links from a page
    pub fn extract(&self, url: &Url, html: &str) -> PageExtractionResult {
        self.extract_page(url, html, false)
    }

    /// Extracts a page, marking it as a profile when discovery flagged it
    pub fn extract_page(&self, url: &Url, html: &str, flagged_profile: bool) -> PageExtractionResult {
        match self.try_extract(url, html, flagged_profile) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Extraction failed for {}: {}", url, e);
                let mut result = PageExtractionResult::empty(url.clone());
                result.is_profile_page = flagged_profile;
                result
            }
        }
    }

    fn try_extract(
        &self,
        url: &Url,
        html: &str,
        flagged_profile: bool,
    ) -> Result<PageExtractionResult, ExtractError> {
        if looks_binary(html) {
            return Err(ExtractError::BinaryContent);
        }

        let selectors = SELECTORS.as_ref().map_err(Clone::clone)?;
        let document = Html::parse_document(html);
        let text = visible_text(&document);
        let mut result = PageExtractionResult::empty(url.clone());

        for m in EMAIL_PATTERN.find_iter(&text) {
            if let Some(email) = self.accept_email(m.as_str()) {
                result.emails.insert(email);
            }
        }
        result.phones.extend(find_phones(&text));

        let anchors = document.select(&selectors.links);
        let resources = document.select(&selectors.resources);
        for element in anchors.chain(resources) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            self.classify_href(href, url, &mut result);
        }

        collect_images(&document, selectors, url, &mut result.image_links);

        result.is_profile_page =
            flagged_profile || (result.has_contacts() && self.has_single_name_heading(&document, selectors));

        tracing::debug!(
            "Extracted {}: {} emails, {} phones, {} vcards, {} pdfs, {} images",
            url,
            result.emails.len(),
            result.phones.len(),
            result.vcard_links.len(),
            result.pdf_links.len(),
            result.image_links.len()
        );

        Ok(result)
    }

    /// Sorts one href into emails, phones, vCards or PDFs
    fn classify_href(&self, href: &str, base: &Url, result: &mut PageExtractionResult) {
        let href = href.trim();
        let lower = href.to_ascii_lowercase();

        if let Some(rest) = strip_prefix_ignore_case(href, &lower, "mailto:") {
            let addresses = rest.split('?').next().unwrap_or_default();
            for address in addresses.split(',') {
                if let Some(email) = self.accept_email(address.trim()) {
                    result.emails.insert(email);
                }
            }
            return;
        }

        if let Some(rest) = strip_prefix_ignore_case(href, &lower, "tel:") {
            if let Some(phone) = phone_from_tel(rest) {
                result.phones.insert(phone);
            }
            return;
        }

        let Some(absolute) = resolve(href, base) else {
            return;
        };
        let path = absolute.path().to_ascii_lowercase();

        if path.ends_with(".vcf") || path.contains("vcard") {
            result.vcard_links.insert(absolute.to_string());
        } else if path.ends_with(".pdf") {
            result.pdf_links.insert(absolute.to_string());
        }
    }

    /// Lowercases a candidate address and applies the generic-inbox filter
    fn accept_email(&self, candidate: &str) -> Option<String> {
        let email = candidate.trim_matches(|c: char| c == '.' || c.is_whitespace()).to_lowercase();
        let m = EMAIL_PATTERN.find(&email)?;
        if m.start() != 0 || m.end() != email.len() {
            return None;
        }

        let (local, domain) = email.split_once('@')?;
        let tld = domain.rsplit('.').next().unwrap_or_default();
        if FILE_SUFFIXES.contains(&tld) {
            return None;
        }
        if self.is_generic_local_part(local) {
            tracing::trace!("Dropping generic address {}", email);
            return None;
        }

        Some(email)
    }

    /// `info`, `info.denver`, `info-2` are generic; `information` is not
    fn is_generic_local_part(&self, local: &str) -> bool {
        self.generic_prefixes.iter().any(|prefix| {
            local == prefix
                || local
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with(['.', '_', '-', '+']))
        })
    }

    /// Single `h1` on the page whose text reads like a person's name
    fn has_single_name_heading(&self, document: &Html, selectors: &Selectors) -> bool {
        let headings: Vec<ElementRef> = document.select(&selectors.headings).collect();
        if headings.len() != 1 {
            return false;
        }
        let text = headings[0].text().collect::<Vec<_>>().join(" ");
        looks_like_person_name(&text, &self.title_keywords)
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(&HeuristicsConfig::default())
    }
}

/// Extracts a page with the default heuristic lists
pub fn extract(url: &Url, html: &str) -> PageExtractionResult {
    Extractor::default().extract(url, html)
}

fn looks_binary(content: &str) -> bool {
    content.chars().take(1024).any(|c| c == '\0')
}

fn strip_prefix_ignore_case<'a>(original: &'a str, lower: &str, prefix: &str) -> Option<&'a str> {
    if lower.starts_with(prefix) {
        Some(&original[prefix.len()..])
    } else {
        None
    }
}

/// Text content outside `<script>`, `<style>` and `<noscript>`, space-joined
fn visible_text(document: &Html) -> String {
    let mut parts = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()))
            .is_some_and(|name| matches!(name, "script" | "style" | "noscript"));
        if !hidden {
            parts.push(&**text);
        }
    }
    parts.join(" ")
}

/// Finds phone numbers in free text
///
/// Bare digit runs without any separator are skipped; in page text they
/// are nearly always IDs or timestamps. International matches claim their
/// span first so a North American reading of the same digits is dropped.
fn find_phones(text: &str) -> Vec<PhoneNumber> {
    let mut phones = Vec::new();
    let mut claimed: Vec<(usize, usize)> = Vec::new();

    for m in INTL_PHONE_PATTERN.find_iter(text) {
        if digit_adjacent(text, m.start(), m.end()) {
            continue;
        }
        if let Some(phone) = international_phone(m.as_str().trim()) {
            claimed.push((m.start(), m.end()));
            phones.push(phone);
        }
    }

    for m in PHONE_PATTERN.find_iter(text) {
        if digit_adjacent(text, m.start(), m.end()) {
            continue;
        }
        if claimed.iter().any(|&(start, end)| m.start() < end && start < m.end()) {
            continue;
        }

        let display = m.as_str().trim();
        if display.chars().all(|c| c.is_ascii_digit() || c == '+') {
            continue;
        }
        if let Some(canonical) = canonical_phone(display) {
            phones.push(PhoneNumber::new(canonical, display));
        }
    }
    phones
}

fn digit_adjacent(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    before.is_some_and(|c| c.is_ascii_digit()) || after.is_some_and(|c| c.is_ascii_digit())
}

fn phone_from_tel(raw: &str) -> Option<PhoneNumber> {
    let display = raw.split(';').next().unwrap_or_default().trim();
    let is_international = display
        .strip_prefix('+')
        .is_some_and(|rest| !rest.trim_start().starts_with('1'));

    if is_international {
        return international_phone(display);
    }
    canonical_phone(display).map(|canonical| PhoneNumber::new(canonical, display))
}

/// International numbers keep their full digit string, country code included
fn international_phone(display: &str) -> Option<PhoneNumber> {
    let digits: String = display.chars().filter(|c| c.is_ascii_digit()).collect();
    if !(8..=15).contains(&digits.len()) || all_same(&digits) {
        return None;
    }
    Some(PhoneNumber::new(digits, display))
}

/// Ten-digit canonical form, dropping a leading country code 1
///
/// Rejects area codes starting with 0 or 1 and runs of a single digit.
pub fn canonical_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = match digits.len() {
        10 => digits,
        11 if digits.starts_with('1') => digits[1..].to_string(),
        _ => return None,
    };

    if matches!(digits.as_bytes()[0], b'0' | b'1') || all_same(&digits) {
        return None;
    }
    Some(digits)
}

fn all_same(digits: &str) -> bool {
    let mut chars = digits.chars();
    match chars.next() {
        Some(first) => chars.all(|c| c == first),
        None => true,
    }
}

fn resolve(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.to_ascii_lowercase().starts_with("data:") {
        return None;
    }
    let url = base.join(href).ok()?;
    if url.scheme() == "http" || url.scheme() == "https" {
        Some(url)
    } else {
        None
    }
}

fn is_image_path(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Collects `img` sources, lazy-load attributes, `srcset` candidates and
/// CSS `url(...)` images
fn collect_images(document: &Html, selectors: &Selectors, base: &Url, out: &mut BTreeSet<String>) {
    for img in document.select(&selectors.images) {
        for attr in LAZY_IMAGE_ATTRS {
            if let Some(url) = img.value().attr(attr).and_then(|v| resolve(v, base)) {
                out.insert(url.to_string());
            }
        }
    }

    for element in document.select(&selectors.sources) {
        let Some(srcset) = element.value().attr("srcset") else {
            continue;
        };
        for candidate in srcset.split(',') {
            let src = candidate.split_whitespace().next().unwrap_or_default();
            if let Some(url) = resolve(src, base) {
                out.insert(url.to_string());
            }
        }
    }

    let inline_styles = document
        .select(&selectors.styled)
        .filter_map(|e| e.value().attr("style").map(str::to_string));
    let style_blocks = document
        .select(&selectors.style_blocks)
        .map(|e| e.text().collect::<String>());

    for css in inline_styles.chain(style_blocks) {
        for cap in CSS_URL_PATTERN.captures_iter(&css) {
            let Some(url) = cap.get(1).and_then(|m| resolve(m.as_str(), base)) else {
                continue;
            };
            if is_image_path(&url) {
                out.insert(url.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://firm.example/attorney/jane-doe").unwrap()
    }

    fn canonical(result: &PageExtractionResult) -> Vec<String> {
        result.phones.iter().map(|p| p.canonical.clone()).collect()
    }

    #[test]
    fn test_profile_contact_line() {
        let html = "<html><body><p>Contact: jdoe@firm.com, (555) 123-4567</p></body></html>";
        let result = extract(&page(), html);

        assert_eq!(
            result.emails.iter().cloned().collect::<Vec<_>>(),
            vec!["jdoe@firm.com".to_string()]
        );
        assert_eq!(canonical(&result), vec!["5551234567".to_string()]);
        assert_eq!(result.phones.iter().next().unwrap().display, "(555) 123-4567");
    }

    #[test]
    fn test_generic_addresses_excluded() {
        let html = r#"
            <p>info@firm.com Contact@Firm.com office@firm.com admin@firm.com
               info.denver@firm.com sales@firm.com</p>
            <a href="mailto:info@firm.com">Email us</a>
            <p>information@firm.com</p>
        "#;
        let result = extract(&page(), html);
        assert_eq!(
            result.emails.into_iter().collect::<Vec<_>>(),
            vec!["information@firm.com".to_string()]
        );
    }

    #[test]
    fn test_emails_lowercased_and_deduplicated() {
        let html = "<p>JDoe@Firm.com</p><a href='mailto:jdoe@firm.com?subject=Hi'>x</a>";
        let result = extract(&page(), html);
        assert_eq!(result.emails.len(), 1);
        assert!(result.emails.contains("jdoe@firm.com"));
    }

    #[test]
    fn test_image_file_names_are_not_emails() {
        let result = extract(&page(), "<p>logo@2x.png</p>");
        assert!(result.emails.is_empty());
    }

    #[test]
    fn test_phone_separators_share_canonical_form() {
        let html = r#"
            <p>555.123.4567</p><p>555-123-4567</p><p>+1 (555) 123-4567</p>
            <a href="tel:+15551234567">Call</a>
        "#;
        let result = extract(&page(), html);
        assert_eq!(canonical(&result), vec!["5551234567".to_string()]);
    }

    #[test]
    fn test_numeric_false_positives_rejected() {
        let html = "<p>Case ID 5551234567</p><p>000-000-0000</p><p>Order 12345551234567</p>";
        let result = extract(&page(), html);
        assert!(result.phones.is_empty());
    }

    #[test]
    fn test_script_text_ignored() {
        let html = r#"<script>var c = "jane@firm.com";</script><p>No contacts here.</p>"#;
        let result = extract(&page(), html);
        assert!(result.emails.is_empty());
    }

    #[test]
    fn test_vcard_and_pdf_links_resolved() {
        let html = r#"
            <a href="../vcards/Jane.VCF">vCard</a>
            <a href="/download-vcard?id=7">Download contact</a>
            <a href="/files/bio.pdf">Bio</a>
            <a href="/files/bio.pdf">Bio again</a>
        "#;
        let result = extract(&page(), html);

        assert!(result
            .vcard_links
            .contains("https://firm.example/vcards/Jane.VCF"));
        assert!(result
            .vcard_links
            .contains("https://firm.example/download-vcard?id=7"));
        assert_eq!(
            result.pdf_links.into_iter().collect::<Vec<_>>(),
            vec!["https://firm.example/files/bio.pdf".to_string()]
        );
    }

    #[test]
    fn test_image_sources() {
        let html = r#"
            <style>.hero { background-image: url('/img/hero.jpg'); } .x { background: url(/fonts/a.woff) }</style>
            <div style="background-image: url(&quot;/img/team.png&quot;)"></div>
            <img src="/img/jane.jpg">
            <img data-src="/img/lazy.webp" src="data:image/gif;base64,R0lGOD">
            <img data-lazy-src="https://cdn.example/photo.jpeg">
            <picture><source srcset="/img/a-1x.png 1x, /img/a-2x.png 2x"></picture>
        "#;
        let result = extract(&page(), html);
        let images = result.image_links;

        assert!(images.contains("https://firm.example/img/hero.jpg"));
        assert!(images.contains("https://firm.example/img/team.png"));
        assert!(images.contains("https://firm.example/img/jane.jpg"));
        assert!(images.contains("https://firm.example/img/lazy.webp"));
        assert!(images.contains("https://cdn.example/photo.jpeg"));
        assert!(images.contains("https://firm.example/img/a-2x.png"));
        assert!(!images.iter().any(|i| i.contains("woff") || i.starts_with("data:")));
    }

    #[test]
    fn test_profile_heuristic_needs_name_and_contact() {
        let url = Url::parse("https://firm.example/people/17").unwrap();
        let with_contact = "<h1>Jane Doe</h1><p>jdoe@firm.com</p>";
        assert!(extract(&url, with_contact).is_profile_page);

        let without_contact = "<h1>Jane Doe</h1><p>Jane practices family law.</p>";
        assert!(!extract(&url, without_contact).is_profile_page);

        let two_headings = "<h1>Jane Doe</h1><h1>John Roe</h1><p>jdoe@firm.com</p>";
        assert!(!extract(&url, two_headings).is_profile_page);
    }

    #[test]
    fn test_flagged_profile_always_profile() {
        let result = Extractor::default().extract_page(&page(), "<p>nothing</p>", true);
        assert!(result.is_profile_page);
    }

    #[test]
    fn test_binary_content_yields_empty_result() {
        let result = Extractor::default().extract_page(&page(), "\0\0PK\u{3}jdoe@firm.com", true);
        assert!(result.emails.is_empty());
        assert!(result.is_profile_page);
    }

    #[test]
    fn test_broken_markup_still_extracts() {
        let result = extract(&page(), "<div><p>jdoe@firm.com <b>(555) 123-4567</div></span>");
        assert!(result.emails.contains("jdoe@firm.com"));
        assert_eq!(result.phones.len(), 1);
    }

    #[test]
    fn test_custom_generic_prefixes() {
        let heuristics = HeuristicsConfig {
            generic_email_prefixes: vec!["intake".to_string()],
            ..HeuristicsConfig::default()
        };
        let result = Extractor::new(&heuristics).extract(&page(), "<p>intake@firm.com info@firm.com</p>");
        assert_eq!(
            result.emails.into_iter().collect::<Vec<_>>(),
            vec!["info@firm.com".to_string()]
        );
    }

    #[test]
    fn test_international_phone_in_text() {
        let result = extract(&page(), "<p>London office: +44 20 7946 0958</p>");
        assert_eq!(canonical(&result), vec!["442079460958".to_string()]);
        assert_eq!(result.phones.iter().next().unwrap().display, "+44 20 7946 0958");
    }

    #[test]
    fn test_international_digits_not_read_as_north_american() {
        let html = "<p>Berlin: +49 301 234 5678</p><p>Denver: +1 (303) 555-0100</p>";
        let result = extract(&page(), html);
        let mut phones = canonical(&result);
        phones.sort();
        assert_eq!(phones, vec!["3035550100".to_string(), "493012345678".to_string()]);
    }

    #[test]
    fn test_international_tel_link_keeps_country_code() {
        let phone = phone_from_tel("+4930123456").unwrap();
        assert_eq!(phone.canonical, "4930123456");
        assert_eq!(phone_from_tel("+15551234567").unwrap().canonical, "5551234567");
        assert!(phone_from_tel("+4444444444").is_none());
    }

    #[test]
    fn test_selectors_compile() {
        assert!(SELECTORS.is_ok());
    }

    #[test]
    fn test_canonical_phone() {
        assert_eq!(canonical_phone("(555) 123-4567").as_deref(), Some("5551234567"));
        assert_eq!(canonical_phone("1-555-123-4567").as_deref(), Some("5551234567"));
        assert_eq!(canonical_phone("155-123-4567"), None);
        assert_eq!(canonical_phone("555-1234"), None);
        assert_eq!(canonical_phone("999-999-9999"), None);
    }
}

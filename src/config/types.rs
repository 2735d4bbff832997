use serde::Deserialize;

/// Main configuration structure for Counsel-Crawler
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub vcard: VCardConfig,
    #[serde(default)]
    pub heuristics: HeuristicsConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub search: Option<SearchConfig>,
    #[serde(default, rename = "seed")]
    pub seeds: Vec<SeedEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Size of the worker pool (maximum concurrent page fetches)
    #[serde(rename = "max-concurrent-requests", default = "default_concurrency")]
    pub max_concurrent_requests: u32,

    /// In-flight requests allowed per domain at one time
    #[serde(rename = "per-domain-burst", default = "default_burst")]
    pub per_domain_burst: u32,

    /// Minimum time between requests to the same domain (milliseconds)
    #[serde(rename = "politeness-delay-ms", default = "default_politeness_delay")]
    pub politeness_delay_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// Additional attempts for transient failures
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff base delay (milliseconds), doubled on every retry
    #[serde(rename = "retry-base-delay-ms", default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Maximum profile links followed per seed site
    #[serde(rename = "max-profile-links", default = "default_max_profile_links")]
    pub max_profile_links: usize,

    /// Maximum pages fetched per seed site, seed page included
    #[serde(rename = "max-pages-per-site", default = "default_max_pages_per_site")]
    pub max_pages_per_site: usize,

    /// Ceiling on a robots.txt crawl-delay (seconds)
    #[serde(rename = "max-crawl-delay-secs", default = "default_max_crawl_delay")]
    pub max_crawl_delay_secs: u64,

    /// Largest page body read, in bytes
    #[serde(rename = "max-page-bytes", default = "default_max_page_bytes")]
    pub max_page_bytes: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_concurrency(),
            per_domain_burst: default_burst(),
            politeness_delay_ms: default_politeness_delay(),
            request_timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay(),
            max_profile_links: default_max_profile_links(),
            max_pages_per_site: default_max_pages_per_site(),
            max_crawl_delay_secs: default_max_crawl_delay(),
            max_page_bytes: default_max_page_bytes(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// vCard download limits
#[derive(Debug, Clone, Deserialize)]
pub struct VCardConfig {
    /// Largest vCard accepted, in bytes
    #[serde(rename = "max-bytes", default = "default_vcard_max_bytes")]
    pub max_bytes: u64,
}

impl Default for VCardConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_vcard_max_bytes(),
        }
    }
}

/// Pattern lists driving the extraction and discovery heuristics
#[derive(Debug, Clone, Deserialize)]
pub struct HeuristicsConfig {
    /// Email local-parts treated as firm/department addresses
    #[serde(
        rename = "generic-email-prefixes",
        default = "default_generic_email_prefixes"
    )]
    pub generic_email_prefixes: Vec<String>,

    /// Path segments that mark attorney profile URLs
    #[serde(
        rename = "profile-path-segments",
        default = "default_profile_path_segments"
    )]
    pub profile_path_segments: Vec<String>,

    /// Words that may follow a name in a profile link ("Esq.", "Partner", ...)
    #[serde(
        rename = "profile-title-keywords",
        default = "default_profile_title_keywords"
    )]
    pub profile_title_keywords: Vec<String>,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            generic_email_prefixes: default_generic_email_prefixes(),
            profile_path_segments: default_profile_path_segments(),
            profile_title_keywords: default_profile_title_keywords(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the markdown run summary
    #[serde(rename = "summary-path", default = "default_summary_path")]
    pub summary_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            summary_path: default_summary_path(),
        }
    }
}

/// Search collaborator settings
///
/// The crawler never calls the search API itself; it only checks that the
/// credential is present before a run starts.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Environment variable holding the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,
}

/// A seed site entry
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntry {
    /// Firm front page URL
    pub url: String,

    /// Practice area the firm was selected for
    #[serde(rename = "practice-area", default)]
    pub practice_area: Option<String>,

    /// Locations the firm was selected for
    #[serde(rename = "location-filters", default)]
    pub location_filters: Vec<String>,
}

fn default_concurrency() -> u32 {
    8
}

fn default_burst() -> u32 {
    1
}

fn default_politeness_delay() -> u64 {
    500
}

fn default_timeout() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_delay() -> u64 {
    500
}

fn default_max_profile_links() -> usize {
    25
}

fn default_max_pages_per_site() -> usize {
    40
}

fn default_max_crawl_delay() -> u64 {
    60
}

fn default_max_page_bytes() -> u64 {
    2 * 1024 * 1024
}

fn default_vcard_max_bytes() -> u64 {
    100 * 1024
}

fn default_summary_path() -> String {
    "./crawl-summary.md".to_string()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_generic_email_prefixes() -> Vec<String> {
    strings(&[
        "info",
        "contact",
        "admin",
        "office",
        "sales",
        "support",
        "webmaster",
        "noreply",
    ])
}

fn default_profile_path_segments() -> Vec<String> {
    strings(&["attorney", "lawyer", "profile", "team", "our-people", "bio"])
}

fn default_profile_title_keywords() -> Vec<String> {
    strings(&[
        "esq",
        "esquire",
        "partner",
        "associate",
        "attorney",
        "counsel",
        "shareholder",
        "principal",
        "founder",
    ])
}

//! Data model shared by the crawler, the aggregator, and the output layer

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use url::Url;

/// Index of a seed within the run, assigned in input order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeedId(pub usize);

impl fmt::Display for SeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seed-{}", self.0)
    }
}

/// A law firm's top-level website selected for crawling
///
/// Immutable for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedSite {
    pub id: SeedId,
    pub base_url: Url,
    pub practice_area: Option<String>,
    pub location_filters: Vec<String>,
}

impl SeedSite {
    pub fn new(id: SeedId, base_url: Url) -> Self {
        Self {
            id,
            base_url,
            practice_area: None,
            location_filters: Vec::new(),
        }
    }

    pub fn with_practice_area(mut self, practice_area: Option<String>) -> Self {
        self.practice_area = practice_area;
        self
    }

    pub fn with_location_filters(mut self, filters: Vec<String>) -> Self {
        self.location_filters = filters;
        self
    }
}

/// Hop distance from the seed page
///
/// Only two depths exist, so a profile page can never spawn further tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Depth {
    Seed,
    Profile,
}

impl Depth {
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Seed => 0,
            Self::Profile => 1,
        }
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// One page fetch scheduled on behalf of a seed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub url: Url,
    pub depth: Depth,
    pub origin_seed: SeedId,
    /// Position among the seed's discovered profile links (0 for the seed page)
    pub discovery_index: usize,
}

impl CrawlTask {
    pub fn seed_page(seed: &SeedSite) -> Self {
        Self {
            url: seed.base_url.clone(),
            depth: Depth::Seed,
            origin_seed: seed.id,
            discovery_index: 0,
        }
    }

    pub fn profile_page(url: Url, origin_seed: SeedId, discovery_index: usize) -> Self {
        Self {
            url,
            depth: Depth::Profile,
            origin_seed,
            discovery_index,
        }
    }
}

/// A phone number with a digits-only canonical form
///
/// Equality and ordering use the canonical form only, so `(555) 123-4567`
/// and `555.123.4567` are the same number.
#[derive(Debug, Clone)]
pub struct PhoneNumber {
    pub canonical: String,
    pub display: String,
}

impl PhoneNumber {
    pub fn new(canonical: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            canonical: canonical.into(),
            display: display.into(),
        }
    }
}

impl PartialEq for PhoneNumber {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for PhoneNumber {}

impl PartialOrd for PhoneNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PhoneNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display)
    }
}

/// Everything the extractor found on one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageExtractionResult {
    pub source_url: Url,
    pub emails: BTreeSet<String>,
    pub phones: BTreeSet<PhoneNumber>,
    pub vcard_links: BTreeSet<String>,
    pub pdf_links: BTreeSet<String>,
    pub image_links: BTreeSet<String>,
    pub is_profile_page: bool,
}

impl PageExtractionResult {
    pub fn empty(source_url: Url) -> Self {
        Self {
            source_url,
            emails: BTreeSet::new(),
            phones: BTreeSet::new(),
            vcard_links: BTreeSet::new(),
            pdf_links: BTreeSet::new(),
            image_links: BTreeSet::new(),
            is_profile_page: false,
        }
    }

    pub fn has_contacts(&self) -> bool {
        !self.emails.is_empty() || !self.phones.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_contacts()
            && self.vcard_links.is_empty()
            && self.pdf_links.is_empty()
            && self.image_links.is_empty()
    }
}

/// A downloaded vCard, base64-encoded for text exports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VCardArtifact {
    pub source_url: String,
    pub byte_size: u64,
    pub encoded_content: String,
}

impl VCardArtifact {
    pub fn from_bytes(source_url: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            source_url: source_url.into(),
            byte_size: bytes.len() as u64,
            encoded_content: STANDARD.encode(bytes),
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.encoded_content)
    }
}

/// Why a vCard reference carries no content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VCardSkipReason {
    /// Declared or streamed size passed the ceiling
    TooLarge { limit: u64, observed: u64 },
    /// Disallowed by the site's robots.txt
    Excluded,
    /// Already downloaded earlier in the run
    Duplicate,
    /// Network or HTTP failure
    Failed(String),
}

impl fmt::Display for VCardSkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLarge { limit, observed } => {
                write!(f, "too large ({} bytes, limit {})", observed, limit)
            }
            Self::Excluded => write!(f, "excluded by robots.txt"),
            Self::Duplicate => write!(f, "duplicate"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Result of trying to download one vCard link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VCardOutcome {
    Downloaded(VCardArtifact),
    Skipped {
        source_url: String,
        reason: VCardSkipReason,
    },
}

impl VCardOutcome {
    pub fn source_url(&self) -> &str {
        match self {
            Self::Downloaded(artifact) => &artifact.source_url,
            Self::Skipped { source_url, .. } => source_url,
        }
    }

    pub fn is_downloaded(&self) -> bool {
        matches!(self, Self::Downloaded(_))
    }
}

/// Why a task never reached the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Disallowed by robots.txt
    Excluded,
    /// URL already fetched (or claimed) earlier in the run
    Duplicate,
    /// Run was cancelled before the task finished
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Excluded => "excluded",
            Self::Duplicate => "duplicate",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// How a task settled
#[derive(Debug, Clone)]
pub enum TaskResult {
    Succeeded {
        extraction: PageExtractionResult,
        vcards: Vec<VCardOutcome>,
        attempts: u32,
    },
    Failed {
        error: String,
        attempts: u32,
    },
    Skipped(SkipReason),
}

/// One settled task, as streamed from the coordinator
///
/// `spawned` is the number of profile tasks this task enqueued. It is only
/// non-zero for seed pages, and the aggregator uses it to learn how many
/// outcomes to expect for the seed.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task: CrawlTask,
    pub result: TaskResult,
    pub spawned: usize,
}

/// Failure provenance kept on a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub url: String,
    pub depth: Depth,
    pub reason: String,
}

/// Contacts found on the seed page itself
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactSet {
    pub emails: BTreeSet<String>,
    pub phones: BTreeSet<PhoneNumber>,
    pub vcards: Vec<VCardOutcome>,
}

impl ContactSet {
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty() && self.phones.is_empty() && self.vcards.is_empty()
    }
}

/// Contacts attributed to one attorney profile page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileContacts {
    pub profile_url: String,
    pub emails: BTreeSet<String>,
    pub phones: BTreeSet<PhoneNumber>,
    pub vcards: Vec<VCardOutcome>,
    pub images: BTreeSet<String>,
}

impl ProfileContacts {
    pub fn new(profile_url: impl Into<String>) -> Self {
        Self {
            profile_url: profile_url.into(),
            emails: BTreeSet::new(),
            phones: BTreeSet::new(),
            vcards: Vec::new(),
            images: BTreeSet::new(),
        }
    }

    /// True when there is nothing worth exporting for this profile
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
            && self.phones.is_empty()
            && self.vcards.is_empty()
            && self.images.is_empty()
    }
}

/// The finished result for one seed site
#[derive(Debug, Clone)]
pub struct FirmRecord {
    pub seed_site: SeedSite,
    pub firm_level_contacts: ContactSet,
    pub profile_level_contacts: Vec<ProfileContacts>,
    pub pdf_links: BTreeSet<String>,
    pub image_links: BTreeSet<String>,
    pub failures: Vec<TaskFailure>,
    /// URLs that were skipped, with the reason
    pub skipped: Vec<(String, SkipReason)>,
    pub pages_fetched: usize,
    pub finalized_at: DateTime<Utc>,
}

impl FirmRecord {
    /// True when the seed page itself could not be fetched
    pub fn seed_failed(&self) -> bool {
        self.failures.iter().any(|f| f.depth == Depth::Seed)
    }

    /// Distinct emails across firm and profile level
    pub fn email_count(&self) -> usize {
        self.firm_level_contacts.emails.len()
            + self
                .profile_level_contacts
                .iter()
                .map(|p| p.emails.len())
                .sum::<usize>()
    }

    /// Distinct phone numbers across firm and profile level
    pub fn phone_count(&self) -> usize {
        self.firm_level_contacts.phones.len()
            + self
                .profile_level_contacts
                .iter()
                .map(|p| p.phones.len())
                .sum::<usize>()
    }

    /// All vCard outcomes, firm level first
    pub fn vcards(&self) -> impl Iterator<Item = &VCardOutcome> {
        self.firm_level_contacts
            .vcards
            .iter()
            .chain(self.profile_level_contacts.iter().flat_map(|p| p.vcards.iter()))
    }

    pub fn has_contacts(&self) -> bool {
        self.email_count() > 0 || self.phone_count() > 0
    }
}

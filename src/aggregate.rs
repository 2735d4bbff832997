//! Result aggregation
//!
//! Folds the coordinator's outcome stream into one [`FirmRecord`] per seed.
//! Outcomes arrive in completion order and interleave across seeds; a
//! record is assembled only once every task spawned for its seed has
//! settled, which the aggregator learns from the seed page's outcome
//! (`1 + spawned` tasks in total).
//!
//! Contacts are deduplicated across a firm's pages by canonical form. The
//! seed page's contacts are firm-level; a contact also seen on a profile
//! page stays firm-level, and one seen on several profiles belongs to the
//! earliest profile in discovery order. Profiles left with nothing to
//! report are dropped.

use crate::model::{
    ContactSet, CrawlTask, Depth, FirmRecord, PageExtractionResult, ProfileContacts, SeedId,
    SeedSite, SkipReason, TaskFailure, TaskOutcome, TaskResult, VCardOutcome, VCardSkipReason,
};
use chrono::Utc;
use std::collections::{BTreeSet, HashMap, HashSet};

/// How far one seed has progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedProgress {
    /// Tasks settled so far
    pub settled: usize,

    /// Total tasks for the seed; unknown until the seed page settles
    pub expected: Option<usize>,
}

impl SeedProgress {
    pub fn is_complete(&self) -> bool {
        self.expected == Some(self.settled)
    }
}

/// Finalized seeds against all seeds in the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunProgress {
    pub finalized: usize,
    pub total: usize,
}

/// A fetched page waiting for its seed to finalize
#[derive(Debug)]
struct PageResult {
    task: CrawlTask,
    extraction: PageExtractionResult,
    vcards: Vec<VCardOutcome>,
}

/// A record under construction
#[derive(Debug)]
struct PendingFirm {
    seed: SeedSite,
    progress: SeedProgress,
    seed_page: Option<PageResult>,
    profiles: Vec<PageResult>,
    failures: Vec<TaskFailure>,
    skipped: Vec<(String, SkipReason)>,
}

impl PendingFirm {
    fn new(seed: SeedSite) -> Self {
        Self {
            seed,
            progress: SeedProgress {
                settled: 0,
                expected: None,
            },
            seed_page: None,
            profiles: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn absorb(&mut self, outcome: TaskOutcome) {
        let TaskOutcome {
            task,
            result,
            spawned,
        } = outcome;

        self.progress.settled += 1;
        if task.depth == Depth::Seed {
            self.progress.expected = Some(1 + spawned);
        }

        match result {
            TaskResult::Succeeded {
                extraction, vcards, ..
            } => {
                let page = PageResult {
                    task,
                    extraction,
                    vcards,
                };
                match page.task.depth {
                    Depth::Seed => self.seed_page = Some(page),
                    Depth::Profile => self.profiles.push(page),
                }
            }
            TaskResult::Failed { error, .. } => self.failures.push(TaskFailure {
                url: task.url.to_string(),
                depth: task.depth,
                reason: error,
            }),
            TaskResult::Skipped(reason) => self.skipped.push((task.url.to_string(), reason)),
        }
    }

    /// Builds the final record from everything collected
    fn assemble(mut self) -> FirmRecord {
        let mut firm = ContactSet::default();
        let mut pdf_links = BTreeSet::new();
        let mut image_links = BTreeSet::new();
        let mut seed_images = BTreeSet::new();
        let mut pages_fetched = 0;

        if let Some(page) = self.seed_page.take() {
            pages_fetched += 1;
            firm.emails = page.extraction.emails;
            firm.phones = page.extraction.phones;
            firm.vcards = page.vcards;
            pdf_links.extend(page.extraction.pdf_links);
            seed_images = page.extraction.image_links;
            image_links.extend(seed_images.iter().cloned());
        }

        self.profiles.sort_by_key(|p| p.task.discovery_index);

        let mut claimed_emails: HashSet<String> = firm.emails.iter().cloned().collect();
        let mut claimed_phones: HashSet<String> =
            firm.phones.iter().map(|p| p.canonical.clone()).collect();
        let mut profiles = Vec::new();

        for page in self.profiles {
            pages_fetched += 1;
            let extraction = page.extraction;
            let mut profile = ProfileContacts::new(page.task.url.as_str());

            for email in extraction.emails {
                if claimed_emails.insert(email.clone()) {
                    profile.emails.insert(email);
                }
            }
            for phone in extraction.phones {
                if claimed_phones.insert(phone.canonical.clone()) {
                    profile.phones.insert(phone);
                }
            }
            profile.images = extraction
                .image_links
                .iter()
                .filter(|img| !seed_images.contains(*img))
                .cloned()
                .collect();
            profile.vcards = page.vcards;

            pdf_links.extend(extraction.pdf_links);
            image_links.extend(extraction.image_links);
            profiles.push(profile);
        }

        drop_redundant_vcard_skips(&mut firm, &mut profiles);
        profiles.retain(|p| !p.is_empty());

        FirmRecord {
            seed_site: self.seed,
            firm_level_contacts: firm,
            profile_level_contacts: profiles,
            pdf_links,
            image_links,
            failures: self.failures,
            skipped: self.skipped,
            pages_fetched,
            finalized_at: Utc::now(),
        }
    }
}

/// Removes "duplicate" vCard skips for URLs this firm already has an
/// outcome for
fn drop_redundant_vcard_skips(firm: &mut ContactSet, profiles: &mut [ProfileContacts]) {
    let is_duplicate_skip = |v: &VCardOutcome| {
        matches!(
            v,
            VCardOutcome::Skipped {
                reason: VCardSkipReason::Duplicate,
                ..
            }
        )
    };

    let known: HashSet<String> = firm
        .vcards
        .iter()
        .chain(profiles.iter().flat_map(|p| p.vcards.iter()))
        .filter(|v| !is_duplicate_skip(*v))
        .map(|v| v.source_url().to_string())
        .collect();

    let keep = |v: &VCardOutcome| !(is_duplicate_skip(v) && known.contains(v.source_url()));
    firm.vcards.retain(keep);
    for profile in profiles.iter_mut() {
        profile.vcards.retain(keep);
    }
}

/// Incremental aggregator over all seeds of a run
#[derive(Debug)]
pub struct FirmAggregator {
    pending: HashMap<SeedId, PendingFirm>,
    total: usize,
    finalized: usize,
}

impl FirmAggregator {
    pub fn new(seeds: &[SeedSite]) -> Self {
        let pending = seeds
            .iter()
            .map(|seed| (seed.id, PendingFirm::new(seed.clone())))
            .collect();
        Self {
            pending,
            total: seeds.len(),
            finalized: 0,
        }
    }

    /// Folds in one outcome; returns the seed's record if it just finalized
    pub fn ingest(&mut self, outcome: TaskOutcome) -> Option<FirmRecord> {
        let seed_id = outcome.task.origin_seed;
        let Some(firm) = self.pending.get_mut(&seed_id) else {
            tracing::warn!(
                "Outcome for {} arrived for unknown or finalized {}",
                outcome.task.url,
                seed_id
            );
            return None;
        };

        if outcome.task.depth == Depth::Seed {
            match &outcome.result {
                TaskResult::Succeeded { .. } => tracing::info!(
                    "Seed {} fetched, {} profile page(s) queued",
                    firm.seed.base_url,
                    outcome.spawned
                ),
                TaskResult::Failed { error, .. } => {
                    tracing::warn!("Seed {} failed: {}", firm.seed.base_url, error)
                }
                TaskResult::Skipped(reason) => {
                    tracing::info!("Seed {} skipped ({})", firm.seed.base_url, reason)
                }
            }
        }

        firm.absorb(outcome);
        if !firm.progress.is_complete() {
            return None;
        }

        let firm = self.pending.remove(&seed_id)?;
        self.finalized += 1;
        let record = firm.assemble();
        tracing::info!(
            "Finalized {}: {} email(s), {} phone(s), {} profile(s), {} failure(s)",
            record.seed_site.base_url,
            record.email_count(),
            record.phone_count(),
            record.profile_level_contacts.len(),
            record.failures.len()
        );
        Some(record)
    }

    /// Progress of one seed, or None once its record has been handed out
    pub fn progress(&self, seed: SeedId) -> Option<SeedProgress> {
        self.pending.get(&seed).map(|f| f.progress)
    }

    /// Progress of every unfinished seed
    pub fn pending_progress(&self) -> Vec<(SeedId, SeedProgress)> {
        let mut all: Vec<_> = self
            .pending
            .iter()
            .map(|(id, firm)| (*id, firm.progress))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    pub fn overall_progress(&self) -> RunProgress {
        RunProgress {
            finalized: self.finalized,
            total: self.total,
        }
    }

    /// Ends aggregation, discarding records that never finalized
    ///
    /// Returns the seeds whose records were discarded.
    pub fn finish(&mut self) -> Vec<SeedSite> {
        let mut discarded: Vec<SeedSite> = self.pending.drain().map(|(_, f)| f.seed).collect();
        discarded.sort_by_key(|s| s.id);
        discarded
    }
}

/// Aggregates a complete set of outcomes for one seed
///
/// Outcomes belonging to other seeds are ignored. If the outcomes do not
/// cover every task, the record is assembled from what is there.
pub fn aggregate<I>(seed_site: &SeedSite, outcomes: I) -> FirmRecord
where
    I: IntoIterator<Item = TaskOutcome>,
{
    let mut firm = PendingFirm::new(seed_site.clone());
    for outcome in outcomes {
        if outcome.task.origin_seed == seed_site.id {
            firm.absorb(outcome);
        }
    }
    firm.assemble()
}

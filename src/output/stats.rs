//! Run statistics
//!
//! Counters are fed from the outcome stream as it is consumed, so they are
//! complete even when a run is cancelled and some records are discarded.

use crate::model::{FirmRecord, TaskOutcome, TaskResult, VCardOutcome};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Counters for one crawl run
#[derive(Debug, Clone)]
pub struct RunStatistics {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Seed sites handed to the run
    pub seeds_total: usize,

    /// Seed sites whose records were finalized
    pub seeds_finalized: usize,

    /// Finalized seeds whose front page could not be fetched
    pub seeds_failed: usize,

    /// HTTP attempts for pages, retries included
    pub requests: u64,

    pub pages_succeeded: u64,
    pub pages_failed: u64,

    /// Tasks that never reached the network, by reason
    pub skipped: BTreeMap<String, u64>,

    pub vcards_downloaded: u64,
    pub vcards_skipped: u64,
    pub vcard_bytes: u64,

    /// Distinct contacts across finalized records
    pub emails_found: u64,
    pub phones_found: u64,
    pub profiles_found: u64,
}

impl RunStatistics {
    pub fn new(seeds_total: usize) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            seeds_total,
            seeds_finalized: 0,
            seeds_failed: 0,
            requests: 0,
            pages_succeeded: 0,
            pages_failed: 0,
            skipped: BTreeMap::new(),
            vcards_downloaded: 0,
            vcards_skipped: 0,
            vcard_bytes: 0,
            emails_found: 0,
            phones_found: 0,
            profiles_found: 0,
        }
    }

    pub fn record_outcome(&mut self, outcome: &TaskOutcome) {
        match &outcome.result {
            TaskResult::Succeeded {
                vcards, attempts, ..
            } => {
                self.requests += u64::from(*attempts);
                self.pages_succeeded += 1;
                for vcard in vcards {
                    match vcard {
                        VCardOutcome::Downloaded(artifact) => {
                            self.vcards_downloaded += 1;
                            self.vcard_bytes += artifact.byte_size;
                        }
                        VCardOutcome::Skipped { .. } => self.vcards_skipped += 1,
                    }
                }
            }
            TaskResult::Failed { attempts, .. } => {
                self.requests += u64::from(*attempts);
                self.pages_failed += 1;
            }
            TaskResult::Skipped(reason) => {
                *self.skipped.entry(reason.to_string()).or_insert(0) += 1;
            }
        }
    }

    pub fn record_firm(&mut self, record: &FirmRecord) {
        self.seeds_finalized += 1;
        if record.seed_failed() {
            self.seeds_failed += 1;
        }
        self.emails_found += record.email_count() as u64;
        self.phones_found += record.phone_count() as u64;
        self.profiles_found += record.profile_level_contacts.len() as u64;
    }

    /// Stamps the end of the run
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }

    pub fn total_skipped(&self) -> u64 {
        self.skipped.values().sum()
    }

    /// Share of settled page tasks that succeeded, as a percentage
    pub fn success_rate(&self) -> f64 {
        let settled = self.pages_succeeded + self.pages_failed + self.total_skipped();
        if settled == 0 {
            return 0.0;
        }
        (self.pages_succeeded as f64 / settled as f64) * 100.0
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &RunStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Seed Sites:");
    println!("  Total: {}", stats.seeds_total);
    println!("  Finalized: {}", stats.seeds_finalized);
    println!("  Front page failed: {}", stats.seeds_failed);
    let unfinished = stats.seeds_total.saturating_sub(stats.seeds_finalized);
    if unfinished > 0 {
        println!("  Discarded (unfinished): {}", unfinished);
    }
    println!();

    println!("Pages:");
    println!("  Requests issued: {}", stats.requests);
    println!("  Succeeded: {}", stats.pages_succeeded);
    println!("  Failed: {}", stats.pages_failed);
    if !stats.skipped.is_empty() {
        println!("  Skipped:");
        for (reason, count) in &stats.skipped {
            println!("    {}: {}", reason, count);
        }
    }
    println!();

    println!("Contacts:");
    println!("  Emails: {}", stats.emails_found);
    println!("  Phones: {}", stats.phones_found);
    println!("  Attorney profiles: {}", stats.profiles_found);
    println!(
        "  vCards: {} downloaded ({} bytes), {} skipped",
        stats.vcards_downloaded, stats.vcard_bytes, stats.vcards_skipped
    );
    println!();

    if let Some(duration) = stats.duration_seconds() {
        println!("Duration: {} seconds", duration);
    }
    println!(
        "Success Rate: {:.1}% ({} pages fetched)",
        stats.success_rate(),
        stats.pages_succeeded
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CrawlTask, PageExtractionResult, SeedId, SeedSite, SkipReason, VCardArtifact,
        VCardSkipReason,
    };
    use url::Url;

    fn seed() -> SeedSite {
        SeedSite::new(SeedId(0), Url::parse("https://firm.example/").unwrap())
    }

    #[test]
    fn test_counts_outcomes_by_kind() {
        let seed = seed();
        let mut stats = RunStatistics::new(1);

        stats.record_outcome(&TaskOutcome {
            task: CrawlTask::seed_page(&seed),
            result: TaskResult::Succeeded {
                extraction: PageExtractionResult::empty(seed.base_url.clone()),
                vcards: vec![
                    VCardOutcome::Downloaded(VCardArtifact::from_bytes(
                        "https://firm.example/a.vcf",
                        b"BEGIN:VCARD",
                    )),
                    VCardOutcome::Skipped {
                        source_url: "https://firm.example/b.vcf".to_string(),
                        reason: VCardSkipReason::TooLarge {
                            limit: 10,
                            observed: 500,
                        },
                    },
                ],
                attempts: 2,
            },
            spawned: 2,
        });

        let profile = Url::parse("https://firm.example/attorney/x").unwrap();
        stats.record_outcome(&TaskOutcome {
            task: CrawlTask::profile_page(profile.clone(), seed.id, 1),
            result: TaskResult::Failed {
                error: "timeout".to_string(),
                attempts: 3,
            },
            spawned: 0,
        });
        stats.record_outcome(&TaskOutcome {
            task: CrawlTask::profile_page(profile, seed.id, 2),
            result: TaskResult::Skipped(SkipReason::Duplicate),
            spawned: 0,
        });

        assert_eq!(stats.requests, 5);
        assert_eq!(stats.pages_succeeded, 1);
        assert_eq!(stats.pages_failed, 1);
        assert_eq!(stats.skipped.get("duplicate"), Some(&1));
        assert_eq!(stats.vcards_downloaded, 1);
        assert_eq!(stats.vcards_skipped, 1);
        assert_eq!(stats.vcard_bytes, 11);
        assert!((stats.success_rate() - 33.33).abs() < 0.01);
    }

    #[test]
    fn test_success_rate_with_no_pages() {
        let stats = RunStatistics::new(0);
        assert_eq!(stats.success_rate(), 0.0);
        assert!(stats.duration_seconds().is_none());
    }

    #[test]
    fn test_finish_sets_duration() {
        let mut stats = RunStatistics::new(1);
        stats.finish();
        assert!(stats.duration_seconds().is_some());
    }
}

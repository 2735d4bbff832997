//! Markdown summary generation
//!
//! This module renders a human-readable summary of a run: statistics first,
//! then one section per finalized firm record.

use crate::crawler::CrawlReport;
use crate::model::{FirmRecord, PhoneNumber, VCardOutcome};
use crate::output::error::OutputResult;
use crate::output::stats::RunStatistics;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Image and PDF lists longer than this are truncated in the summary
const LINK_LIST_LIMIT: usize = 20;

/// Writes the markdown summary for a run to `output_path`
pub fn generate_markdown_summary(
    report: &CrawlReport,
    config_hash: &str,
    output_path: &Path,
) -> OutputResult<()> {
    let markdown = format_markdown_summary(report, config_hash);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run as markdown
pub fn format_markdown_summary(report: &CrawlReport, config_hash: &str) -> String {
    let mut md = String::new();

    md.push_str("# Counsel-Crawler Run Summary\n\n");
    push_run_information(&mut md, &report.statistics, config_hash, report.cancelled);
    push_statistics(&mut md, &report.statistics);

    if !report.records.is_empty() {
        md.push_str("## Firms\n\n");
        for record in &report.records {
            push_firm(&mut md, record);
        }
    }

    if !report.discarded.is_empty() {
        md.push_str("## Discarded Seeds\n\n");
        md.push_str("These seeds were still being crawled when the run stopped.\n\n");
        for seed in &report.discarded {
            md.push_str(&format!("- {}\n", seed.base_url));
        }
        md.push('\n');
    }

    md.push_str("---\n\n");
    md.push_str("*Generated by Counsel-Crawler*\n");

    md
}

fn push_run_information(md: &mut String, stats: &RunStatistics, config_hash: &str, cancelled: bool) {
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Started**: {}\n", stats.started_at.to_rfc3339()));
    if let Some(finished) = stats.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
    }
    if let Some(duration) = stats.duration_seconds() {
        md.push_str(&format!(
            "- **Duration**: {} seconds ({:.2} minutes)\n",
            duration,
            duration as f64 / 60.0
        ));
    }
    let status = if cancelled { "cancelled" } else { "completed" };
    md.push_str(&format!("- **Status**: {}\n", status));
    md.push_str(&format!("- **Config Hash**: {}\n\n", config_hash));
}

fn push_statistics(md: &mut String, stats: &RunStatistics) {
    md.push_str("## Statistics\n\n");
    md.push_str("| Metric | Count |\n");
    md.push_str("|--------|-------|\n");
    md.push_str(&format!("| Seed sites | {} |\n", stats.seeds_total));
    md.push_str(&format!("| Records finalized | {} |\n", stats.seeds_finalized));
    md.push_str(&format!("| Front page failures | {} |\n", stats.seeds_failed));
    md.push_str(&format!("| Requests issued | {} |\n", stats.requests));
    md.push_str(&format!("| Pages fetched | {} |\n", stats.pages_succeeded));
    md.push_str(&format!("| Pages failed | {} |\n", stats.pages_failed));
    for (reason, count) in &stats.skipped {
        md.push_str(&format!("| Skipped ({}) | {} |\n", reason, count));
    }
    md.push_str(&format!("| Emails | {} |\n", stats.emails_found));
    md.push_str(&format!("| Phones | {} |\n", stats.phones_found));
    md.push_str(&format!("| Attorney profiles | {} |\n", stats.profiles_found));
    md.push_str(&format!("| vCards downloaded | {} |\n", stats.vcards_downloaded));
    md.push_str(&format!("| vCards skipped | {} |\n", stats.vcards_skipped));
    md.push_str(&format!(
        "\n**Success Rate**: {:.2}%\n\n",
        stats.success_rate()
    ));
}

fn push_firm(md: &mut String, record: &FirmRecord) {
    let seed = &record.seed_site;
    md.push_str(&format!("### {}\n\n", seed.base_url));

    if let Some(area) = &seed.practice_area {
        md.push_str(&format!("- **Practice Area**: {}\n", area));
    }
    if !seed.location_filters.is_empty() {
        md.push_str(&format!(
            "- **Locations**: {}\n",
            seed.location_filters.join("; ")
        ));
    }
    md.push_str(&format!("- **Pages Fetched**: {}\n", record.pages_fetched));
    md.push_str(&format!(
        "- **Finalized**: {}\n\n",
        record.finalized_at.to_rfc3339()
    ));

    let firm = &record.firm_level_contacts;
    if !firm.is_empty() {
        md.push_str("**Firm contacts**\n\n");
        push_contacts(md, &firm.emails, &firm.phones, &firm.vcards);
        md.push('\n');
    }

    if !record.profile_level_contacts.is_empty() {
        md.push_str("**Attorney profiles**\n\n");
        md.push_str("| Profile | Emails | Phones | vCards |\n");
        md.push_str("|---------|--------|--------|--------|\n");
        for profile in &record.profile_level_contacts {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                profile.profile_url,
                join_or_dash(profile.emails.iter().map(String::as_str)),
                join_or_dash(profile.phones.iter().map(|p| p.display.as_str())),
                join_or_dash(profile.vcards.iter().map(VCardOutcome::source_url)),
            ));
        }
        md.push('\n');
    }

    push_link_list(md, "PDFs", &record.pdf_links);
    push_link_list(md, "Images", &record.image_links);

    if !record.failures.is_empty() {
        md.push_str("**Failures**\n\n");
        for failure in &record.failures {
            md.push_str(&format!(
                "- {} (depth {}): {}\n",
                failure.url, failure.depth, failure.reason
            ));
        }
        md.push('\n');
    }

    if !record.skipped.is_empty() {
        md.push_str("**Skipped**\n\n");
        for (url, reason) in &record.skipped {
            md.push_str(&format!("- {} ({})\n", url, reason));
        }
        md.push('\n');
    }

    if !record.has_contacts() && record.failures.is_empty() {
        md.push_str("*No contacts found.*\n\n");
    }
}

fn push_contacts(
    md: &mut String,
    emails: &BTreeSet<String>,
    phones: &BTreeSet<PhoneNumber>,
    vcards: &[VCardOutcome],
) {
    for email in emails {
        md.push_str(&format!("- Email: {}\n", email));
    }
    for phone in phones {
        md.push_str(&format!("- Phone: {} ({})\n", phone.display, phone.canonical));
    }
    for vcard in vcards {
        match vcard {
            VCardOutcome::Downloaded(artifact) => md.push_str(&format!(
                "- vCard: {} ({} bytes)\n",
                artifact.source_url, artifact.byte_size
            )),
            VCardOutcome::Skipped { source_url, reason } => {
                md.push_str(&format!("- vCard: {} (skipped: {})\n", source_url, reason))
            }
        }
    }
}

fn push_link_list(md: &mut String, title: &str, links: &BTreeSet<String>) {
    if links.is_empty() {
        return;
    }

    md.push_str(&format!("**{}** ({})\n\n", title, links.len()));
    for link in links.iter().take(LINK_LIST_LIMIT) {
        md.push_str(&format!("- {}\n", link));
    }
    if links.len() > LINK_LIST_LIMIT {
        md.push_str(&format!("- ... and {} more\n", links.len() - LINK_LIST_LIMIT));
    }
    md.push('\n');
}

fn join_or_dash<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let joined = items.collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "-".to_string()
    } else {
        joined
    }
}

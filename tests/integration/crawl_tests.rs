//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock firm websites and run the full
//! crawl cycle end-to-end: fetch, discovery, extraction, vCards, aggregation.

use counsel_crawler::config::{parse_config, Config};
use counsel_crawler::crawler::{crawl, CrawlReport};
use counsel_crawler::model::{
    FirmRecord, SeedId, SeedSite, SkipReason, VCardOutcome, VCardSkipReason,
};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with no politeness delay and fast retries
fn create_test_config() -> Config {
    parse_config(
        r#"
[crawler]
max-concurrent-requests = 4
politeness-delay-ms = 0
request-timeout-secs = 5
max-retries = 2
retry-base-delay-ms = 1

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[vcard]
max-bytes = 102400
"#,
    )
    .expect("test config is valid")
}

fn seed(id: usize, server: &MockServer, page: &str) -> SeedSite {
    let url = Url::parse(&format!("{}{}", server.uri(), page)).expect("valid seed URL");
    SeedSite::new(SeedId(id), url)
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>Firm</title></head><body>{}</body></html>", body),
        "text/html",
    )
}

async fn mount_page(server: &MockServer, page: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(html(body))
        .mount(server)
        .await;
}

async fn run(config: Config, seeds: Vec<SeedSite>) -> CrawlReport {
    tokio::time::timeout(
        Duration::from_secs(30),
        crawl(config, seeds, CancellationToken::new()),
    )
    .await
    .expect("crawl finished in time")
    .expect("crawl succeeded")
}

fn record_for<'a>(report: &'a CrawlReport, id: usize) -> &'a FirmRecord {
    report
        .records
        .iter()
        .find(|r| r.seed_site.id == SeedId(id))
        .expect("record for seed")
}

#[tokio::test]
async fn test_seed_and_profile_contacts_attributed() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"
        <header>Call us: (303) 555-0100 or email info@smithlaw.example</header>
        <nav><a href="/about">About</a><a href="/contact">Contact</a></nav>
        <ul>
          <li><a href="/attorneys/jane-doe">Jane Doe, Esq.</a></li>
          <li><a href="/attorneys/john-roe">John Roe</a></li>
        </ul>
        "#,
    )
    .await;
    mount_page(
        &server,
        "/attorneys/jane-doe",
        r#"
        <h1>Jane Doe</h1>
        <p>Email: <a href="mailto:jane.doe@smithlaw.example">jane.doe@smithlaw.example</a></p>
        <p>Direct: 303.555.0142 | Main: (303) 555-0100</p>
        "#,
    )
    .await;
    mount_page(
        &server,
        "/attorneys/john-roe",
        r#"
        <h1>John Roe</h1>
        <p>john.roe@smithlaw.example</p>
        <p>Also reach Jane at jane.doe@smithlaw.example</p>
        "#,
    )
    .await;

    let report = run(create_test_config(), vec![seed(0, &server, "/")]).await;

    assert!(!report.cancelled);
    assert!(report.discarded.is_empty());
    assert_eq!(report.records.len(), 1);

    let record = &report.records[0];
    assert_eq!(record.pages_fetched, 3);
    assert!(record.failures.is_empty());

    let firm = &record.firm_level_contacts;
    assert!(firm.emails.is_empty(), "generic address filtered: {:?}", firm.emails);
    assert_eq!(
        firm.phones.iter().map(|p| p.canonical.as_str()).collect::<Vec<_>>(),
        vec!["3035550100"]
    );

    let profiles = &record.profile_level_contacts;
    assert_eq!(profiles.len(), 2);
    assert!(profiles[0].profile_url.ends_with("/attorneys/jane-doe"));
    assert!(profiles[0].emails.contains("jane.doe@smithlaw.example"));
    assert_eq!(
        profiles[0].phones.iter().map(|p| p.canonical.as_str()).collect::<Vec<_>>(),
        vec!["3035550142"]
    );

    assert!(profiles[1].profile_url.ends_with("/attorneys/john-roe"));
    assert_eq!(
        profiles[1].emails.iter().cloned().collect::<Vec<_>>(),
        vec!["john.roe@smithlaw.example".to_string()]
    );

    assert_eq!(report.statistics.seeds_finalized, 1);
    assert_eq!(report.statistics.pages_succeeded, 3);
}

#[tokio::test]
async fn test_shared_profile_fetched_once() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"
        <a href="/attorneys/shared-partner">Pat Smith</a>
        <a href="/attorneys/shared-partner#bio">Read Pat's bio</a>
        "#,
    )
    .await;
    mount_page(
        &server,
        "/b",
        r#"<a href="/attorneys/shared-partner">Pat Smith</a>"#,
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/attorneys/shared-partner"))
        .respond_with(html("<h1>Pat Smith</h1><p>pat@firm.example</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let report = run(
        create_test_config(),
        vec![seed(0, &server, "/"), seed(1, &server, "/b")],
    )
    .await;

    assert_eq!(report.records.len(), 2);

    let with_profile = report
        .records
        .iter()
        .filter(|r| {
            r.profile_level_contacts
                .iter()
                .any(|p| p.emails.contains("pat@firm.example"))
        })
        .count();
    assert_eq!(with_profile, 1);

    let duplicates = report
        .records
        .iter()
        .flat_map(|r| r.skipped.iter())
        .filter(|(_, reason)| *reason == SkipReason::Duplicate)
        .count();
    assert_eq!(duplicates, 1);

    server.verify().await;
}

#[tokio::test]
async fn test_robots_disallow_respected() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("User-agent: *\nDisallow: /attorneys/private\n"),
        )
        .mount(&server)
        .await;

    mount_page(
        &server,
        "/",
        r#"
        <a href="/attorneys/private-partner">Alex Hidden</a>
        <a href="/attorneys/jane-doe">Jane Doe</a>
        "#,
    )
    .await;
    mount_page(&server, "/attorneys/jane-doe", "<p>jane@firm.example</p>").await;

    Mock::given(method("GET"))
        .and(path("/attorneys/private-partner"))
        .respond_with(html("<p>hidden@firm.example</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let report = run(create_test_config(), vec![seed(0, &server, "/")]).await;
    let record = record_for(&report, 0);

    assert_eq!(record.skipped.len(), 1);
    assert!(record.skipped[0].0.ends_with("/attorneys/private-partner"));
    assert_eq!(record.skipped[0].1, SkipReason::Excluded);
    assert_eq!(record.email_count(), 1);

    server.verify().await;
}

#[tokio::test]
async fn test_failing_seed_does_not_affect_others() {
    let broken = MockServer::start().await;
    let healthy = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&broken)
        .await;

    mount_page(
        &healthy,
        "/",
        r#"<p>Call (720) 555-0199</p><a href="/attorneys/sam-lee">Sam Lee</a>"#,
    )
    .await;
    mount_page(&healthy, "/attorneys/sam-lee", "<p>sam.lee@healthy.example</p>").await;

    let report = run(
        create_test_config(),
        vec![seed(0, &broken, "/"), seed(1, &healthy, "/")],
    )
    .await;

    assert_eq!(report.records.len(), 2);

    let failed = record_for(&report, 0);
    assert!(failed.seed_failed());
    assert!(!failed.has_contacts());
    assert!(failed.profile_level_contacts.is_empty());

    let ok = record_for(&report, 1);
    assert!(!ok.seed_failed());
    assert_eq!(ok.phone_count(), 1);
    assert_eq!(ok.email_count(), 1);

    assert_eq!(report.statistics.seeds_failed, 1);
    assert_eq!(report.statistics.pages_failed, 1);

    broken.verify().await;
}

#[tokio::test]
async fn test_oversized_vcard_skipped() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"
        <p>lee@bigfirm.example</p>
        <a href="/vcards/office.vcf">Download our vCard</a>
        "#,
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/vcards/office.vcf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![b'A'; 500 * 1024], "text/vcard"))
        .mount(&server)
        .await;

    let report = run(create_test_config(), vec![seed(0, &server, "/")]).await;
    let record = record_for(&report, 0);

    assert!(record.firm_level_contacts.emails.contains("lee@bigfirm.example"));
    assert_eq!(record.firm_level_contacts.vcards.len(), 1);
    match &record.firm_level_contacts.vcards[0] {
        VCardOutcome::Skipped {
            reason: VCardSkipReason::TooLarge { limit, .. },
            ..
        } => assert_eq!(*limit, 102400),
        other => panic!("expected size skip, got {:?}", other),
    }
    assert_eq!(report.statistics.vcards_skipped, 1);
}

#[tokio::test]
async fn test_vcard_content_preserved() {
    let server = MockServer::start().await;
    let vcard: &[u8] = b"BEGIN:VCARD\r\nVERSION:3.0\r\nFN:Jane Doe\r\nEMAIL:jane@firm.example\r\nEND:VCARD\r\n";

    mount_page(&server, "/", r#"<a href="/attorneys/jane-doe">Jane Doe</a>"#).await;
    mount_page(
        &server,
        "/attorneys/jane-doe",
        r#"<h1>Jane Doe</h1><a href="/attorneys/jane-doe/vcard">Download vCard</a>"#,
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/attorneys/jane-doe/vcard"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vcard.to_vec(), "text/vcard"))
        .expect(1)
        .mount(&server)
        .await;

    let report = run(create_test_config(), vec![seed(0, &server, "/")]).await;
    let record = record_for(&report, 0);

    let downloaded: Vec<_> = record
        .vcards()
        .filter_map(|v| match v {
            VCardOutcome::Downloaded(artifact) => Some(artifact),
            VCardOutcome::Skipped { .. } => None,
        })
        .collect();
    assert_eq!(downloaded.len(), 1);
    assert_eq!(downloaded[0].byte_size, vcard.len() as u64);
    assert_eq!(downloaded[0].decode().unwrap(), vcard);

    assert_eq!(record.profile_level_contacts.len(), 1);
    assert_eq!(record.profile_level_contacts[0].vcards.len(), 1);

    server.verify().await;
}

#[tokio::test]
async fn test_profile_link_cap() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"
        <a href="/attorneys/first-person">First Person</a>
        <a href="/attorneys/second-person">Second Person</a>
        "#,
    )
    .await;
    mount_page(&server, "/attorneys/first-person", "<p>first@firm.example</p>").await;

    Mock::given(method("GET"))
        .and(path("/attorneys/second-person"))
        .respond_with(html("<p>second@firm.example</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = create_test_config();
    config.crawler.max_profile_links = 1;

    let report = run(config, vec![seed(0, &server, "/")]).await;
    let record = record_for(&report, 0);

    assert_eq!(record.pages_fetched, 2);
    assert_eq!(record.profile_level_contacts.len(), 1);

    server.verify().await;
}

#[tokio::test]
async fn test_politeness_delay_spaces_requests() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<a href="/attorneys/jane-doe">Jane Doe</a>"#).await;
    mount_page(&server, "/attorneys/jane-doe", "<p>jane@firm.example</p>").await;

    let mut config = create_test_config();
    config.crawler.politeness_delay_ms = 200;

    let started = Instant::now();
    let report = run(config, vec![seed(0, &server, "/")]).await;

    // robots.txt, seed page, profile page: two gaps of at least 200ms
    assert!(started.elapsed() >= Duration::from_millis(400));
    assert_eq!(record_for(&report, 0).pages_fetched, 2);
}

#[tokio::test]
async fn test_cancellation_discards_unfinished_records() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<p>slow@firm.example</p>").set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        crawl(create_test_config(), vec![seed(0, &server, "/")], cancel),
    )
    .await
    .expect("cancelled crawl returns promptly")
    .expect("crawl succeeded");

    assert!(report.cancelled);
    assert!(report.records.is_empty());
    assert_eq!(report.discarded.len(), 1);
    assert_eq!(report.discarded[0].id, SeedId(0));
}

#[tokio::test]
async fn test_no_seeds_is_an_error() {
    let result = crawl(create_test_config(), vec![], CancellationToken::new()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_server_error_retried_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, "/", "<p>Reach Dana at dana@firm.example</p>").await;

    let report = run(create_test_config(), vec![seed(0, &server, "/")]).await;
    let record = record_for(&report, 0);

    assert!(!record.seed_failed());
    assert!(record.firm_level_contacts.emails.contains("dana@firm.example"));
    assert_eq!(report.statistics.requests, 2);
}

#[tokio::test]
async fn test_rate_limited_seed_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, "/", "<p>Call (720) 555-0142</p>").await;

    let report = run(create_test_config(), vec![seed(0, &server, "/")]).await;
    let record = record_for(&report, 0);

    assert!(!record.seed_failed());
    assert_eq!(record.phone_count(), 1);
    assert_eq!(report.statistics.requests, 2);
}

#[tokio::test]
async fn test_not_found_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let report = run(create_test_config(), vec![seed(0, &server, "/")]).await;
    let record = record_for(&report, 0);

    assert!(record.seed_failed());
    assert!(record.failures[0].reason.contains("404"));
    assert_eq!(report.statistics.requests, 1);

    server.verify().await;
}

#[tokio::test]
async fn test_seed_redirect_followed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/home"))
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/home",
        r#"<p>Main line (303) 555-0100</p><a href="attorneys/jane-doe">Jane Doe</a>"#,
    )
    .await;
    mount_page(&server, "/attorneys/jane-doe", "<h1>Jane Doe</h1><p>jane@firm.example</p>").await;

    let report = run(create_test_config(), vec![seed(0, &server, "/")]).await;
    let record = record_for(&report, 0);

    assert!(!record.seed_failed());
    assert_eq!(record.firm_level_contacts.phones.len(), 1);
    assert_eq!(record.profile_level_contacts.len(), 1);
    assert!(record.profile_level_contacts[0]
        .emails
        .contains("jane@firm.example"));
}

#[tokio::test]
async fn test_redirect_to_visited_profile_not_extracted_twice() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"
        <a href="/attorneys/jane-doe">Jane Doe</a>
        <a href="/attorneys/j-doe">J. Doe</a>
        "#,
    )
    .await;
    mount_page(&server, "/attorneys/jane-doe", "<h1>Jane Doe</h1><p>jane@firm.example</p>").await;
    Mock::given(method("GET"))
        .and(path("/attorneys/j-doe"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/attorneys/jane-doe"))
        .mount(&server)
        .await;

    let report = run(create_test_config(), vec![seed(0, &server, "/")]).await;
    let record = record_for(&report, 0);

    assert_eq!(record.profile_level_contacts.len(), 1);
    assert!(record.profile_level_contacts[0]
        .emails
        .contains("jane@firm.example"));
    let duplicates = record
        .skipped
        .iter()
        .filter(|(_, reason)| *reason == SkipReason::Duplicate)
        .count();
    assert_eq!(duplicates, 1);
}

#[tokio::test]
async fn test_oversized_page_fails_without_retry() {
    let server = MockServer::start().await;
    let filler = "<p>lorem ipsum dolor sit amet</p>".repeat(2048);

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&format!("<p>big@firm.example</p>{}", filler)))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = create_test_config();
    config.crawler.max_page_bytes = 4096;

    let report = run(config, vec![seed(0, &server, "/")]).await;
    let record = record_for(&report, 0);

    assert!(record.seed_failed());
    assert!(!record.has_contacts());
    assert!(record.failures[0].reason.contains("larger than 4096"));
    assert_eq!(report.statistics.requests, 1);

    server.verify().await;
}

#[tokio::test]
async fn test_absurd_crawl_delay_ignored() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("User-agent: *\nCrawl-delay: 1e30\nDisallow: /private\n"),
        )
        .mount(&server)
        .await;
    mount_page(&server, "/", r#"<a href="/attorneys/jane-doe">Jane Doe</a>"#).await;
    mount_page(&server, "/attorneys/jane-doe", "<p>jane@firm.example</p>").await;

    let report = run(create_test_config(), vec![seed(0, &server, "/")]).await;
    let record = record_for(&report, 0);

    assert!(record.failures.is_empty(), "unexpected failures: {:?}", record.failures);
    assert_eq!(record.email_count(), 1);
}

#[tokio::test]
async fn test_long_crawl_delay_clamped() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("User-agent: *\nCrawl-delay: 3600\nDisallow: /private\n"),
        )
        .mount(&server)
        .await;
    mount_page(&server, "/", "<p>jane@firm.example</p>").await;

    let mut config = create_test_config();
    config.crawler.max_crawl_delay_secs = 1;

    let started = Instant::now();
    let report = run(config, vec![seed(0, &server, "/")]).await;

    assert!(started.elapsed() >= Duration::from_secs(1));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(record_for(&report, 0).email_count(), 1);
}

#[tokio::test]
async fn test_throttled_domain_does_not_starve_pool() {
    let busy = MockServer::start().await;
    let quiet = MockServer::start().await;

    let links: String = (0..6)
        .map(|i| format!(r#"<a href="/attorneys/partner-{i}">Partner Number{i}</a>"#))
        .collect();
    mount_page(&busy, "/", &links).await;
    for i in 0..6 {
        mount_page(
            &busy,
            &format!("/attorneys/partner-{i}"),
            &format!("<p>partner{i}@busy.example</p>"),
        )
        .await;
    }

    mount_page(&quiet, "/", r#"<a href="/attorneys/solo-counsel">Solo Counsel</a>"#).await;
    mount_page(&quiet, "/attorneys/solo-counsel", "<p>solo@quiet.example</p>").await;

    let mut config = create_test_config();
    config.crawler.max_concurrent_requests = 2;
    config.crawler.politeness_delay_ms = 500;

    // localhost keeps the second site on its own politeness schedule
    let quiet_url = Url::parse(&format!("http://localhost:{}/", quiet.address().port()))
        .expect("valid seed URL");
    let seeds = vec![
        seed(0, &busy, "/"),
        SeedSite::new(SeedId(1), quiet_url),
    ];

    let report = run(config, seeds).await;

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.records[0].seed_site.id, SeedId(1));
    assert_eq!(record_for(&report, 1).email_count(), 1);
    assert_eq!(record_for(&report, 0).profile_level_contacts.len(), 6);
}

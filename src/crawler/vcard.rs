//! vCard downloading
//!
//! vCards are small text attachments linked from profile pages. They are
//! downloaded under a hard size ceiling and stored base64-encoded so they can
//! be embedded in text exports. Nothing here fails a task: every problem
//! becomes a skipped reference that keeps the URL.

use crate::crawler::fetcher::read_body;
use crate::model::{VCardArtifact, VCardOutcome, VCardSkipReason};
use reqwest::Client;
use url::Url;

/// Downloads one vCard, enforcing `max_bytes`
///
/// A declared `Content-Length` above the ceiling aborts before the body is
/// read. Otherwise the body is streamed and the download stops as soon as
/// more than `max_bytes` have arrived.
pub async fn download_vcard(client: &Client, url: &Url, max_bytes: u64) -> VCardOutcome {
    let skipped = |reason: VCardSkipReason| {
        tracing::debug!("Skipping vCard {}: {}", url, reason);
        VCardOutcome::Skipped {
            source_url: url.to_string(),
            reason,
        }
    };

    let response = match client.get(url.clone()).send().await {
        Ok(r) => r,
        Err(e) => return skipped(VCardSkipReason::Failed(e.to_string())),
    };

    if !response.status().is_success() {
        return skipped(VCardSkipReason::Failed(format!(
            "HTTP {}",
            response.status().as_u16()
        )));
    }

    if let Some(declared) = response.content_length() {
        if declared > max_bytes {
            return skipped(VCardSkipReason::TooLarge {
                limit: max_bytes,
                observed: declared,
            });
        }
    }

    let body = match read_body(response, max_bytes).await {
        Ok(body) => body,
        Err(e) => return skipped(VCardSkipReason::Failed(e.to_string())),
    };
    if body.truncated {
        return skipped(VCardSkipReason::TooLarge {
            limit: max_bytes,
            observed: body.bytes.len() as u64,
        });
    }

    let artifact = VCardArtifact::from_bytes(url.as_str(), &body.bytes);
    tracing::debug!("Downloaded vCard {} ({} bytes)", url, artifact.byte_size);
    VCardOutcome::Downloaded(artifact)
}

use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use counsel_crawler::url::extract_domain;
///
/// let url = Url::parse("https://WWW.Firm.Example/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("www.firm.example".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the site-level domain of a host: lowercase, without `www.`
pub fn site_domain(host: &str) -> String {
    let host = host.to_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}

/// Checks whether `candidate` lies within the site rooted at `seed`
///
/// The site covers the seed's domain (without `www.`) and every subdomain
/// of it, so `firm.com` accepts `www.firm.com` and `lawyers.firm.com` but
/// not `notfirm.com`.
pub fn is_same_site(seed: &Url, candidate: &Url) -> bool {
    let (Some(seed_host), Some(candidate_host)) = (seed.host_str(), candidate.host_str()) else {
        return false;
    };

    let base = site_domain(seed_host);
    let host = site_domain(candidate_host);
    host == base || host.ends_with(&format!(".{}", base))
}

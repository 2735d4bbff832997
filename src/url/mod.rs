//! URL handling for Counsel-Crawler
//!
//! Normalization produces the dedup key for the visited set; the domain
//! helpers scope discovered links to the seed's site.

mod domain;
mod normalize;

pub use domain::{extract_domain, is_same_site, site_domain};
pub use normalize::normalize_url;

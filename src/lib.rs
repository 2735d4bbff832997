//! Counsel-Crawler: a focused contact crawler for law-firm websites
//!
//! This crate takes a set of selected firm websites (seed sites), crawls each
//! front page plus the attorney profile pages it links to, and extracts
//! contact artifacts (emails, phones, vCards, PDFs, images) into one
//! [`model::FirmRecord`] per seed. It respects robots.txt, throttles per
//! domain, fetches each URL at most once per run, and isolates failures to
//! the task that produced them.

pub mod aggregate;
pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod robots;
pub mod seeds;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Counsel-Crawler operations
///
/// Only configuration and setup problems surface through this type; errors
/// raised while crawling one task are recorded on that task's outcome.
#[derive(Debug, Error)]
pub enum CounselError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No seed sites to crawl")]
    NoSeeds,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Missing search credential: environment variable {0} is not set")]
    MissingCredential(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Counsel-Crawler operations
pub type Result<T> = std::result::Result<T, CounselError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use aggregate::{aggregate, FirmAggregator};
pub use config::Config;
pub use crawler::{Coordinator, TaskOutcome};
pub use model::{FirmRecord, PageExtractionResult, SeedSite};
pub use state::{DomainState, TaskState};
pub use url::{extract_domain, normalize_url};

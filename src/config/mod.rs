//! Configuration module for Counsel-Crawler
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use counsel_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Worker pool size: {}", config.crawler.max_concurrent_requests);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, HeuristicsConfig, OutputConfig, SearchConfig, SeedEntry,
    UserAgentConfig, VCardConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, ensure_search_credential, load_config, load_config_with_hash,
    parse_config,
};

//! Output module for run statistics and summaries
//!
//! This module handles:
//! - Counting what a run did, task by task and firm by firm
//! - Printing statistics at the end of a run
//! - Writing a markdown summary of finalized records

mod error;
mod markdown;
pub mod stats;

pub use error::{OutputError, OutputResult};
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{print_statistics, RunStatistics};

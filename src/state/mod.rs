//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `TaskState`: lifecycle of one crawl task (pending, in flight, retrying, terminal)
//! - `TaskLifecycle`: enforces legal transitions and counts attempts
//! - `DomainState`: per-domain politeness bookkeeping

mod domain_state;
mod task_state;

pub use domain_state::DomainState;
pub use task_state::{InvalidTransition, TaskLifecycle, TaskState};

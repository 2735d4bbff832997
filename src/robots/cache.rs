//! Shared robots.txt cache
//!
//! One entry per origin, shared by every worker. Each entry is a
//! `OnceCell`, so concurrent workers hitting a new origin wait on a single
//! robots.txt fetch instead of issuing their own.

use crate::robots::ParsedRobots;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

type Slot = Arc<OnceCell<ParsedRobots>>;

/// Run-scoped robots.txt store keyed by origin
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: Mutex<HashMap<String, Slot>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the rules for `origin`, running `fetch` at most once per origin
    ///
    /// The map lock is only held to look up or insert the slot; the fetch
    /// itself runs outside it, so different origins never wait on each other.
    pub async fn get_or_fetch<F, Fut>(&self, origin: &str, fetch: F) -> ParsedRobots
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ParsedRobots>,
    {
        let slot = self.slot(origin);
        slot.get_or_init(fetch).await.clone()
    }

    /// Returns the cached rules for `origin` without fetching
    #[cfg(test)]
    pub fn get(&self, origin: &str) -> Option<ParsedRobots> {
        let entries = self.lock();
        entries.get(origin).and_then(|slot| slot.get().cloned())
    }

    /// Number of origins with a resolved entry
    pub fn len(&self) -> usize {
        self.lock().values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, origin: &str) -> Slot {
        let mut entries = self.lock();
        let slot = entries
            .entry(origin.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()));
        Arc::clone(slot)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        // A poisoned map still holds valid entries
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

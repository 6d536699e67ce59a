#![forbid(unsafe_code)]

//! Per-observer build counts.
//!
//! The counter is plain state owned by whoever drives the tree. Nothing is
//! process-wide, so parallel tests never see each other's builds.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;

/// Shared map from observer name to number of builds.
///
/// Clones share the same counts.
#[derive(Debug, Clone, Default)]
pub struct BuildCounter {
    counts: Rc<RefCell<AHashMap<String, usize>>>,
}

impl BuildCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one build of `name` and return its new count.
    pub fn record(&self, name: &str) -> usize {
        let mut counts = self.counts.borrow_mut();
        let count = counts.entry(name.to_owned()).or_insert(0);
        *count += 1;
        *count
    }

    /// Builds of `name` so far; zero for unknown names.
    #[must_use]
    pub fn get(&self, name: &str) -> usize {
        self.counts.borrow().get(name).copied().unwrap_or(0)
    }

    /// Sum over every observer.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.borrow().values().sum()
    }

    /// Snapshot sorted by name.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, usize)> {
        let mut entries: Vec<_> = self
            .counts
            .borrow()
            .iter()
            .map(|(name, count)| (name.clone(), *count))
            .collect();
        entries.sort();
        entries
    }

    pub fn reset(&self) {
        self.counts.borrow_mut().clear();
    }
}

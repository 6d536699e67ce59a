#![forbid(unsafe_code)]

//! Per-(observer, scope) dependency sets.
//!
//! # Invariants
//!
//! 1. No two entries share an identity: adding an entry equal to an existing
//!    one (same token or same key) replaces it in place.
//! 2. Entries keep their insertion order.
//! 3. Every entry is evaluated on a replacement, even after one notified, so
//!    stateful decisions always see every change.
//! 4. Carried state moves between entries paired by identity on `add`, and by
//!    position on [`DependencySet::adopt_from`].

use std::fmt;

use aspect_core::{Dependency, IdentityToken, Waker};

pub struct DependencySet<V> {
    entries: Vec<Dependency<V>>,
}

impl<V> Clone for DependencySet<V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<V> Default for DependencySet<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> fmt::Debug for DependencySet<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(Dependency::label))
            .finish()
    }
}

impl<V> DependencySet<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set, collapsing entries with the same identity (last wins).
    pub fn from_dependencies(deps: impl IntoIterator<Item = Dependency<V>>) -> Self {
        let mut set = Self::new();
        for dep in deps {
            set.add(dep);
        }
        set
    }

    /// Add or replace. Returns `true` when an entry with the same identity
    /// was replaced.
    pub fn add(&mut self, dep: Dependency<V>) -> bool {
        match self.entries.iter_mut().find(|existing| **existing == dep) {
            Some(existing) => {
                dep.adopt_from(existing);
                *existing = dep;
                true
            }
            None => {
                self.entries.push(dep);
                false
            }
        }
    }

    /// Remove the entry equal to `dep`.
    pub fn remove(&mut self, dep: &Dependency<V>) -> bool {
        let before = self.entries.len();
        self.entries.retain(|existing| existing != dep);
        self.entries.len() != before
    }

    /// Remove every entry carrying `token`.
    pub fn remove_token(&mut self, token: &IdentityToken) -> bool {
        let before = self.entries.len();
        self.entries.retain(|existing| existing.token() != Some(token));
        self.entries.len() != before
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dependency<V>> {
        self.entries.iter()
    }

    #[must_use]
    pub fn is_unconditional(&self) -> bool {
        self.entries.iter().any(Dependency::is_unconditional)
    }

    /// Whether any entry notifies. All entries are evaluated.
    #[must_use]
    pub fn should_notify(&self, new: &V, old: &V) -> bool {
        let mut notify = false;
        for dep in &self.entries {
            notify |= dep.should_notify(new, old);
        }
        notify
    }

    pub fn bind_waker(&self, waker: &Waker) {
        for dep in &self.entries {
            dep.bind_waker(waker);
        }
    }

    /// Hand each entry of `previous` to the entry at the same position here.
    pub fn adopt_from(&self, previous: &DependencySet<V>) {
        for (dep, old) in self.entries.iter().zip(&previous.entries) {
            dep.adopt_from(old);
        }
    }
}

impl<V: 'static> DependencySet<V> {
    /// The "depends on everything" set.
    #[must_use]
    pub fn unconditional() -> Self {
        Self {
            entries: vec![Dependency::unconditional()],
        }
    }
}

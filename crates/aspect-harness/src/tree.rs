#![forbid(unsafe_code)]

//! A minimal hosting tree.
//!
//! Each mounted observer has a position ([`Env`]) and a build closure that
//! reads through a [`Watch`]. [`Tree::pump`] plays the role of a frame tick:
//! due timers fire, dirty observers are collected from every scope the tree
//! knows about, and each one is rebuilt against its position. A rebuild
//! replaces the observer's registrations, and scopes it no longer reads are
//! told to forget it.
//!
//! # Invariants
//!
//! 1. A mounted observer is built exactly once per mount and once per pump
//!    pass in which it is dirty.
//! 2. After a successful rebuild, the observer is registered with exactly
//!    the scopes its last build read from.
//! 3. Unmounting removes the observer from every scope it was registered with.

use std::rc::Rc;

use ahash::AHashSet;
use aspect_core::{LabClock, Result, Timers};
use aspect_runtime::{AnyScope, Env, ObserverId, Watch};
use web_time::Duration;

use crate::counter::BuildCounter;

/// Build closure for one observer.
pub type BuildFn = Box<dyn for<'e> FnMut(&mut Watch<'e>) -> Result<()>>;

/// Upper bound on rebuild passes within one pump.
const MAX_PASSES: usize = 32;

struct Node {
    id: ObserverId,
    name: String,
    env: Env,
    build: BuildFn,
    scopes: Vec<Rc<dyn AnyScope>>,
}

/// Deterministic hosting tree on a lab clock.
pub struct Tree {
    clock: LabClock,
    timers: Timers,
    counter: BuildCounter,
    nodes: Vec<Node>,
}

impl std::fmt::Debug for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tree")
            .field("nodes", &self.nodes.iter().map(|n| &n.name).collect::<Vec<_>>())
            .field("timers", &self.timers)
            .field("builds", &self.counter.total())
            .finish()
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    #[must_use]
    pub fn new() -> Self {
        Self::with_counter(BuildCounter::new())
    }

    /// A tree recording builds into an existing counter.
    #[must_use]
    pub fn with_counter(counter: BuildCounter) -> Self {
        let clock = LabClock::new();
        let timers = Timers::lab(&clock);
        Self {
            clock,
            timers,
            counter,
            nodes: Vec::new(),
        }
    }

    /// Timer queue for debounced projections used in this tree.
    #[must_use]
    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    #[must_use]
    pub fn clock(&self) -> &LabClock {
        &self.clock
    }

    #[must_use]
    pub fn counter(&self) -> &BuildCounter {
        &self.counter
    }

    /// Builds recorded for `name`.
    #[must_use]
    pub fn builds(&self, name: &str) -> usize {
        self.counter.get(name)
    }

    #[must_use]
    pub fn observer(&self, name: &str) -> Option<ObserverId> {
        self.nodes.iter().find(|n| n.name == name).map(|n| n.id)
    }

    /// Scopes `observer` is currently registered with.
    #[must_use]
    pub fn registrations(&self, observer: ObserverId) -> usize {
        self.index_of(observer)
            .map_or(0, |i| self.nodes[i].scopes.len())
    }

    fn index_of(&self, observer: ObserverId) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == observer)
    }

    /// Mount an observer at `env` and build it once.
    ///
    /// # Errors
    ///
    /// Whatever the first build returns; the observer stays mounted and is
    /// retried when it becomes dirty.
    pub fn mount(
        &mut self,
        name: impl Into<String>,
        env: &Env,
        build: impl for<'e> FnMut(&mut Watch<'e>) -> Result<()> + 'static,
    ) -> Result<ObserverId> {
        let id = ObserverId::next();
        self.nodes.push(Node {
            id,
            name: name.into(),
            env: env.clone(),
            build: Box::new(build),
            scopes: Vec::new(),
        });
        self.rebuild(self.nodes.len() - 1)?;
        Ok(id)
    }

    /// Remove `observer` and its registrations.
    pub fn unmount(&mut self, observer: ObserverId) -> bool {
        let Some(index) = self.index_of(observer) else {
            return false;
        };
        let node = self.nodes.remove(index);
        for scope in &node.scopes {
            scope.remove_observer(node.id);
        }
        tracing::debug!(message = "harness.unmount", observer = node.id.raw(), name = %node.name);
        true
    }

    fn rebuild(&mut self, index: usize) -> Result<()> {
        let Node {
            id,
            name,
            env,
            build,
            scopes,
        } = &mut self.nodes[index];
        let mut watch = env.watch(*id);
        build(&mut watch)?;
        let fresh = watch.commit()?;
        for stale in scopes
            .iter()
            .filter(|old| fresh.iter().all(|s| s.scope_id() != old.scope_id()))
        {
            stale.remove_observer(*id);
        }
        *scopes = fresh;
        let count = self.counter.record(name);
        tracing::debug!(message = "harness.build", observer = id.raw(), name = %name, count);
        Ok(())
    }

    fn collect_dirty(&self) -> Vec<ObserverId> {
        let mut seen_scopes = AHashSet::new();
        let mut dirty = Vec::new();
        for scope in self.nodes.iter().flat_map(|n| n.scopes.iter()) {
            if !seen_scopes.insert(scope.scope_id()) {
                continue;
            }
            for id in scope.take_dirty() {
                if !dirty.contains(&id) {
                    dirty.push(id);
                }
            }
        }
        dirty
    }

    /// Fire due timers and rebuild dirty observers until the tree settles.
    ///
    /// Returns the number of rebuilds.
    ///
    /// # Errors
    ///
    /// The first failing rebuild; observers after it stay dirty-free but
    /// unbuilt for this pass.
    pub fn pump(&mut self) -> Result<usize> {
        let fired = self.timers.fire_due();
        let mut rebuilt = 0;
        for _ in 0..MAX_PASSES {
            let dirty = self.collect_dirty();
            if dirty.is_empty() {
                tracing::trace!(message = "harness.pump", fired, rebuilt);
                return Ok(rebuilt);
            }
            for id in dirty {
                // unmounted observers may still sit in a dirty list
                if let Some(index) = self.index_of(id) {
                    self.rebuild(index)?;
                    rebuilt += 1;
                }
            }
        }
        tracing::warn!(message = "harness.unsettled", passes = MAX_PASSES, rebuilt);
        Ok(rebuilt)
    }

    /// Advance the lab clock by `delta`, then pump.
    ///
    /// # Errors
    ///
    /// As [`Tree::pump`].
    pub fn advance(&mut self, delta: Duration) -> Result<usize> {
        self.clock.advance(delta);
        self.pump()
    }
}

#![forbid(unsafe_code)]

//! Scope containers.
//!
//! A [`Scope<V>`] holds the current value of one shared `V`, the dependency
//! sets registered against it, and the owner's update handler. It is the
//! engine side of the hosting tree's callbacks:
//!
//! - registration: [`Scope::add_dependency`], [`Scope::remove_dependency`],
//!   [`Scope::remove_token`], [`Scope::set_unconditional`],
//!   [`Scope::set_dependencies`];
//! - value replacement: [`Scope::replace`], returning the notified observers;
//! - mutation: [`Scope::request_update`], forwarded to the owner.
//!
//! # Invariants
//!
//! 1. Replacing the value with an equal one is a no-op: no version bump and
//!    no projection is consulted.
//! 2. Every accepted replacement installs a new value reference and bumps
//!    `version` by exactly 1.
//! 3. All dependency sets are evaluated against the same old/new pair.
//! 4. An observer never registers an empty set; removing its last entry
//!    removes the observer.
//! 5. The dirty list holds each observer at most once, in notification order.
//!
//! # Failure Modes
//!
//! - **Handler absent**: update requests are accepted and discarded.
//! - **Decision panics**: the new value is already installed; observers
//!   evaluated before the panic are not marked dirty.

use std::any::type_name;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use aspect_core::{AspectError, Dependency, IdentityToken, Result, Waker};

use crate::dependency_set::DependencySet;
use crate::observer::ObserverId;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Owner callback receiving update requests.
pub type UpdateHandler<V> = Rc<dyn Fn(&Scope<V>, V)>;

struct ScopeState<V> {
    value: Rc<V>,
    version: u64,
    token: Option<IdentityToken>,
    handler: Option<UpdateHandler<V>>,
    /// Registration order.
    dependents: Vec<(ObserverId, DependencySet<V>)>,
    dirty: Vec<ObserverId>,
}

impl<V> ScopeState<V> {
    fn set_mut(&mut self, observer: ObserverId) -> Option<&mut DependencySet<V>> {
        self.dependents
            .iter_mut()
            .find(|(id, _)| *id == observer)
            .map(|(_, set)| set)
    }

    fn is_registered(&self, observer: ObserverId) -> bool {
        self.dependents.iter().any(|(id, _)| *id == observer)
    }

    fn mark_dirty(&mut self, observer: ObserverId) {
        if !self.dirty.contains(&observer) {
            self.dirty.push(observer);
        }
    }

    fn prune(&mut self, observer: ObserverId) {
        self.dependents
            .retain(|(id, set)| *id != observer || !set.is_empty());
    }
}

struct ScopeInner<V> {
    id: u64,
    state: RefCell<ScopeState<V>>,
}

/// Shared handle to one scope. Clones refer to the same scope.
pub struct Scope<V> {
    inner: Rc<ScopeInner<V>>,
}

impl<V> Clone for Scope<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Scope<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("token", &state.token)
            .field("value", &state.value)
            .field("version", &state.version)
            .field("dependents", &state.dependents.len())
            .finish()
    }
}

impl<V: 'static> Scope<V> {
    /// A scope holding `value`, with no token and no update handler.
    #[must_use]
    pub fn new(value: V) -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
                state: RefCell::new(ScopeState {
                    value: Rc::new(value),
                    version: 0,
                    token: None,
                    handler: None,
                    dependents: Vec::new(),
                    dirty: Vec::new(),
                }),
            }),
        }
    }

    /// Tag the scope so lookups can tell same-typed scopes apart.
    #[must_use]
    pub fn with_token(self, token: impl Into<IdentityToken>) -> Self {
        self.inner.state.borrow_mut().token = Some(token.into());
        self
    }

    /// Install the owner's handler for update requests.
    #[must_use]
    pub fn on_update(self, handler: impl Fn(&Scope<V>, V) + 'static) -> Self {
        self.inner.state.borrow_mut().handler = Some(Rc::new(handler));
        self
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    #[must_use]
    pub fn token(&self) -> Option<IdentityToken> {
        self.inner.state.borrow().token.clone()
    }

    /// Current value reference.
    #[must_use]
    pub fn value(&self) -> Rc<V> {
        Rc::clone(&self.inner.state.borrow().value)
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> V
    where
        V: Clone,
    {
        (*self.value()).clone()
    }

    /// Run `f` against the current value.
    pub fn with<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        let value = self.value();
        f(&value)
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.state.borrow().version
    }

    /// Observers currently registered, in registration order.
    #[must_use]
    pub fn dependents(&self) -> Vec<ObserverId> {
        self.inner
            .state
            .borrow()
            .dependents
            .iter()
            .map(|(id, _)| *id)
            .collect()
    }

    /// Clone of an observer's dependency set.
    #[must_use]
    pub fn dependencies(&self, observer: ObserverId) -> Option<DependencySet<V>> {
        self.inner
            .state
            .borrow()
            .dependents
            .iter()
            .find(|(id, _)| *id == observer)
            .map(|(_, set)| set.clone())
    }

    #[must_use]
    pub fn is_dependent(&self, observer: ObserverId) -> bool {
        self.inner.state.borrow().is_registered(observer)
    }

    fn waker(&self, observer: ObserverId) -> Waker {
        let weak: Weak<ScopeInner<V>> = Rc::downgrade(&self.inner);
        Waker::new((self.inner.id, observer.raw()), move || {
            let Some(inner) = weak.upgrade() else {
                return false;
            };
            let Ok(mut state) = inner.state.try_borrow_mut() else {
                return true;
            };
            if !state.is_registered(observer) {
                return false;
            }
            state.mark_dirty(observer);
            tracing::trace!(message = "scope.wake", scope = inner.id, observer = observer.raw());
            true
        })
    }

    /// Add `dep` to the observer's set, replacing an entry with the same
    /// identity. A replaced entry hands its carried state to `dep`.
    pub fn add_dependency(&self, observer: ObserverId, dep: Dependency<V>) {
        let waker = self.waker(observer);
        let mut state = self.inner.state.borrow_mut();
        let replaced = match state.set_mut(observer) {
            Some(set) => set.add(dep.clone()),
            None => {
                state
                    .dependents
                    .push((observer, DependencySet::from_dependencies([dep.clone()])));
                false
            }
        };
        drop(state);
        dep.bind_waker(&waker);
        tracing::trace!(
            message = "scope.register",
            scope = self.inner.id,
            observer = observer.raw(),
            replaced
        );
    }

    /// Replace the observer's whole set.
    ///
    /// Each new entry adopts the carried state of the previous entry at the
    /// same position, so stateful decisions survive the observer rebuilding
    /// its projections.
    ///
    /// # Errors
    ///
    /// [`AspectError::EmptyDependency`] when `deps` is empty; the previous
    /// set stays installed.
    pub fn set_dependencies(
        &self,
        observer: ObserverId,
        deps: impl IntoIterator<Item = Dependency<V>>,
    ) -> Result<()> {
        let set = DependencySet::from_dependencies(deps);
        if set.is_empty() {
            return Err(AspectError::EmptyDependency {
                observer: observer.raw(),
                scope: type_name::<V>(),
            });
        }
        let waker = self.waker(observer);
        let mut state = self.inner.state.borrow_mut();
        let count = set.len();
        match state.set_mut(observer) {
            Some(existing) => {
                set.adopt_from(existing);
                set.bind_waker(&waker);
                *existing = set;
            }
            None => {
                set.bind_waker(&waker);
                state.dependents.push((observer, set));
            }
        }
        tracing::trace!(
            message = "scope.register",
            scope = self.inner.id,
            observer = observer.raw(),
            count
        );
        Ok(())
    }

    /// Switch the observer to "depends on everything".
    pub fn set_unconditional(&self, observer: ObserverId) {
        let mut state = self.inner.state.borrow_mut();
        match state.set_mut(observer) {
            Some(existing) => *existing = DependencySet::unconditional(),
            None => state
                .dependents
                .push((observer, DependencySet::unconditional())),
        }
        tracing::trace!(
            message = "scope.unconditional",
            scope = self.inner.id,
            observer = observer.raw()
        );
    }

    /// Remove the entry equal to `dep`.
    pub fn remove_dependency(&self, observer: ObserverId, dep: &Dependency<V>) -> bool {
        let mut state = self.inner.state.borrow_mut();
        let removed = state.set_mut(observer).is_some_and(|set| set.remove(dep));
        state.prune(observer);
        removed
    }

    /// Remove the observer's entries carrying `token`.
    pub fn remove_token(&self, observer: ObserverId, token: &IdentityToken) -> bool {
        let mut state = self.inner.state.borrow_mut();
        let removed = state
            .set_mut(observer)
            .is_some_and(|set| set.remove_token(token));
        state.prune(observer);
        removed
    }

    /// Deregister the observer entirely.
    pub fn remove_observer(&self, observer: ObserverId) -> bool {
        let mut state = self.inner.state.borrow_mut();
        let before = state.dependents.len();
        state.dependents.retain(|(id, _)| *id != observer);
        state.dirty.retain(|id| *id != observer);
        state.dependents.len() != before
    }

    /// Observers notified since the last call, in notification order.
    pub fn take_dirty(&self) -> Vec<ObserverId> {
        std::mem::take(&mut self.inner.state.borrow_mut().dirty)
    }

    #[must_use]
    pub fn has_dirty(&self) -> bool {
        !self.inner.state.borrow().dirty.is_empty()
    }

    /// Hand `value` to the owner's handler, or discard it when there is none.
    pub fn request_update(&self, value: V) {
        let handler = self.inner.state.borrow().handler.clone();
        match handler {
            Some(handler) => {
                tracing::debug!(message = "scope.update", scope = self.inner.id, handled = true);
                handler(self, value);
            }
            None => {
                tracing::debug!(message = "scope.update", scope = self.inner.id, handled = false);
            }
        }
    }
}

impl<V: PartialEq + 'static> Scope<V> {
    /// Install `new` and return the observers whose projections decided to
    /// notify, in registration order.
    pub fn replace(&self, new: V) -> Vec<ObserverId> {
        let (old, dependents, version) = {
            let mut state = self.inner.state.borrow_mut();
            if *state.value == new {
                return Vec::new();
            }
            let old = std::mem::replace(&mut state.value, Rc::new(new));
            state.version += 1;
            (old, state.dependents.clone(), state.version)
        };
        let new = self.value();

        let span = tracing::debug_span!(
            "scope.replace",
            scope = type_name::<V>(),
            id = self.inner.id,
            version
        );
        let _guard = span.enter();

        // Evaluated without holding the borrow: decisions may reach back
        // into scopes.
        let notified: Vec<ObserverId> = dependents
            .iter()
            .filter(|(_, set)| set.should_notify(&new, &old))
            .map(|(id, _)| *id)
            .collect();

        let mut state = self.inner.state.borrow_mut();
        for id in &notified {
            if state.is_registered(*id) {
                state.mark_dirty(*id);
            }
        }
        tracing::debug!(
            message = "scope.replace",
            version,
            evaluated = dependents.len(),
            notified = notified.len()
        );
        notified
    }
}

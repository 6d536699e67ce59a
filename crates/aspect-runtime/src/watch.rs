#![forbid(unsafe_code)]

//! Single-use dependency collection for one observer build.
//!
//! A [`Watch`] resolves values like [`Env::read`] and records every
//! projection it resolved against a scope. Nothing is registered until
//! [`Watch::commit`] consumes the watch; each touched scope then receives the
//! observer's complete new set in one step. Dropping a watch uncommitted
//! leaves existing registrations untouched.

use std::any::Any;
use std::rc::Rc;

use aspect_core::{Aspect, Dependency, IdentityToken, Result};

use crate::env::Env;
use crate::observer::ObserverId;
use crate::registry::AnyScope;
use crate::scope::Scope;

trait Pending {
    fn scope_id(&self) -> u64;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn install(self: Box<Self>, observer: ObserverId) -> Result<Rc<dyn AnyScope>>;
}

struct PendingScope<V> {
    scope: Scope<V>,
    deps: Vec<Dependency<V>>,
}

impl<V: 'static> Pending for PendingScope<V> {
    fn scope_id(&self) -> u64 {
        self.scope.id()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn install(self: Box<Self>, observer: ObserverId) -> Result<Rc<dyn AnyScope>> {
        let PendingScope { scope, deps } = *self;
        scope.set_dependencies(observer, deps)?;
        Ok(Rc::new(scope))
    }
}

/// Dependency collector for one build of one observer.
#[must_use = "a Watch registers nothing until committed"]
pub struct Watch<'e> {
    env: &'e Env,
    observer: ObserverId,
    pending: Vec<Box<dyn Pending>>,
}

impl std::fmt::Debug for Watch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watch")
            .field("observer", &self.observer)
            .field("scopes", &self.pending.len())
            .finish()
    }
}

impl<'e> Watch<'e> {
    pub(crate) fn new(env: &'e Env, observer: ObserverId) -> Self {
        Self {
            env,
            observer,
            pending: Vec::new(),
        }
    }

    #[must_use]
    pub fn observer(&self) -> ObserverId {
        self.observer
    }

    fn record<V: 'static>(&mut self, scope: &Scope<V>, dep: Dependency<V>) {
        let id = scope.id();
        let slot = self
            .pending
            .iter_mut()
            .find(|p| p.scope_id() == id)
            .and_then(|p| p.as_any_mut().downcast_mut::<PendingScope<V>>());
        match slot {
            Some(pending) => pending.deps.push(dep),
            None => self.pending.push(Box::new(PendingScope {
                scope: scope.clone(),
                deps: vec![dep],
            })),
        }
    }

    fn resolve<V: 'static, A: Clone + 'static>(
        &mut self,
        token: Option<&IdentityToken>,
        aspect: &Aspect<V, A>,
    ) -> Result<Option<A>> {
        if let Some(value) = self.env.resolve_override(aspect)? {
            return Ok(Some(value));
        }
        match self.env.find::<V>(token) {
            Some(scope) => {
                self.record(&scope, aspect.dependency());
                Ok(Some(scope.with(|v| aspect.read(v))))
            }
            None => Ok(aspect.resolve_default(self.env)),
        }
    }

    /// Read `aspect` and depend on it.
    ///
    /// # Errors
    ///
    /// As [`Env::read`].
    pub fn get<V: 'static, A: Clone + 'static>(&mut self, aspect: &Aspect<V, A>) -> Result<A> {
        self.resolve(None, aspect)?
            .ok_or_else(|| Env::not_found(aspect))
    }

    /// Read `aspect` from the scope tagged `token` and depend on it.
    ///
    /// # Errors
    ///
    /// As [`Env::read`].
    pub fn get_tagged<V: 'static, A: Clone + 'static>(
        &mut self,
        token: &IdentityToken,
        aspect: &Aspect<V, A>,
    ) -> Result<A> {
        self.resolve(Some(token), aspect)?
            .ok_or_else(|| Env::not_found(aspect))
    }

    /// Read `aspect`, yielding `None` on a soft miss.
    ///
    /// # Errors
    ///
    /// [`aspect_core::AspectError::OverrideTypeMismatch`] for a mistyped
    /// override.
    pub fn get_optional<V: 'static, A: Clone + 'static>(
        &mut self,
        aspect: &Aspect<V, A>,
    ) -> Result<Option<A>> {
        self.resolve(None, aspect)
    }

    /// Install every collected set and return the scopes now registered.
    ///
    /// # Errors
    ///
    /// Propagates the first registration error; scopes installed before it
    /// keep their new sets.
    pub fn commit(self) -> Result<Vec<Rc<dyn AnyScope>>> {
        let observer = self.observer;
        let scopes = self
            .pending
            .into_iter()
            .map(|pending| pending.install(observer))
            .collect::<Result<Vec<_>>>()?;
        tracing::trace!(message = "watch.commit", observer = observer.raw(), scopes = scopes.len());
        Ok(scopes)
    }
}

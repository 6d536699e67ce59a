#![forbid(unsafe_code)]

//! Read-only access to the scope values around a consumer, and fallbacks
//! computed from them.

use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;

use crate::token::IdentityToken;

/// Read-only view of the scopes visible from a consumer's position.
pub trait Ambient {
    /// Current value of the nearest scope holding `type_id`, optionally
    /// narrowed to a scope carrying `token`.
    fn lookup(&self, type_id: TypeId, token: Option<&IdentityToken>) -> Option<Rc<dyn Any>>;
}

impl dyn Ambient + '_ {
    /// Typed lookup of the nearest scope value of type `S`.
    #[must_use]
    pub fn get<S: 'static>(&self) -> Option<Rc<S>> {
        self.lookup(TypeId::of::<S>(), None)?.downcast::<S>().ok()
    }

    /// Typed lookup narrowed to a scope carrying `token`.
    #[must_use]
    pub fn get_tagged<S: 'static>(&self, token: &IdentityToken) -> Option<Rc<S>> {
        self.lookup(TypeId::of::<S>(), Some(token))?
            .downcast::<S>()
            .ok()
    }
}

/// An ambient with no scopes at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAmbient;

impl Ambient for NoAmbient {
    fn lookup(&self, _type_id: TypeId, _token: Option<&IdentityToken>) -> Option<Rc<dyn Any>> {
        None
    }
}

/// Value used when no satisfying scope exists.
pub struct Fallback<A> {
    resolve: Rc<dyn Fn(&dyn Ambient) -> Option<A>>,
}

impl<A> Clone for Fallback<A> {
    fn clone(&self) -> Self {
        Self {
            resolve: Rc::clone(&self.resolve),
        }
    }
}

impl<A> fmt::Debug for Fallback<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fallback").finish_non_exhaustive()
    }
}

impl<A: 'static> Fallback<A> {
    /// A fixed value.
    pub fn value(value: A) -> Self
    where
        A: Clone,
    {
        Self::with(move |_| Some(value.clone()))
    }

    /// A value derived from another scope visible at the lookup position.
    pub fn from_scope<S: 'static>(f: impl Fn(&S) -> A + 'static) -> Self {
        Self::with(move |ambient| ambient.get::<S>().map(|s| f(&s)))
    }

    /// Arbitrary resolution against the ambient scopes.
    pub fn with(f: impl Fn(&dyn Ambient) -> Option<A> + 'static) -> Self {
        Self {
            resolve: Rc::new(f),
        }
    }

    /// Resolve the fallback. `None` when an ambient-derived fallback cannot
    /// find its own source.
    #[must_use]
    pub fn resolve(&self, ambient: &dyn Ambient) -> Option<A> {
        (self.resolve)(ambient)
    }

    /// Transform the fallback the way `map` transforms a real value.
    pub fn map<B: 'static>(self, f: Rc<dyn Fn(A) -> B>) -> Fallback<B> {
        Fallback::with(move |ambient| self.resolve(ambient).map(|a| f(a)))
    }
}

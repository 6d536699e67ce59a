#![forbid(unsafe_code)]

//! Type-erased dependencies.
//!
//! A [`Dependency<V>`] keeps only what a scope needs from a projection: its
//! decision, its identity, and its diagnostics. Projections with different
//! derived types can therefore share one dependency set or one union.

use std::fmt;
use std::rc::Rc;

use crate::decide::{Always, Carried, Decide, Waker};
use crate::diagnostics::{AspectKind, Debuggable, Diagnostics, short_type_name};
use crate::token::{AspectKey, IdentityToken, same_identity};

pub struct Dependency<V> {
    decide: Rc<dyn Decide<V>>,
    key: AspectKey,
    token: Option<IdentityToken>,
    diagnostics: Rc<Diagnostics>,
}

impl<V> Clone for Dependency<V> {
    fn clone(&self) -> Self {
        Self {
            decide: Rc::clone(&self.decide),
            key: self.key,
            token: self.token.clone(),
            diagnostics: Rc::clone(&self.diagnostics),
        }
    }
}

impl<V> fmt::Debug for Dependency<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("label", &self.diagnostics.label)
            .field("kind", &self.diagnostics.kind)
            .field("key", &self.key)
            .field("token", &self.token)
            .finish()
    }
}

impl<V> PartialEq for Dependency<V> {
    fn eq(&self, other: &Self) -> bool {
        same_identity(self.key, self.token.as_ref(), other.key, other.token.as_ref())
    }
}

impl<V> Dependency<V> {
    pub(crate) fn from_parts(
        decide: Rc<dyn Decide<V>>,
        key: AspectKey,
        token: Option<IdentityToken>,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            decide,
            key,
            token,
            diagnostics: Rc::new(diagnostics),
        }
    }

    #[must_use]
    pub fn should_notify(&self, new: &V, old: &V) -> bool {
        self.decide.should_notify(new, old)
    }

    pub fn bind_waker(&self, waker: &Waker) {
        self.decide.bind_waker(waker);
    }

    /// State this dependency would hand to a successor.
    pub fn carry(&self, out: &mut Vec<Carried>) {
        self.decide.carry(out);
    }

    pub fn adopt(&self, carried: &mut dyn Iterator<Item = Carried>) {
        self.decide.adopt(carried);
    }

    /// Take over whatever state `previous` carries.
    pub fn adopt_from(&self, previous: &Dependency<V>) {
        let mut carried = Vec::new();
        previous.carry(&mut carried);
        if !carried.is_empty() {
            self.adopt(&mut carried.into_iter());
        }
    }

    #[must_use]
    pub fn key(&self) -> AspectKey {
        self.key
    }

    #[must_use]
    pub fn token(&self) -> Option<&IdentityToken> {
        self.token.as_ref()
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.diagnostics.label
    }

    #[must_use]
    pub fn is_unconditional(&self) -> bool {
        self.key == AspectKey::UNCONDITIONAL
    }
}

impl<V: 'static> Dependency<V> {
    /// The explicit "depends on everything" dependency.
    #[must_use]
    pub fn unconditional() -> Self {
        let target = std::any::type_name::<V>();
        Self::from_parts(
            Rc::new(Always),
            AspectKey::UNCONDITIONAL,
            None,
            Diagnostics {
                label: format!("Unconditional<{}>", short_type_name(target)).into(),
                token: None,
                kind: AspectKind::Unconditional,
                target,
                value: target,
            },
        )
    }
}

impl<V> Debuggable for Dependency<V> {
    fn diagnostics(&self) -> Diagnostics {
        (*self.diagnostics).clone()
    }
}

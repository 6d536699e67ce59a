#![forbid(unsafe_code)]

//! Multi-scope registries.
//!
//! A [`ScopeRegistry`] assembles scopes of different value types (or of the
//! same type told apart by identity tokens) into one logical scope set.
//!
//! # Strictness
//!
//! | Entries of one type          | strict                    | non-strict            |
//! |------------------------------|---------------------------|-----------------------|
//! | distinct non-null tokens     | accepted                  | accepted              |
//! | same token (or both untagged)| [`AspectError::DuplicateScope`] | later one shadows |
//! | one tagged, one untagged     | [`AspectError::AmbiguousScope`] | accepted        |
//!
//! Strict checks run in [`ScopeRegistryBuilder::build`], before any lookup;
//! a failing build produces no registry at all.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use aspect_core::{AspectError, IdentityToken, Result};

use crate::observer::ObserverId;
use crate::scope::Scope;

/// Type-erased view of a [`Scope`].
pub trait AnyScope {
    fn scope_id(&self) -> u64;
    fn value_type(&self) -> TypeId;
    fn value_type_name(&self) -> &'static str;
    fn token(&self) -> Option<IdentityToken>;
    /// Current value as `Rc<V>` behind `dyn Any`.
    fn value_any(&self) -> Rc<dyn Any>;
    /// The `Scope<V>` handle itself.
    fn as_any(&self) -> &dyn Any;
    fn remove_observer(&self, observer: ObserverId) -> bool;
    fn take_dirty(&self) -> Vec<ObserverId>;
}

impl<V: 'static> AnyScope for Scope<V> {
    fn scope_id(&self) -> u64 {
        self.id()
    }

    fn value_type(&self) -> TypeId {
        TypeId::of::<V>()
    }

    fn value_type_name(&self) -> &'static str {
        type_name::<V>()
    }

    fn token(&self) -> Option<IdentityToken> {
        Scope::token(self)
    }

    fn value_any(&self) -> Rc<dyn Any> {
        self.value()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn remove_observer(&self, observer: ObserverId) -> bool {
        Scope::remove_observer(self, observer)
    }

    fn take_dirty(&self) -> Vec<ObserverId> {
        Scope::take_dirty(self)
    }
}

impl fmt::Debug for dyn AnyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyScope")
            .field("id", &self.scope_id())
            .field("type", &self.value_type_name())
            .field("token", &self.token())
            .finish()
    }
}

/// An immutable set of scopes, indexed by value type.
#[derive(Clone, Default)]
pub struct ScopeRegistry {
    entries: Vec<Rc<dyn AnyScope>>,
    by_type: AHashMap<TypeId, Vec<usize>>,
}

impl fmt::Debug for ScopeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

impl ScopeRegistry {
    #[must_use]
    pub fn builder() -> ScopeRegistryBuilder {
        ScopeRegistryBuilder::default()
    }

    /// A non-strict registry holding one scope.
    #[must_use]
    pub fn single<V: 'static>(scope: &Scope<V>) -> Self {
        let mut registry = Self::default();
        registry.push(Rc::new(scope.clone()));
        registry
    }

    fn push(&mut self, scope: Rc<dyn AnyScope>) {
        self.by_type
            .entry(scope.value_type())
            .or_default()
            .push(self.entries.len());
        self.entries.push(scope);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<dyn AnyScope>> {
        self.entries.iter()
    }

    /// Entry for `type_id`, narrowed to `token` when given.
    ///
    /// Untagged lookups prefer an untagged scope and otherwise take the most
    /// recently added scope of that type.
    #[must_use]
    pub fn lookup(&self, type_id: TypeId, token: Option<&IdentityToken>) -> Option<&Rc<dyn AnyScope>> {
        let candidates = self.by_type.get(&type_id)?;
        let mut candidates = candidates.iter().rev().map(|&i| &self.entries[i]);
        match token {
            Some(token) => candidates.find(|s| s.token().as_ref() == Some(token)),
            None => {
                let all: Vec<_> = candidates.collect();
                all.iter()
                    .find(|s| s.token().is_none())
                    .or_else(|| all.first())
                    .copied()
            }
        }
    }

    /// Typed lookup.
    #[must_use]
    pub fn find<V: 'static>(&self, token: Option<&IdentityToken>) -> Option<Scope<V>> {
        self.lookup(TypeId::of::<V>(), token)?
            .as_any()
            .downcast_ref::<Scope<V>>()
            .cloned()
    }
}

/// Builder for [`ScopeRegistry`].
#[derive(Default)]
#[must_use]
pub struct ScopeRegistryBuilder {
    strict: bool,
    entries: Vec<Rc<dyn AnyScope>>,
}

impl ScopeRegistryBuilder {
    /// Reject ambiguous or duplicate same-typed entries at build time.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with<V: 'static>(mut self, scope: &Scope<V>) -> Self {
        self.entries.push(Rc::new(scope.clone()));
        self
    }

    /// Validate and assemble.
    ///
    /// # Errors
    ///
    /// Under strict rules, [`AspectError::DuplicateScope`] for two entries
    /// with the same type and token, and [`AspectError::AmbiguousScope`] for
    /// same-typed entries where only some carry a token.
    pub fn build(self) -> Result<ScopeRegistry> {
        let strict = self.strict;
        let mut registry = ScopeRegistry::default();
        for scope in self.entries {
            let token = scope.token();
            let existing = registry.by_type.get(&scope.value_type()).and_then(|slots| {
                slots.iter().copied().find(|&i| {
                    let other = registry.entries[i].token();
                    if strict {
                        other.is_none() || token.is_none() || other == token
                    } else {
                        other == token
                    }
                })
            });
            match existing {
                None => registry.push(scope),
                Some(i) if strict => {
                    let other = registry.entries[i].token();
                    let type_name = scope.value_type_name();
                    return Err(if other == token {
                        AspectError::DuplicateScope { type_name, token }
                    } else {
                        AspectError::AmbiguousScope { type_name }
                    });
                }
                Some(i) => {
                    tracing::warn!(
                        message = "registry.shadow",
                        scope = scope.value_type_name(),
                        token = ?token,
                        shadowed = registry.entries[i].scope_id(),
                        by = scope.scope_id()
                    );
                    registry.entries[i] = scope;
                }
            }
        }
        tracing::trace!(message = "registry.build", strict, len = registry.len());
        Ok(registry)
    }
}

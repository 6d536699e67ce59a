#![forbid(unsafe_code)]

//! Subtree-scoped substitutes for projections.
//!
//! An [`OverrideSet`] maps projections to substitute values or substitute
//! mutation handlers. Entries are keyed the way dependencies are: by identity
//! token, or by the projection's key.
//!
//! # Invariants
//!
//! 1. Within one set, no two value entries and no two mutation entries share
//!    a token or a key. A value entry and a mutation entry for the same
//!    projection may coexist.
//! 2. Lookup tries the token first, then the key.
//! 3. A substitute whose type differs from the projection's derived type is
//!    reported as [`AspectError::OverrideTypeMismatch`], never coerced.
//! 4. A set is immutable once built; replacing overrides means building a
//!    new set.

use std::any::{Any, type_name};
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use aspect_core::{Aspect, AspectError, AspectKey, IdentityToken, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Channel {
    Value,
    Mutation,
}

/// One override entry.
#[derive(Clone)]
pub struct Override {
    key: Option<AspectKey>,
    token: Option<IdentityToken>,
    label: String,
    channel: Channel,
    payload: Rc<dyn Any>,
    payload_type: &'static str,
}

impl fmt::Debug for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Override")
            .field("label", &self.label)
            .field("channel", &self.channel)
            .field("key", &self.key)
            .field("token", &self.token)
            .field("payload", &self.payload_type)
            .finish()
    }
}

/// Handler type stored by mutation overrides.
pub type MutationHandler<A> = Rc<dyn Fn(A)>;

impl Override {
    /// Substitute `value` for whatever `aspect` would read.
    pub fn value<V: 'static, A: 'static>(aspect: &Aspect<V, A>, value: A) -> Self {
        Self {
            key: Some(aspect.key()),
            token: aspect.token().cloned(),
            label: aspect.label().into_owned(),
            channel: Channel::Value,
            payload: Rc::new(value),
            payload_type: type_name::<A>(),
        }
    }

    /// Substitute `value` for any projection carrying `token`.
    pub fn token<T: 'static>(token: impl Into<IdentityToken>, value: T) -> Self {
        let token = token.into();
        Self {
            key: None,
            label: token.to_string(),
            token: Some(token),
            channel: Channel::Value,
            payload: Rc::new(value),
            payload_type: type_name::<T>(),
        }
    }

    /// Route patch-style writes through `aspect` to `handler` instead of the
    /// scope owner.
    pub fn mutation<V: 'static, A: 'static>(
        aspect: &Aspect<V, A>,
        handler: impl Fn(A) + 'static,
    ) -> Self {
        let handler: MutationHandler<A> = Rc::new(handler);
        Self {
            key: Some(aspect.key()),
            token: aspect.token().cloned(),
            label: aspect.label().into_owned(),
            channel: Channel::Mutation,
            payload: Rc::new(handler),
            payload_type: type_name::<MutationHandler<A>>(),
        }
    }

    #[must_use]
    pub fn is_mutation(&self) -> bool {
        self.channel == Channel::Mutation
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Immutable, validated set of overrides.
#[derive(Debug, Clone, Default)]
pub struct OverrideSet {
    entries: Vec<Override>,
    by_token: AHashMap<(Channel, IdentityToken), usize>,
    by_key: AHashMap<(Channel, AspectKey), usize>,
}

impl OverrideSet {
    /// Validate and index `entries`.
    ///
    /// # Errors
    ///
    /// [`AspectError::DuplicateOverride`] when two entries on the same
    /// channel share a token or a key.
    pub fn new(entries: impl IntoIterator<Item = Override>) -> Result<Self> {
        let mut set = Self::default();
        for entry in entries {
            let index = set.entries.len();
            let token_taken = entry
                .token
                .as_ref()
                .is_some_and(|t| set.by_token.contains_key(&(entry.channel, t.clone())));
            let key_taken = entry
                .key
                .is_some_and(|k| set.by_key.contains_key(&(entry.channel, k)));
            if token_taken || key_taken {
                return Err(AspectError::DuplicateOverride {
                    aspect: entry.label,
                    token: entry.token,
                });
            }
            if let Some(token) = &entry.token {
                set.by_token.insert((entry.channel, token.clone()), index);
            }
            if let Some(key) = entry.key {
                set.by_key.insert((entry.channel, key), index);
            }
            set.entries.push(entry);
        }
        Ok(set)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find<V: 'static, A: 'static>(
        &self,
        aspect: &Aspect<V, A>,
        channel: Channel,
    ) -> Option<&Override> {
        let by_token = aspect
            .token()
            .and_then(|t| self.by_token.get(&(channel, t.clone())));
        let index = by_token.or_else(|| self.by_key.get(&(channel, aspect.key())))?;
        self.entries.get(*index)
    }

    fn mismatch<V: 'static, A: 'static>(aspect: &Aspect<V, A>, entry: &Override, expected: &'static str) -> AspectError {
        AspectError::OverrideTypeMismatch {
            aspect: aspect.label().into_owned(),
            expected,
            found: entry.payload_type,
        }
    }

    /// Substitute value for `aspect`, if this set overrides it.
    ///
    /// # Errors
    ///
    /// [`AspectError::OverrideTypeMismatch`] when the matching entry holds a
    /// value of another type.
    pub fn resolve_value<V: 'static, A: Clone + 'static>(
        &self,
        aspect: &Aspect<V, A>,
    ) -> Result<Option<A>> {
        let Some(entry) = self.find(aspect, Channel::Value) else {
            return Ok(None);
        };
        match entry.payload.downcast_ref::<A>() {
            Some(value) => {
                tracing::trace!(message = "override.hit", aspect = entry.label(), channel = "value");
                Ok(Some(value.clone()))
            }
            None => Err(Self::mismatch(aspect, entry, type_name::<A>())),
        }
    }

    /// Substitute mutation handler for `aspect`, if this set overrides it.
    ///
    /// # Errors
    ///
    /// [`AspectError::OverrideTypeMismatch`] when the matching entry's
    /// handler takes another type.
    pub fn resolve_mutation<V: 'static, A: 'static>(
        &self,
        aspect: &Aspect<V, A>,
    ) -> Result<Option<MutationHandler<A>>> {
        let Some(entry) = self.find(aspect, Channel::Mutation) else {
            return Ok(None);
        };
        match entry.payload.downcast_ref::<MutationHandler<A>>() {
            Some(handler) => {
                tracing::trace!(message = "override.hit", aspect = entry.label(), channel = "mutation");
                Ok(Some(Rc::clone(handler)))
            }
            None => Err(Self::mismatch(aspect, entry, type_name::<MutationHandler<A>>())),
        }
    }
}

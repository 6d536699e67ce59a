#![forbid(unsafe_code)]

//! A consumer's position in the hosting tree.
//!
//! An [`Env`] is a persistent chain of layers, nearest first. Each layer
//! either provides scopes (a [`ScopeRegistry`]) or declares overrides (an
//! [`OverrideSet`]). Deriving a child env never changes the parent, so the
//! hosting tree can hand each subtree its own env.
//!
//! # Resolution order
//!
//! 1. Overrides on the path, nearest declaration first. A hit substitutes
//!    the value and registers nothing.
//! 2. The nearest scope of the requested type (and token, when given).
//! 3. The projection's fallback, resolved against this env.
//! 4. Otherwise [`AspectError::ScopeNotFound`], or `None` for optional reads.

use std::any::{Any, TypeId, type_name};
use std::rc::Rc;

use aspect_core::{Ambient, Aspect, AspectError, IdentityToken, Result};

use crate::observer::ObserverId;
use crate::overrides::OverrideSet;
use crate::registry::ScopeRegistry;
use crate::scope::Scope;
use crate::watch::Watch;

enum LayerKind {
    Scopes(ScopeRegistry),
    Overrides(OverrideSet),
}

struct Layer {
    kind: LayerKind,
    parent: Option<Rc<Layer>>,
}

/// Position handle used for scope lookup, reads, watches, and updates.
#[derive(Clone, Default)]
pub struct Env {
    head: Option<Rc<Layer>>,
}

impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut scopes = 0;
        let mut overrides = 0;
        for layer in self.layers() {
            match &layer.kind {
                LayerKind::Scopes(registry) => scopes += registry.len(),
                LayerKind::Overrides(set) => overrides += set.len(),
            }
        }
        f.debug_struct("Env")
            .field("scopes", &scopes)
            .field("overrides", &overrides)
            .finish()
    }
}

impl Env {
    /// The root position: no scopes, no overrides.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    fn push(&self, kind: LayerKind) -> Self {
        Self {
            head: Some(Rc::new(Layer {
                kind,
                parent: self.head.clone(),
            })),
        }
    }

    fn layers(&self) -> impl Iterator<Item = &Layer> {
        std::iter::successors(self.head.as_deref(), |layer| layer.parent.as_deref())
    }

    /// Child position below a single scope.
    #[must_use]
    pub fn provide<V: 'static>(&self, scope: &Scope<V>) -> Self {
        self.push(LayerKind::Scopes(ScopeRegistry::single(scope)))
    }

    /// Child position below every scope of `registry`.
    #[must_use]
    pub fn provide_registry(&self, registry: ScopeRegistry) -> Self {
        self.push(LayerKind::Scopes(registry))
    }

    /// Child position below an override declaration.
    #[must_use]
    pub fn with_overrides(&self, overrides: OverrideSet) -> Self {
        self.push(LayerKind::Overrides(overrides))
    }

    /// Nearest scope holding `V`, narrowed to `token` when given.
    #[must_use]
    pub fn find<V: 'static>(&self, token: Option<&IdentityToken>) -> Option<Scope<V>> {
        self.layers().find_map(|layer| match &layer.kind {
            LayerKind::Scopes(registry) => registry.find::<V>(token),
            LayerKind::Overrides(_) => None,
        })
    }

    pub(crate) fn override_sets(&self) -> impl Iterator<Item = &OverrideSet> {
        self.layers().filter_map(|layer| match &layer.kind {
            LayerKind::Overrides(set) => Some(set),
            LayerKind::Scopes(_) => None,
        })
    }

    pub(crate) fn resolve_override<V: 'static, A: Clone + 'static>(
        &self,
        aspect: &Aspect<V, A>,
    ) -> Result<Option<A>> {
        for set in self.override_sets() {
            if let Some(value) = set.resolve_value(aspect)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    pub(crate) fn not_found<V: 'static, A: 'static>(aspect: &Aspect<V, A>) -> AspectError {
        AspectError::ScopeNotFound {
            scope: type_name::<V>(),
            aspect: aspect.label().into_owned(),
        }
    }

    /// Read `aspect` without registering a dependency.
    ///
    /// # Errors
    ///
    /// [`AspectError::ScopeNotFound`] when no scope, override, or fallback
    /// satisfies the read; [`AspectError::OverrideTypeMismatch`] for a
    /// mistyped override.
    pub fn read<V: 'static, A: Clone + 'static>(&self, aspect: &Aspect<V, A>) -> Result<A> {
        self.read_optional(aspect)?
            .ok_or_else(|| Self::not_found(aspect))
    }

    /// [`Env::read`] against the scope tagged with `token`.
    ///
    /// # Errors
    ///
    /// As [`Env::read`].
    pub fn read_tagged<V: 'static, A: Clone + 'static>(
        &self,
        token: &IdentityToken,
        aspect: &Aspect<V, A>,
    ) -> Result<A> {
        self.read_in(Some(token), aspect)?
            .ok_or_else(|| Self::not_found(aspect))
    }

    /// Read `aspect`, yielding `None` on a soft miss.
    ///
    /// # Errors
    ///
    /// [`AspectError::OverrideTypeMismatch`] for a mistyped override.
    pub fn read_optional<V: 'static, A: Clone + 'static>(
        &self,
        aspect: &Aspect<V, A>,
    ) -> Result<Option<A>> {
        self.read_in(None, aspect)
    }

    fn read_in<V: 'static, A: Clone + 'static>(
        &self,
        token: Option<&IdentityToken>,
        aspect: &Aspect<V, A>,
    ) -> Result<Option<A>> {
        if let Some(value) = self.resolve_override(aspect)? {
            return Ok(Some(value));
        }
        Ok(match self.find::<V>(token) {
            Some(scope) => Some(scope.with(|v| aspect.read(v))),
            None => aspect.resolve_default(self),
        })
    }

    /// Start collecting `observer`'s dependencies for one build.
    pub fn watch(&self, observer: ObserverId) -> Watch<'_> {
        Watch::new(self, observer)
    }
}

impl Ambient for Env {
    fn lookup(&self, type_id: TypeId, token: Option<&IdentityToken>) -> Option<Rc<dyn Any>> {
        self.layers().find_map(|layer| match &layer.kind {
            LayerKind::Scopes(registry) => registry.lookup(type_id, token).map(|s| s.value_any()),
            LayerKind::Overrides(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::Override;

    #[derive(Debug, Clone, PartialEq)]
    struct Theme {
        accent: &'static str,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Locale(&'static str);

    #[test]
    fn nearest_scope_wins() {
        let outer = Scope::new(Theme { accent: "red" });
        let inner = Scope::new(Theme { accent: "blue" });
        let env = Env::root().provide(&outer);
        let child = env.provide(&inner);
        let accent = Aspect::new(|t: &Theme| t.accent);
        assert_eq!(env.read(&accent).expect("outer"), "red");
        assert_eq!(child.read(&accent).expect("inner"), "blue");
    }

    #[test]
    fn missing_scope_errors_unless_defaulted() {
        let accent = Aspect::new(|t: &Theme| t.accent);
        let err = Env::root().read(&accent).expect_err("no scope");
        assert!(matches!(err, AspectError::ScopeNotFound { .. }));
        assert!(err.is_usage());
        assert_eq!(Env::root().read_optional(&accent).expect("soft"), None);

        let defaulted = accent.with_default("gray");
        assert_eq!(Env::root().read(&defaulted).expect("fallback"), "gray");
    }

    #[test]
    fn ambient_fallback_reads_other_scope() {
        let env = Env::root().provide(&Scope::new(Locale("fr")));
        let accent = Aspect::new(|t: &Theme| t.accent)
            .with_default_for(|locale: &Locale| if locale.0 == "fr" { "bleu" } else { "blue" });
        assert_eq!(env.read(&accent).expect("ambient fallback"), "bleu");
        assert_eq!(Env::root().read_optional(&accent).expect("soft"), None);
    }

    #[test]
    fn overrides_beat_scopes() {
        let accent = Aspect::new(|t: &Theme| t.accent).with_token("accent");
        let env = Env::root()
            .provide(&Scope::new(Theme { accent: "red" }))
            .with_overrides(OverrideSet::new([Override::token("accent", "green")]).expect("valid"));
        assert_eq!(env.read(&accent).expect("override"), "green");

        // works without any scope, too
        let bare = Env::root()
            .with_overrides(OverrideSet::new([Override::value(&accent, "teal")]).expect("valid"));
        assert_eq!(bare.read(&accent).expect("override"), "teal");
    }

    #[test]
    fn nearest_override_declaration_wins() {
        let accent = Aspect::new(|t: &Theme| t.accent).with_token("accent");
        let env = Env::root()
            .with_overrides(OverrideSet::new([Override::token("accent", "outer")]).expect("valid"))
            .with_overrides(OverrideSet::new([Override::token("accent", "inner")]).expect("valid"));
        assert_eq!(env.read(&accent).expect("override"), "inner");
    }

    #[test]
    fn tagged_lookup() {
        let registry = ScopeRegistry::builder()
            .strict(true)
            .with(&Scope::new(Theme { accent: "red" }).with_token("primary"))
            .with(&Scope::new(Theme { accent: "blue" }).with_token("secondary"))
            .build()
            .expect("distinct tokens");
        let env = Env::root().provide_registry(registry);
        let accent = Aspect::new(|t: &Theme| t.accent);
        assert_eq!(
            env.read_tagged(&IdentityToken::named("secondary"), &accent)
                .expect("tagged"),
            "blue"
        );
        assert!(env.find::<Theme>(Some(&IdentityToken::named("none"))).is_none());
    }

    #[test]
    fn env_is_an_ambient() {
        let env = Env::root().provide(&Scope::new(Locale("de")));
        let ambient: &dyn Ambient = &env;
        assert_eq!(ambient.get::<Locale>().map(|l| l.0), Some("de"));
        assert!(ambient.get::<Theme>().is_none());
    }
}

#![forbid(unsafe_code)]

//! The mutation protocol: requests from consumers to scope owners.
//!
//! Writes are decoupled from dependencies. Any position that can see a scope
//! may request a new value for it, whether or not it watches that scope. The
//! owner's handler decides what the next value is; observers then learn about
//! it through the ordinary replacement path.
//!
//! # Failure Modes
//!
//! - **No scope in sight**: [`AspectError::ScopeNotFound`]; nothing changes.
//! - **Read-only projection**: [`AspectError::ReadOnly`] before any scope is
//!   consulted, unless a mutation override captures the write first.
//! - **Owner without handler**: the request is accepted and discarded.

use aspect_core::{Aspect, AspectError, IdentityToken, Result};

use crate::env::Env;

impl Env {
    /// Ask the owner of the nearest `V` scope to install `value`.
    ///
    /// # Errors
    ///
    /// [`AspectError::ScopeNotFound`] when no `V` scope is visible.
    pub fn update<V: 'static>(&self, value: V) -> Result<()> {
        self.update_in(None, value)
    }

    /// [`Env::update`] against the scope tagged `token`.
    ///
    /// # Errors
    ///
    /// As [`Env::update`].
    pub fn update_tagged<V: 'static>(&self, token: &IdentityToken, value: V) -> Result<()> {
        self.update_in(Some(token), value)
    }

    fn update_in<V: 'static>(&self, token: Option<&IdentityToken>, value: V) -> Result<()> {
        let scope = self
            .find::<V>(token)
            .ok_or_else(|| AspectError::ScopeNotFound {
                scope: std::any::type_name::<V>(),
                aspect: String::from("update"),
            })?;
        scope.request_update(value);
        Ok(())
    }

    /// Write `value` through `aspect`'s patch.
    ///
    /// A mutation override for `aspect` on the path receives `value` instead
    /// of the owner. Otherwise the patch folds `value` into the current
    /// scope value and the result is requested as an update.
    ///
    /// # Errors
    ///
    /// [`AspectError::ReadOnly`] for projections without a patch,
    /// [`AspectError::ScopeNotFound`] when no `V` scope is visible, and
    /// [`AspectError::OverrideTypeMismatch`] for a mistyped mutation
    /// override.
    pub fn patch<V: 'static, A: 'static>(&self, aspect: &Aspect<V, A>, value: A) -> Result<()> {
        self.patch_in(None, aspect, value)
    }

    /// [`Env::patch`] against the scope tagged `token`.
    ///
    /// # Errors
    ///
    /// As [`Env::patch`].
    pub fn patch_tagged<V: 'static, A: 'static>(
        &self,
        token: &IdentityToken,
        aspect: &Aspect<V, A>,
        value: A,
    ) -> Result<()> {
        self.patch_in(Some(token), aspect, value)
    }

    fn patch_in<V: 'static, A: 'static>(
        &self,
        token: Option<&IdentityToken>,
        aspect: &Aspect<V, A>,
        value: A,
    ) -> Result<()> {
        for set in self.override_sets() {
            if let Some(handler) = set.resolve_mutation(aspect)? {
                handler(value);
                return Ok(());
            }
        }
        if !aspect.is_patchable() {
            return Err(AspectError::ReadOnly {
                aspect: aspect.label().into_owned(),
                scope: std::any::type_name::<V>(),
            });
        }
        let scope = self.find::<V>(token).ok_or_else(|| Self::not_found(aspect))?;
        let next = aspect.patch(&scope.value(), value)?;
        scope.request_update(next);
        Ok(())
    }

    /// Read-modify-write across scopes: compute the next `V` from this
    /// position (typically by reading other scopes), then request it.
    ///
    /// # Errors
    ///
    /// Whatever `compute` returns, then as [`Env::update`].
    pub fn update_with<V: 'static>(&self, compute: impl FnOnce(&Env) -> Result<V>) -> Result<()> {
        let value = compute(self)?;
        self.update(value)
    }
}

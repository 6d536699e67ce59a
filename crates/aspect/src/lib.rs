#![forbid(unsafe_code)]

//! Aspect-based selective change notification.
//!
//! Observers declare which aspect of a shared value they read and are
//! refreshed only when that aspect changes. This crate is the stable
//! surface over [`core`] (projections and decisions) and, with the default
//! `runtime` feature, [`runtime`] (scopes, registries, overrides, and the
//! mutation protocol).

pub use aspect_core as core;
#[cfg(feature = "runtime")]
pub use aspect_runtime as runtime;

pub use aspect_core::{
    Aspect, AspectError, AspectKind, DebounceConfig, Debouncer, Dependency, Diagnostics,
    IdentityToken, Result, Signal, Timers,
};
#[cfg(feature = "runtime")]
pub use aspect_runtime::{Env, ObserverId, Override, OverrideSet, Scope, ScopeRegistry, Watch};

pub mod prelude {
    pub use aspect_core::{
        Aspect, AspectError, DebounceConfig, Debouncer, Debuggable, IdentityToken, Signal, Timers,
    };
    #[cfg(feature = "runtime")]
    pub use aspect_runtime::{Env, ObserverId, Override, OverrideSet, Scope, ScopeRegistry};
}

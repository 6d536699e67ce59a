#![forbid(unsafe_code)]

//! Core: projections, change decisions, and the composition algebra.
//!
//! An observer declares an [`Aspect`] of a shared value and is refreshed
//! only when that aspect's decision says the value changed in a way it
//! cares about. This crate holds everything that does not need to know
//! about observers or scopes:
//!
//! - [`signal`]: extraction signals with the `Skip`/`Absent`/`Force` sentinels.
//! - [`strategy`]: single, multi, indexed, and length-indexed extraction.
//! - [`aspect`]: the projection type and its combinators.
//! - [`debounce`] and [`timer`]: time-based suppression on a lab or real clock.
//! - [`dependency`]: type-erased dependencies for sets and unions.
//! - [`ambient`]: scope lookups available to fallbacks.
//! - [`diagnostics`]: structured introspection records.
//! - [`error`]: the configuration and usage error taxonomy.

pub mod ambient;
pub mod aspect;
pub mod debounce;
pub mod decide;
pub mod dependency;
pub mod diagnostics;
pub mod error;
mod logging;
pub mod signal;
pub mod strategy;
pub mod timer;
pub mod token;

pub use ambient::{Ambient, Fallback, NoAmbient};
pub use aspect::Aspect;
pub use debounce::{DebounceConfig, Debouncer};
pub use decide::{Always, Carried, Decide, Waker};
pub use dependency::Dependency;
pub use diagnostics::{AspectKind, Debuggable, Diagnostics};
pub use error::{AspectError, Result};
pub use signal::{Signal, Step};
pub use strategy::Strategy;
pub use timer::{Clock, LabClock, TimerHandle, Timers};
pub use token::{AspectKey, IdentityToken};

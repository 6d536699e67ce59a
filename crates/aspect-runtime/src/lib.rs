#![forbid(unsafe_code)]

//! Runtime: scopes, observers, and the protocols between them.
//!
//! The hosting tree (a widget tree, a component graph, a test harness)
//! owns positions and observers. This crate supplies what it plugs into:
//!
//! - [`Scope`]: one shared value, its registered dependency sets, and the
//!   owner's update handler.
//! - [`ScopeRegistry`]: several scopes assembled into one logical layer,
//!   with optional strict uniqueness checks.
//! - [`Env`]: a position in the tree; resolves reads through overrides,
//!   scopes, and fallbacks.
//! - [`Watch`]: collects one observer build's dependencies and registers
//!   them in one step.
//! - [`OverrideSet`]: subtree-scoped substitutes for values and mutations.
//!
//! Everything is single-threaded (`Rc`/`RefCell`); notifications are
//! delivered by marking observers dirty, never by calling back into them.

pub mod dependency_set;
pub mod env;
pub mod mutation;
pub mod observer;
pub mod overrides;
pub mod registry;
pub mod scope;
pub mod watch;

pub use dependency_set::DependencySet;
pub use env::Env;
pub use observer::ObserverId;
pub use overrides::{MutationHandler, Override, OverrideSet};
pub use registry::{AnyScope, ScopeRegistry, ScopeRegistryBuilder};
pub use scope::{Scope, UpdateHandler};
pub use watch::Watch;

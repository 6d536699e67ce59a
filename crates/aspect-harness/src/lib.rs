#![forbid(unsafe_code)]

//! Test harness for aspect-based change notification.
//!
//! Provides a small deterministic hosting tree ([`Tree`]) and explicit build
//! counters ([`BuildCounter`]) so end-to-end tests can assert exactly which
//! observers rebuilt, and how often, after scope updates and timer ticks.

pub mod counter;
pub mod tree;

pub use counter::BuildCounter;
pub use tree::{BuildFn, Tree};

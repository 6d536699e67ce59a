#![forbid(unsafe_code)]

//! Identity tokens and structural aspect keys.
//!
//! Two projections are the same dependency when their identity tokens match
//! or when they share an [`AspectKey`]. Keys are minted once per extraction
//! closure and survive cloning, so a cloned aspect compares equal to its
//! source while two separately built aspects never do.

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ASPECT_KEY: AtomicU64 = AtomicU64::new(1);
static NEXT_UNIQUE_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Structural identity of one extraction closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AspectKey(u64);

impl AspectKey {
    /// Key shared by every unconditional dependency.
    pub const UNCONDITIONAL: Self = Self(0);

    /// Mint a fresh key.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_ASPECT_KEY.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw key value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Dependency identity rule: matching tokens, or the same extraction.
#[must_use]
pub fn same_identity(
    key: AspectKey,
    token: Option<&IdentityToken>,
    other_key: AspectKey,
    other_token: Option<&IdentityToken>,
) -> bool {
    match (token, other_token) {
        (Some(a), Some(b)) if a == b => true,
        _ => key == other_key,
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
enum TokenRepr {
    Named(Cow<'static, str>),
    Int(u64),
    Unique(u64),
}

/// Opaque, comparable key used to match projections and overrides
/// independently of the extraction closure.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct IdentityToken(TokenRepr);

impl IdentityToken {
    /// A token identified by name.
    #[must_use]
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self(TokenRepr::Named(name.into()))
    }

    /// A token identified by an integer.
    #[must_use]
    pub const fn int(value: u64) -> Self {
        Self(TokenRepr::Int(value))
    }

    /// A process-unique token that equals only its own clones.
    #[must_use]
    pub fn unique() -> Self {
        Self(TokenRepr::Unique(
            NEXT_UNIQUE_TOKEN.fetch_add(1, Ordering::Relaxed),
        ))
    }
}

impl fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityToken({self})")
    }
}

impl fmt::Display for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            TokenRepr::Named(name) => write!(f, "#{name}"),
            TokenRepr::Int(value) => write!(f, "#{value}"),
            TokenRepr::Unique(id) => write!(f, "#unique-{id}"),
        }
    }
}

impl From<&'static str> for IdentityToken {
    fn from(name: &'static str) -> Self {
        Self::named(name)
    }
}

impl From<String> for IdentityToken {
    fn from(name: String) -> Self {
        Self::named(name)
    }
}

impl From<u64> for IdentityToken {
    fn from(value: u64) -> Self {
        Self::int(value)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for IdentityToken {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#![forbid(unsafe_code)]

//! Read-only introspection records for tooling.

use std::borrow::Cow;
use std::fmt;

use crate::token::IdentityToken;

/// Which strategy or combinator produced a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum AspectKind {
    Single,
    Multi,
    Indexed,
    LengthIndexed,
    Unconditional,
    Mapped,
    Gated,
    Union,
    Debounced,
}

impl AspectKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "Single",
            Self::Multi => "Multi",
            Self::Indexed => "Indexed",
            Self::LengthIndexed => "LengthIndexed",
            Self::Unconditional => "Unconditional",
            Self::Mapped => "Mapped",
            Self::Gated => "Gated",
            Self::Union => "Union",
            Self::Debounced => "Debounced",
        }
    }
}

impl fmt::Display for AspectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured description of one projection.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Diagnostics {
    /// Human-readable label.
    pub label: Cow<'static, str>,
    pub token: Option<IdentityToken>,
    pub kind: AspectKind,
    /// Type name of the scope value.
    pub target: &'static str,
    /// Type name of the derived value.
    pub value: &'static str,
}

/// Capability: report a [`Diagnostics`] record on demand.
pub trait Debuggable {
    fn diagnostics(&self) -> Diagnostics;
}

/// Last path segment of a type name, keeping generic arguments.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}

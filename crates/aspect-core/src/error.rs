use thiserror::Error;

use crate::token::IdentityToken;

pub type Result<T, E = AspectError> = std::result::Result<T, E>;

fn token_suffix(token: &Option<IdentityToken>) -> String {
    match token {
        Some(token) => format!(" (token {token})"),
        None => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AspectError {
    #[error("duplicate override for {aspect}{}", token_suffix(.token))]
    DuplicateOverride {
        aspect: String,
        token: Option<IdentityToken>,
    },

    #[error("duplicate scope of type {type_name}{}", token_suffix(.token))]
    DuplicateScope {
        type_name: &'static str,
        token: Option<IdentityToken>,
    },

    #[error("ambiguous scopes of type {type_name}: strict registries need distinct identity tokens")]
    AmbiguousScope { type_name: &'static str },

    #[error("override for {aspect} holds a {found}, expected {expected}")]
    OverrideTypeMismatch {
        aspect: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("observer {observer} registered no dependency on {scope}; register an unconditional dependency instead")]
    EmptyDependency { observer: u64, scope: &'static str },

    #[error("{aspect} is read-only and cannot drive an update of {scope}")]
    ReadOnly { aspect: String, scope: &'static str },

    #[error("no enclosing scope of type {scope} for {aspect}")]
    ScopeNotFound { scope: &'static str, aspect: String },
}

impl AspectError {
    /// Construction-time errors that prevent a scope, registry, or override
    /// set from being built at all.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::DuplicateOverride { .. }
                | Self::DuplicateScope { .. }
                | Self::AmbiguousScope { .. }
                | Self::OverrideTypeMismatch { .. }
        )
    }

    /// Call-time errors that reject one read or write.
    #[must_use]
    pub fn is_usage(&self) -> bool {
        !self.is_configuration()
    }
}

//! Layered environment lookup
//!
//! Values are resolved from, in order:
//! 1. Per-provider overrides (`env` in the provider options)
//! 2. The process environment (via an [`EnvSource`])
//! 3. A literal default
//!
//! Empty strings count as unset at every layer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Environment variable holding the OpenAI API key
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Environment variable holding the OpenAI organization id
pub const OPENAI_ORGANIZATION: &str = "OPENAI_ORGANIZATION";

/// Environment variable holding the OpenAI API base URL
pub const OPENAI_API_URL: &str = "OPENAI_API_URL";

/// Per-provider environment overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvOverrides(HashMap<String, String>);

impl EnvOverrides {
    /// Create an empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an override
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert an override in place
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up an override
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge `other` on top of `self`; entries in `other` win
    pub fn extend(&mut self, other: EnvOverrides) {
        self.0.extend(other.0);
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvOverrides {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Read-only access to a set of environment variables
pub trait EnvSource: Send + Sync {
    /// Get the value of a variable, if set
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Resolve `key` through overrides, then `source`, then `default`
#[must_use]
pub fn resolve_layered(
    key: &str,
    overrides: Option<&EnvOverrides>,
    source: &dyn EnvSource,
    default: &str,
) -> String {
    overrides
        .and_then(|env| env.get(key))
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .or_else(|| source.var(key).filter(|value| !value.is_empty()))
        .unwrap_or_else(|| default.to_owned())
}

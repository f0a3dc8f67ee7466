//! Environment variable lookup.
//!
//! Lookups go through [`VarSource`] so the resolver can read the live process
//! environment in production and a fixed map in tests.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Read-only source of environment-style variables.
pub trait VarSource: Send + Sync {
    /// Source name for debugging.
    fn name(&self) -> &str;

    /// Raw value of `key`, if set.
    fn get(&self, key: &str) -> Option<String>;

    /// Value of `key` with surrounding whitespace removed; empty counts as unset.
    fn get_non_empty(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Parse a boolean flag. `1`, `true`, `yes` and `on` are truthy.
    fn get_bool(&self, key: &str) -> bool {
        self.get(key).map(|v| parse_bool(&v)).unwrap_or(false)
    }
}

/// Parse an environment flag value.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// The live process environment. Every lookup re-reads the variable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl VarSource for ProcessEnv {
    fn name(&self) -> &str {
        "process"
    }

    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory variables, mutable behind a lock so tests can simulate rotation.
#[derive(Debug, Default)]
pub struct MemoryEnv {
    vars: RwLock<HashMap<String, String>>,
}

impl MemoryEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.vars
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) {
        self.vars
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemoryEnv {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            vars: RwLock::new(
                iter.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl VarSource for MemoryEnv {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self, key: &str) -> Option<String> {
        self.vars
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

//! Project-local `.env` file, parsed once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use super::env::VarSource;

pub const DEFAULT_DOTENV_FILE: &str = ".env";

/// Immutable snapshot of a dotenv file.
///
/// Loading never mutates the process environment.
#[derive(Debug, Clone, Default)]
pub struct DotEnv {
    path: Option<PathBuf>,
    vars: HashMap<String, String>,
}

impl DotEnv {
    /// An empty snapshot, as if no file existed.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse `path`. A missing file yields an empty snapshot; unparseable lines
    /// are skipped with a warning.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let iter = match dotenvy::from_path_iter(path) {
            Ok(iter) => iter,
            Err(e) if e.not_found() => {
                tracing::debug!("No dotenv file at {}", path.display());
                return Self {
                    path: Some(path.to_path_buf()),
                    vars: HashMap::new(),
                };
            }
            Err(e) => {
                tracing::warn!("Failed to open dotenv file {}: {}", path.display(), e);
                return Self {
                    path: Some(path.to_path_buf()),
                    vars: HashMap::new(),
                };
            }
        };

        let mut vars = HashMap::new();
        for item in iter {
            match item {
                Ok((key, value)) => {
                    vars.insert(key, value);
                }
                Err(e) => tracing::warn!("Skipping line in {}: {}", path.display(), e),
            }
        }

        tracing::debug!(path = %path.display(), count = vars.len(), "Loaded dotenv file");
        Self {
            path: Some(path.to_path_buf()),
            vars,
        }
    }

    /// The `.env` in the working directory, loaded at most once per process.
    pub fn process() -> Arc<DotEnv> {
        static PROCESS_DOTENV: OnceLock<Arc<DotEnv>> = OnceLock::new();
        PROCESS_DOTENV
            .get_or_init(|| Arc::new(DotEnv::load(DEFAULT_DOTENV_FILE)))
            .clone()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DotEnv {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            path: None,
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl VarSource for DotEnv {
    fn name(&self) -> &str {
        "dotenv"
    }

    fn get(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// Process variables layered over a dotenv snapshot. The live environment wins.
pub struct MergedEnv<'a> {
    primary: &'a dyn VarSource,
    fallback: &'a DotEnv,
}

impl<'a> MergedEnv<'a> {
    pub fn new(primary: &'a dyn VarSource, fallback: &'a DotEnv) -> Self {
        Self { primary, fallback }
    }
}

impl VarSource for MergedEnv<'_> {
    fn name(&self) -> &str {
        "merged"
    }

    fn get(&self, key: &str) -> Option<String> {
        self.primary
            .get_non_empty(key)
            .or_else(|| self.fallback.get(key))
    }
}

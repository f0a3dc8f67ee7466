//! Client secret JSON files.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::secret::{SecretFileError, load_client_secret_file};
use crate::auth::{CredentialSource, ResolutionContext, ResolverConfig, SourceKind, SourceOutcome};
use crate::config::{MergedEnv, VarSource};
use crate::{Error, Result};

/// File named by the custom-path variable. Any failure is fatal because the
/// operator pointed at it explicitly.
pub struct CustomSecretFileProvider {
    config: Arc<ResolverConfig>,
}

impl CustomSecretFileProvider {
    pub fn new(config: Arc<ResolverConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CredentialSource for CustomSecretFileProvider {
    fn kind(&self) -> SourceKind {
        SourceKind::CustomSecretFile
    }

    async fn attempt(&self, _ctx: &ResolutionContext) -> Result<SourceOutcome> {
        let Some(path) = custom_path(&self.config) else {
            return Ok(SourceOutcome::Absent(format!(
                "{} not set",
                self.config.custom_secret_path_var
            )));
        };

        match load_client_secret_file(&path, SourceKind::CustomSecretFile).await {
            Ok(client) => Ok(SourceOutcome::Client(client)),
            Err(SecretFileError::NotFound(path)) => Err(malformed(path, "file not found")),
            Err(SecretFileError::Unreadable(path, e)) => Err(malformed(path, e.to_string())),
            Err(SecretFileError::Malformed(path, reason)) => Err(malformed(path, reason)),
        }
    }
}

/// `client_secret.json` in the working directory, consulted only when no
/// custom path is configured. A missing file is skipped.
pub struct DefaultSecretFileProvider {
    config: Arc<ResolverConfig>,
}

impl DefaultSecretFileProvider {
    pub fn new(config: Arc<ResolverConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CredentialSource for DefaultSecretFileProvider {
    fn kind(&self) -> SourceKind {
        SourceKind::DefaultSecretFile
    }

    async fn attempt(&self, _ctx: &ResolutionContext) -> Result<SourceOutcome> {
        if custom_path(&self.config).is_some() {
            return Ok(SourceOutcome::Absent(format!(
                "skipped, {} is set",
                self.config.custom_secret_path_var
            )));
        }

        let path = &self.config.default_secret_path;
        match load_client_secret_file(path, SourceKind::DefaultSecretFile).await {
            Ok(client) => Ok(SourceOutcome::Client(client)),
            Err(SecretFileError::NotFound(path)) => Ok(SourceOutcome::Absent(format!(
                "{} not found",
                path.display()
            ))),
            Err(SecretFileError::Unreadable(path, e)) => Err(malformed(path, e.to_string())),
            Err(SecretFileError::Malformed(path, reason)) => Err(malformed(path, reason)),
        }
    }
}

/// Live environment first, then the `.env` snapshot.
fn custom_path(config: &ResolverConfig) -> Option<PathBuf> {
    MergedEnv::new(config.env.as_ref(), &config.dotenv)
        .get_non_empty(&config.custom_secret_path_var)
        .map(PathBuf::from)
}

fn malformed(path: PathBuf, reason: impl Into<String>) -> Error {
    Error::MalformedSecret {
        path,
        reason: reason.into(),
        checked: Vec::new(),
    }
}

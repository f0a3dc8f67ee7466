//! File-based token storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{StoredToken, TokenSchema, TokenStore};
use crate::Result;

const OAUTH21_SUBDIR: &str = "oauth21";
const TOKEN_EXTENSION: &str = "json";
const EMPTY_STEM: &str = "%";

/// One JSON file per account under a credentials directory.
///
/// Writes go to a temporary file in the same directory and are renamed into
/// place, so readers never observe a partially written token.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    root: PathBuf,
}

impl FileTokenStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn schema_dir(&self, schema: TokenSchema) -> PathBuf {
        match schema {
            TokenSchema::Legacy => self.root.clone(),
            TokenSchema::OAuth21 => self.root.join(OAUTH21_SUBDIR),
        }
    }

    /// Path of the token file for `account`.
    pub fn token_path(&self, account: &str, schema: TokenSchema) -> PathBuf {
        self.schema_dir(schema)
            .join(format!("{}.{}", file_stem(account), TOKEN_EXTENSION))
    }
}

/// Map an account id onto a file stem, one-to-one.
///
/// Everything outside `[A-Za-z0-9._~-]` is percent-encoded except `@`, which
/// stays readable. `%` itself is encoded, so distinct ids never share a file.
fn file_stem(account: &str) -> String {
    if account.is_empty() {
        return EMPTY_STEM.to_string();
    }

    let stem = urlencoding::encode(account).replace("%40", "@");
    match stem.strip_prefix('.') {
        Some(rest) => format!("%2E{}", rest),
        None => stem,
    }
}

/// Inverse of [`file_stem`]; `None` for names this store did not write.
fn account_from_stem(stem: &str) -> Option<String> {
    if stem == EMPTY_STEM {
        return Some(String::new());
    }
    if stem.starts_with('.') {
        return None;
    }
    urlencoding::decode(stem).ok().map(|s| s.into_owned())
}

#[async_trait]
impl TokenStore for FileTokenStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self, account: &str, schema: TokenSchema) -> Result<Option<StoredToken>> {
        let path = self.token_path(account, schema);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match StoredToken::from_json(&content, schema) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable token file {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    async fn save(&self, account: &str, schema: TokenSchema, token: &StoredToken) -> Result<()> {
        let path = self.token_path(account, schema);
        let dir = self.schema_dir(schema);
        tokio::fs::create_dir_all(&dir).await?;

        let content = token.to_json(schema)?;
        let tmp = dir.join(format!(
            ".{}.{}.tmp",
            file_stem(account),
            uuid::Uuid::new_v4().simple()
        ));

        tokio::fs::write(&tmp, content).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::debug!(account, path = %path.display(), "Stored token");
        Ok(())
    }

    async fn remove(&self, account: &str, schema: TokenSchema) -> Result<bool> {
        let path = self.token_path(account, schema);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(account, path = %path.display(), "Removed token");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn accounts(&self, schema: TokenSchema) -> Result<Vec<String>> {
        let dir = self.schema_dir(schema);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut accounts = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(TOKEN_EXTENSION) {
                continue;
            }
            if let Some(account) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(account_from_stem)
            {
                accounts.push(account);
            }
        }

        accounts.sort();
        Ok(accounts)
    }
}

//! Token storage implementations.

mod file;
mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{ClientDescriptor, Credential, SourceKind, TokenGrant};
use crate::Result;

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;

/// On-disk token layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenSchema {
    /// Google authorized-user JSON (`token`, `expiry` as RFC 3339).
    Legacy,
    /// OAuth 2.1 session layout (`access_token`, `expires_at` as Unix seconds).
    OAuth21,
}

/// A refreshable token persisted for one account.
#[derive(Clone, Debug)]
pub struct StoredToken {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub expiry: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
    pub token_uri: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
}

impl StoredToken {
    /// Build from a token endpoint grant. A grant without a refresh token keeps
    /// `previous_refresh`.
    pub fn from_grant(
        grant: TokenGrant,
        client: &ClientDescriptor,
        previous_refresh: Option<SecretString>,
        requested_scopes: &[String],
    ) -> Self {
        let expiry = grant.expiry();
        let scopes = grant
            .scopes()
            .unwrap_or_else(|| requested_scopes.to_vec());
        Self {
            access_token: SecretString::from(grant.access_token),
            refresh_token: grant
                .refresh_token
                .map(SecretString::from)
                .or(previous_refresh),
            expiry,
            scopes,
            token_uri: Some(client.token_uri.clone()),
            client_id: Some(client.client_id.clone()),
            client_secret: Some(SecretString::from(client.client_secret().to_string())),
        }
    }

    pub fn to_credential(&self) -> Credential {
        Credential::bearer(self.access_token.expose_secret())
            .with_refresh_token(self.refresh_token.clone())
            .with_expiry(self.expiry)
            .with_scopes(self.scopes.clone())
            .with_source(SourceKind::OnDiskRefreshableToken)
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().is_empty())
    }

    pub(crate) fn to_json(&self, schema: TokenSchema) -> serde_json::Result<String> {
        match schema {
            TokenSchema::Legacy => serde_json::to_string_pretty(&LegacyTokenFile::from(self)),
            TokenSchema::OAuth21 => serde_json::to_string_pretty(&OAuth21TokenFile::from(self)),
        }
    }

    pub(crate) fn from_json(content: &str, schema: TokenSchema) -> serde_json::Result<Self> {
        match schema {
            TokenSchema::Legacy => serde_json::from_str::<LegacyTokenFile>(content).map(Into::into),
            TokenSchema::OAuth21 => {
                serde_json::from_str::<OAuth21TokenFile>(content).map(Into::into)
            }
        }
    }
}

/// Per-account token persistence. One entry per account and schema.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Store name for debugging.
    fn name(&self) -> &str;

    async fn load(&self, account: &str, schema: TokenSchema) -> Result<Option<StoredToken>>;

    /// Replace the entry atomically.
    async fn save(&self, account: &str, schema: TokenSchema, token: &StoredToken) -> Result<()>;

    /// Returns whether an entry existed.
    async fn remove(&self, account: &str, schema: TokenSchema) -> Result<bool>;

    /// Accounts with a stored entry, sorted.
    async fn accounts(&self, schema: TokenSchema) -> Result<Vec<String>>;
}

#[derive(Serialize, Deserialize)]
struct LegacyTokenFile {
    token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_secret: Option<String>,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiry: Option<DateTime<Utc>>,
}

impl From<&StoredToken> for LegacyTokenFile {
    fn from(token: &StoredToken) -> Self {
        Self {
            token: token.access_token.expose_secret().to_string(),
            refresh_token: expose(&token.refresh_token),
            token_uri: token.token_uri.clone(),
            client_id: token.client_id.clone(),
            client_secret: expose(&token.client_secret),
            scopes: token.scopes.clone(),
            expiry: token.expiry,
        }
    }
}

impl From<LegacyTokenFile> for StoredToken {
    fn from(file: LegacyTokenFile) -> Self {
        Self {
            access_token: SecretString::from(file.token),
            refresh_token: file.refresh_token.map(SecretString::from),
            expiry: file.expiry,
            scopes: file.scopes,
            token_uri: file.token_uri,
            client_id: file.client_id,
            client_secret: file.client_secret.map(SecretString::from),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct OAuth21TokenFile {
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default = "bearer")]
    token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<i64>,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
}

fn bearer() -> String {
    "Bearer".to_string()
}

impl From<&StoredToken> for OAuth21TokenFile {
    fn from(token: &StoredToken) -> Self {
        Self {
            access_token: token.access_token.expose_secret().to_string(),
            refresh_token: expose(&token.refresh_token),
            token_type: bearer(),
            expires_at: token.expiry.map(|e| e.timestamp()),
            scopes: token.scopes.clone(),
            token_uri: token.token_uri.clone(),
            client_id: token.client_id.clone(),
        }
    }
}

impl From<OAuth21TokenFile> for StoredToken {
    fn from(file: OAuth21TokenFile) -> Self {
        Self {
            access_token: SecretString::from(file.access_token),
            refresh_token: file.refresh_token.map(SecretString::from),
            expiry: file
                .expires_at
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
            scopes: file.scopes,
            token_uri: file.token_uri,
            client_id: file.client_id,
            client_secret: None,
        }
    }
}

fn expose(secret: &Option<SecretString>) -> Option<String> {
    secret.as_ref().map(|s| s.expose_secret().to_string())
}

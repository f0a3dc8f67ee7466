//! OAuth client descriptors and `client_secret.json` parsing.

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use super::SourceKind;

pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth client registration used to refresh tokens or run consent.
///
/// Not a credential by itself.
#[derive(Clone, Debug)]
pub struct ClientDescriptor {
    pub client_id: String,
    client_secret: SecretString,
    pub auth_uri: String,
    pub token_uri: String,
    pub redirect_uris: Vec<String>,
    pub origin: SourceKind,
}

impl ClientDescriptor {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        origin: SourceKind,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            auth_uri: DEFAULT_AUTH_URI.to_string(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            redirect_uris: Vec::new(),
            origin,
        }
    }

    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }

    pub fn with_auth_uri(mut self, auth_uri: impl Into<String>) -> Self {
        self.auth_uri = auth_uri.into();
        self
    }

    pub fn client_secret(&self) -> &str {
        self.client_secret.expose_secret()
    }

    /// Consent URL requesting offline access so the grant carries a refresh token.
    pub fn authorization_url(
        &self,
        redirect_uri: &str,
        scopes: &[String],
        state: &str,
    ) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&self.auth_uri)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &scopes.join(" "))
            .append_pair("state", state)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");
        Ok(url)
    }
}

#[derive(Deserialize)]
struct SecretFile {
    web: Option<SecretEntry>,
    installed: Option<SecretEntry>,
}

#[derive(Deserialize)]
struct SecretEntry {
    client_id: Option<String>,
    client_secret: Option<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

/// Why a secret file could not be used.
#[derive(Debug)]
pub enum SecretFileError {
    NotFound(PathBuf),
    Unreadable(PathBuf, std::io::Error),
    Malformed(PathBuf, String),
}

/// Parse a Google client secret file with a `web` or `installed` section.
pub async fn load_client_secret_file(
    path: &Path,
    origin: SourceKind,
) -> Result<ClientDescriptor, SecretFileError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SecretFileError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(SecretFileError::Unreadable(path.to_path_buf(), e)),
    };

    parse_client_secret(&content, origin)
        .map_err(|reason| SecretFileError::Malformed(path.to_path_buf(), reason))
}

fn parse_client_secret(content: &str, origin: SourceKind) -> Result<ClientDescriptor, String> {
    let file: SecretFile =
        serde_json::from_str(content).map_err(|e| format!("invalid JSON: {}", e))?;

    let entry = file
        .web
        .or(file.installed)
        .ok_or_else(|| "expected a top-level 'web' or 'installed' key".to_string())?;

    let client_id = required(entry.client_id, "client_id")?;
    let client_secret = required(entry.client_secret, "client_secret")?;
    let auth_uri = required(entry.auth_uri, "auth_uri")?;
    let token_uri = required(entry.token_uri, "token_uri")?;

    let mut descriptor = ClientDescriptor::new(client_id, client_secret, origin)
        .with_auth_uri(auth_uri)
        .with_token_uri(token_uri);
    descriptor.redirect_uris = entry.redirect_uris;
    Ok(descriptor)
}

fn required(value: Option<String>, key: &str) -> Result<String, String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| format!("missing '{}'", key))
}

//! Credential types.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};

/// Where a credential or client descriptor came from, in precedence order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    GatewayInjectedToken,
    EnvironmentVariablePair,
    DotEnvFile,
    CustomSecretFile,
    DefaultSecretFile,
    OnDiskRefreshableToken,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::GatewayInjectedToken => "gateway",
            SourceKind::EnvironmentVariablePair => "environment",
            SourceKind::DotEnvFile => "dotenv",
            SourceKind::CustomSecretFile => "custom_secret_file",
            SourceKind::DefaultSecretFile => "default_secret_file",
            SourceKind::OnDiskRefreshableToken => "stored_token",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bearer credential for outbound Workspace API calls.
#[derive(Clone, Debug)]
pub struct Credential {
    access_token: SecretString,
    refresh_token: Option<SecretString>,
    expiry: Option<DateTime<Utc>>,
    scopes: Vec<String>,
    source: Option<SourceKind>,
}

impl Credential {
    /// Bare bearer token with no refresh metadata.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(token.into()),
            refresh_token: None,
            expiry: None,
            scopes: Vec::new(),
            source: None,
        }
    }

    pub fn with_refresh_token(mut self, token: Option<SecretString>) -> Self {
        self.refresh_token = token;
        self
    }

    pub fn with_expiry(mut self, expiry: Option<DateTime<Utc>>) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_source(mut self, source: SourceKind) -> Self {
        self.source = Some(source);
        self
    }

    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(|t| t.expose_secret())
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn source(&self) -> Option<SourceKind> {
        self.source
    }

    /// Check if token is expired. Credentials without expiry never expire.
    pub fn is_expired(&self) -> bool {
        self.expiry.map(|exp| Utc::now() >= exp).unwrap_or(false)
    }

    /// Check if token expires within `skew`.
    pub fn needs_refresh(&self, skew: Duration) -> bool {
        self.expiry
            .is_some_and(|exp| match exp.checked_sub_signed(skew) {
                Some(threshold) => Utc::now() >= threshold,
                // Out of range: below the minimum for a positive skew.
                None => skew > Duration::zero(),
            })
    }

    /// A credential is usable when its token is non-empty and unexpired.
    pub fn is_valid(&self) -> bool {
        !self.access_token().is_empty() && !self.is_expired()
    }

    /// `Authorization` header value.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token())
    }
}

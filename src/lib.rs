//! # workspace-mcp-auth
//!
//! Credential resolution for the Google Workspace MCP server.
//!
//! Every outbound Workspace API call asks the [`CredentialResolver`] for a
//! bearer credential. The resolver walks a fixed precedence chain: a token
//! injected by the Docker MCP Gateway, the OAuth client id/secret pair from the
//! environment or a `.env` file, a custom or default `client_secret.json`, and
//! finally the per-account token stored on disk, refreshing or running consent
//! as needed.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use workspace_mcp_auth::{CredentialResolver, ResolutionContext, ResolverConfig};
//!
//! # async fn example() -> Result<(), workspace_mcp_auth::Error> {
//! let config = Arc::new(ResolverConfig::from_env());
//! let resolver = CredentialResolver::new(config)?;
//!
//! let credential = resolver
//!     .resolve(&ResolutionContext::new("user@example.com"))
//!     .await?;
//! println!("Authorization: {}", credential.authorization_header());
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod auth;
pub mod config;
pub mod observability;

pub use auth::{
    ClientDescriptor, ConsentFlow, Credential, CredentialResolver, CredentialSource,
    FileTokenStore, HttpTokenExchange, MemoryTokenStore, ResolutionContext, ResolverConfig,
    ResolverConfigBuilder, SourceChain, SourceKind, SourceOutcome, StoredToken, TokenExchange,
    TokenGrant, TokenSchema, TokenStore,
};
pub use config::{DotEnv, MemoryEnv, ProcessEnv, VarSource};

use std::path::PathBuf;

/// Error type for credential resolution.
///
/// Configuration failures name every source checked, in precedence order.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No credential source could be located.
    #[error("No credential source for account '{account}': {message} (checked: {})", checked.join(" > "))]
    Configuration {
        account: String,
        message: String,
        checked: Vec<String>,
    },

    /// A client secret file exists but cannot be used.
    #[error("Malformed client secret file {}: {reason} (checked: {})", path.display(), checked.join(" > "))]
    MalformedSecret {
        path: PathBuf,
        reason: String,
        checked: Vec<String>,
    },

    /// No credential exists for the account.
    #[error("Not authenticated for account '{account}': {message}")]
    NotAuthenticated { account: String, message: String },

    /// A credential exists but was refused by the authorization server.
    #[error("Credential for account '{account}' was rejected: {message}")]
    Rejected { account: String, message: String },

    /// Token endpoint returned an unexpected status.
    #[error("Token endpoint error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Network connectivity or request failed.
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// File system operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or malformed configuration; not retried.
    Configuration,
    /// Absent or rejected credentials.
    Authorization,
    /// Network, file or server failures that may succeed on retry.
    Transient,
    /// Unexpected responses or encoding failures.
    Internal,
}

impl Error {
    pub fn not_authenticated(account: impl Into<String>, message: impl Into<String>) -> Self {
        Error::NotAuthenticated {
            account: account.into(),
            message: message.into(),
        }
    }

    pub fn rejected(account: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Rejected {
            account: account.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Configuration { .. } | Error::MalformedSecret { .. } => {
                ErrorCategory::Configuration
            }
            Error::NotAuthenticated { .. } | Error::Rejected { .. } => {
                ErrorCategory::Authorization
            }
            Error::Network(_) | Error::Io(_) => ErrorCategory::Transient,
            Error::Api {
                status: 429 | 500..=599,
                ..
            } => ErrorCategory::Transient,
            Error::Api { .. } | Error::Json(_) => ErrorCategory::Internal,
        }
    }

    pub fn is_configuration_error(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn is_authorization_error(&self) -> bool {
        self.category() == ErrorCategory::Authorization
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    /// True when a credential was present but refused.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Error::Rejected { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

//! Credential resolution for Google Workspace APIs.
//!
//! Sources, in fixed precedence order:
//! - **Gateway**: bearer token injected by the Docker MCP Gateway
//! - **Environment**: `GOOGLE_OAUTH_CLIENT_ID` / `GOOGLE_OAUTH_CLIENT_SECRET`
//! - **Dotenv**: the same pair from the project `.env` file
//! - **Custom secret file**: JSON named by `GOOGLE_CLIENT_SECRET_PATH`
//! - **Default secret file**: `client_secret.json` in the working directory
//! - **Stored token**: per-account refreshable token, or interactive consent

mod config;
mod consent;
mod context;
mod credential;
mod exchange;
mod provider;
mod providers;
mod resolver;
mod secret;
mod storage;

pub use config::{
    CLIENT_ID_VAR, CLIENT_SECRET_VAR, CUSTOM_SECRET_PATH_VAR, DEFAULT_SCOPES,
    DEFAULT_SECRET_FILE, GATEWAY_MODE_VAR, GATEWAY_TOKEN_VAR, ResolverConfig,
    ResolverConfigBuilder,
};
pub use consent::ConsentFlow;
pub use context::ResolutionContext;
pub use credential::{Credential, SourceKind};
pub use exchange::{HttpTokenExchange, TokenExchange, TokenGrant};
pub use provider::{CredentialSource, SourceOutcome};
pub use providers::{
    ChainResolution, CustomSecretFileProvider, DefaultSecretFileProvider, DotEnvProvider,
    EnvironmentProvider, GatewayProvider, SourceChain,
};
pub use resolver::CredentialResolver;
pub use secret::{ClientDescriptor, DEFAULT_AUTH_URI, DEFAULT_TOKEN_URI};
pub use storage::{FileTokenStore, MemoryTokenStore, StoredToken, TokenSchema, TokenStore};

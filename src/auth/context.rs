//! Per-call resolution inputs.

use super::ResolverConfig;
use super::storage::TokenSchema;

/// Inputs to one resolution attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolutionContext {
    /// Account identifier, usually the Google account email.
    pub account_id: String,
    /// Whether a consent flow may be run when nothing else yields a token.
    pub interactive: bool,
    /// Use the OAuth 2.1 token schema on disk.
    pub prefer_oauth21: bool,
}

impl ResolutionContext {
    /// Non-interactive context using the legacy token schema.
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            interactive: false,
            prefer_oauth21: false,
        }
    }

    /// Context for the configured default account, honouring `MCP_ENABLE_OAUTH21`.
    pub fn default_account(config: &ResolverConfig) -> Option<Self> {
        config.default_account.as_ref().map(|account| Self {
            account_id: account.clone(),
            interactive: false,
            prefer_oauth21: config.oauth21_enabled,
        })
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn prefer_oauth21(mut self, prefer: bool) -> Self {
        self.prefer_oauth21 = prefer;
        self
    }

    pub fn schema(&self) -> TokenSchema {
        if self.prefer_oauth21 {
            TokenSchema::OAuth21
        } else {
            TokenSchema::Legacy
        }
    }
}

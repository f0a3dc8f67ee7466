//! Docker MCP Gateway injected token.

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::auth::{
    Credential, CredentialSource, ResolutionContext, ResolverConfig, SourceKind, SourceOutcome,
};
use crate::config::{MergedEnv, VarSource};

/// Reads the bearer token the gateway injects into the environment.
///
/// The variable is re-read on every attempt because the gateway may rotate it
/// without restarting the process. A live value wins over one from `.env`.
/// The gateway owns rotation, so the credential carries no refresh token.
pub struct GatewayProvider {
    config: Arc<ResolverConfig>,
}

impl GatewayProvider {
    pub fn new(config: Arc<ResolverConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CredentialSource for GatewayProvider {
    fn kind(&self) -> SourceKind {
        SourceKind::GatewayInjectedToken
    }

    async fn attempt(&self, ctx: &ResolutionContext) -> Result<SourceOutcome> {
        if !self.config.gateway_mode {
            return Ok(SourceOutcome::Absent("gateway mode disabled".into()));
        }

        let vars = MergedEnv::new(self.config.env.as_ref(), &self.config.dotenv);
        match vars.get_non_empty(&self.config.gateway_token_var) {
            Some(token) => Ok(SourceOutcome::Credential(
                Credential::bearer(token).with_source(SourceKind::GatewayInjectedToken),
            )),
            None => {
                tracing::warn!(
                    account = %ctx.account_id,
                    "Gateway mode enabled but {} is not set; falling back to local OAuth sources",
                    self.config.gateway_token_var
                );
                Ok(SourceOutcome::Absent(format!(
                    "{} not set",
                    self.config.gateway_token_var
                )))
            }
        }
    }
}

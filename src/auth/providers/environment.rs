//! OAuth client id/secret pair from environment variables.

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::auth::{
    ClientDescriptor, CredentialSource, ResolutionContext, ResolverConfig, SourceKind,
    SourceOutcome,
};
use crate::config::{MergedEnv, VarSource};

/// Client pair from the live process environment.
pub struct EnvironmentProvider {
    config: Arc<ResolverConfig>,
}

impl EnvironmentProvider {
    pub fn new(config: Arc<ResolverConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CredentialSource for EnvironmentProvider {
    fn kind(&self) -> SourceKind {
        SourceKind::EnvironmentVariablePair
    }

    async fn attempt(&self, _ctx: &ResolutionContext) -> Result<SourceOutcome> {
        Ok(client_pair(
            self.config.env.as_ref(),
            &self.config,
            SourceKind::EnvironmentVariablePair,
        ))
    }
}

/// Client pair from the process environment merged over the `.env` snapshot.
pub struct DotEnvProvider {
    config: Arc<ResolverConfig>,
}

impl DotEnvProvider {
    pub fn new(config: Arc<ResolverConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CredentialSource for DotEnvProvider {
    fn kind(&self) -> SourceKind {
        SourceKind::DotEnvFile
    }

    async fn attempt(&self, _ctx: &ResolutionContext) -> Result<SourceOutcome> {
        if self.config.dotenv.is_empty() {
            return Ok(SourceOutcome::Absent("no .env entries".into()));
        }

        let merged = MergedEnv::new(self.config.env.as_ref(), self.config.dotenv.as_ref());
        Ok(client_pair(&merged, &self.config, SourceKind::DotEnvFile))
    }
}

fn client_pair(vars: &dyn VarSource, config: &ResolverConfig, origin: SourceKind) -> SourceOutcome {
    let id = vars.get_non_empty(&config.client_id_var);
    let secret = vars.get_non_empty(&config.client_secret_var);

    match (id, secret) {
        (Some(id), Some(secret)) => SourceOutcome::Client(ClientDescriptor::new(id, secret, origin)),
        (None, None) => SourceOutcome::Absent(format!(
            "{} and {} not set",
            config.client_id_var, config.client_secret_var
        )),
        (Some(_), None) => SourceOutcome::Absent(format!("{} not set", config.client_secret_var)),
        (None, Some(_)) => SourceOutcome::Absent(format!("{} not set", config.client_id_var)),
    }
}

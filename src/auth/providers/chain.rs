//! Ordered precedence chain over credential sources.

use std::sync::Arc;

use crate::auth::{
    ClientDescriptor, Credential, CredentialSource, CustomSecretFileProvider,
    DefaultSecretFileProvider, DotEnvProvider, EnvironmentProvider, GatewayProvider,
    ResolutionContext, ResolverConfig, SourceOutcome,
};
use crate::{Error, Result};

/// What the chain settled on.
#[derive(Debug)]
pub enum ChainResolution {
    /// A source produced a ready credential.
    Credential(Credential),
    /// A source produced a client; the token stage takes over.
    Client {
        client: ClientDescriptor,
        checked: Vec<String>,
    },
}

/// Chain that tries sources in order; the first non-absent outcome wins.
pub struct SourceChain {
    sources: Vec<Box<dyn CredentialSource>>,
}

impl SourceChain {
    /// Create with specified sources.
    pub fn new(sources: Vec<Box<dyn CredentialSource>>) -> Self {
        Self { sources }
    }

    /// Standard precedence: gateway, environment, dotenv, custom file, default file.
    pub fn standard(config: Arc<ResolverConfig>) -> Self {
        Self::new(vec![
            Box::new(GatewayProvider::new(Arc::clone(&config))),
            Box::new(EnvironmentProvider::new(Arc::clone(&config))),
            Box::new(DotEnvProvider::new(Arc::clone(&config))),
            Box::new(CustomSecretFileProvider::new(Arc::clone(&config))),
            Box::new(DefaultSecretFileProvider::new(config)),
        ])
    }

    /// Add a source to the end of the chain.
    pub fn with<S: CredentialSource + 'static>(mut self, source: S) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    pub async fn resolve(&self, ctx: &ResolutionContext) -> Result<ChainResolution> {
        let mut checked = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            checked.push(source.name().to_string());

            match source.attempt(ctx).await {
                Ok(SourceOutcome::Credential(cred)) => {
                    tracing::info!(
                        account = %ctx.account_id,
                        source = source.name(),
                        "Credential resolved"
                    );
                    return Ok(ChainResolution::Credential(cred));
                }
                Ok(SourceOutcome::Client(client)) => {
                    tracing::debug!(
                        account = %ctx.account_id,
                        source = source.name(),
                        "OAuth client configuration found"
                    );
                    return Ok(ChainResolution::Client { client, checked });
                }
                Ok(SourceOutcome::Absent(reason)) => {
                    tracing::debug!("Source {} skipped: {}", source.name(), reason);
                    if let Some(last) = checked.last_mut() {
                        *last = format!("{} ({})", source.name(), reason);
                    }
                }
                Err(Error::MalformedSecret { path, reason, .. }) => {
                    return Err(Error::MalformedSecret {
                        path,
                        reason,
                        checked,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::Configuration {
            account: ctx.account_id.clone(),
            message: "no OAuth client configuration found; set GOOGLE_OAUTH_CLIENT_ID and \
                      GOOGLE_OAUTH_CLIENT_SECRET or provide client_secret.json"
                .into(),
            checked,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SourceKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        kind: SourceKind,
        outcome: fn() -> Result<SourceOutcome>,
        calls: Arc<AtomicUsize>,
    }

    impl Fixed {
        fn new(kind: SourceKind, outcome: fn() -> Result<SourceOutcome>) -> Self {
            Self {
                kind,
                outcome,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl CredentialSource for Fixed {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        async fn attempt(&self, _ctx: &ResolutionContext) -> Result<SourceOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    fn absent() -> Result<SourceOutcome> {
        Ok(SourceOutcome::Absent("nothing".into()))
    }

    fn client() -> Result<SourceOutcome> {
        Ok(SourceOutcome::Client(ClientDescriptor::new(
            "id",
            "secret",
            SourceKind::EnvironmentVariablePair,
        )))
    }

    fn token() -> Result<SourceOutcome> {
        Ok(SourceOutcome::Credential(Credential::bearer("ya29.first")))
    }

    fn broken() -> Result<SourceOutcome> {
        Err(Error::MalformedSecret {
            path: "/tmp/custom.json".into(),
            reason: "invalid JSON".into(),
            checked: Vec::new(),
        })
    }

    #[tokio::test]
    async fn test_chain_first_success() {
        let later = Fixed::new(SourceKind::EnvironmentVariablePair, client);
        let later_calls = Arc::clone(&later.calls);
        let chain = SourceChain::new(vec![])
            .with(Fixed::new(SourceKind::GatewayInjectedToken, token))
            .with(later);

        let resolution = chain.resolve(&ResolutionContext::new("a")).await.unwrap();
        assert!(
            matches!(resolution, ChainResolution::Credential(c) if c.access_token() == "ya29.first")
        );
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_chain_fallback() {
        let chain = SourceChain::new(vec![])
            .with(Fixed::new(SourceKind::GatewayInjectedToken, absent))
            .with(Fixed::new(SourceKind::EnvironmentVariablePair, client));

        match chain.resolve(&ResolutionContext::new("a")).await.unwrap() {
            ChainResolution::Client { client, checked } => {
                assert_eq!(client.client_id, "id");
                assert_eq!(checked.len(), 2);
                assert!(checked[0].starts_with("gateway"));
            }
            other => panic!("Expected client, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_chain_all_absent() {
        let chain = SourceChain::new(vec![])
            .with(Fixed::new(SourceKind::EnvironmentVariablePair, absent))
            .with(Fixed::new(SourceKind::DefaultSecretFile, absent));

        let err = chain.resolve(&ResolutionContext::new("a")).await.unwrap_err();
        match err {
            Error::Configuration { checked, .. } => {
                assert_eq!(
                    checked,
                    vec![
                        "environment (nothing)".to_string(),
                        "default_secret_file (nothing)".to_string()
                    ]
                );
            }
            other => panic!("Expected configuration error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_chain_hard_failure_stops() {
        let later = Fixed::new(SourceKind::DefaultSecretFile, client);
        let later_calls = Arc::clone(&later.calls);
        let chain = SourceChain::new(vec![])
            .with(Fixed::new(SourceKind::EnvironmentVariablePair, absent))
            .with(Fixed::new(SourceKind::CustomSecretFile, broken))
            .with(later);

        let err = chain.resolve(&ResolutionContext::new("a")).await.unwrap_err();
        match err {
            Error::MalformedSecret { checked, .. } => assert_eq!(checked.len(), 2),
            other => panic!("Expected malformed secret, got {:?}", other),
        }
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_standard_order() {
        let config = Arc::new(ResolverConfig::from_sources(
            Arc::new(crate::config::MemoryEnv::new()),
            Arc::new(crate::config::DotEnv::empty()),
        ));
        assert_eq!(
            SourceChain::standard(config).source_names(),
            vec![
                "gateway",
                "environment",
                "dotenv",
                "custom_secret_file",
                "default_secret_file"
            ]
        );
    }
}

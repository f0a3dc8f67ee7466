//! Credential resolution across the precedence chain and the token store.

use std::sync::Arc;

use dashmap::DashMap;
use secrecy::ExposeSecret;
use tokio::sync::Mutex;
use tracing::Instrument;

use super::providers::{ChainResolution, SourceChain};
use super::storage::{FileTokenStore, StoredToken, TokenSchema, TokenStore};
use super::{
    ClientDescriptor, ConsentFlow, Credential, HttpTokenExchange, ResolutionContext,
    ResolverConfig, TokenExchange,
};
use crate::observability::ResolveSpan;
use crate::{Error, Result};

type LockKey = (TokenSchema, String);
type LockMap = DashMap<LockKey, Arc<Mutex<()>>>;

/// Resolves bearer credentials for Workspace API calls.
///
/// Safe to share across tasks. Calls for different accounts run independently;
/// calls for the same account serialize the read-refresh-write of its stored
/// token, so one expired token triggers exactly one refresh.
pub struct CredentialResolver {
    config: Arc<ResolverConfig>,
    chain: SourceChain,
    store: Arc<dyn TokenStore>,
    exchange: Arc<dyn TokenExchange>,
    consent: Option<Arc<dyn ConsentFlow>>,
    locks: LockMap,
}

impl CredentialResolver {
    /// Standard chain, file store under the configured credentials directory
    /// and the HTTPS token endpoint client.
    pub fn new(config: Arc<ResolverConfig>) -> Result<Self> {
        Ok(Self {
            chain: SourceChain::standard(Arc::clone(&config)),
            store: Arc::new(FileTokenStore::new(config.credentials_dir.clone())),
            exchange: Arc::new(HttpTokenExchange::new()?),
            consent: None,
            locks: DashMap::new(),
            config,
        })
    }

    /// Same as [`CredentialResolver::new`] but with caller-supplied collaborators.
    pub fn with_parts(
        config: Arc<ResolverConfig>,
        store: Arc<dyn TokenStore>,
        exchange: Arc<dyn TokenExchange>,
    ) -> Self {
        Self {
            chain: SourceChain::standard(Arc::clone(&config)),
            store,
            exchange,
            consent: None,
            locks: DashMap::new(),
            config,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_exchange(mut self, exchange: Arc<dyn TokenExchange>) -> Self {
        self.exchange = exchange;
        self
    }

    pub fn with_consent(mut self, consent: Arc<dyn ConsentFlow>) -> Self {
        self.consent = Some(consent);
        self
    }

    pub fn with_chain(mut self, chain: SourceChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Accounts with a resolution currently holding or awaiting the token lock.
    pub fn in_flight(&self) -> usize {
        self.locks.len()
    }

    /// Resolve a credential for `ctx.account_id`.
    pub async fn resolve(&self, ctx: &ResolutionContext) -> Result<Credential> {
        let span = ResolveSpan::new(&ctx.account_id, ctx.interactive);
        let result = self
            .resolve_inner(ctx)
            .instrument(span.span().clone())
            .await;
        span.finish(&result);
        result
    }

    /// Convenience wrapper building the context inline.
    pub async fn resolve_for(
        &self,
        account_id: &str,
        interactive: bool,
        prefer_oauth21: bool,
    ) -> Result<Credential> {
        let ctx = ResolutionContext::new(account_id)
            .interactive(interactive)
            .prefer_oauth21(prefer_oauth21);
        self.resolve(&ctx).await
    }

    /// Drop the stored token for an account, e.g. after the API answered 401.
    pub async fn invalidate(&self, ctx: &ResolutionContext) -> Result<bool> {
        let schema = ctx.schema();
        let lease = AccountLock::acquire(&self.locks, schema, &ctx.account_id);
        let _guard = lease.mutex().lock().await;
        self.store.remove(&ctx.account_id, schema).await
    }

    async fn resolve_inner(&self, ctx: &ResolutionContext) -> Result<Credential> {
        let client = match self.chain.resolve(ctx).await? {
            ChainResolution::Credential(cred) => return Ok(cred),
            ChainResolution::Client { client, checked } => {
                tracing::debug!(
                    account = %ctx.account_id,
                    origin = %client.origin,
                    "Using OAuth client after checking: {}",
                    checked.join(", ")
                );
                client
            }
        };

        let schema = ctx.schema();
        let account = self.effective_account(ctx, schema).await?;

        let lease = AccountLock::acquire(&self.locks, schema, &account);
        let _guard = lease.mutex().lock().await;
        self.token_stage(&client, ctx, &account, schema).await
    }

    /// In single-user mode an account without a token borrows any stored one.
    async fn effective_account(
        &self,
        ctx: &ResolutionContext,
        schema: TokenSchema,
    ) -> Result<String> {
        if !self.config.single_user
            || self.store.load(&ctx.account_id, schema).await?.is_some()
        {
            return Ok(ctx.account_id.clone());
        }

        match self.store.accounts(schema).await?.into_iter().next() {
            Some(other) => {
                tracing::info!(
                    requested = %ctx.account_id,
                    using = %other,
                    "Single-user mode: using stored credentials of another account"
                );
                Ok(other)
            }
            None => Ok(ctx.account_id.clone()),
        }
    }

    async fn token_stage(
        &self,
        client: &ClientDescriptor,
        ctx: &ResolutionContext,
        account: &str,
        schema: TokenSchema,
    ) -> Result<Credential> {
        if let Some(token) = self.store.load(account, schema).await? {
            let cred = token.to_credential();
            let usable = !cred.access_token().is_empty();

            if usable && !cred.needs_refresh(self.config.refresh_skew) {
                tracing::info!(account, source = "stored_token", "Credential resolved");
                return Ok(cred);
            }

            if token.has_refresh_token() {
                match self.refresh(client, account, schema, &token).await {
                    Ok(fresh) => return Ok(fresh),
                    Err(e) if e.is_rejected() => {
                        tracing::warn!(account, "Refresh rejected, clearing stored token: {}", e);
                        self.store.remove(account, schema).await?;
                        if !ctx.interactive || self.consent.is_none() {
                            return Err(e);
                        }
                    }
                    Err(e) if usable && !cred.is_expired() => {
                        tracing::warn!(account, "Early refresh failed, using current token: {}", e);
                        return Ok(cred);
                    }
                    Err(e) => return Err(e),
                }
            } else if usable && !cred.is_expired() {
                return Ok(cred);
            } else {
                tracing::debug!(account, "Stored token expired and has no refresh token");
            }
        }

        if ctx.interactive {
            return self.consent(client, ctx, account, schema).await;
        }

        Err(Error::not_authenticated(
            account,
            "no valid stored token; authorize interactively to create one",
        ))
    }

    async fn refresh(
        &self,
        client: &ClientDescriptor,
        account: &str,
        schema: TokenSchema,
        token: &StoredToken,
    ) -> Result<Credential> {
        let Some(refresh_token) = token.refresh_token.as_ref() else {
            return Err(Error::not_authenticated(account, "no refresh token"));
        };

        tracing::debug!(account, "Refreshing access token");
        let grant = self
            .exchange
            .refresh(client, account, refresh_token.expose_secret(), &token.scopes)
            .await?;

        let updated = StoredToken::from_grant(
            grant,
            client,
            token.refresh_token.clone(),
            &token.scopes,
        );
        self.store.save(account, schema, &updated).await?;
        tracing::info!(account, source = "stored_token", "Credential refreshed");
        Ok(updated.to_credential())
    }

    async fn consent(
        &self,
        client: &ClientDescriptor,
        ctx: &ResolutionContext,
        account: &str,
        schema: TokenSchema,
    ) -> Result<Credential> {
        let Some(consent) = self.consent.as_ref() else {
            return Err(Error::not_authenticated(
                account,
                "interactive authorization requested but no consent flow is configured",
            ));
        };

        tracing::info!(account, "Starting interactive authorization");
        let grant = consent.authorize(client, ctx, &self.config.scopes).await?;
        let token = StoredToken::from_grant(grant, client, None, &self.config.scopes);
        self.store.save(account, schema, &token).await?;
        tracing::info!(account, source = "consent", "Credential resolved");
        Ok(token.to_credential())
    }
}

/// Holds a clone of an account's mutex and removes the map entry once no
/// other caller holds one.
struct AccountLock<'a> {
    locks: &'a LockMap,
    key: LockKey,
    mutex: Arc<Mutex<()>>,
}

impl<'a> AccountLock<'a> {
    fn acquire(locks: &'a LockMap, schema: TokenSchema, account: &str) -> Self {
        let key = (schema, account.to_string());
        let mutex = Arc::clone(
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        Self { locks, key, mutex }
    }

    fn mutex(&self) -> &Mutex<()> {
        &self.mutex
    }
}

impl Drop for AccountLock<'_> {
    fn drop(&mut self) {
        // Map entry plus our own clone.
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) <= 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::storage::MemoryTokenStore;
    use crate::auth::{SourceKind, TokenGrant};
    use crate::config::{DotEnv, MemoryEnv};
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use secrecy::SecretString;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingExchange {
        calls: AtomicUsize,
        reject: bool,
    }

    impl CountingExchange {
        fn new(reject: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                reject,
            }
        }
    }

    #[async_trait]
    impl TokenExchange for CountingExchange {
        async fn refresh(
            &self,
            _client: &ClientDescriptor,
            account: &str,
            _refresh_token: &str,
            _scopes: &[String],
        ) -> Result<TokenGrant> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.reject {
                return Err(Error::rejected(account, "invalid_grant"));
            }
            Ok(TokenGrant {
                access_token: format!("ya29.refreshed-{}", n),
                refresh_token: None,
                expires_in: Some(3600),
                scope: None,
                token_type: Some("Bearer".into()),
            })
        }

        async fn exchange_code(
            &self,
            _client: &ClientDescriptor,
            account: &str,
            _code: &str,
            _redirect_uri: &str,
        ) -> Result<TokenGrant> {
            Err(Error::rejected(account, "unused"))
        }
    }

    fn config() -> Arc<ResolverConfig> {
        let env = MemoryEnv::new()
            .with("GOOGLE_OAUTH_CLIENT_ID", "cid")
            .with("GOOGLE_OAUTH_CLIENT_SECRET", "csecret");
        Arc::new(
            ResolverConfig::builder_from(Arc::new(env), Arc::new(DotEnv::empty()))
                .default_secret_path("/nonexistent/client_secret.json")
                .build(),
        )
    }

    fn stored(access: &str, expires_in: Duration, refresh: Option<&str>) -> StoredToken {
        StoredToken {
            access_token: SecretString::from(access.to_string()),
            refresh_token: refresh.map(|r| SecretString::from(r.to_string())),
            expiry: Some(Utc::now() + expires_in),
            scopes: vec!["openid".into()],
            token_uri: None,
            client_id: None,
            client_secret: None,
        }
    }

    #[tokio::test]
    async fn test_fresh_stored_token() {
        let store = Arc::new(MemoryTokenStore::new());
        store
            .save("a", TokenSchema::Legacy, &stored("ya29.ok", Duration::hours(1), Some("1//r")))
            .await
            .unwrap();
        let exchange = Arc::new(CountingExchange::new(false));
        let resolver = CredentialResolver::with_parts(config(), store, exchange.clone());

        let cred = resolver.resolve(&ResolutionContext::new("a")).await.unwrap();
        assert_eq!(cred.access_token(), "ya29.ok");
        assert_eq!(cred.source(), Some(SourceKind::OnDiskRefreshableToken));
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 0);
        assert_eq!(resolver.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token() {
        let store = Arc::new(MemoryTokenStore::new());
        store
            .save("a", TokenSchema::Legacy, &stored("ya29.old", -Duration::hours(1), None))
            .await
            .unwrap();
        let resolver = CredentialResolver::with_parts(
            config(),
            store,
            Arc::new(CountingExchange::new(false)),
        );

        let err = resolver.resolve(&ResolutionContext::new("a")).await.unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated { .. }));
    }

    #[tokio::test]
    async fn test_within_skew_without_refresh_token_is_used() {
        let store = Arc::new(MemoryTokenStore::new());
        store
            .save("a", TokenSchema::Legacy, &stored("ya29.soon", Duration::seconds(20), None))
            .await
            .unwrap();
        let resolver = CredentialResolver::with_parts(
            config(),
            store,
            Arc::new(CountingExchange::new(false)),
        );

        let cred = resolver.resolve(&ResolutionContext::new("a")).await.unwrap();
        assert_eq!(cred.access_token(), "ya29.soon");
    }

    #[tokio::test]
    async fn test_rejected_without_consent_flow_stays_rejected() {
        let store = Arc::new(MemoryTokenStore::new());
        store
            .save("a", TokenSchema::Legacy, &stored("ya29.old", -Duration::hours(1), Some("1//r")))
            .await
            .unwrap();
        let resolver = CredentialResolver::with_parts(
            config(),
            store.clone(),
            Arc::new(CountingExchange::new(true)),
        );

        let ctx = ResolutionContext::new("a").interactive(true);
        let err = resolver.resolve(&ctx).await.unwrap_err();
        assert!(err.is_rejected(), "{err:?}");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_events_nest_under_resolve_span() {
        use std::sync::Mutex as StdMutex;
        use tracing::{Event, Subscriber};
        use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
        use tracing_subscriber::registry::LookupSpan;

        #[derive(Clone, Default)]
        struct ParentNames(Arc<StdMutex<Vec<Option<String>>>>);

        impl<S> Layer<S> for ParentNames
        where
            S: Subscriber + for<'a> LookupSpan<'a>,
        {
            fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
                let parent = ctx.event_span(event).map(|span| span.name().to_string());
                self.0.lock().unwrap().push(parent);
            }
        }

        let recorded = ParentNames::default();
        let subscriber = tracing_subscriber::registry().with(recorded.clone());
        let _default = tracing::subscriber::set_default(subscriber);

        let store = Arc::new(MemoryTokenStore::new());
        store
            .save("a", TokenSchema::Legacy, &stored("ya29.ok", Duration::hours(1), None))
            .await
            .unwrap();
        let resolver =
            CredentialResolver::with_parts(config(), store, Arc::new(CountingExchange::new(false)));
        resolver.resolve(&ResolutionContext::new("a")).await.unwrap();

        let parents = recorded.0.lock().unwrap().clone();
        assert!(!parents.is_empty());
        assert!(
            parents
                .iter()
                .all(|p| p.as_deref() == Some("credential.resolve")),
            "{parents:?}"
        );
    }

    #[tokio::test]
    async fn test_interactive_without_consent_flow() {
        let resolver = CredentialResolver::with_parts(
            config(),
            Arc::new(MemoryTokenStore::new()),
            Arc::new(CountingExchange::new(false)),
        );
        let ctx = ResolutionContext::new("a").interactive(true);
        let err = resolver.resolve(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("no consent flow"));
    }

    #[tokio::test]
    async fn test_single_user_borrows_stored_token() {
        let env = MemoryEnv::new()
            .with("GOOGLE_OAUTH_CLIENT_ID", "cid")
            .with("GOOGLE_OAUTH_CLIENT_SECRET", "csecret")
            .with("MCP_SINGLE_USER_MODE", "1");
        let config = Arc::new(ResolverConfig::from_sources(
            Arc::new(env),
            Arc::new(DotEnv::empty()),
        ));
        assert!(config.single_user);

        let store = Arc::new(MemoryTokenStore::new());
        store
            .save(
                "owner@example.com",
                TokenSchema::Legacy,
                &stored("ya29.owner", Duration::hours(1), None),
            )
            .await
            .unwrap();
        let resolver =
            CredentialResolver::with_parts(config, store, Arc::new(CountingExchange::new(false)));

        let cred = resolver
            .resolve(&ResolutionContext::new("someone@example.com"))
            .await
            .unwrap();
        assert_eq!(cred.access_token(), "ya29.owner");
    }

    #[tokio::test]
    async fn test_invalidate() {
        let store = Arc::new(MemoryTokenStore::new());
        store
            .save("a", TokenSchema::Legacy, &stored("ya29.ok", Duration::hours(1), None))
            .await
            .unwrap();
        let resolver = CredentialResolver::with_parts(
            config(),
            store.clone(),
            Arc::new(CountingExchange::new(false)),
        );

        assert!(resolver.invalidate(&ResolutionContext::new("a")).await.unwrap());
        assert!(store.is_empty());
        assert_eq!(resolver.in_flight(), 0);
    }

    #[test]
    fn test_account_lock_clears_entry() {
        let locks = LockMap::new();
        {
            let first = AccountLock::acquire(&locks, TokenSchema::Legacy, "a");
            {
                let _second = AccountLock::acquire(&locks, TokenSchema::Legacy, "a");
                assert_eq!(locks.len(), 1);
            }
            assert_eq!(locks.len(), 1);
            assert!(first.mutex().try_lock().is_ok());
        }
        assert!(locks.is_empty());
    }
}

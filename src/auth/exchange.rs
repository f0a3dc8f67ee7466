//! Token endpoint client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::ClientDescriptor;
use crate::{Error, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on a reported token lifetime (one year).
const MAX_EXPIRES_IN_SECS: i64 = 365 * 24 * 60 * 60;

/// Successful token endpoint response.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenGrant {
    /// Absolute expiry, computed from `expires_in` at call time.
    ///
    /// Negative lifetimes count as already expired and oversized ones are
    /// capped at one year.
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        let secs = self.expires_in?.clamp(0, MAX_EXPIRES_IN_SECS);
        chrono::Duration::try_seconds(secs)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
    }

    /// Granted scopes, if the server reported them.
    pub fn scopes(&self) -> Option<Vec<String>> {
        self.scope
            .as_ref()
            .map(|s| s.split_whitespace().map(String::from).collect())
    }
}

#[derive(Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchanges grants with an OAuth token endpoint.
///
/// Implementations report a refused grant as [`Error::Rejected`] so the
/// resolver can tell revocation apart from transient failures.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Exchange a refresh token for a new access token.
    async fn refresh(
        &self,
        client: &ClientDescriptor,
        account: &str,
        refresh_token: &str,
        scopes: &[String],
    ) -> Result<TokenGrant>;

    /// Exchange an authorization code from the consent redirect.
    async fn exchange_code(
        &self,
        client: &ClientDescriptor,
        account: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant>;
}

/// [`TokenExchange`] over HTTPS using the client's `token_uri`.
#[derive(Debug, Clone)]
pub struct HttpTokenExchange {
    http: reqwest::Client,
}

impl HttpTokenExchange {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self { http })
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn post_form(
        &self,
        client: &ClientDescriptor,
        account: &str,
        params: &[(&str, &str)],
    ) -> Result<TokenGrant> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();

        let response = self
            .http
            .post(&client.token_uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .header("accept", "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            let grant: TokenGrant = serde_json::from_str(&text)?;
            if grant.access_token.is_empty() {
                return Err(Error::Api {
                    status: status.as_u16(),
                    message: "token endpoint returned an empty access token".into(),
                });
            }
            return Ok(grant);
        }

        let message = match serde_json::from_str::<TokenErrorBody>(&text) {
            Ok(body) => match body.error_description {
                Some(desc) => format!("{}: {}", body.error, desc),
                None => body.error,
            },
            Err(_) => text,
        };

        match status.as_u16() {
            400 | 401 => Err(Error::rejected(account, message)),
            code => Err(Error::Api {
                status: code,
                message,
            }),
        }
    }
}

#[async_trait]
impl TokenExchange for HttpTokenExchange {
    async fn refresh(
        &self,
        client: &ClientDescriptor,
        account: &str,
        refresh_token: &str,
        scopes: &[String],
    ) -> Result<TokenGrant> {
        let scope = scopes.join(" ");
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret()),
        ];
        if !scope.is_empty() {
            params.push(("scope", scope.as_str()));
        }
        self.post_form(client, account, &params).await
    }

    async fn exchange_code(
        &self,
        client: &ClientDescriptor,
        account: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret()),
        ];
        self.post_form(client, account, &params).await
    }
}

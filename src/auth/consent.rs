//! Interactive consent seam.

use async_trait::async_trait;

use super::{ClientDescriptor, ResolutionContext, TokenGrant};
use crate::Result;

/// Runs the browser consent flow for an account and returns the resulting grant.
///
/// The redirect handling lives with the embedding server; a typical
/// implementation presents [`ClientDescriptor::authorization_url`] to the user,
/// waits for the callback and finishes with
/// [`TokenExchange::exchange_code`](super::TokenExchange::exchange_code).
#[async_trait]
pub trait ConsentFlow: Send + Sync {
    async fn authorize(
        &self,
        client: &ClientDescriptor,
        ctx: &ResolutionContext,
        scopes: &[String],
    ) -> Result<TokenGrant>;
}

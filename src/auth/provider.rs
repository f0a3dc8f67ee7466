//! Credential source trait.

use async_trait::async_trait;

use super::{ClientDescriptor, Credential, ResolutionContext, SourceKind};
use crate::Result;

/// Result of asking one source for credentials.
#[derive(Clone, Debug)]
pub enum SourceOutcome {
    /// A ready-to-use credential; resolution ends here.
    Credential(Credential),
    /// An OAuth client to resolve the stored token against.
    Client(ClientDescriptor),
    /// Nothing here; the reason is reported if every source comes up empty.
    Absent(String),
}

/// One link of the precedence chain.
///
/// Returning `Err` is a hard failure that stops the chain: the source was
/// explicitly configured but its input is unusable.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Source name for debugging.
    fn name(&self) -> &str {
        self.kind().as_str()
    }

    fn kind(&self) -> SourceKind;

    /// Attempt to produce a credential or client descriptor.
    async fn attempt(&self, ctx: &ResolutionContext) -> Result<SourceOutcome>;
}

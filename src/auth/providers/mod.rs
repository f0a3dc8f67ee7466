//! Credential source implementations.

mod chain;
mod environment;
mod gateway;
mod secret_file;

pub use chain::{ChainResolution, SourceChain};
pub use environment::{DotEnvProvider, EnvironmentProvider};
pub use gateway::GatewayProvider;
pub use secret_file::{CustomSecretFileProvider, DefaultSecretFileProvider};

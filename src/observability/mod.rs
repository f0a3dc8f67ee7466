//! Tracing for credential resolution.
//!
//! The library only emits `tracing` events and spans. Binaries that want a
//! console subscriber can enable the `subscriber` feature:
//!
//! ```toml
//! workspace-mcp-auth = { version = "0.1", features = ["subscriber"] }
//! ```

mod spans;

pub use spans::ResolveSpan;

/// Install a stderr fmt subscriber filtered by `RUST_LOG`, defaulting to `info`.
///
/// Returns `false` when a global subscriber was already set.
#[cfg(feature = "subscriber")]
#[cfg_attr(docsrs, doc(cfg(feature = "subscriber")))]
pub fn init_tracing() -> bool {
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

//! Process-wide resolver configuration.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Duration;
use directories::BaseDirs;

use crate::config::{DotEnv, MergedEnv, ProcessEnv, VarSource};

pub const GATEWAY_MODE_VAR: &str = "MCP_GATEWAY_MODE";
pub const GATEWAY_TOKEN_VAR: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
pub const CLIENT_ID_VAR: &str = "GOOGLE_OAUTH_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "GOOGLE_OAUTH_CLIENT_SECRET";
pub const CUSTOM_SECRET_PATH_VAR: &str = "GOOGLE_CLIENT_SECRET_PATH";
pub const DEFAULT_SECRET_FILE: &str = "client_secret.json";
pub const CREDENTIALS_DIR_VARS: &[&str] =
    &["WORKSPACE_MCP_CREDENTIALS_DIR", "GOOGLE_MCP_CREDENTIALS_DIR"];
pub const OAUTH21_VAR: &str = "MCP_ENABLE_OAUTH21";
pub const SINGLE_USER_VAR: &str = "MCP_SINGLE_USER_MODE";
pub const USER_EMAIL_VAR: &str = "USER_GOOGLE_EMAIL";

const DEFAULT_CREDENTIALS_SUBDIR: &str = ".google_workspace_mcp/credentials";
const DEFAULT_REFRESH_SKEW_SECS: i64 = 60;

/// Scopes requested on consent and refresh unless overridden.
pub const DEFAULT_SCOPES: &[&str] = &[
    "openid",
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
    "https://www.googleapis.com/auth/script.projects",
    "https://www.googleapis.com/auth/script.deployments",
    "https://www.googleapis.com/auth/script.processes",
];

/// Immutable configuration built once at startup and shared by the resolver.
///
/// `gateway_mode` is read here and stays fixed for the process lifetime. The
/// injected token itself is looked up through `env` on every resolution.
#[derive(Clone)]
pub struct ResolverConfig {
    pub gateway_mode: bool,
    pub gateway_token_var: String,
    pub client_id_var: String,
    pub client_secret_var: String,
    pub custom_secret_path_var: String,
    pub default_secret_path: PathBuf,
    pub credentials_dir: PathBuf,
    pub oauth21_enabled: bool,
    pub single_user: bool,
    pub default_account: Option<String>,
    pub scopes: Vec<String>,
    pub refresh_skew: Duration,
    pub env: Arc<dyn VarSource>,
    pub dotenv: Arc<DotEnv>,
}

impl ResolverConfig {
    /// Read the process environment, layered over the working directory `.env`.
    pub fn from_env() -> Self {
        Self::from_sources(Arc::new(ProcessEnv), DotEnv::process())
    }

    /// Build from explicit variable sources. Startup flags see dotenv values too.
    pub fn from_sources(env: Arc<dyn VarSource>, dotenv: Arc<DotEnv>) -> Self {
        let (gateway_mode, credentials_dir, oauth21_enabled, single_user, default_account) = {
            let merged = MergedEnv::new(env.as_ref(), dotenv.as_ref());
            (
                merged.get_bool(GATEWAY_MODE_VAR),
                credentials_dir_from(&merged),
                merged.get_bool(OAUTH21_VAR),
                merged.get_bool(SINGLE_USER_VAR),
                merged.get_non_empty(USER_EMAIL_VAR),
            )
        };

        Self {
            gateway_mode,
            gateway_token_var: GATEWAY_TOKEN_VAR.to_string(),
            client_id_var: CLIENT_ID_VAR.to_string(),
            client_secret_var: CLIENT_SECRET_VAR.to_string(),
            custom_secret_path_var: CUSTOM_SECRET_PATH_VAR.to_string(),
            default_secret_path: PathBuf::from(DEFAULT_SECRET_FILE),
            credentials_dir,
            oauth21_enabled,
            single_user,
            default_account,
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            refresh_skew: Duration::seconds(DEFAULT_REFRESH_SKEW_SECS),
            env,
            dotenv,
        }
    }

    /// Builder seeded from the process environment.
    pub fn builder() -> ResolverConfigBuilder {
        ResolverConfigBuilder {
            config: Self::from_env(),
        }
    }

    /// Builder seeded from explicit sources.
    pub fn builder_from(env: Arc<dyn VarSource>, dotenv: Arc<DotEnv>) -> ResolverConfigBuilder {
        ResolverConfigBuilder {
            config: Self::from_sources(env, dotenv),
        }
    }
}

fn credentials_dir_from(vars: &dyn VarSource) -> PathBuf {
    CREDENTIALS_DIR_VARS
        .iter()
        .find_map(|key| vars.get_non_empty(key))
        .map(PathBuf::from)
        .or_else(|| BaseDirs::new().map(|dirs| dirs.home_dir().join(DEFAULT_CREDENTIALS_SUBDIR)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_SUBDIR))
}

impl fmt::Debug for ResolverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverConfig")
            .field("gateway_mode", &self.gateway_mode)
            .field("gateway_token_var", &self.gateway_token_var)
            .field("client_id_var", &self.client_id_var)
            .field("client_secret_var", &self.client_secret_var)
            .field("custom_secret_path_var", &self.custom_secret_path_var)
            .field("default_secret_path", &self.default_secret_path)
            .field("credentials_dir", &self.credentials_dir)
            .field("oauth21_enabled", &self.oauth21_enabled)
            .field("single_user", &self.single_user)
            .field("default_account", &self.default_account)
            .field("scopes", &self.scopes)
            .field("refresh_skew", &self.refresh_skew)
            .field("env", &self.env.name())
            .field("dotenv", &self.dotenv.path())
            .finish()
    }
}

/// Builder for ResolverConfig.
pub struct ResolverConfigBuilder {
    config: ResolverConfig,
}

impl ResolverConfigBuilder {
    pub fn gateway_mode(mut self, enabled: bool) -> Self {
        self.config.gateway_mode = enabled;
        self
    }

    pub fn gateway_token_var(mut self, var: impl Into<String>) -> Self {
        self.config.gateway_token_var = var.into();
        self
    }

    pub fn client_vars(mut self, id_var: impl Into<String>, secret_var: impl Into<String>) -> Self {
        self.config.client_id_var = id_var.into();
        self.config.client_secret_var = secret_var.into();
        self
    }

    pub fn custom_secret_path_var(mut self, var: impl Into<String>) -> Self {
        self.config.custom_secret_path_var = var.into();
        self
    }

    pub fn default_secret_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.default_secret_path = path.into();
        self
    }

    pub fn credentials_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.credentials_dir = dir.into();
        self
    }

    pub fn oauth21_enabled(mut self, enabled: bool) -> Self {
        self.config.oauth21_enabled = enabled;
        self
    }

    pub fn single_user(mut self, enabled: bool) -> Self {
        self.config.single_user = enabled;
        self
    }

    pub fn default_account(mut self, account: impl Into<String>) -> Self {
        self.config.default_account = Some(account.into());
        self
    }

    /// Set scopes (replaces the defaults).
    pub fn scopes(mut self, scopes: Vec<String>) -> Self {
        self.config.scopes = scopes;
        self
    }

    pub fn refresh_skew(mut self, skew: Duration) -> Self {
        self.config.refresh_skew = skew;
        self
    }

    pub fn build(self) -> ResolverConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryEnv;

    fn sources(env: MemoryEnv, dotenv: DotEnv) -> (Arc<dyn VarSource>, Arc<DotEnv>) {
        (Arc::new(env), Arc::new(dotenv))
    }

    #[test]
    fn test_defaults() {
        let (env, dotenv) = sources(MemoryEnv::new(), DotEnv::empty());
        let config = ResolverConfig::from_sources(env, dotenv);
        assert!(!config.gateway_mode);
        assert!(!config.oauth21_enabled);
        assert!(!config.single_user);
        assert_eq!(config.gateway_token_var, GATEWAY_TOKEN_VAR);
        assert_eq!(config.default_secret_path, PathBuf::from(DEFAULT_SECRET_FILE));
        assert!(config.credentials_dir.ends_with("credentials"));
        assert_eq!(config.scopes.len(), DEFAULT_SCOPES.len());
    }

    #[test]
    fn test_flags_from_env() {
        let env = MemoryEnv::new()
            .with(GATEWAY_MODE_VAR, "true")
            .with(OAUTH21_VAR, "1")
            .with(USER_EMAIL_VAR, "user@example.com")
            .with("WORKSPACE_MCP_CREDENTIALS_DIR", "/var/creds")
            .with("GOOGLE_MCP_CREDENTIALS_DIR", "/ignored");
        let (env, dotenv) = sources(env, DotEnv::empty());
        let config = ResolverConfig::from_sources(env, dotenv);
        assert!(config.gateway_mode);
        assert!(config.oauth21_enabled);
        assert_eq!(config.default_account.as_deref(), Some("user@example.com"));
        assert_eq!(config.credentials_dir, PathBuf::from("/var/creds"));
    }

    #[test]
    fn test_flags_from_dotenv() {
        let dotenv: DotEnv = [(SINGLE_USER_VAR, "yes"), ("GOOGLE_MCP_CREDENTIALS_DIR", "/d")]
            .into_iter()
            .collect();
        let (env, dotenv) = sources(MemoryEnv::new(), dotenv);
        let config = ResolverConfig::from_sources(env, dotenv);
        assert!(config.single_user);
        assert_eq!(config.credentials_dir, PathBuf::from("/d"));
    }

    #[test]
    fn test_builder() {
        let (env, dotenv) = sources(MemoryEnv::new(), DotEnv::empty());
        let config = ResolverConfig::builder_from(env, dotenv)
            .gateway_mode(true)
            .gateway_token_var("TEST_TOKEN")
            .credentials_dir("/tmp/creds")
            .refresh_skew(Duration::zero())
            .scopes(vec!["openid".into()])
            .build();
        assert!(config.gateway_mode);
        assert_eq!(config.gateway_token_var, "TEST_TOKEN");
        assert_eq!(config.scopes, vec!["openid".to_string()]);
        assert!(format!("{:?}", config).contains("memory"));
    }
}

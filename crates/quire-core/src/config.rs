use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuireConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Replies nested deeper than this are re-hung under their ancestor at
    /// this depth when served.
    #[serde(default = "default_max_reply_depth")]
    pub max_reply_depth: usize,
    /// Allowed CORS origins. Empty disables the CORS layer.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_reply_depth: default_max_reply_depth(),
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub account: String,
    /// Hex blake3 digest of the bearer token.
    pub digest: String,
    #[serde(default)]
    pub moderator: bool,
}

/// Where the effective config came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    Environment(PathBuf),
    UserDir(PathBuf),
    Defaults,
}

/// Parse a config file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid TOML.
pub fn load_config_file(path: &Path) -> Result<QuireConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<QuireConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Locate and load the effective config.
///
/// Precedence: `explicit` path, then `$QUIRE_CONFIG`, then
/// `<config_dir>/quire/config.toml`, then built-in defaults. After loading,
/// `$QUIRE_DB` and `$QUIRE_BIND` override the store path and bind address.
///
/// # Errors
///
/// Returns an error if an explicitly named file is missing or any located
/// file fails to parse.
pub fn resolve_config(explicit: Option<&Path>) -> Result<(QuireConfig, ConfigSource)> {
    let env_path = env::var_os("QUIRE_CONFIG").map(PathBuf::from);
    let user_path = dirs::config_dir().map(|dir| dir.join("quire/config.toml"));

    let source = locate(explicit, env_path, user_path);
    let mut config = match &source {
        ConfigSource::Explicit(path)
        | ConfigSource::Environment(path)
        | ConfigSource::UserDir(path) => load_config_file(path)?,
        ConfigSource::Defaults => QuireConfig::default(),
    };

    apply_overrides(
        &mut config,
        env::var("QUIRE_DB").ok(),
        env::var("QUIRE_BIND").ok(),
    );
    Ok((config, source))
}

fn locate(
    explicit: Option<&Path>,
    env_path: Option<PathBuf>,
    user_path: Option<PathBuf>,
) -> ConfigSource {
    if let Some(path) = explicit {
        return ConfigSource::Explicit(path.to_path_buf());
    }
    if let Some(path) = env_path.filter(|p| !p.as_os_str().is_empty()) {
        return ConfigSource::Environment(path);
    }
    match user_path {
        Some(path) if path.exists() => ConfigSource::UserDir(path),
        _ => ConfigSource::Defaults,
    }
}

/// Apply environment-style overrides. Blank values are ignored.
pub fn apply_overrides(config: &mut QuireConfig, db: Option<String>, bind: Option<String>) {
    if let Some(db) = db.filter(|v| !v.trim().is_empty()) {
        config.store.path = PathBuf::from(db.trim());
    }
    if let Some(bind) = bind.filter(|v| !v.trim().is_empty()) {
        config.server.bind = bind.trim().to_string();
    }
}

fn default_store_path() -> PathBuf {
    dirs::data_dir().map_or_else(
        || PathBuf::from("quire.sqlite3"),
        |dir| dir.join("quire/quire.sqlite3"),
    )
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

const fn default_max_reply_depth() -> usize {
    32
}

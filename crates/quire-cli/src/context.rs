//! Per-invocation settings shared by every command handler.

use anyhow::Context as _;
use quire_core::config::{self, ConfigSource, QuireConfig};
use quire_core::db;
use quire_core::error::ErrorCode;
use quire_core::identity::{Identity, TokenDirectory};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::output::{CliError, OutputMode};

#[derive(Debug)]
pub struct AppContext {
    pub config: QuireConfig,
    pub source: ConfigSource,
    pub output: OutputMode,
    act_as: Option<String>,
}

impl AppContext {
    /// Resolve the effective config and apply `--db` on top of it.
    pub fn load(
        config_flag: Option<&Path>,
        db_flag: Option<PathBuf>,
        output: OutputMode,
        act_as: Option<String>,
    ) -> anyhow::Result<Self> {
        let (mut config, source) = config::resolve_config(config_flag).map_err(|e| {
            CliError::coded(format!("{e:#}"), ErrorCode::ConfigParseError)
        })?;
        if let Some(db) = db_flag {
            config.store.path = db;
        }
        debug!(?source, store = %config.store.path.display(), "config resolved");
        Ok(Self {
            config,
            source,
            output,
            act_as,
        })
    }

    /// Context over an explicit store with default settings otherwise.
    #[cfg(test)]
    pub fn for_store(path: &Path, output: OutputMode, act_as: Option<&str>) -> Self {
        let mut config = QuireConfig::default();
        config.store.path = path.to_path_buf();
        Self {
            config,
            source: ConfigSource::Defaults,
            output,
            act_as: act_as.map(str::to_string),
        }
    }

    pub fn store_path(&self) -> &Path {
        &self.config.store.path
    }

    /// Connect to the existing store. Never creates it.
    pub fn connect(&self) -> anyhow::Result<Connection> {
        db::connect(self.store_path()).map_err(|e| {
            CliError::coded(format!("{e:#}"), ErrorCode::StoreUnavailable).into()
        })
    }

    /// Create or migrate the store.
    pub fn open_or_create(&self) -> anyhow::Result<Connection> {
        db::open_store(self.store_path())
            .with_context(|| format!("initialize store at {}", self.store_path().display()))
    }

    /// Identity for moderation commands: the named account with `--as`,
    /// otherwise the local operator.
    pub fn actor(&self) -> anyhow::Result<Identity> {
        self.act_as
            .as_deref()
            .map_or_else(|| Ok(Identity::operator()), |name| self.configured(name))
    }

    /// Identity for submissions: the named account with `--as`, otherwise
    /// an anonymous reader.
    pub fn submitter(&self) -> anyhow::Result<Identity> {
        self.act_as
            .as_deref()
            .map_or(Ok(Identity::Anonymous), |name| self.configured(name))
    }

    fn configured(&self, name: &str) -> anyhow::Result<Identity> {
        TokenDirectory::from_config(&self.config.auth)
            .account(name)
            .ok_or_else(|| {
                CliError::coded(
                    format!("account '{name}' is not configured under [[auth.tokens]]"),
                    ErrorCode::Unauthorized,
                )
                .into()
            })
    }
}

use anyhow::Result;
use quire_core::config::ConfigSource;
use quire_core::db::migrations;
use serde::Serialize;
use std::io::Write;
use tracing::info;

use crate::context::AppContext;
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Debug, Serialize)]
pub struct InitReport {
    pub store: String,
    pub schema_version: u32,
    pub config: String,
}

fn describe_source(source: &ConfigSource) -> String {
    match source {
        ConfigSource::Explicit(path) => format!("{} (--config)", path.display()),
        ConfigSource::Environment(path) => format!("{} ($QUIRE_CONFIG)", path.display()),
        ConfigSource::UserDir(path) => path.display().to_string(),
        ConfigSource::Defaults => "built-in defaults".to_string(),
    }
}

/// Execute `quire init`: create the store file if needed and migrate it to
/// the latest schema. Safe to run repeatedly.
///
/// # Errors
///
/// Returns an error if the store cannot be created or migrated.
pub fn run_init(ctx: &AppContext) -> Result<()> {
    let conn = ctx.open_or_create()?;
    let schema_version = migrations::current_schema_version(&conn)?;
    info!(store = %ctx.store_path().display(), schema_version, "store ready");

    let report = InitReport {
        store: ctx.store_path().display().to_string(),
        schema_version,
        config: describe_source(&ctx.source),
    };

    render_mode(
        ctx.output,
        &report,
        |r, w| writeln!(w, "{}\tv{}", r.store, r.schema_version),
        |r, w| {
            pretty_section(w, "Store initialized")?;
            pretty_kv(w, "store", &r.store)?;
            pretty_kv(w, "schema", format!("v{}", r.schema_version))?;
            pretty_kv(w, "config", &r.config)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputMode;
    use quire_core::db;

    #[test]
    fn init_creates_a_connectable_store() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested/quire.sqlite3");
        let ctx = AppContext::for_store(&path, OutputMode::Json, None);

        run_init(&ctx).expect("init");
        run_init(&ctx).expect("init is idempotent");
        assert!(db::connect(&path).is_ok());
    }

    #[test]
    fn sources_are_described() {
        assert_eq!(describe_source(&ConfigSource::Defaults), "built-in defaults");
        assert!(
            describe_source(&ConfigSource::Explicit("/etc/q.toml".into())).ends_with("(--config)")
        );
    }
}

use anyhow::{Context as _, Result};
use clap::Args;

use crate::context::AppContext;
use crate::server;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen address, e.g. `127.0.0.1:8080`. Overrides config and $QUIRE_BIND.
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,
}

/// Execute `quire serve`. Blocks until SIGINT/SIGTERM.
///
/// # Errors
///
/// Returns an error if the store is missing, the address cannot be bound,
/// or the server fails.
pub fn run_serve(args: &ServeArgs, ctx: &AppContext) -> Result<()> {
    // Fail fast on a missing or stale store rather than on the first request.
    drop(ctx.connect()?);

    let mut config = ctx.config.clone();
    if let Some(bind) = &args.bind {
        config.server.bind.clone_from(bind);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;
    runtime.block_on(server::serve(&config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: ServeArgs,
    }

    #[test]
    fn bind_is_optional() {
        let w = Wrapper::parse_from(["test"]);
        assert!(w.args.bind.is_none());

        let w = Wrapper::parse_from(["test", "--bind", "0.0.0.0:9000"]);
        assert_eq!(w.args.bind.as_deref(), Some("0.0.0.0:9000"));
    }
}

use anyhow::Result;
use clap::Subcommand;
use quire_core::identity::TokenDirectory;
use serde::Serialize;
use std::io::Write;

use crate::context::AppContext;
use crate::output::{pretty_section, render_mode};

#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    #[command(
        about = "Print the config digest of a bearer token",
        after_help = "EXAMPLES:\n    # Register a moderator token\n    quire token digest \"$(openssl rand -hex 32)\" --account ann --moderator"
    )]
    Digest {
        /// The plaintext token callers will send as `Authorization: Bearer`.
        token: String,

        /// Account name for the generated config snippet.
        #[arg(long, default_value = "reader")]
        account: String,

        /// Grant the moderator role in the snippet.
        #[arg(long)]
        moderator: bool,
    },
}

#[derive(Debug, Serialize)]
pub struct TokenEntry {
    pub account: String,
    pub digest: String,
    pub moderator: bool,
}

impl TokenEntry {
    fn to_toml(&self) -> String {
        format!(
            "[[auth.tokens]]\naccount = \"{}\"\ndigest = \"{}\"\nmoderator = {}\n",
            self.account, self.digest, self.moderator
        )
    }
}

/// Execute a `quire token` subcommand. Never touches the store.
///
/// # Errors
///
/// Returns an error only if writing output fails.
pub fn run_token(command: &TokenCommand, ctx: &AppContext) -> Result<()> {
    match command {
        TokenCommand::Digest {
            token,
            account,
            moderator,
        } => {
            let entry = TokenEntry {
                account: account.clone(),
                digest: TokenDirectory::digest(token),
                moderator: *moderator,
            };
            render_mode(
                ctx.output,
                &entry,
                |e, w| writeln!(w, "{}", e.digest),
                |e, w| {
                    pretty_section(w, "Add to config.toml")?;
                    write!(w, "{}", e.to_toml())
                },
            )
        }
    }
}

#![forbid(unsafe_code)]

mod cmd;
mod context;
mod output;
mod server;

use clap::{Parser, Subcommand};
use context::AppContext;
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "quire: nested comments and moderation for a personal blog",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Config file (overrides $QUIRE_CONFIG and the user config dir).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Comment store path (overrides config and $QUIRE_DB).
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Act as a configured account instead of the local operator.
    #[arg(long = "as", global = true, value_name = "ACCOUNT")]
    act_as: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Create or migrate the comment store",
        after_help = "EXAMPLES:\n    # Initialize the store named in config\n    quire init\n\n    # Initialize a specific file\n    quire --db ./comments.sqlite3 init"
    )]
    Init,

    #[command(
        next_help_heading = "Setup",
        about = "Run the HTTP comment service",
        after_help = "EXAMPLES:\n    # Serve on the configured address\n    quire serve\n\n    # Override the bind address\n    quire serve --bind 0.0.0.0:9000"
    )]
    Serve(cmd::serve::ServeArgs),

    #[command(next_help_heading = "Posts", about = "Manage the post directory")]
    Post {
        #[command(subcommand)]
        command: cmd::post::PostCommand,
    },

    #[command(
        next_help_heading = "Comments",
        about = "Show the approved comment tree of a post",
        after_help = "EXAMPLES:\n    # By slug\n    quire comments hello-world\n\n    # As JSON\n    quire comments p-0123456789ab --json"
    )]
    Comments(cmd::comments::CommentsArgs),

    #[command(next_help_heading = "Comments", about = "Submit comments")]
    Comment {
        #[command(subcommand)]
        command: cmd::comment::CommentCommand,
    },

    #[command(next_help_heading = "Moderation", about = "Moderate comments")]
    Moderate {
        #[command(subcommand)]
        command: cmd::moderate::ModerateCommand,
    },

    #[command(next_help_heading = "Setup", about = "Bearer token helpers")]
    Token {
        #[command(subcommand)]
        command: cmd::token::TokenCommand,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("QUIRE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "quire=debug,tower_http=debug,info"
        } else {
            "quire=info,warn"
        })
    });

    let format = env::var("QUIRE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: Cli, output: OutputMode) -> anyhow::Result<()> {
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let ctx = AppContext::load(cli.config.as_deref(), cli.db, output, cli.act_as)?;

    match cli.command {
        Commands::Init => cmd::init::run_init(&ctx),
        Commands::Serve(args) => cmd::serve::run_serve(&args, &ctx),
        Commands::Post { command } => cmd::post::run_post(&command, &ctx),
        Commands::Comments(args) => cmd::comments::run_comments(&args, &ctx),
        Commands::Comment { command } => cmd::comment::run_comment(&command, &ctx),
        Commands::Moderate { command } => cmd::moderate::run_moderate(&command, &ctx),
        Commands::Token { command } => cmd::token::run_token(&command, &ctx),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let output = cli.output_mode();

    match run(cli, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if render_error(output, &CliError::from(&err)).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}

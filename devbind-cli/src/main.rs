//! Devbind CLI - Device binding with post-quantum assertions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod gate;
mod utils;

use exit_codes::ExitCode;

#[derive(Parser)]
#[command(name = "devbind")]
#[command(
    author,
    version,
    about = "Device binding with post-quantum assertions",
    long_about = None
)]
#[command(after_help = exit_codes::HELP_TEXT)]
struct Cli {
    /// Show debug logs on stderr
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print data (response JSON, claims), no status lines
    #[arg(short, long, global = true)]
    quiet: bool,

    /// When to use colors
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a device binding callback with a freshly bound key
    Bind {
        /// Path to the callback JSON (`-` for stdin)
        #[arg(value_name = "CALLBACK")]
        callback: PathBuf,

        /// Write the response callback here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Device name reported on success
        #[arg(long, env = "DEVBIND_DEVICE_NAME")]
        device_name: Option<String>,

        /// Device identifier reported on success (defaults to the machine id)
        #[arg(long)]
        device_id: Option<String>,

        /// Key store directory
        #[arg(long, env = "DEVBIND_STORE_DIR", value_name = "DIR")]
        store_dir: Option<PathBuf>,

        /// Confirm user presence without prompting
        #[arg(long, conflicts_with_all = ["deny", "cancel"])]
        yes: bool,

        /// Fail the presence check without prompting
        #[arg(long, conflicts_with = "cancel")]
        deny: bool,

        /// Cancel the presence check without prompting
        #[arg(long)]
        cancel: bool,
    },

    /// Verify a signed binding assertion
    Verify {
        /// Compact JWS, or `@FILE` to read it from a file
        #[arg(value_name = "TOKEN")]
        token: String,

        /// Expected challenge
        #[arg(long)]
        challenge: Option<String>,

        /// Print header and claims as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete the key bound to a user
    Unbind {
        /// User identifier the key was bound to
        #[arg(value_name = "USER_ID")]
        user_id: String,

        /// Key store directory
        #[arg(long, env = "DEVBIND_STORE_DIR", value_name = "DIR")]
        store_dir: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool, ansi: bool) {
    let filter = if verbose {
        EnvFilter::new("devbind=debug,devbind_core=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(exit_codes::USAGE_ERROR);
        }
    };

    match cli.color {
        ColorChoice::Always => colored::control::set_override(true),
        ColorChoice::Never => colored::control::set_override(false),
        ColorChoice::Auto => {}
    }
    init_tracing(cli.verbose, cli.color != ColorChoice::Never);

    let result = match cli.command {
        Commands::Bind {
            callback,
            output,
            device_name,
            device_id,
            store_dir,
            yes,
            deny,
            cancel,
        } => {
            let presence = commands::bind::Presence::from_flags(yes, deny, cancel);
            commands::bind::execute(commands::bind::BindArgs {
                callback,
                output,
                device_name,
                device_id,
                store_dir: utils::resolve_store_dir(store_dir),
                presence,
                quiet: cli.quiet,
            })
            .await
        }
        Commands::Verify {
            token,
            challenge,
            json,
        } => commands::verify::execute(&token, challenge.as_deref(), json, cli.quiet),
        Commands::Unbind { user_id, store_dir } => {
            commands::unbind::execute(&user_id, utils::resolve_store_dir(store_dir), cli.quiet)
        }
    };

    let exit = match result {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };
    if let Some(message) = &exit.message {
        eprintln!("{} {}", "Error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}

// Command-line entry point for package configuration
use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use parcel_configure::ConfigureStatus;
use std::io::stderr;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

mod cmd;
use cmd::check::CheckArgs;
use cmd::configure::ConfigureArgs;

/// Exit code when some non-critical steps failed
const EXIT_PARTIAL: i32 = 2;

#[derive(Parser, Debug)]
#[command(author, version, about = "Stage a package archive and run its action document", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output - shows more detailed logs
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract a package and run one of its documents
    Configure(ConfigureArgs),
    /// Validate an action document without running it
    Check(CheckArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // RUST_LOG wins; otherwise --verbose picks the level for our crates
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "parcel={level},parcel_configure={level},parcel_actions={level},parcel_document={level}",
            level = level
        ))
    });
    registry().with(filter).with(fmt::layer().with_writer(stderr)).init();

    match cli.command {
        Commands::Configure(args) => match cmd::configure::run_configure(args).await? {
            ConfigureStatus::Succeeded => {}
            ConfigureStatus::PartiallyFailed => std::process::exit(EXIT_PARTIAL),
            ConfigureStatus::Failed => {
                error!("Package configure failed");
                std::process::exit(1);
            }
        },
        Commands::Check(args) => cmd::check::run_check(args)?,
    }

    Ok(())
}

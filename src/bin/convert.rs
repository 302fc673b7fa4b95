//! Resource Convert CLI
//!
//! Converts cert-manager resource manifests between API versions.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use resource_convert::codec::{self, OutputFormat};
use resource_convert::{ConversionDriver, ConvertConfig, TargetVersion};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "resource-convert")]
#[command(about = "Convert cert-manager resource manifests between API versions")]
struct Cli {
    /// Additional configuration file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert manifests to another API version
    Convert {
        /// Files or directories to read ("-" for stdin)
        #[arg(short = 'f', long = "filename", required = true)]
        files: Vec<PathBuf>,

        /// Target version, "group/version" or "version" (default: each kind's hub)
        #[arg(long)]
        output_version: Option<String>,

        /// Output format
        #[arg(short, long, value_enum)]
        output: Option<OutputFormat>,

        /// Process directories recursively
        #[arg(short = 'R', long)]
        recursive: bool,
    },

    /// List managed kinds with their versions
    Kinds,

    /// Print the effective configuration
    Config,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = ConvertConfig::load_from(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Convert {
            files,
            output_version,
            output,
            recursive,
        } => {
            let registry = config.build_registry().context("failed to build schema registry")?;
            let driver = ConversionDriver::new(Arc::new(registry));

            let target = match output_version {
                Some(version) => Some(version.parse::<TargetVersion>()?),
                None => config.default_target()?,
            };
            let format = output.unwrap_or(config.output.format);

            let documents = codec::read_sources(&files, recursive || config.input.recursive)?;
            let converted = driver.convert_documents(documents, target.as_ref())?;
            let text = codec::encode(&converted, format)?;

            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }

        Commands::Kinds => {
            let registry = config.build_registry().context("failed to build schema registry")?;
            for kind in registry.kinds() {
                println!(
                    "{:<40} hub={:<8} versions={}",
                    kind.group_kind().to_string(),
                    kind.hub(),
                    kind.versions().join(",")
                );
            }
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

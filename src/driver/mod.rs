use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::RubyIrConfig;

pub mod demo;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inline a sample method into a caller, print the IR and run both.
    Demo {
        /// The config file. Defaults apply when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Splat the call's arguments so they can only be bound at run time.
        #[arg(short, long, default_value_t = false)]
        dynamic: bool,
    },
}

pub fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    match args.command {
        Command::Demo { config, dynamic } => {
            let config = match config {
                Some(path) => RubyIrConfig::load(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => RubyIrConfig::default(),
            };
            init_logging(&config);
            debug!("running with config: {:#?}", config);
            demo::run(&config, dynamic)
        }
    }
}

/// `RUST_LOG` takes precedence over the configured filter.
fn init_logging(config: &RubyIrConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

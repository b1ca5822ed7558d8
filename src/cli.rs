use std::path::PathBuf;

use clap::Parser;
use config::{Config as ConfigBuilder, Environment, File};
use tracing_subscriber::{filter::Targets, prelude::*};

use argus_core::config::{LoggingConfig, RootConfig};
use argus_core::Error;

#[derive(Parser, Debug)]
#[command(
    name = "argus",
    bin_name = "argus",
    author,
    version,
    about = "A fast chain indexer for Cardano-style UTxO blockchains",
    long_about = None
)]
pub struct Cli {
    /// Path to a TOML or JSON configuration file.
    #[arg(short, long, default_value = "argus.toml")]
    pub config: PathBuf,
}

/// Loads `RootConfig` from the file named on the command line, layered with
/// `ARGUS__`-prefixed environment overrides (double underscore as the
/// nesting separator, so `ARGUS__SERVE__LISTEN_ADDRESS` reaches
/// `serve.listen_address`).
pub fn load_config(path: &std::path::Path) -> Result<RootConfig, Error> {
    ConfigBuilder::builder()
        .add_source(File::from(path))
        .add_source(Environment::with_prefix("ARGUS").separator("__"))
        .build()
        .map_err(|err| Error::config(err.to_string()))?
        .try_deserialize()
        .map_err(|err| Error::config(err.to_string()))
}

pub fn setup_tracing(config: &LoggingConfig) -> Result<(), Error> {
    let level: tracing::Level = config
        .max_level
        .parse()
        .map_err(|_| Error::config(format!("invalid log level '{}'", config.max_level)))?;

    let mut filter = Targets::new().with_target("argus", level);

    if config.include_tokio {
        filter = filter.with_target("tokio", level);
    }
    if config.include_pallas {
        filter = filter.with_target("pallas", level);
    }

    tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .finish()
        .with(filter)
        .init();

    Ok(())
}

//! Command-line interface parsing for Biowetter
//!
//! This module handles parsing of CLI arguments using clap and decides
//! whether the binary serves HTTP or prints a single record.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::config::Config;

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The bind address is not a valid socket address
    #[error("Invalid bind address: '{0}'. Expected host:port, e.g. 127.0.0.1:3000")]
    InvalidBind(String),
}

/// Biowetter Wiesbaden - biometeorological weather, pollen, UV and ozone
#[derive(Parser, Debug)]
#[command(name = "biowetter")]
#[command(about = "Biometeorological weather, pollen, UV and ozone data for Wiesbaden")]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file
    ///
    /// Defaults to the platform config directory, e.g.
    /// ~/.config/biowetter/config.toml
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Address to listen on, overrides the config file
    #[arg(long, value_name = "ADDR", env = "BIOWETTER_BIND")]
    pub bind: Option<String>,

    /// Build one record, print it as JSON and exit
    #[arg(long)]
    pub once: bool,
}

/// What the binary does after startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Print one record to stdout
    Once,
    /// Serve the HTTP endpoint
    Serve { bind: SocketAddr },
}

/// Parses a bind address argument.
///
/// # Arguments
/// * `s` - The address string, e.g. `0.0.0.0:8080`
///
/// # Returns
/// * `Ok(SocketAddr)` if the string is a valid socket address
/// * `Err(CliError::InvalidBind)` otherwise
pub fn parse_bind_arg(s: &str) -> Result<SocketAddr, CliError> {
    s.trim()
        .parse()
        .map_err(|_| CliError::InvalidBind(s.to_string()))
}

impl RunMode {
    /// Creates a RunMode from parsed CLI arguments and the loaded config.
    ///
    /// `--bind` wins over the config file's `server.bind`. The address is only
    /// validated when serving.
    pub fn from_cli(cli: &Cli, config: &Config) -> Result<Self, CliError> {
        if cli.once {
            return Ok(RunMode::Once);
        }

        let bind = cli.bind.as_deref().unwrap_or(&config.server.bind);
        Ok(RunMode::Serve {
            bind: parse_bind_arg(bind)?,
        })
    }
}

//! Biowetter Wiesbaden - biometeorological data service
//!
//! Serves one unified JSON record combining DWD biometeorology, pollen, UV
//! and ozone data for Wiesbaden, or prints it once with `--once`.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use biowetter::aggregate::Aggregator;
use biowetter::cli::{Cli, RunMode};
use biowetter::config::Config;
use biowetter::server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so --once output stays clean JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let mode = RunMode::from_cli(&cli, &config)?;
    let aggregator = Aggregator::new(config);

    match mode {
        RunMode::Once => {
            let record = aggregator.build_record().await;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        RunMode::Serve { bind } => {
            server::serve(aggregator, bind).await?;
        }
    }

    Ok(())
}

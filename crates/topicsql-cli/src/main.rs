//! topicsql command line
//!
//! Rewrites queries written against per-topic logical tables into queries
//! over the shared physical `jsonb` table, either offline or with field
//! metadata sampled from PostgreSQL.

use clap::Parser;
use tracing::{info_span, Instrument};
use uuid::Uuid;

mod cli;
mod commands;
mod config;
mod logging;

use cli::Cli;
use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables (database password)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    config.apply_logging_env();
    logging::init();

    let request_id = Uuid::new_v4();
    let span = info_span!("request", %request_id);
    commands::run(cli, &config).instrument(span).await
}

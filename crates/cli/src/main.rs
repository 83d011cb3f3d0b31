//! # hpetl: Harry Potter API to MongoDB
//!
//! Thin entrypoint for the `hpetl` binary. All logic lives in the
//! `hpetl_cli` library crate.

use anyhow::Result;
use clap::Parser;
use hpetl_cli::{run, Cli};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Setup logging
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive("hpetl=info".parse()?))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // 2. Pick up a local .env before clap reads `env` defaults
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // 3. Run the command and map any failure to exit code 1
    if let Err(e) = run(cli).await {
        eprintln!("[hpetl error] {e:#}");
        std::process::exit(1);
    }

    Ok(())
}

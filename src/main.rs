use anyhow::{Context, Result};
use clap::Parser;
use shortener_core::config::{CliOverrides, Config};
use shortener_core::lifecycle;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let overrides = CliOverrides::parse();
    let config = Config::from_env()?.with_overrides(overrides);
    config.validate()?;

    init_tracing(&config)?;
    config.print_summary();

    lifecycle::run(config).await
}

fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_level)
        .with_context(|| format!("Invalid log filter '{}'", config.log_level))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

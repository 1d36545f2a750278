use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sd_cli::commands::{event, hours, report, rules, sla, status, sweep, timer};
use sd_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // try_init so tests that call main paths twice don't panic
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let config =
        Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let stdout = std::io::stdout();
    let mut writer = stdout.lock();

    match &cli.command {
        Commands::Status => status::run(&mut writer, &config)?,
        Commands::Timer { action } => timer::run(&mut writer, &config, action)?,
        Commands::Hours { action } => hours::run(&mut writer, &config, action)?,
        Commands::Rules { action } => rules::run(&mut writer, &config, action)?,
        Commands::Event { event } => event::run(&mut writer, &config, event)?,
        Commands::Sla { ticket, at, json } => {
            sla::run(&mut writer, &config, ticket, at.as_deref(), *json)?;
        }
        Commands::Sweep { at } => sweep::run(&mut writer, &config, at.as_deref())?,
        Commands::Report { start, end, json } => {
            report::run(&mut writer, &config, start.as_deref(), end.as_deref(), *json)?;
        }
    }

    Ok(())
}

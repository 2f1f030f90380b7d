use anyhow::Context;
use clap::Parser;
use quicd_trace_cli::commands;
use quicd_trace_cli::config::{self, CliArgs};
use quicd_trace_cli::telemetry;

fn main() -> anyhow::Result<()> {
    let cli = CliArgs::parse();

    if cli.print_default_config {
        println!("{}", config::loader::default_config_toml()?);
        return Ok(());
    }

    let config = config::load_config(&cli)?;

    if cli.validate {
        println!("✓ Configuration is valid");
        return Ok(());
    }

    telemetry::init_logging(&config.logging).context("failed to initialize logging")?;

    let Some(command) = cli.command else {
        anyhow::bail!("no subcommand given: use frames, ticket or transport-params");
    };

    commands::run(&command, &config)
        .with_context(|| format!("{} failed", command_name(&command)))
}

fn command_name(command: &config::Command) -> &'static str {
    match command {
        config::Command::Frames(_) => "frames",
        config::Command::Ticket(_) => "ticket",
        config::Command::TransportParams(_) => "transport-params",
    }
}

// forksync CLI entry point.

use clap::Parser;

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "forksync", about = "Keep a fork clone in sync with its upstream")]
struct Cli {
    #[command(subcommand)]
    command: Option<commands::Command>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    // Bare invocation runs the sync workflow.
    commands::run(cli.command.unwrap_or_default())
}
